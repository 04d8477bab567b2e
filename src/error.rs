//! Error types for the Gmail assistant MCP server
//!
//! This module defines the error hierarchy for all operations in the server.

use thiserror::Error;

/// Main error type for the Gmail assistant MCP server
#[derive(Error, Debug)]
pub enum GmailMcpError {
    /// OAuth authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Gmail API errors
    #[error("Gmail API error: {0}")]
    Gmail(#[from] GmailApiError),

    /// Credential persistence errors
    #[error("Credential store error: {0}")]
    CredentialStore(#[from] CredentialStoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GmailMcpError {
    /// Authorization URL to hand to the user when this is a login-required error
    pub fn authorization_url(&self) -> Option<&str> {
        match self {
            GmailMcpError::Auth(AuthError::LoginRequired {
                authorization_url, ..
            }) => Some(authorization_url),
            _ => None,
        }
    }

    /// Stable machine-readable code for protocol error payloads
    pub fn code(&self) -> &'static str {
        match self {
            GmailMcpError::Auth(AuthError::LoginRequired { .. }) => "login_required",
            GmailMcpError::Auth(AuthError::TokenExchangeFailed { .. }) => "exchange_failed",
            GmailMcpError::Auth(_) => "auth_failed",
            GmailMcpError::Gmail(GmailApiError::NoMatch { .. }) => "no_match",
            GmailMcpError::Gmail(GmailApiError::AmbiguousMatch { .. }) => "ambiguous_match",
            GmailMcpError::Gmail(GmailApiError::MissingHeader { .. }) => "missing_header",
            GmailMcpError::Gmail(GmailApiError::MessageNotFound { .. }) => "not_found",
            GmailMcpError::Gmail(_) => "gmail_api",
            GmailMcpError::CredentialStore(_) => "credential_store",
            GmailMcpError::Mcp(McpError::InvalidArguments { .. }) => "invalid_input",
            _ => "internal",
        }
    }
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth keys file not found: {path}")]
    KeysFileNotFound { path: String },

    #[error("Invalid OAuth keys format: expected 'installed' or 'web' credentials")]
    InvalidKeysFormat,

    #[error("Login is required! Open {authorization_url} to login.")]
    LoginRequired {
        email: String,
        authorization_url: String,
    },

    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,
}

/// Gmail API errors
#[derive(Error, Debug)]
pub enum GmailApiError {
    #[error("No messages found for query: {query}")]
    NoMatch { query: String },

    #[error("More than one message found for query: {query}")]
    AmbiguousMatch { query: String },

    #[error("Message {message_id} has no '{name}' header")]
    MissingHeader { message_id: String, name: String },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Message body could not be decoded: {message}")]
    UndecodableBody { message: String },

    #[error("API request failed: {message}")]
    RequestFailed { message: String },
}

/// Credential persistence errors
///
/// Every variant is treated as "not logged in" by the login check.
#[derive(Error, Debug)]
pub enum CredentialStoreError {
    #[error("No stored credentials for {email}")]
    NotFound { email: String },

    #[error("Stored credentials for {email} are unreadable: {message}")]
    Corrupt { email: String, message: String },

    #[error("Cannot use '{email}' as a credential key")]
    InvalidKey { email: String },

    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found: {path}")]
    DirNotFound { path: String },

    #[error("Failed to create config directory: {path}")]
    DirCreationFailed { path: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Unknown resource: {uri}")]
    UnknownResource { uri: String },
}

/// Result type alias for Gmail MCP operations
pub type Result<T> = std::result::Result<T, GmailMcpError>;
