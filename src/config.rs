//! Configuration management for the Gmail assistant MCP server
//!
//! Handles paths, environment variables, and configuration loading.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, GmailMcpError, Result};

/// Configuration for the Gmail assistant MCP server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to OAuth keys file (client credentials)
    pub oauth_path: PathBuf,

    /// Directory holding one credential file per authorized mailbox
    pub credentials_dir: PathBuf,

    /// OAuth redirect URI registered with the provider
    pub oauth_redirect_uri: String,

    /// Address the HTTP front-end listens on
    pub bind_address: SocketAddr,

    /// Gmail API base URL
    pub gmail_api_base: String,

    /// OAuth2 user-info endpoint
    pub userinfo_url: String,

    /// OAuth scopes requested at consent time
    pub scopes: Vec<String>,
}

impl Config {
    /// Create a new configuration from the environment with default paths
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let mut config = Self::for_dir(&config_dir);

        if let Ok(path) = std::env::var("GMAIL_OAUTH_PATH") {
            config.oauth_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("GMAIL_CREDENTIALS_DIR") {
            config.credentials_dir = PathBuf::from(dir);
        }

        if let Ok(bind) = std::env::var("GMAIL_MCP_BIND") {
            config.bind_address = parse_bind_address(&bind)?;
        }

        config.oauth_redirect_uri = std::env::var("GMAIL_OAUTH_REDIRECT_URI")
            .unwrap_or_else(|_| default_redirect_uri(config.bind_address));

        if let Ok(base) = std::env::var("GMAIL_API_BASE") {
            config.gmail_api_base = base;
        }

        if let Ok(url) = std::env::var("GMAIL_USERINFO_URL") {
            config.userinfo_url = url;
        }

        Ok(config)
    }

    /// Configuration rooted at `config_dir` with every other setting at its default
    pub fn for_dir(config_dir: &Path) -> Self {
        let bind_address = SocketAddr::from(([127, 0, 0, 1], 8080));

        Self {
            config_dir: config_dir.to_path_buf(),
            oauth_path: config_dir.join("gcp-oauth.keys.json"),
            credentials_dir: config_dir.join("user-credentials"),
            oauth_redirect_uri: default_redirect_uri(bind_address),
            bind_address,
            gmail_api_base: gmail::API_BASE_URL.to_string(),
            userinfo_url: gmail::USERINFO_URL.to_string(),
            scopes: gmail::SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the bind address, keeping the default redirect URI in step
    pub fn with_bind_address(mut self, bind: &str) -> Result<Self> {
        let previous_default = default_redirect_uri(self.bind_address);
        self.bind_address = parse_bind_address(bind)?;
        if self.oauth_redirect_uri == previous_default {
            self.oauth_redirect_uri = default_redirect_uri(self.bind_address);
        }
        Ok(self)
    }

    /// Get the configuration directory, creating it if necessary
    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| {
                GmailMcpError::Config(ConfigError::DirNotFound {
                    path: "~".to_string(),
                })
            })?
            .join(".gmail-assistant");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|_| {
                GmailMcpError::Config(ConfigError::DirCreationFailed {
                    path: config_dir.display().to_string(),
                })
            })?;
        }

        Ok(config_dir)
    }

    /// Check if OAuth keys file exists
    pub fn oauth_keys_exist(&self) -> bool {
        self.oauth_path.exists()
    }

    /// Try to find OAuth keys in current directory and copy to config dir
    pub fn find_and_copy_oauth_keys(&self) -> Result<bool> {
        let local_oauth = std::env::current_dir()
            .map_err(GmailMcpError::Io)?
            .join("gcp-oauth.keys.json");

        if local_oauth.exists() && !self.oauth_keys_exist() {
            std::fs::copy(&local_oauth, &self.oauth_path).map_err(GmailMcpError::Io)?;
            return Ok(true);
        }

        Ok(false)
    }
}

fn parse_bind_address(bind: &str) -> Result<SocketAddr> {
    bind.parse().map_err(|e| {
        GmailMcpError::Config(ConfigError::InvalidConfig {
            message: format!("invalid bind address '{}': {}", bind, e),
        })
    })
}

fn default_redirect_uri(bind_address: SocketAddr) -> String {
    format!("http://localhost:{}/oauth2/callback", bind_address.port())
}

/// Google API constants
pub mod gmail {
    /// Base URL for Gmail API
    pub const API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// OAuth2 user-info endpoint used to discover the authorized mailbox
    pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";

    /// Scopes requested at consent time
    pub const SCOPES: &[&str] = &[
        "https://www.googleapis.com/auth/gmail.readonly",
        "https://www.googleapis.com/auth/userinfo.email",
        "openid",
    ];
}
