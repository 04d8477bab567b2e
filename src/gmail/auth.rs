//! OAuth authorization flow for Gmail API
//!
//! Handles the per-mailbox login lifecycle:
//! - Generating consent URLs
//! - Exchanging authorization codes and storing the resulting credentials
//! - Gating mailbox access behind a valid login

use std::sync::Arc;

use crate::config::Config;
use crate::error::{AuthError, GmailMcpError, Result};
use crate::gmail::credentials::{Credential, CredentialManager, CredentialStore, FileCredentialStore};
use crate::gmail::oauth::{OAuthClient, OAuthKeys};

/// OAuth authenticator
pub struct Authenticator {
    /// Provider endpoints
    oauth: OAuthClient,

    /// Stored credentials
    credentials: CredentialManager,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(oauth: OAuthClient, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            credentials: CredentialManager::new(store, oauth.clone()),
            oauth,
        }
    }

    /// Build an authenticator from configuration, using file-backed credentials
    pub fn from_config(config: &Config) -> Result<Self> {
        // Try to find and copy OAuth keys from current directory
        config.find_and_copy_oauth_keys()?;

        let keys = OAuthKeys::load(&config.oauth_path)?;
        let oauth = OAuthClient::new(
            reqwest::Client::new(),
            keys,
            config.oauth_redirect_uri.clone(),
            config.scopes.clone(),
        )
        .with_userinfo_url(config.userinfo_url.clone());

        let store = Arc::new(FileCredentialStore::new(config.credentials_dir.clone()));
        Ok(Self::new(oauth, store))
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// Generate the consent URL for `email`
    ///
    /// The email only pre-fills the provider's account chooser.
    pub fn authorization_url(&self, email: &str) -> String {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.oauth.authorization_url(email, &state)
    }

    /// Error telling the caller to send `email` through the consent flow
    pub fn login_required(&self, email: &str) -> GmailMcpError {
        GmailMcpError::Auth(AuthError::LoginRequired {
            email: email.to_string(),
            authorization_url: self.authorization_url(email),
        })
    }

    /// Credentials for `email`, or a login-required error carrying a consent URL
    pub async fn require_credentials(&self, email: &str) -> Result<Credential> {
        if !self.credentials.is_logged_in(email).await {
            return Err(self.login_required(email));
        }
        self.credentials.get_credentials(email).await
    }

    /// Exchange an authorization code for tokens and store them
    ///
    /// The credential is stored under the email reported by the user-info
    /// endpoint, which may differ from the login hint.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<Credential> {
        if code.is_empty() {
            return Err(GmailMcpError::Auth(AuthError::NoAuthCode));
        }
        if state.is_empty() {
            return Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                message: "missing state parameter".to_string(),
            }));
        }

        let mut credential = self.oauth.exchange_code(code).await?;
        credential.email = self.oauth.fetch_user_email(&credential.access_token).await?;

        self.credentials.save(&credential).await?;
        tracing::info!(email = %credential.email, "Stored credentials for authorized mailbox");

        Ok(credential)
    }
}
