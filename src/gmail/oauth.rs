//! OAuth 2.0 provider protocol
//!
//! Talks to the provider's authorization, token and user-info endpoints:
//! - Loading client credentials
//! - Building consent URLs
//! - Exchanging authorization codes and refreshing tokens

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{AuthError, GmailMcpError, Result};
use crate::gmail::credentials::Credential;
use crate::gmail::types::UserInfo;

/// OAuth client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthKeys {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    pub auth_uri: String,

    /// Token URI
    pub token_uri: String,
}

/// OAuth keys file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct OAuthKeysFile {
    #[serde(alias = "web")]
    installed: Option<OAuthKeys>,
}

impl OAuthKeys {
    /// Load OAuth keys from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GmailMcpError::Auth(AuthError::KeysFileNotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        let keys_file: OAuthKeysFile = serde_json::from_str(&content)?;

        keys_file
            .installed
            .ok_or(GmailMcpError::Auth(AuthError::InvalidKeysFormat))
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token response from OAuth token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| {
            Duration::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or(if secs > 0 { DateTime::<Utc>::MAX_UTC } else { now })
        })
    }

    fn scopes(&self) -> Option<Vec<String>> {
        self.scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.split_whitespace().map(str::to_string).collect())
    }
}

/// Client for the provider's OAuth endpoints
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// OAuth client credentials
    keys: OAuthKeys,

    /// Redirect URI registered with the provider
    redirect_uri: String,

    /// Scopes requested at consent time
    scopes: Vec<String>,

    /// User-info endpoint
    userinfo_url: String,
}

impl OAuthClient {
    /// Create a new OAuth client
    pub fn new(
        http_client: reqwest::Client,
        keys: OAuthKeys,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            http_client,
            keys,
            redirect_uri: redirect_uri.into(),
            scopes,
            userinfo_url: crate::config::gmail::USERINFO_URL.to_string(),
        }
    }

    pub fn with_userinfo_url(mut self, userinfo_url: impl Into<String>) -> Self {
        self.userinfo_url = userinfo_url.into();
        self
    }

    /// Generate the consent URL for `login_hint`
    ///
    /// Offline access plus forced consent guarantee a refresh token even when
    /// the account granted access before.
    pub fn authorization_url(&self, login_hint: &str, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&include_granted_scopes=true&login_hint={}&prompt=consent&state={}",
            self.keys.auth_uri,
            urlencoding::encode(&self.keys.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(login_hint),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for a token set
    ///
    /// The returned credential has no email yet; see [`OAuthClient::fetch_user_email`].
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let params = [
            ("client_id", self.keys.client_id.as_str()),
            ("client_secret", self.keys.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(exchange_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                message: format!("token endpoint returned {}: {}", status, text),
            }));
        }

        let token_response: TokenResponse = response.json().await.map_err(exchange_failed)?;

        let scopes = match token_response.scopes() {
            Some(granted) => {
                let missing: Vec<&str> = self
                    .scopes
                    .iter()
                    .filter(|s| !granted.contains(s))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                        message: format!("scope mismatch, not granted: {}", missing.join(" ")),
                    }));
                }
                granted
            }
            None => self.scopes.clone(),
        };

        Ok(Credential {
            email: String::new(),
            expiry: token_response.expiry(Utc::now()),
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_type: token_response.token_type,
            scopes,
        })
    }

    /// Refresh the access token of `credential`
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
            GmailMcpError::Auth(AuthError::TokenRefreshFailed {
                message: "No refresh token available".to_string(),
            })
        })?;

        let params = [
            ("client_id", self.keys.client_id.as_str()),
            ("client_secret", self.keys.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Auth(AuthError::TokenRefreshFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;

        Ok(Credential {
            email: credential.email.clone(),
            expiry: token_response.expiry(Utc::now()),
            scopes: token_response
                .scopes()
                .unwrap_or_else(|| credential.scopes.clone()),
            access_token: token_response.access_token,
            // Providers usually omit the refresh token on refresh
            refresh_token: token_response
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            token_type: token_response.token_type,
        })
    }

    /// Look up the email of the account an access token belongs to
    pub async fn fetch_user_email(&self, access_token: &str) -> Result<String> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(exchange_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                message: format!("user-info lookup returned {}: {}", status, text),
            }));
        }

        let user_info: UserInfo = response.json().await.map_err(exchange_failed)?;

        user_info
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                GmailMcpError::Auth(AuthError::TokenExchangeFailed {
                    message: "user-info response has no email".to_string(),
                })
            })
    }
}

fn exchange_failed(err: reqwest::Error) -> GmailMcpError {
    GmailMcpError::Auth(AuthError::TokenExchangeFailed {
        message: err.to_string(),
    })
}
