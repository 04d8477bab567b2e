//! Per-mailbox credential persistence
//!
//! One credential record per email address. The login check may refresh
//! and rewrite a record; plain fetches never touch the provider.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CredentialStoreError, GmailMcpError, Result};
use crate::gmail::oauth::OAuthClient;

/// Tokens this close to expiry are refreshed early
const EXPIRY_SKEW_SECS: i64 = 300;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Stored OAuth token set for one mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Mailbox identity this record belongs to
    #[serde(default)]
    pub email: String,

    /// Access token
    pub access_token: String,

    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Access token expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Whether the access token is expired, or about to be, at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| {
            // Expiries at the edge of the representable range count as expired
            expiry
                .checked_sub_signed(Duration::seconds(EXPIRY_SKEW_SECS))
                .map_or(true, |refresh_at| refresh_at <= now)
        })
    }

    /// Whether the access token can be used as-is at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }
}

/// Storage backend for credential records, keyed by email
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the record for `email`
    async fn get(&self, email: &str) -> std::result::Result<Credential, CredentialStoreError>;

    /// Create or replace the record for `credential.email`
    async fn put(&self, credential: &Credential) -> std::result::Result<(), CredentialStoreError>;
}

/// Credential store keeping one JSON file per email in a directory
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the record for `email`
    pub fn credential_path(&self, email: &str) -> std::result::Result<PathBuf, CredentialStoreError> {
        let usable = !email.is_empty()
            && !email.starts_with('.')
            && !email.contains(['/', '\\', '\0']);

        if !usable {
            return Err(CredentialStoreError::InvalidKey {
                email: email.to_string(),
            });
        }

        Ok(self.dir.join(format!("{}.json", email)))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, email: &str) -> std::result::Result<Credential, CredentialStoreError> {
        let path = self.credential_path(email)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialStoreError::NotFound {
                    email: email.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut credential: Credential =
            serde_json::from_str(&content).map_err(|e| CredentialStoreError::Corrupt {
                email: email.to_string(),
                message: e.to_string(),
            })?;

        // The file name is the identity key
        credential.email = email.to_string();
        Ok(credential)
    }

    async fn put(&self, credential: &Credential) -> std::result::Result<(), CredentialStoreError> {
        let path = self.credential_path(&credential.email)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let content = serde_json::to_string_pretty(credential).map_err(|e| {
            CredentialStoreError::Corrupt {
                email: credential.email.clone(),
                message: e.to_string(),
            }
        })?;

        // Write atomically (write to temp, then rename); each writer gets its own temp file
        let temp_path =
            path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(email = %credential.email, path = %path.display(), "Stored credentials");
        Ok(())
    }
}

/// Login checks and credential access on top of a [`CredentialStore`]
///
/// Two concurrent refreshes for the same email are not serialized; the last
/// write wins.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    oauth: OAuthClient,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn CredentialStore>, oauth: OAuthClient) -> Self {
        Self { store, oauth }
    }

    /// Whether `email` has usable credentials, refreshing them if needed
    ///
    /// Fails closed: missing, unreadable or unrefreshable records all yield
    /// `false`. A failed refresh leaves the stale record in place.
    pub async fn is_logged_in(&self, email: &str) -> bool {
        let credential = match self.store.get(email).await {
            Ok(credential) => credential,
            Err(CredentialStoreError::NotFound { .. }) => {
                tracing::debug!(%email, "No stored credentials");
                return false;
            }
            Err(e) => {
                tracing::warn!(%email, error = %e, "Ignoring unusable credentials");
                return false;
            }
        };

        if credential.is_valid(Utc::now()) {
            return true;
        }

        if credential.refresh_token.is_none() {
            tracing::debug!(%email, "Credentials expired and cannot be refreshed");
            return false;
        }

        let refreshed = match self.oauth.refresh(&credential).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::warn!(%email, error = %e, "Token refresh failed");
                return false;
            }
        };

        match self.store.put(&refreshed).await {
            Ok(()) => {
                tracing::info!(%email, "Refreshed access token");
                true
            }
            Err(e) => {
                tracing::warn!(%email, error = %e, "Could not persist refreshed credentials");
                false
            }
        }
    }

    /// Fetch the stored record without any validity check
    ///
    /// Callers check [`CredentialManager::is_logged_in`] first.
    pub async fn get_credentials(&self, email: &str) -> Result<Credential> {
        Ok(self.store.get(email).await?)
    }

    /// Persist a credential under its email
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        self.store
            .put(credential)
            .await
            .map_err(GmailMcpError::CredentialStore)
    }
}
