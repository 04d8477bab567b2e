//! Gmail API client
//!
//! Mailbox queries on behalf of a logged-in user.

use std::sync::Arc;

use crate::config::gmail::{API_BASE_URL, USER_ID};
use crate::error::{GmailApiError, GmailMcpError, Result};
use crate::gmail::auth::Authenticator;
use crate::gmail::types::*;
use crate::gmail::utils::{decode_message, find_header};

/// Gmail API client
pub struct GmailClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// OAuth authenticator
    authenticator: Arc<Authenticator>,

    /// API base URL
    api_base: String,
}

impl GmailClient {
    /// Create a new Gmail client
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            authenticator,
            api_base: API_BASE_URL.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Access token for `email`, or a login-required error
    async fn access_token(&self, email: &str) -> Result<String> {
        let credential = self.authenticator.require_credentials(email).await?;
        Ok(credential.access_token)
    }

    /// Base URL for messages
    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.api_base, USER_ID)
    }

    /// Find the single message matching `query` (Gmail search syntax)
    ///
    /// Zero matches and more than one match are both errors.
    pub async fn search(&self, query: &str, email: &str) -> Result<SearchResult> {
        let token = self.access_token(email).await?;

        let response = self
            .http_client
            .get(self.messages_url())
            .query(&[("q", query), ("maxResults", "1")])
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                message: format!("Failed to search messages ({}): {}", status, text),
            }));
        }

        let message_list: MessageList = response.json().await?;

        // A next page means a second candidate exists
        if message_list.messages.len() > 1 || message_list.next_page_token.is_some() {
            return Err(GmailMcpError::Gmail(GmailApiError::AmbiguousMatch {
                query: query.to_string(),
            }));
        }

        match message_list.messages.into_iter().next() {
            Some(message) => {
                tracing::debug!(
                    %email,
                    message_id = %message.id,
                    thread_id = %message.thread_id,
                    "Search matched one message"
                );
                Ok(SearchResult { id: message.id })
            }
            None => Err(GmailMcpError::Gmail(GmailApiError::NoMatch {
                query: query.to_string(),
            })),
        }
    }

    /// Get a message by ID
    async fn get_message(&self, token: &str, message_id: &str) -> Result<Message> {
        let url = format!(
            "{}/{}",
            self.messages_url(),
            urlencoding::encode(message_id)
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[("format", "full")])
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else if response.status().as_u16() == 404 {
            Err(GmailMcpError::Gmail(GmailApiError::MessageNotFound {
                message_id: message_id.to_string(),
            }))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(GmailMcpError::Gmail(GmailApiError::RequestFailed {
                message: format!("Failed to get message ({}): {}", status, text),
            }))
        }
    }

    /// Get a message flattened to sender, recipient and plain text
    pub async fn get_conversation(&self, email: &str, message_id: &str) -> Result<MailConversation> {
        let token = self.access_token(email).await?;
        let message = self.get_message(&token, message_id).await?;

        let header = |name: &str| -> Result<String> {
            message
                .payload
                .as_ref()
                .and_then(|p| find_header(p, name))
                .map(str::to_string)
                .ok_or_else(|| {
                    GmailMcpError::Gmail(GmailApiError::MissingHeader {
                        message_id: message_id.to_string(),
                        name: name.to_string(),
                    })
                })
        };

        let from = header("From")?;
        let to = header("To")?;
        let conversation = decode_message(&message)?;

        if conversation.is_empty() {
            tracing::debug!("Message {} has no plain text content", message_id);
        }

        Ok(MailConversation {
            from,
            to,
            conversation,
        })
    }
}
