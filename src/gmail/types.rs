//! Gmail API type definitions
//!
//! Provider responses are read with only the fields the server consumes;
//! everything else in the payload is ignored.

use serde::{Deserialize, Serialize};

/// A MIME part of a message
///
/// The payload of a message is itself a part; multipart payloads nest further
/// parts to arbitrary depth.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Empty when the API omits it
    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub headers: Vec<Header>,

    #[serde(default)]
    pub body: MessagePartBody,

    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body of a message part
///
/// Large bodies come back with an `attachmentId` and no inline data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,

    /// Size in bytes; zero means the part has no body
    #[serde(default)]
    pub size: i64,

    /// Base64url-encoded content
    #[serde(default)]
    pub data: Option<String>,
}

/// A message fetched with `format=full`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,

    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// One page of `users.messages.list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Absent entirely when nothing matched
    #[serde(default)]
    pub messages: Vec<MessageRef>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,

    #[serde(default)]
    pub thread_id: String,
}

/// OAuth2 user-info response
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a single-match mailbox search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
}

/// A message flattened to sender, recipient and plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConversation {
    pub from: String,
    pub to: String,
    pub conversation: String,
}
