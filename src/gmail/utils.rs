//! Gmail utility functions
//!
//! Base64url handling, header lookup and flattening of MIME payloads to text.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::{GmailApiError, GmailMcpError, Result};
use crate::gmail::types::{Message, MessagePart, MessagePartBody};

const TEXT_PLAIN: &str = "text/plain";

/// Decode base64url data from Gmail API
/// Handles both padded and non-padded base64url encoding
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    // Gmail API typically returns unpadded data
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(data))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(data))
        .map_err(|e| {
            GmailMcpError::Gmail(GmailApiError::UndecodableBody {
                message: e.to_string(),
            })
        })
}

/// Decode base64url data to string
pub fn decode_base64url_string(data: &str) -> Result<String> {
    let bytes = decode_base64url(data)?;
    String::from_utf8(bytes).map_err(|e| {
        GmailMcpError::Gmail(GmailApiError::UndecodableBody {
            message: e.to_string(),
        })
    })
}

/// Flatten a message to the plain text it carries
///
/// A single-part payload contributes its own body. A multipart payload
/// contributes every `text/plain` part, depth first, in part order.
pub fn decode_message(message: &Message) -> Result<String> {
    let Some(payload) = message.payload.as_ref() else {
        return Ok(String::new());
    };

    if payload.parts.is_empty() {
        decode_body(&payload.body)
    } else {
        decode_parts(&payload.parts)
    }
}

/// Concatenate the decoded `text/plain` bodies found in `parts` and their descendants
pub fn decode_parts(parts: &[MessagePart]) -> Result<String> {
    let mut content = String::new();

    for part in parts {
        if part.mime_type == TEXT_PLAIN {
            content.push_str(&decode_body(&part.body)?);
        }
        content.push_str(&decode_parts(&part.parts)?);
    }

    Ok(content)
}

/// Decode a single body, trimmed. Empty bodies yield an empty string.
pub fn decode_body(body: &MessagePartBody) -> Result<String> {
    if body.size == 0 {
        return Ok(String::new());
    }

    match body.data.as_deref() {
        Some(data) => Ok(decode_base64url_string(data)?.trim().to_string()),
        None => Ok(String::new()),
    }
}

/// Find the first header value by name (case-insensitive)
pub fn find_header<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}
