//! MCP tool and resource definitions and handlers
//!
//! Marshals arguments into the Gmail client and its results back into MCP
//! payloads.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{GmailMcpError, McpError, Result};
use crate::gmail::client::GmailClient;
use crate::mcp::types::{
    CallToolResult, JsonRpcError, ReadResourceResult, ResourceContent, ResourceTemplate, Tool,
};

/// URI scheme and authority of conversation resources
const CONVERSATION_URI_PREFIX: &str = "email://gmail/";

/// Arguments of `search_mailbox`
#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct SearchMailboxArgs {
    /// The query used to search the mailbox, syntax is the same as for Gmail search.
    #[validate(length(min = 1))]
    pub query: String,

    /// Address of the mailbox to search.
    #[validate(email)]
    pub mail_address: String,
}

/// Arguments of `get_mail_conversation`
#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct MailConversationArgs {
    /// Address of the mailbox holding the message.
    #[validate(email)]
    pub mail_address: String,

    /// ID of the message, as returned by search_mailbox.
    #[validate(length(min = 1))]
    pub message_id: String,
}

/// Tool handler
pub struct ToolHandler {
    gmail_client: Arc<GmailClient>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self { gmail_client }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def::<SearchMailboxArgs>(
                "search_mailbox",
                "Searches the mailbox with Gmail search syntax. Returns the id of exactly one matching message.",
            ),
            tool_def::<MailConversationArgs>(
                "get_mail_conversation",
                "Retrieves sender, recipient and plain text content of a message",
            ),
        ]
    }

    /// List the resource templates
    pub fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: format!("{}{{mail_address}}/{{message_id}}", CONVERSATION_URI_PREFIX),
            name: "get_mail_conversation".to_string(),
            description: Some(
                "Sender, recipient and plain text content of a message".to_string(),
            ),
            mime_type: Some("application/json".to_string()),
        }]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        let result = match name {
            "search_mailbox" => self.handle_search_mailbox(args).await,
            "get_mail_conversation" => self.handle_get_mail_conversation(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        };

        match result {
            Ok(value) => CallToolResult::json(value),
            Err(e) => {
                tracing::debug!(tool = %name, error = %e, "Tool call failed");
                tool_error(&e)
            }
        }
    }

    /// Read a conversation resource by URI
    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let (mail_address, message_id) =
            parse_conversation_uri(uri).ok_or_else(|| McpError::UnknownResource {
                uri: uri.to_string(),
            })?;

        let value = self
            .get_mail_conversation(MailConversationArgs {
                mail_address,
                message_id,
            })
            .await?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                text: Some(value.to_string()),
                mime_type: Some("application/json".to_string()),
            }],
        })
    }

    // ==================== Tool Handlers ====================

    async fn handle_search_mailbox(&self, args: Value) -> Result<Value> {
        let args: SearchMailboxArgs = parse_args(args)?;

        let result = self
            .gmail_client
            .search(&args.query, &args.mail_address)
            .await?;

        Ok(serde_json::to_value(result)?)
    }

    async fn handle_get_mail_conversation(&self, args: Value) -> Result<Value> {
        let args: MailConversationArgs = parse_args(args)?;
        self.get_mail_conversation(args).await
    }

    async fn get_mail_conversation(&self, args: MailConversationArgs) -> Result<Value> {
        args.validate().map_err(invalid_arguments)?;

        let conversation = self
            .gmail_client
            .get_conversation(&args.mail_address, &args.message_id)
            .await?;

        Ok(serde_json::to_value(conversation)?)
    }
}

/// Deserialize and validate tool arguments
fn parse_args<T>(args: Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let args: T = serde_json::from_value(args).map_err(invalid_arguments)?;
    args.validate().map_err(invalid_arguments)?;
    Ok(args)
}

fn invalid_arguments(err: impl std::fmt::Display) -> GmailMcpError {
    GmailMcpError::Mcp(McpError::InvalidArguments {
        message: err.to_string(),
    })
}

/// Tool result for a failed call; login-required failures carry the consent URL
fn tool_error(err: &GmailMcpError) -> CallToolResult {
    let result = CallToolResult::error(err.to_string());

    match err.authorization_url() {
        Some(url) => result.with_structured_content(json!({
            "loginRequired": true,
            "authorizationUrl": url,
        })),
        None => result,
    }
}

/// JSON-RPC error for a failed resource read
pub fn resource_error(err: &GmailMcpError) -> JsonRpcError {
    let mut data = json!({ "code": err.code() });
    if let Some(url) = err.authorization_url() {
        data["authorizationUrl"] = json!(url);
    }

    let error = match err {
        GmailMcpError::Mcp(McpError::UnknownResource { .. })
        | GmailMcpError::Gmail(crate::error::GmailApiError::MessageNotFound { .. }) => {
            JsonRpcError::resource_not_found(err.to_string())
        }
        GmailMcpError::Mcp(McpError::InvalidArguments { .. }) => {
            JsonRpcError::invalid_params(err.to_string())
        }
        _ => JsonRpcError::internal_error(err.to_string()),
    };

    error.with_data(data)
}

/// Split `email://gmail/{mail_address}/{message_id}` into its parts
fn parse_conversation_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix(CONVERSATION_URI_PREFIX)?;
    let (mail_address, message_id) = rest.split_once('/')?;
    if mail_address.is_empty() || message_id.is_empty() || message_id.contains('/') {
        return None;
    }

    let mail_address = urlencoding::decode(mail_address).ok()?.into_owned();
    let message_id = urlencoding::decode(message_id).ok()?.into_owned();
    Some((mail_address, message_id))
}

fn tool_def<T: JsonSchema>(name: &str, description: &str) -> Tool {
    let mut input_schema =
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}));

    // Clients expect a bare object schema
    if let Some(schema) = input_schema.as_object_mut() {
        schema.remove("$schema");
        schema.remove("title");
    }

    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}
