//! Integration tests for the Gmail assistant MCP server
//!
//! These tests drive the MCP dispatcher and the HTTP front-end against mocked
//! OAuth and Gmail endpoints - they don't make real API calls.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gmail_assistant_mcp::gmail::auth::Authenticator;
use gmail_assistant_mcp::gmail::client::GmailClient;
use gmail_assistant_mcp::gmail::credentials::{Credential, CredentialStore, FileCredentialStore};
use gmail_assistant_mcp::gmail::oauth::{OAuthClient, OAuthKeys};
use gmail_assistant_mcp::mcp::server::McpServer;
use gmail_assistant_mcp::web::AppState;

const AUTH_URI: &str = "https://accounts.example.com/o/oauth2/auth";
const MESSAGES_PATH: &str = "/gmail/v1/users/me/messages";

struct TestEnv {
    server: MockServer,
    dir: TempDir,
    store: Arc<FileCredentialStore>,
    authenticator: Arc<Authenticator>,
    mcp: Arc<McpServer>,
}

impl TestEnv {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let oauth = OAuthClient::new(
            reqwest::Client::new(),
            OAuthKeys {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                auth_uri: AUTH_URI.to_string(),
                token_uri: format!("{}/token", server.uri()),
            },
            "http://localhost:8080/oauth2/callback",
            vec!["openid".to_string()],
        )
        .with_userinfo_url(format!("{}/userinfo", server.uri()));

        let store = Arc::new(FileCredentialStore::new(dir.path()));
        let authenticator = Arc::new(Authenticator::new(oauth, store.clone()));
        let client = GmailClient::new(authenticator.clone())
            .with_api_base(format!("{}/gmail/v1", server.uri()));
        let mcp = Arc::new(McpServer::new(Arc::new(client)));

        Self {
            server,
            dir,
            store,
            authenticator,
            mcp,
        }
    }

    async fn login(&self, email: &str, access_token: &str) {
        self.store
            .put(&Credential {
                email: email.to_string(),
                access_token: access_token.to_string(),
                refresh_token: Some("refresh-1".to_string()),
                token_type: "Bearer".to_string(),
                expiry: Some(Utc::now() + Duration::hours(1)),
                scopes: vec!["openid".to_string()],
            })
            .await
            .unwrap();
    }

    async fn rpc(&self, request: Value) -> Value {
        let response = self
            .mcp
            .handle_message(&request.to_string())
            .await
            .unwrap()
            .expect("request should get a response");
        serde_json::to_value(response).unwrap()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        let response = self
            .rpc(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": name, "arguments": arguments}
            }))
            .await;
        response["result"].clone()
    }

    fn app_state(&self) -> AppState {
        AppState {
            authenticator: self.authenticator.clone(),
            mcp: self.mcp.clone(),
        }
    }
}

fn encode(text: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text.as_bytes())
}

fn message_list(ids: &[&str]) -> Value {
    let messages: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "threadId": format!("t-{}", id)}))
        .collect();
    json!({"messages": messages, "resultSizeEstimate": ids.len()})
}

mod mcp_protocol_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_advertises_tools_and_resources() {
        let env = TestEnv::new().await;
        let response = env
            .rpc(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "clientInfo": {"name": "test-client", "version": "1.0.0"},
                    "capabilities": {}
                }
            }))
            .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert!(response["result"]["capabilities"]["tools"].is_object());
        assert!(response["result"]["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn test_initialized_notification_has_no_response() {
        let env = TestEnv::new().await;
        let response = env
            .mcp
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .unwrap();

        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let env = TestEnv::new().await;
        let response = env
            .rpc(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await;

        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["search_mailbox", "get_mail_conversation"]);
        assert_eq!(
            response["result"]["tools"][0]["inputSchema"]["type"],
            "object"
        );
    }

    #[tokio::test]
    async fn test_list_resource_templates() {
        let env = TestEnv::new().await;
        let response = env
            .rpc(json!({"jsonrpc": "2.0", "id": 3, "method": "resources/templates/list"}))
            .await;

        assert_eq!(
            response["result"]["resourceTemplates"][0]["uriTemplate"],
            "email://gmail/{mail_address}/{message_id}"
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let env = TestEnv::new().await;
        let response = env
            .rpc(json!({"jsonrpc": "2.0", "id": 4, "method": "prompts/list"}))
            .await;

        assert_eq!(response["error"]["code"], -32601);
        assert!(response["result"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let env = TestEnv::new().await;
        let response = env.mcp.handle_message("{not json").await.unwrap().unwrap();
        let response = serde_json::to_value(response).unwrap();

        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let env = TestEnv::new().await;
        let result = env.call_tool("send_email", json!({})).await;

        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Unknown tool"));
    }
}

mod search_mailbox_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_required_without_credentials() {
        let env = TestEnv::new().await;
        let result = env
            .call_tool(
                "search_mailbox",
                json!({"query": "subject:test", "mail_address": "a@x.com"}),
            )
            .await;

        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["loginRequired"], true);

        let url = result["structuredContent"]["authorizationUrl"]
            .as_str()
            .unwrap();
        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("login_hint=a%40x.com"));

        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Login is required!"));
        assert!(text.contains(url));
    }

    #[tokio::test]
    async fn test_single_match_returns_id() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .and(query_param("q", "subject:test"))
            .and(query_param("maxResults", "1"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_list(&["123"])))
            .expect(1)
            .mount(&env.server)
            .await;

        let result = env
            .call_tool(
                "search_mailbox",
                json!({"query": "subject:test", "mail_address": "a@x.com"}),
            )
            .await;

        assert!(result.get("isError").is_none());
        assert_eq!(result["structuredContent"], json!({"id": "123"}));
        assert_eq!(result["content"][0]["text"], r#"{"id":"123"}"#);
    }

    #[tokio::test]
    async fn test_no_match() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultSizeEstimate": 0})))
            .mount(&env.server)
            .await;

        let client_err = search_error(&env).await;
        assert!(client_err.contains("No messages found"));
    }

    #[tokio::test]
    async fn test_two_messages_are_ambiguous() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_list(&["1", "2"])))
            .mount(&env.server)
            .await;

        assert!(search_error(&env).await.contains("More than one message found"));
    }

    #[tokio::test]
    async fn test_next_page_is_ambiguous() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        let mut body = message_list(&["1"]);
        body["nextPageToken"] = json!("page-2");
        body["resultSizeEstimate"] = json!(2);

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&env.server)
            .await;

        assert!(search_error(&env).await.contains("More than one message found"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .expect(1)
            .mount(&env.server)
            .await;

        let text = search_error(&env).await;
        assert!(text.contains("429"));
        assert!(text.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_expired_credentials_are_refreshed_before_search() {
        let env = TestEnv::new().await;
        env.store
            .put(&Credential {
                email: "a@x.com".to_string(),
                access_token: "stale".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                token_type: "Bearer".to_string(),
                expiry: Some(Utc::now() - Duration::hours(1)),
                scopes: vec!["openid".to_string()],
            })
            .await
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&env.server)
            .await;

        Mock::given(method("GET"))
            .and(path(MESSAGES_PATH))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_list(&["42"])))
            .expect(1)
            .mount(&env.server)
            .await;

        let result = env
            .call_tool(
                "search_mailbox",
                json!({"query": "from:boss", "mail_address": "a@x.com"}),
            )
            .await;

        assert_eq!(result["structuredContent"], json!({"id": "42"}));
        let stored = env.store.get("a@x.com").await.unwrap();
        assert_eq!(stored.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let env = TestEnv::new().await;
        let result = env
            .call_tool("search_mailbox", json!({"mail_address": "a@x.com"}))
            .await;

        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid tool arguments"));
    }

    async fn search_error(env: &TestEnv) -> String {
        let result = env
            .call_tool(
                "search_mailbox",
                json!({"query": "subject:test", "mail_address": "a@x.com"}),
            )
            .await;
        assert_eq!(result["isError"], true);
        result["content"][0]["text"].as_str().unwrap().to_string()
    }
}

mod conversation_tests {
    use super::*;

    async fn mount_message(env: &TestEnv, id: &str, message: Value) {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", MESSAGES_PATH, id)))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message))
            .mount(&env.server)
            .await;
    }

    #[tokio::test]
    async fn test_get_mail_conversation() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        mount_message(
            &env,
            "123",
            json!({
                "id": "123",
                "threadId": "t-123",
                "payload": {
                    "mimeType": "multipart/alternative",
                    "headers": [
                        {"name": "From", "value": "a@x.com"},
                        {"name": "To", "value": "b@y.com"}
                    ],
                    "body": {"size": 0, "data": ""},
                    "parts": [
                        {"mimeType": "text/plain", "body": {"size": 5, "data": encode("hello")}}
                    ]
                }
            }),
        )
        .await;

        let result = env
            .call_tool(
                "get_mail_conversation",
                json!({"mail_address": "a@x.com", "message_id": "123"}),
            )
            .await;

        assert_eq!(
            result["structuredContent"],
            json!({"from": "a@x.com", "to": "b@y.com", "conversation": "hello"})
        );
    }

    #[tokio::test]
    async fn test_missing_to_header() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        mount_message(
            &env,
            "7",
            json!({
                "id": "7",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [{"name": "From", "value": "a@x.com"}],
                    "body": {"size": 2, "data": encode("hi")}
                }
            }),
        )
        .await;

        let result = env
            .call_tool(
                "get_mail_conversation",
                json!({"mail_address": "a@x.com", "message_id": "7"}),
            )
            .await;

        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("'To' header"));
    }

    #[tokio::test]
    async fn test_message_not_found() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        Mock::given(method("GET"))
            .and(path(format!("{}/missing", MESSAGES_PATH)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&env.server)
            .await;

        let response = env
            .rpc(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "resources/read",
                "params": {"uri": "email://gmail/a@x.com/missing"}
            }))
            .await;

        assert_eq!(response["error"]["code"], -32002);
        assert_eq!(response["error"]["data"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_read_resource() {
        let env = TestEnv::new().await;
        env.login("a@x.com", "access-1").await;

        mount_message(
            &env,
            "55",
            json!({
                "id": "55",
                "payload": {
                    "mimeType": "text/plain",
                    "headers": [
                        {"name": "From", "value": "a@x.com"},
                        {"name": "To", "value": "b@y.com"}
                    ],
                    "body": {"size": 12, "data": encode("  plain body\n")}
                }
            }),
        )
        .await;

        let response = env
            .rpc(json!({
                "jsonrpc": "2.0",
                "id": 10,
                "method": "resources/read",
                "params": {"uri": "email://gmail/a@x.com/55"}
            }))
            .await;

        let content = &response["result"]["contents"][0];
        assert_eq!(content["uri"], "email://gmail/a@x.com/55");
        assert_eq!(content["mimeType"], "application/json");

        let body: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["conversation"], "plain body");
    }

    #[tokio::test]
    async fn test_read_resource_login_required() {
        let env = TestEnv::new().await;

        let response = env
            .rpc(json!({
                "jsonrpc": "2.0",
                "id": 11,
                "method": "resources/read",
                "params": {"uri": "email://gmail/a@x.com/55"}
            }))
            .await;

        assert_eq!(response["error"]["data"]["code"], "login_required");
        let url = response["error"]["data"]["authorizationUrl"].as_str().unwrap();
        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("login_hint=a%40x.com"));
    }
}

mod http_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::LOCATION, Request, StatusCode};
    use tower::ServiceExt;

    async fn get(env: &TestEnv, uri: &str) -> axum::response::Response {
        gmail_assistant_mcp::web::router(env.app_state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &axum::response::Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_success_page() {
        let env = TestEnv::new().await;
        let response = get(&env, "/oauth2/success").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Login Success!"));
    }

    #[tokio::test]
    async fn test_error_page_escapes_message() {
        let env = TestEnv::new().await;
        let response = get(&env, "/oauth2/error?error=%3Cb%3Edenied%3C%2Fb%3E").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains("Error: &lt;b&gt;denied&lt;/b&gt;"));
    }

    #[tokio::test]
    async fn test_callback_with_provider_error() {
        let env = TestEnv::new().await;
        let response = get(&env, "/oauth2/callback?error=access_denied").await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/oauth2/error?error=access_denied");
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let env = TestEnv::new().await;
        let response = get(&env, "/oauth2/callback?state=s").await;

        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/oauth2/error?error="));
    }

    #[tokio::test]
    async fn test_callback_stores_credentials() {
        let env = TestEnv::new().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3600,
                "scope": "openid"
            })))
            .expect(1)
            .mount(&env.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "a@x.com"})))
            .expect(1)
            .mount(&env.server)
            .await;

        let response = get(&env, "/oauth2/callback?code=code-1&state=state-1").await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/oauth2/success");
        assert!(env.dir.path().join("a@x.com.json").exists());
        assert!(env.authenticator.credentials().is_logged_in("a@x.com").await);
    }

    #[tokio::test]
    async fn test_callback_exchange_failure() {
        let env = TestEnv::new().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&env.server)
            .await;

        let response = get(&env, "/oauth2/callback?code=bad&state=state-1").await;

        assert!(response.status().is_redirection());
        assert!(location(&response).starts_with("/oauth2/error?error=Authentication%20error"));
        assert!(!env.dir.path().join("a@x.com.json").exists());
    }

    #[tokio::test]
    async fn test_mcp_over_http() {
        let env = TestEnv::new().await;
        let app = gmail_assistant_mcp::web::router(env.app_state());

        let response = app
            .clone()
            .oneshot(
                Request::post("/mcp/gmail")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"], json!({}));

        let response = app
            .oneshot(
                Request::post("/mcp/gmail")
                    .body(Body::from(
                        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
