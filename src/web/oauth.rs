//! OAuth redirect endpoints
//!
//! The provider redirects the browser to `/oauth2/callback`; the outcome is
//! shown on `/oauth2/success` or `/oauth2/error`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::web::AppState;

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorParams {
    error: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/callback", get(callback))
        .route("/success", get(success))
        .route("/error", get(error))
}

async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Redirect {
    if let Some(error) = params.error {
        tracing::warn!(%error, "Provider reported an authorization error");
        return error_redirect(&error);
    }

    let Some(code) = params.code else {
        return error_redirect("missing authorization code");
    };

    let oauth_state = params.state.unwrap_or_default();
    match state.authenticator.exchange_code(&code, &oauth_state).await {
        Ok(credential) => {
            tracing::info!(email = %credential.email, "Mailbox authorized");
            Redirect::to("/oauth2/success")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            error_redirect(&e.to_string())
        }
    }
}

async fn success() -> Html<&'static str> {
    Html("<html><body>Login Success!</body></html>")
}

async fn error(Query(params): Query<ErrorParams>) -> impl IntoResponse {
    let message = params.error.unwrap_or_else(|| "unknown error".to_string());
    (
        StatusCode::BAD_REQUEST,
        Html(format!(
            "<html><body>Error: {}</body></html>",
            escape_html(&message)
        )),
    )
}

fn error_redirect(error: &str) -> Redirect {
    Redirect::to(&format!("/oauth2/error?error={}", urlencoding::encode(error)))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }
}
