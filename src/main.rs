//! Gmail Assistant MCP Server
//!
//! A Model Context Protocol (MCP) server exposing Gmail search and message
//! retrieval per mailbox, with an OAuth2 consent flow served over HTTP.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use gmail_assistant_mcp::config::Config;
use gmail_assistant_mcp::gmail::auth::Authenticator;
use gmail_assistant_mcp::gmail::client::GmailClient;
use gmail_assistant_mcp::mcp::server::McpServer;
use gmail_assistant_mcp::web::{self, AppState};

/// Gmail Assistant MCP Server
#[derive(Parser)]
#[command(name = "gmail-assistant-mcp")]
#[command(author, version, about = "Gmail Assistant - A Model Context Protocol server for Gmail")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP and the OAuth callback over HTTP (default)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8080
        #[arg(long)]
        bind: Option<String>,
    },
    /// Serve MCP over stdio; the OAuth callback still needs `serve`
    Stdio,
    /// Print and open the consent URL for a mailbox
    Login {
        /// Mailbox to pre-fill on the consent screen
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is the stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::new().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            let config = match bind {
                Some(bind) => config.with_bind_address(&bind)?,
                None => config,
            };
            let (authenticator, server) = build(&config)?;
            let state = AppState {
                authenticator,
                mcp: server,
            };
            web::serve(config.bind_address, state)
                .await
                .context("HTTP server failed")?;
        }
        Commands::Stdio => {
            let (_, server) = build(&config)?;
            server.run_stdio().await.context("stdio transport failed")?;
        }
        Commands::Login { email } => {
            let authenticator = Authenticator::from_config(&config)
                .with_context(|| oauth_keys_hint(&config))?;
            let auth_url = authenticator.authorization_url(&email);

            eprintln!("\nPlease visit this URL to authenticate:");
            eprintln!("{}\n", auth_url);

            if let Err(e) = open::that(&auth_url) {
                eprintln!("Could not open browser automatically: {}", e);
                eprintln!("Please open the URL manually.");
            }
            eprintln!(
                "The consent page redirects to {}; keep `serve` running to receive it.",
                config.oauth_redirect_uri
            );
        }
    }

    Ok(())
}

fn build(config: &Config) -> anyhow::Result<(Arc<Authenticator>, Arc<McpServer>)> {
    let authenticator =
        Arc::new(Authenticator::from_config(config).with_context(|| oauth_keys_hint(config))?);

    let gmail_client =
        GmailClient::new(authenticator.clone()).with_api_base(config.gmail_api_base.clone());
    let server = Arc::new(McpServer::new(Arc::new(gmail_client)));

    Ok((authenticator, server))
}

fn oauth_keys_hint(config: &Config) -> String {
    format!(
        "could not load OAuth keys; place gcp-oauth.keys.json in the current directory or {}",
        config.config_dir.display()
    )
}
