//! Gmail Assistant MCP Server Library
//!
//! A Model Context Protocol (MCP) server exposing read-only Gmail search and
//! message retrieval, gated behind a per-mailbox OAuth2 login.

pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;
pub mod web;

pub use config::Config;
pub use error::{GmailMcpError, Result};
