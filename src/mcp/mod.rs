//! MCP (Model Context Protocol) module
//!
//! Implements the MCP server protocol for tool calls and resource reads.

pub mod server;
pub mod tools;
pub mod types;
