//! Gmail API module
//!
//! Contains types, OAuth, credential storage and the client for interacting with the Gmail API.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod oauth;
pub mod types;
pub mod utils;
