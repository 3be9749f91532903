//! Typed HTTP client for the EtudeExpress API.
//!
//! Every request goes through [`ApiClient`], which asks its
//! [`CredentialProvider`] for a bearer token right before sending.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod session;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use credentials::{CredentialProvider, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::{ClientError, ClientResult};
