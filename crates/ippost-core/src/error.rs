//! Error types for the public IP poster
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for poster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the public IP poster
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (unreadable, empty or malformed config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache store errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// A single echo service failed to answer
    #[error("Echo service error ({service}): {message}")]
    EchoService {
        /// Service identity (URL)
        service: String,
        /// Error message
        message: String,
    },

    /// No echo service produced a valid address
    #[error("Could not retrieve a public IP address from any service")]
    NoAddresses,

    /// Transport-specific error
    #[error("Transport error ({transport}): {message}")]
    Transport {
        /// Transport name
        transport: String,
        /// Error message
        message: String,
    },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Host key verification errors
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create an echo service error
    pub fn echo_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EchoService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a transport-specific error
    pub fn transport(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a host key error
    pub fn host_key(msg: impl Into<String>) -> Self {
        Self::HostKey(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
