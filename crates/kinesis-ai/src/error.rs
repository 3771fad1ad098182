//! Error types for kinesis-ai

use thiserror::Error;

/// Result type alias using kinesis-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a generation endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// Connectivity probe failed: endpoint unreachable or rejected the request
    #[error("Cannot connect to {url}: {message}. Please ensure the model server is running")]
    Connectivity { url: String, message: String },

    /// Stream failed mid-flight: network drop, non-success status or unreadable body
    #[error("Generation request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A response body was not the JSON the endpoint should send
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a connectivity error for an endpoint
    pub fn connectivity(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a transport error for an endpoint
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from the connectivity probe
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity { .. })
    }

    /// The endpoint URL this error refers to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Connectivity { url, .. } | Error::Transport { url, .. } => Some(url),
            _ => None,
        }
    }
}
