//! Error types for kinesis-agent

use thiserror::Error;

/// Result type alias using kinesis-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the transport layer
    #[error(transparent)]
    Ai(#[from] kinesis_ai::Error),

    /// Export was requested while the document is empty
    #[error("Nothing to export: generate some SRS content first")]
    NothingToExport,

    /// The export collaborator failed
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl Error {
    /// Check if this error came from the connectivity probe
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_connectivity(),
            _ => false,
        }
    }
}

/// Errors raised by an export collaborator
#[derive(Error, Debug)]
pub enum ExportError {
    /// Writing the file failed
    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),

    /// The collaborator does not handle this format
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// The document could not be rendered in the requested format
    #[error("Rendering failed: {0}")]
    Render(String),
}
