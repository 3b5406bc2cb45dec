//! Error taxonomy for dependency acquisition.

use std::path::PathBuf;

use thiserror::Error;

use crate::dependency::validator::ValidationFailure;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Network error while fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} failed with status code {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Redirect error for {url}: {reason}")]
    Redirect { url: String, reason: String },
    #[error("Could not verify {path}: expected SHA-256 {expected}, got {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("Unexpected archive layout: {0}")]
    Layout(String),
    #[error("ltex-ls validation failed: {0}")]
    Validation(Box<ValidationFailure>),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("No ltex-ls-plus release for {0}")]
    UnsupportedPlatform(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not read archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },
    #[error("Download canceled")]
    Canceled,
}

impl AcquisitionError {
    /// Wraps an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the user canceled the operation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Captured process output, when the failure came from running ltex-ls.
    pub fn process_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Validation(failure) => Some((&failure.stdout, &failure.stderr)),
            _ => None,
        }
    }
}

impl From<ValidationFailure> for AcquisitionError {
    fn from(value: ValidationFailure) -> Self {
        Self::Validation(Box::new(value))
    }
}

pub type AcquisitionResult<T> = Result<T, AcquisitionError>;
