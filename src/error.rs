use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolverError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected page structure: {0}")]
    Parse(String),

    #[error("invalid archive {path}: {reason}")]
    Integrity { path: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("genome has no usable identifier: {0}")]
    UnresolvableBundle(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid input document: {0}")]
    InvalidInput(String),
}

/// Coarse classification used by the batch driver and the exit code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    Integrity,
    Extraction,
    Configuration,
    Local,
}

impl ResolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolverError::Http(_) | ResolverError::Status { .. } | ResolverError::NotFound(_) => {
                ErrorKind::Transport
            }
            ResolverError::Parse(_) => ErrorKind::Parse,
            ResolverError::Integrity { .. } => ErrorKind::Integrity,
            ResolverError::Extraction(_) => ErrorKind::Extraction,
            ResolverError::UnresolvableBundle(_)
            | ResolverError::ConfigRead(_)
            | ResolverError::ConfigParse(_)
            | ResolverError::InvalidInput(_) => ErrorKind::Configuration,
            ResolverError::Filesystem(_) | ResolverError::Ledger(_) => ErrorKind::Local,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolverError::NotFound(_))
    }

    pub fn fs(err: impl std::fmt::Display) -> Self {
        ResolverError::Filesystem(err.to_string())
    }
}
