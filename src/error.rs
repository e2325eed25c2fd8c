//! Error types shared by collectors, sources and polling sessions.

use std::path::PathBuf;

/// Failure to read or parse a kernel pseudo-file.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {what}: {detail}")]
    Parse { what: &'static str, detail: String },
}

impl CollectorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            what,
            detail: detail.into(),
        }
    }

    /// True when the underlying file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Unexpected failure while producing a snapshot. Ends the polling session.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("Blocking collector task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

/// Failure to deliver a payload to the connected client.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink closed by peer")]
    Closed,

    #[error("Sink transport error: {0}")]
    Transport(String),
}

pub type CollectorResult<T> = Result<T, CollectorError>;
