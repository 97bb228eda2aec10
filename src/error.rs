//! Error taxonomy for the downtime tracker core.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Why a validation check turned an operation into a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Fault label is empty after trimming.
    EmptyFault,
    /// Downtime duration below one minute.
    ZeroDuration,
    /// The catalog would become empty.
    LastRemainingFault,
    /// The fault is not in the machine's catalog.
    UnknownFault(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyFault => write!(f, "fault name must not be empty"),
            Rejection::ZeroDuration => write!(f, "downtime must be at least 1 minute"),
            Rejection::LastRemainingFault => write!(f, "cannot delete the last fault"),
            Rejection::UnknownFault(label) => write!(f, "fault '{label}' is not in the catalog"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("rejected: {0}")]
    Validation(Rejection),

    #[error("fault already exists: {label}")]
    DuplicateFault { label: String },

    #[error("fault not found: {label}")]
    FaultNotFound { label: String },

    #[error("unknown machine: {name}")]
    UnknownMachine { name: String },

    #[error("row {index} does not exist (ledger has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data directory is in use by another session: {}", path.display())]
    Locked { path: PathBuf },

    #[error("config error: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrackerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TrackerError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Recoverable user mistakes: nothing changed, show a warning and carry on.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            TrackerError::Validation(_)
                | TrackerError::DuplicateFault { .. }
                | TrackerError::FaultNotFound { .. }
                | TrackerError::UnknownMachine { .. }
                | TrackerError::RowOutOfRange { .. }
        )
    }

    /// Re-label a parse error produced from in-memory bytes with the file it came from.
    pub(crate) fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            TrackerError::Parse { message, .. } => TrackerError::Parse {
                path: path.into(),
                message,
            },
            other => other,
        }
    }
}

impl From<Rejection> for TrackerError {
    fn from(r: Rejection) -> Self {
        TrackerError::Validation(r)
    }
}
