//! Errors raised while moving payloads and sweeping working folders.
//!
//! Display strings are fixed; the operation and path live in fields and are
//! rendered by [`FsOpsError::detail`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while moving payloads around.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("filesystem call failed")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("directory walk failed")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Input validation failures.
    #[error("invalid filesystem input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The blocking worker running the filesystem task did not finish.
    #[error("filesystem task did not complete")]
    Join {
        /// Operation that was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Human-readable description including the context carried in fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::InvalidInput {
                field,
                reason,
                value,
            } => match value {
                Some(value) => format!("invalid {field} '{value}': {reason}"),
                None => format!("invalid {field}: {reason}"),
            },
            Self::Join { operation, source } => format!("{operation} did not finish: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_errors_keep_context_out_of_display() {
        let err = FsOpsError::io(
            "finalize.create_destination",
            "/tmp/dest",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "filesystem call failed");
        assert!(err.source().is_some());
        let detail = err.detail();
        assert!(detail.contains("finalize.create_destination"));
        assert!(detail.contains("/tmp/dest"));
        assert!(detail.contains("denied"));
    }

    #[test]
    fn invalid_input_detail_mentions_value() {
        let err = FsOpsError::InvalidInput {
            field: "working_folder",
            reason: "same_as_destination",
            value: Some("/x".into()),
        };
        assert_eq!(
            err.detail(),
            "invalid working_folder '/x': same_as_destination"
        );
    }
}
