//! Error types for transfer engine adapters.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::EngineHandle;

/// Primary error type for transfer engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The supplied source could not be parsed into something the engine accepts.
    #[error("transfer source is invalid")]
    InvalidSource {
        /// Raw input supplied by the caller.
        input: String,
        /// Short description of what was wrong with it.
        reason: &'static str,
    },
    /// Local filesystem work required by the engine failed.
    #[error("transfer engine io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The engine refused the request.
    #[error("transfer engine rejected the request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure reported by the engine.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No transfer is registered for the handle.
    #[error("transfer handle is unknown")]
    UnknownHandle {
        /// Handle that was looked up.
        handle: EngineHandle,
    },
    /// The engine worker has shut down.
    #[error("transfer engine is unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
    },
}

impl EngineError {
    /// Construct an [`EngineError::InvalidSource`].
    #[must_use]
    pub fn invalid_source(input: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidSource {
            input: input.into(),
            reason,
        }
    }

    /// Construct an [`EngineError::Io`].
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Construct an [`EngineError::Rejected`] from any boxed error.
    #[must_use]
    pub fn rejected(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Rejected {
            operation,
            source: source.into(),
        }
    }

    /// Human-readable description including the context carried in fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidSource { input, reason } => {
                format!("invalid transfer source '{input}': {reason}")
            }
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
            Self::Rejected { operation, source } => format!("{operation} rejected: {source}"),
            Self::UnknownHandle { handle } => format!("unknown transfer handle {handle}"),
            Self::Unavailable { operation } => {
                format!("{operation} failed: transfer engine is not running")
            }
        }
    }
}

/// Convenience alias for engine operation results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_field_context() {
        let err = EngineError::invalid_source("nope", "unsupported scheme");
        assert_eq!(err.to_string(), "transfer source is invalid");
        assert!(err.detail().contains("nope"));
        assert!(err.detail().contains("unsupported scheme"));

        let err = EngineError::rejected("begin", "tracker said no");
        assert_eq!(err.detail(), "begin rejected: tracker said no");
        assert!(err.source().is_some());

        let err = EngineError::UnknownHandle {
            handle: EngineHandle::new(4),
        };
        assert_eq!(err.detail(), "unknown transfer handle 4");
    }
}
