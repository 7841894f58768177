//! # Design
//!
//! - `JobError` is what the orchestrator hands back to the command surface.
//! - `AppError` covers process start-up (configuration, telemetry, engine session).
//! - Messages stay constant; ids, operations and sources live in fields.

use hanamirip_config::ConfigError;
use hanamirip_fsops::FsOpsError;
use hanamirip_telemetry::TelemetryError;
use hanamirip_transfer_core::{EngineError, JobId, JobState};
use thiserror::Error;

/// Result alias for orchestrator operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors surfaced by job operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// The source string could not be turned into a transfer.
    #[error("invalid download source")]
    InvalidSource {
        /// Input as supplied by the caller.
        input: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// No job with this id exists.
    #[error("job not found")]
    NotFound {
        /// Requested job id.
        job_id: JobId,
    },
    /// The job's state does not allow the operation.
    #[error("operation not allowed in current job state")]
    InvalidState {
        /// Job the operation targeted.
        job_id: JobId,
        /// Operation identifier.
        operation: &'static str,
        /// State the job was in.
        state: JobState,
    },
    /// The transfer engine failed.
    #[error("transfer engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Job involved, when one exists yet.
        job_id: Option<JobId>,
        /// Underlying engine error.
        source: EngineError,
    },
    /// Filesystem work failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying filesystem error.
        source: FsOpsError,
    },
}

impl JobError {
    /// Wrap an engine error. Source parsing failures become
    /// [`JobError::InvalidSource`] and local filesystem failures become
    /// [`JobError::Io`]; everything else stays an engine error.
    #[must_use]
    pub fn engine(operation: &'static str, job_id: Option<JobId>, source: EngineError) -> Self {
        match source {
            EngineError::InvalidSource { input, reason } => Self::InvalidSource { input, reason },
            EngineError::Io {
                operation: step,
                path,
                source,
            } => Self::Io {
                operation,
                source: FsOpsError::Io {
                    operation: step,
                    path,
                    source,
                },
            },
            source => Self::Engine {
                operation,
                job_id,
                source,
            },
        }
    }

    pub(crate) const fn io(operation: &'static str, source: FsOpsError) -> Self {
        Self::Io { operation, source }
    }

    /// Stable tag used on the command surface.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSource { .. } => "invalid_source",
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::Engine { .. } => "engine_error",
            Self::Io { .. } => "io_error",
        }
    }

    /// Human-readable description including the context carried in fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidSource { input, reason } => {
                format!("invalid download source '{input}': {reason}")
            }
            Self::NotFound { job_id } => format!("job {job_id} not found"),
            Self::InvalidState {
                job_id,
                operation,
                state,
            } => format!("cannot {operation} job {job_id} while it is {state}"),
            Self::Engine {
                job_id: Some(job_id),
                source,
                ..
            } => format!("job {job_id}: {}", source.detail()),
            Self::Engine {
                job_id: None,
                source,
                ..
            } => source.detail(),
            Self::Io { operation, source } => format!("{operation}: {}", source.detail()),
        }
    }
}

/// Result alias for application start-up.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised while bootstrapping the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// The transfer engine session could not be started.
    #[error("transfer engine start-up failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Filesystem work during start-up failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: FsOpsError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }
}
