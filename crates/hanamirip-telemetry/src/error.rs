//! Telemetry error taxonomy.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Where a collector failed while the metrics registry was being set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStage {
    /// Building the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
}

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A Prometheus collector could not be set up.
    #[error("failed to set up metrics collector")]
    Collector {
        /// Metric name.
        name: &'static str,
        /// Set-up step that failed.
        stage: CollectorStage,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// Rendering the text exposition failed.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The rendered exposition was not valid UTF-8.
    #[error("metrics output was not valid utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Human-readable description including the context carried in fields.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Collector {
                name,
                stage,
                source,
            } => format!("metrics collector {name} failed at {stage:?}: {source}"),
            other => match std::error::Error::source(other) {
                Some(source) => format!("{other}: {source}"),
                None => other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn message_is_constant_and_detail_names_the_collector() {
        let err = TelemetryError::Collector {
            name: "jobs_active",
            stage: CollectorStage::Register,
            source: prometheus::Error::AlreadyReg,
        };
        assert_eq!(err.to_string(), "failed to set up metrics collector");
        assert!(err.source().is_some());
        assert!(err.detail().starts_with("metrics collector jobs_active failed at Register"));

        let utf8 = String::from_utf8(vec![0, 159]).expect_err("invalid utf-8");
        let err = TelemetryError::RenderUtf8 { source: utf8 };
        assert!(err.detail().starts_with("metrics output was not valid utf-8: "));
    }
}
