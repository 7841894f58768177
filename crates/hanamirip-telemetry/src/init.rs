//! Global `tracing` subscriber set-up.
//!
//! One call to [`init_logging`] per process. `RUST_LOG` overrides the
//! configured directive, and the build id passed in is kept for
//! [`build_sha`] and the process span.

use std::str::FromStr;

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Directive used when neither the settings nor `RUST_LOG` name one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_ID: OnceCell<String> = OnceCell::new();

/// How records are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One flattened JSON object per record.
    Json,
    /// Multi-field human output.
    Pretty,
}

impl LogFormat {
    /// `Pretty` for debug builds, `Json` for release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> std::result::Result<Self, ()> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if raw.eq_ignore_ascii_case("pretty") || raw.eq_ignore_ascii_case("text") {
            Ok(Self::Pretty)
        } else {
            Err(())
        }
    }
}

/// Inputs to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive, e.g. `info` or `hanamirip_app=debug,warn`.
    pub level: &'a str,
    /// Record layout.
    pub format: LogFormat,
    /// Build id attached to the process span.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
        }
    }
}

/// Install the process-wide subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInstall`] when a global subscriber is
/// already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // Only the first call records the build id.
    let _ = BUILD_ID.set(config.build_sha.to_owned());
    install_fmt_subscriber(config)
}

/// Build id recorded by [`init_logging`], or `dev` before it ran.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_ID.get().map_or("dev", String::as_str)
}

fn install_fmt_subscriber(config: &LoggingConfig) -> Result<()> {
    let output = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_target(false).boxed(),
    };
    tracing_subscriber::registry()
        .with(output)
        .with(env_filter(config.level))
        .try_init()
        .map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// `RUST_LOG` when set and valid, otherwise the configured directive.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
