//! Validation of a merged configuration.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Check cross-field and per-field constraints.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the first offending field.
pub fn validate(config: &AppConfig) -> ConfigResult<()> {
    if config.work_root.as_os_str().is_empty() {
        return Err(ConfigError::invalid("app", "work_root", None, "empty"));
    }
    if config.poll_interval_ms == 0 {
        return Err(ConfigError::invalid(
            "app",
            "poll_interval_ms",
            Some("0".to_string()),
            "must_be_positive",
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid("logging", "level", None, "empty"));
    }
    if let Some(format) = config.logging.format.as_deref() {
        let known = matches!(
            format.trim().to_ascii_lowercase().as_str(),
            "json" | "pretty" | "text"
        );
        if !known {
            return Err(ConfigError::invalid(
                "logging",
                "format",
                Some(format.to_string()),
                "unknown_format",
            ));
        }
    }

    let engine = &config.engine;
    if engine.listen_port_start == 0 || engine.listen_port_end <= engine.listen_port_start {
        return Err(ConfigError::invalid(
            "engine",
            "listen_port_range",
            Some(format!(
                "{}..{}",
                engine.listen_port_start, engine.listen_port_end
            )),
            "empty_or_inverted",
        ));
    }
    for tracker in &engine.trackers {
        if Url::parse(tracker).is_err() {
            return Err(ConfigError::invalid(
                "engine",
                "trackers",
                Some(tracker.clone()),
                "invalid_url",
            ));
        }
    }
    Ok(())
}
