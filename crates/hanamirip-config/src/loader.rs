//! Layered configuration loading: defaults, then an optional TOML file, then
//! environment overrides, then validation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate::validate;

/// Overrides [`AppConfig::work_root`].
pub const ENV_WORK_ROOT: &str = "HANAMIRIP_WORK_ROOT";
/// Overrides [`AppConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "HANAMIRIP_POLL_INTERVAL_MS";
/// Overrides [`AppConfig::purge_orphans_on_start`].
pub const ENV_PURGE_ORPHANS: &str = "HANAMIRIP_PURGE_ORPHANS";
/// Overrides the logging level.
pub const ENV_LOG_LEVEL: &str = "HANAMIRIP_LOG_LEVEL";
/// Overrides the logging format.
pub const ENV_LOG_FORMAT: &str = "HANAMIRIP_LOG_FORMAT";

/// Load configuration from `path` (when given) and the process environment.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, an environment
/// override is malformed, or the merged result fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<AppConfig> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load`] but reads overrides through `lookup`.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => AppConfig::default(),
    };
    apply_env(&mut config, &lookup)?;
    validate(&config)?;
    debug!(work_root = %config.work_root.display(), "configuration loaded");
    Ok(config)
}

/// Parse a TOML document; missing keys take their defaults.
///
/// # Errors
///
/// Returns the TOML error when the document does not match the expected shape.
pub fn parse_toml(text: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

fn read_file(path: &Path) -> ConfigResult<AppConfig> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env<F>(config: &mut AppConfig, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_WORK_ROOT) {
        config.work_root = PathBuf::from(value);
    }
    if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
        config.poll_interval_ms = value.trim().parse().map_err(|_| {
            ConfigError::invalid("env", ENV_POLL_INTERVAL_MS, Some(value), "not_an_integer")
        })?;
    }
    if let Some(value) = lookup(ENV_PURGE_ORPHANS) {
        config.purge_orphans_on_start = parse_flag(&value).ok_or_else(|| {
            ConfigError::invalid("env", ENV_PURGE_ORPHANS, Some(value.clone()), "not_a_boolean")
        })?;
    }
    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = value;
    }
    if let Some(value) = lookup(ENV_LOG_FORMAT) {
        config.logging.format = Some(value);
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn partial_toml_keeps_defaults() -> anyhow::Result<()> {
        let config = parse_toml(
            r#"
            poll_interval_ms = 500

            [engine]
            enable_upnp = false
            "#,
        )?;
        assert_eq!(config.poll_interval_ms, 500);
        assert!(!config.engine.enable_upnp);
        assert_eq!(config.engine.listen_port_start, 40_000);
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_toml("pol_interval_ms = 5").is_err());
    }
}
