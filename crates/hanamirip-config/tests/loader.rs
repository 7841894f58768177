use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use hanamirip_config::{
    ConfigError, ENV_LOG_LEVEL, ENV_POLL_INTERVAL_MS, ENV_PURGE_ORPHANS, ENV_WORK_ROOT,
    load_with_env,
};
use tempfile::TempDir;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn file_values_are_overridden_by_environment() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hanamirip.toml");
    fs::write(
        &path,
        r#"
        work_root = "/srv/hanamirip/work"
        poll_interval_ms = 2000

        [logging]
        level = "warn"
        format = "json"

        [engine]
        listen_port_start = 41000
        listen_port_end = 42000
        trackers = ["udp://tracker.example.org:1337/announce"]
        "#,
    )?;

    let config = load_with_env(
        Some(&path),
        env_of(&[
            (ENV_WORK_ROOT, "/data/work"),
            (ENV_POLL_INTERVAL_MS, "750"),
            (ENV_PURGE_ORPHANS, "yes"),
            (ENV_LOG_LEVEL, "debug"),
        ]),
    )?;

    assert_eq!(config.work_root, PathBuf::from("/data/work"));
    assert_eq!(config.poll_interval_ms, 750);
    assert!(config.purge_orphans_on_start);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format.as_deref(), Some("json"));
    assert_eq!(config.engine.listen_port_start, 41_000);
    assert_eq!(config.engine.trackers.len(), 1);
    assert_eq!(config.engine.keep_alive_secs, 60);
    Ok(())
}

#[test]
fn no_file_means_defaults() -> Result<()> {
    let config = load_with_env(None, env_of(&[]))?;
    assert_eq!(config.poll_interval_ms, 1_500);
    assert_eq!(config.engine.concurrent_init_limit, 8);
    Ok(())
}

#[test]
fn malformed_environment_values_are_reported() {
    let err = load_with_env(None, env_of(&[(ENV_POLL_INTERVAL_MS, "soon")]))
        .expect_err("non-numeric interval must fail");
    assert!(matches!(
        err,
        ConfigError::InvalidField {
            field: ENV_POLL_INTERVAL_MS,
            reason: "not_an_integer",
            ..
        }
    ));

    let err = load_with_env(None, env_of(&[(ENV_POLL_INTERVAL_MS, "0")]))
        .expect_err("zero interval must fail validation");
    assert!(matches!(err, ConfigError::InvalidField { .. }));
}

#[test]
fn missing_and_malformed_files_are_distinguished() -> Result<()> {
    let dir = TempDir::new()?;
    let missing = dir.path().join("absent.toml");
    let err = load_with_env(Some(&missing), env_of(&[])).expect_err("missing file");
    assert!(matches!(err, ConfigError::Io { .. }));

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "poll_interval_ms = \"fast\"")?;
    let err = load_with_env(Some(&broken), env_of(&[])).expect_err("bad type");
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}
