//! Typed configuration models.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::defaults;

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Root under which per-job working folders are created.
    pub work_root: PathBuf,
    /// Poll interval used by status consumers, in milliseconds.
    pub poll_interval_ms: u64,
    /// Remove working folders left by an earlier process at start-up.
    pub purge_orphans_on_start: bool,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Transfer engine session settings.
    pub engine: EngineSettings,
}

impl AppConfig {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_root: defaults::work_root(),
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            purge_orphans_on_start: false,
            logging: LoggingSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level or filter directive.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Transfer engine session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// First port of the listen range.
    pub listen_port_start: u16,
    /// One past the last port of the listen range.
    pub listen_port_end: u16,
    /// Ask the router for a port mapping.
    pub enable_upnp: bool,
    /// Peer connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Peer read/write timeout in seconds.
    pub read_write_timeout_secs: u64,
    /// Peer keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Pieces buffered before writes are flushed.
    pub defer_writes_up_to: usize,
    /// Transfers initialised in parallel.
    pub concurrent_init_limit: usize,
    /// Trackers appended to every transfer.
    pub trackers: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            listen_port_start: defaults::LISTEN_PORT_START,
            listen_port_end: defaults::LISTEN_PORT_END,
            enable_upnp: true,
            connect_timeout_secs: defaults::CONNECT_TIMEOUT_SECS,
            read_write_timeout_secs: defaults::READ_WRITE_TIMEOUT_SECS,
            keep_alive_secs: defaults::KEEP_ALIVE_SECS,
            defer_writes_up_to: defaults::DEFER_WRITES_UP_TO,
            concurrent_init_limit: defaults::CONCURRENT_INIT_LIMIT,
            trackers: defaults::TRACKERS.iter().map(ToString::to_string).collect(),
        }
    }
}
