//! Mapping from loaded settings to the engine session tuning.

use std::time::Duration;

use hanamirip_config::AppConfig;
use hanamirip_transfer_rqbit::EngineRuntimeConfig;

/// Derive the engine runtime configuration; the session shares the work root.
#[must_use]
pub fn runtime_config(config: &AppConfig) -> EngineRuntimeConfig {
    let engine = &config.engine;
    EngineRuntimeConfig {
        base_dir: config.work_root.clone(),
        listen_ports: engine.listen_port_start..engine.listen_port_end,
        enable_upnp: engine.enable_upnp,
        connect_timeout: Duration::from_secs(engine.connect_timeout_secs),
        read_write_timeout: Duration::from_secs(engine.read_write_timeout_secs),
        keep_alive_interval: Duration::from_secs(engine.keep_alive_secs),
        defer_writes_up_to: engine.defer_writes_up_to,
        concurrent_init_limit: engine.concurrent_init_limit,
        trackers: engine.trackers.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_desktop_tuning() {
        let config = AppConfig::default();
        let runtime = runtime_config(&config);
        assert_eq!(runtime.base_dir, config.work_root);
        assert_eq!(runtime.listen_ports, 40_000..50_000);
        assert_eq!(runtime.connect_timeout, Duration::from_secs(5));
        assert_eq!(runtime.read_write_timeout, Duration::from_secs(15));
        assert_eq!(runtime.keep_alive_interval, Duration::from_secs(60));
        assert_eq!(runtime.defer_writes_up_to, 128);
        assert_eq!(runtime.concurrent_init_limit, 8);
        assert_eq!(runtime.trackers.len(), 6);
    }
}
