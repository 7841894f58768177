//! Process start-up: settings, logging, leftover folders and service wiring.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hanamirip_config::AppConfig;
use hanamirip_events::EventBus;
use hanamirip_fsops::{FsFinalizer, FsOpsError, purge_orphans, scan_orphans};
use hanamirip_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use hanamirip_transfer_rqbit::RqbitEngine;
use tracing::{info, warn};

use crate::engine_config::runtime_config;
use crate::error::{AppError, AppResult};
use crate::orchestrator::DownloadOrchestrator;

/// Orchestrator wired to the production engine and finalizer.
pub type AppOrchestrator = DownloadOrchestrator<RqbitEngine, FsFinalizer>;

/// Running application services.
pub struct App {
    /// Effective settings.
    pub config: AppConfig,
    /// Shared orchestrator.
    pub orchestrator: Arc<AppOrchestrator>,
    _context: GlobalContextGuard,
}

/// Working folders found under the work root at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanSweep {
    /// Folders found, ordered by job id.
    pub found: Vec<PathBuf>,
    /// How many of them were removed.
    pub removed: usize,
}

impl OrphanSweep {
    /// First job id that cannot collide with a folder still on disk.
    #[must_use]
    pub fn next_free_id(&self) -> u64 {
        if self.removed == self.found.len() {
            return 1;
        }
        self.found
            .iter()
            .filter_map(|folder| folder.file_name()?.to_str()?.parse::<u64>().ok())
            .max()
            .map_or(1, |highest| highest.saturating_add(1))
    }
}

/// Load and validate settings from `path` and the environment.
///
/// # Errors
///
/// Returns [`AppError::Config`] when the file or an override is invalid.
pub fn load_settings(path: Option<&Path>) -> AppResult<AppConfig> {
    hanamirip_config::load(path).map_err(|err| AppError::config("config.load", err))
}

/// Install the global tracing subscriber described by `config`.
///
/// # Errors
///
/// Returns [`AppError::Telemetry`] when a subscriber is already installed.
pub fn init_telemetry(config: &AppConfig) -> AppResult<()> {
    let format = config
        .logging
        .format
        .as_deref()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_else(LogFormat::infer);
    let logging = LoggingConfig {
        level: &config.logging.level,
        format,
        build_sha: env!("CARGO_PKG_VERSION"),
    };
    hanamirip_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))
}

/// Find working folders left by an earlier process and optionally remove them.
///
/// # Errors
///
/// Returns [`AppError::FsOps`] when the work root cannot be read.
pub fn sweep_orphans(work_root: &Path, purge: bool) -> AppResult<OrphanSweep> {
    let found = scan_orphans(work_root).map_err(|err| AppError::fsops("orphans.scan", err))?;
    if found.is_empty() {
        return Ok(OrphanSweep::default());
    }
    for folder in &found {
        warn!(folder = %folder.display(), "working folder left by an earlier run");
    }
    let removed = if purge { purge_orphans(&found) } else { 0 };
    if purge {
        info!(found = found.len(), removed, "leftover working folders purged");
    }
    Ok(OrphanSweep { found, removed })
}

/// Write the Prometheus text exposition of `metrics` to `path`.
///
/// # Errors
///
/// Returns [`AppError::Telemetry`] when rendering fails and
/// [`AppError::FsOps`] when the file cannot be written.
pub fn write_metrics(metrics: &Metrics, path: &Path) -> AppResult<()> {
    let text = metrics
        .render()
        .map_err(|err| AppError::telemetry("metrics.render", err))?;
    std::fs::write(path, text).map_err(|source| {
        AppError::fsops(
            "metrics.write",
            FsOpsError::Io {
                operation: "metrics.write",
                path: path.to_path_buf(),
                source,
            },
        )
    })?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}

/// Start every service for a long-running process.
///
/// # Errors
///
/// Returns an error when settings, telemetry or the engine session cannot be initialised.
pub async fn start(config_path: Option<&Path>, mode: &str) -> AppResult<App> {
    let config = load_settings(config_path)?;
    init_telemetry(&config)?;
    let context = GlobalContextGuard::new(mode);
    info!(work_root = %config.work_root.display(), "hanamirip bootstrap starting");

    let sweep = sweep_orphans(&config.work_root, config.purge_orphans_on_start)?;
    let orchestrator = build_orchestrator(&config, sweep.next_free_id()).await?;
    info!("download orchestrator ready");

    Ok(App {
        config,
        orchestrator: Arc::new(orchestrator),
        _context: context,
    })
}

async fn build_orchestrator(config: &AppConfig, first_job_id: u64) -> AppResult<AppOrchestrator> {
    let engine = RqbitEngine::new(&runtime_config(config))
        .await
        .map_err(|err| AppError::Engine {
            operation: "engine.start",
            source: err.into(),
        })?;
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    Ok(DownloadOrchestrator::new(
        Arc::new(engine),
        Arc::new(FsFinalizer::new()),
        config.work_root.clone(),
        EventBus::new(),
        metrics,
    )
    .with_first_job_id(first_job_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn kept_orphans_push_the_first_id_past_them() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("3"))?;
        fs::create_dir_all(dir.path().join("12"))?;
        fs::create_dir_all(dir.path().join("session"))?;

        let sweep = sweep_orphans(dir.path(), false)?;
        assert_eq!(sweep.found.len(), 2);
        assert_eq!(sweep.removed, 0);
        assert_eq!(sweep.next_free_id(), 13);
        assert!(dir.path().join("12").is_dir());
        Ok(())
    }

    #[test]
    fn purged_orphans_restart_ids_at_one() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("4"))?;

        let sweep = sweep_orphans(dir.path(), true)?;
        assert_eq!(sweep.removed, 1);
        assert_eq!(sweep.next_free_id(), 1);
        assert!(!dir.path().join("4").exists());
        Ok(())
    }

    #[test]
    fn metrics_file_holds_the_exposition() -> Result<()> {
        let dir = TempDir::new()?;
        let metrics = Metrics::new()?;
        metrics.inc_job_started();
        metrics.inc_finalize("success");

        let path = dir.path().join("hanamirip.prom");
        write_metrics(&metrics, &path)?;
        let text = fs::read_to_string(&path)?;
        assert!(text.contains("jobs_started_total 1"));
        assert!(text.contains("finalize_total{outcome=\"success\"} 1"));

        let err = write_metrics(&metrics, &dir.path().join("absent").join("m.prom"))
            .expect_err("parent folder is missing");
        assert!(matches!(err, AppError::FsOps { operation: "metrics.write", .. }));
        Ok(())
    }

    #[test]
    fn missing_work_root_has_no_orphans() -> Result<()> {
        let dir = TempDir::new()?;
        let sweep = sweep_orphans(&dir.path().join("absent"), true)?;
        assert_eq!(sweep, OrphanSweep::default());
        assert_eq!(sweep.next_free_id(), 1);
        Ok(())
    }
}
