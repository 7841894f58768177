#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use hanamirip_app::DownloadOrchestrator;
use hanamirip_events::EventBus;
use hanamirip_fsops::{FinalizeReport, FsFinalizer, FsOpsResult, PayloadFinalizer};
use hanamirip_telemetry::Metrics;
use hanamirip_transfer_core::{EngineHandle, JobSnapshot};
use hanamirip_transfer_rqbit::{RqbitEngine, StubControl};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const MAGNET: &str = "magnet:?xt=urn:btih:0123456789ABCDEF&dn=Show%2001";
pub const PAYLOAD_NAME: &str = "Show 01.mkv";
pub const PAYLOAD: &[u8] = b"episode bytes";

pub struct Harness<F> {
    pub dir: TempDir,
    pub engine: RqbitEngine,
    pub control: StubControl,
    pub orchestrator: Arc<DownloadOrchestrator<RqbitEngine, F>>,
}

pub fn harness() -> Result<Harness<FsFinalizer>> {
    harness_with(Arc::new(FsFinalizer::new()))
}

pub fn harness_with<F>(finalizer: Arc<F>) -> Result<Harness<F>>
where
    F: PayloadFinalizer + 'static,
{
    let dir = TempDir::new()?;
    let (engine, control) = RqbitEngine::in_memory();
    let orchestrator = DownloadOrchestrator::new(
        Arc::new(engine.clone()),
        finalizer,
        dir.path().join("work"),
        EventBus::new(),
        Metrics::new()?,
    );
    Ok(Harness {
        dir,
        engine,
        control,
        orchestrator: Arc::new(orchestrator),
    })
}

impl<F> Harness<F>
where
    F: PayloadFinalizer + 'static,
{
    pub fn destination(&self) -> PathBuf {
        self.dir.path().join("library").join("Show")
    }

    pub fn handle(&self, job: &JobSnapshot) -> Result<EngineHandle> {
        self.control
            .handle_for(&job.working_folder)
            .context("job has no engine transfer")
    }

    /// Write the payload into the job's working folder and report it complete.
    pub async fn finish_download(&self, job: &JobSnapshot) -> Result<()> {
        let handle = self.handle(job)?;
        std::fs::write(job.working_folder.join(PAYLOAD_NAME), PAYLOAD)?;
        let size = PAYLOAD.len() as u64;
        self.control.set_progress(handle, size, size);
        self.control.complete(handle);
        self.engine.refresh().await?;
        Ok(())
    }
}

/// Finalizer that counts calls before delegating to the real one.
#[derive(Default)]
pub struct CountingFinalizer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PayloadFinalizer for CountingFinalizer {
    async fn finalize(&self, working: &Path, destination: &Path) -> FsOpsResult<FinalizeReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FsFinalizer::new().finalize(working, destination).await
    }
}

/// Finalizer that parks until the test releases it.
#[derive(Default)]
pub struct GatedFinalizer {
    pub entered: Notify,
    pub release: Notify,
    pub calls: AtomicUsize,
}

#[async_trait]
impl PayloadFinalizer for GatedFinalizer {
    async fn finalize(&self, working: &Path, destination: &Path) -> FsOpsResult<FinalizeReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        FsFinalizer::new().finalize(working, destination).await
    }
}
