//! Download orchestrator composing the transfer engine, the job registry and
//! payload finalization.
//!
//! # Design
//! - Every operation on a job runs while holding that job's slot lock, engine
//!   and filesystem awaits included, so operations on one id are linearised.
//! - Finalize is checked and recorded under the same lock, which makes it run
//!   at most once per job even under concurrent polls.
//! - Engine failures after admission never escape `get_status`; they flip the
//!   job to `Failed` instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use hanamirip_events::{Event, EventBus, EventId, EventStream};
use hanamirip_fsops::{FinalizeReport, FsFinalizer, FsOpsError, PayloadFinalizer};
use hanamirip_telemetry::Metrics;
use hanamirip_transfer_core::{
    EngineResult, Job, JobId, JobSnapshot, JobState, TransferEngine, TransferSource,
};
use tracing::{debug, info, warn};

use crate::error::{JobError, JobResult};
use crate::registry::JobRegistry;

/// Coordinates download jobs from admission to a finalized payload.
pub struct DownloadOrchestrator<E, F = FsFinalizer> {
    engine: Arc<E>,
    finalizer: Arc<F>,
    registry: JobRegistry,
    work_root: PathBuf,
    events: EventBus,
    metrics: Metrics,
}

impl<E, F> DownloadOrchestrator<E, F>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    /// Build an orchestrator whose working folders live under `work_root`.
    pub fn new(
        engine: Arc<E>,
        finalizer: Arc<F>,
        work_root: impl Into<PathBuf>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            engine,
            finalizer,
            registry: JobRegistry::new(),
            work_root: work_root.into(),
            events,
            metrics,
        }
    }

    /// Hand out job ids starting at `first`, e.g. past folders a previous
    /// process left in the work root.
    #[must_use]
    pub fn with_first_job_id(mut self, first: u64) -> Self {
        self.registry = JobRegistry::with_first_id(first);
        self
    }

    /// Root under which `<id>` working folders are created.
    #[must_use]
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Metrics registry shared with the rest of the process.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Subscribe to job events, replaying those after `since` when still buffered.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        self.events.subscribe(since)
    }

    /// Admit a new download and register it as `Queued`.
    ///
    /// Nothing is registered when admission fails, and the working folder is
    /// removed best-effort.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidSource`] for unparsable sources,
    /// [`JobError::Io`] when the working folder cannot be created, and
    /// [`JobError::Engine`] when the engine refuses the transfer.
    pub async fn start(&self, source: &str, destination: &Path) -> JobResult<JobSnapshot> {
        let parsed =
            TransferSource::parse(source).map_err(|err| JobError::engine("start", None, err))?;

        let (job_id, mut slot) = self.registry.reserve().await;
        let working_folder = self.work_root.join(job_id.to_string());
        let admission = match self.engine.begin(&parsed, &working_folder).await {
            Ok(admission) => {
                self.metrics.inc_engine_command("begin", "ok");
                admission
            }
            Err(err) => {
                self.metrics.inc_engine_command("begin", "error");
                warn!(job_id = %job_id, error = %err.detail(), "transfer admission failed");
                self.registry.discard(job_id);
                drop(slot);
                discard_working_folder(job_id, &working_folder).await;
                return Err(JobError::engine("start", None, err));
            }
        };

        let job = Job::admitted(
            job_id,
            source.trim(),
            admission,
            destination.to_path_buf(),
            Utc::now(),
        );
        let snapshot = job.snapshot();
        slot.fill(job);
        drop(slot);

        self.metrics.inc_job_started();
        self.update_active_gauge();
        self.publish(Event::JobAdded {
            job_id,
            info_hash: snapshot.info_hash.clone(),
        });
        info!(
            job_id = %job_id,
            info_hash = %snapshot.info_hash,
            working_folder = %snapshot.working_folder.display(),
            "download job started"
        );
        Ok(snapshot)
    }

    /// Pause a queued or downloading job; pausing a paused job is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`], [`JobError::InvalidState`] for
    /// terminal jobs, or [`JobError::Engine`] when the engine call fails.
    pub async fn pause(&self, job_id: JobId) -> JobResult<()> {
        let mut slot = self.registry.lock(job_id).await?;
        let job = slot.job_mut(job_id)?;
        match job.state {
            JobState::Paused => return Ok(()),
            JobState::Completed | JobState::Failed => {
                return Err(JobError::InvalidState {
                    job_id,
                    operation: "pause",
                    state: job.state,
                });
            }
            JobState::Queued | JobState::Downloading => {}
        }

        let result = self.engine.pause(job.handle).await;
        self.record_engine("pause", &result);
        result.map_err(|err| JobError::engine("pause", Some(job_id), err))?;

        job.set_state(JobState::Paused, Utc::now());
        self.publish(Event::StateChanged {
            job_id,
            state: JobState::Paused,
        });
        info!(job_id = %job_id, "download job paused");
        Ok(())
    }

    /// Resume a paused job; resuming a queued or downloading job is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`], [`JobError::InvalidState`] for
    /// terminal jobs, or [`JobError::Engine`] when the engine call fails.
    pub async fn resume(&self, job_id: JobId) -> JobResult<()> {
        let mut slot = self.registry.lock(job_id).await?;
        let job = slot.job_mut(job_id)?;
        match job.state {
            JobState::Queued | JobState::Downloading => return Ok(()),
            JobState::Completed | JobState::Failed => {
                return Err(JobError::InvalidState {
                    job_id,
                    operation: "resume",
                    state: job.state,
                });
            }
            JobState::Paused => {}
        }

        let result = self.engine.resume(job.handle).await;
        self.record_engine("resume", &result);
        result.map_err(|err| JobError::engine("resume", Some(job_id), err))?;

        job.set_state(JobState::Downloading, Utc::now());
        self.publish(Event::StateChanged {
            job_id,
            state: JobState::Downloading,
        });
        info!(job_id = %job_id, "download job resumed");
        Ok(())
    }

    /// Remove a job in any state, release its engine handle and delete its
    /// working folder. Unknown ids succeed without doing anything.
    ///
    /// Waits for any in-flight operation on the job, finalize included.
    ///
    /// # Errors
    ///
    /// Currently infallible; engine and filesystem failures are logged.
    pub async fn delete(&self, job_id: JobId) -> JobResult<()> {
        let Ok(mut slot) = self.registry.lock(job_id).await else {
            debug!(job_id = %job_id, "delete for unknown job ignored");
            return Ok(());
        };
        let Some(job) = slot.clear() else {
            debug!(job_id = %job_id, "job already deleted");
            return Ok(());
        };
        self.registry.discard(job_id);

        let result = self.engine.remove(job.handle).await;
        self.record_engine("remove", &result);
        if let Err(err) = result {
            warn!(
                job_id = %job_id,
                error = %err.detail(),
                "engine remove failed; continuing delete"
            );
        }
        discard_working_folder(job_id, &job.working_folder).await;
        drop(slot);

        self.update_active_gauge();
        self.publish(Event::JobRemoved { job_id });
        info!(job_id = %job_id, "download job deleted");
        Ok(())
    }

    /// Current status of a job, refreshed from the engine.
    ///
    /// The first call that observes `Completed` runs the finalizer before it
    /// returns; a failed finalize is recorded on the job and retried on the
    /// next call.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown or deleted jobs.
    pub async fn get_status(&self, job_id: JobId) -> JobResult<JobSnapshot> {
        let mut slot = self.registry.lock(job_id).await?;
        let job = slot.job_mut(job_id)?;
        let now = Utc::now();

        match self.engine.snapshot(job.handle).await {
            Ok(snapshot) => {
                let observation = job.observe(&snapshot, now);
                if observation.state_changed() {
                    info!(
                        job_id = %job_id,
                        from = %observation.previous,
                        to = %observation.current,
                        "download job state changed"
                    );
                    self.publish(Event::StateChanged {
                        job_id,
                        state: observation.current,
                    });
                }
                if observation.progressed {
                    self.publish(Event::Progress {
                        job_id,
                        bytes_downloaded: job.progress_bytes,
                        bytes_total: job.total_bytes,
                    });
                }
            }
            Err(err) => {
                let message = err.detail();
                if job.fail(message.clone(), now) {
                    warn!(
                        job_id = %job_id,
                        error = %message,
                        "engine snapshot failed; job marked failed"
                    );
                    self.publish(Event::StateChanged {
                        job_id,
                        state: JobState::Failed,
                    });
                }
            }
        }

        if job.needs_finalize() {
            // Failure is already recorded on the job.
            let _ = self.finalize_job(job).await;
        }
        Ok(job.snapshot())
    }

    /// Explicit finalize retry for one job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`], [`JobError::InvalidState`] unless the
    /// job is `Completed`, or [`JobError::Io`] when the move fails again.
    pub async fn retry_finalize(&self, job_id: JobId) -> JobResult<JobSnapshot> {
        let mut slot = self.registry.lock(job_id).await?;
        let job = slot.job_mut(job_id)?;
        if job.state != JobState::Completed {
            return Err(JobError::InvalidState {
                job_id,
                operation: "finalize",
                state: job.state,
            });
        }
        if job.needs_finalize() {
            self.finalize_job(job)
                .await
                .map_err(|err| JobError::io("finalize", err))?;
        }
        Ok(job.snapshot())
    }

    /// Move `working` into `destination`.
    ///
    /// When the working folder belongs to a registered job the move runs under
    /// that job's lock and records the outcome on the job; otherwise the plain
    /// finalizer runs.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidState`] for an owning job that has not
    /// completed, or [`JobError::Io`] when the move fails or `destination`
    /// differs from the owning job's destination.
    pub async fn finalize_folders(&self, working: &Path, destination: &Path) -> JobResult<()> {
        let Some(job_id) = self.owner_of(working) else {
            let report = self
                .finalizer
                .finalize(working, destination)
                .await
                .map_err(|err| JobError::io("finalize", err))?;
            debug!(
                working = %working.display(),
                moved = report.moved_entries,
                "unowned working folder finalized"
            );
            return Ok(());
        };

        let mut slot = self.registry.lock(job_id).await?;
        let job = slot.job_mut(job_id)?;
        if job.destination_folder != destination {
            return Err(JobError::io(
                "finalize",
                FsOpsError::InvalidInput {
                    field: "destination",
                    reason: "does not match the job destination",
                    value: Some(destination.display().to_string()),
                },
            ));
        }
        if job.state != JobState::Completed {
            return Err(JobError::InvalidState {
                job_id,
                operation: "finalize",
                state: job.state,
            });
        }
        if job.needs_finalize() {
            self.finalize_job(job)
                .await
                .map_err(|err| JobError::io("finalize", err))?;
        }
        Ok(())
    }

    /// Snapshots of every job ordered by id, without consulting the engine.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs = Vec::new();
        for job_id in self.registry.ids() {
            let Ok(slot) = self.registry.lock(job_id).await else {
                continue;
            };
            if let Ok(job) = slot.job(job_id) {
                jobs.push(job.snapshot());
            }
        }
        jobs
    }

    async fn finalize_job(&self, job: &mut Job) -> Result<FinalizeReport, FsOpsError> {
        let job_id = job.id;
        self.publish(Event::FinalizeStarted { job_id });
        let outcome = self
            .finalizer
            .finalize(&job.working_folder, &job.destination_folder)
            .await;
        let now = Utc::now();
        match &outcome {
            Ok(report) => {
                job.mark_finalized(now);
                self.metrics.inc_finalize("success");
                self.publish(Event::FinalizeCompleted {
                    job_id,
                    destination: job.destination_folder.display().to_string(),
                });
                info!(
                    job_id = %job_id,
                    moved = report.moved_entries,
                    destination = %job.destination_folder.display(),
                    "payload finalized"
                );
            }
            Err(err) => {
                let message = err.detail();
                job.mark_finalize_failed(message.clone(), now);
                self.metrics.inc_finalize("failure");
                self.publish(Event::FinalizeFailed {
                    job_id,
                    message: message.clone(),
                });
                warn!(job_id = %job_id, error = %message, "payload finalize failed");
            }
        }
        outcome
    }

    fn owner_of(&self, working: &Path) -> Option<JobId> {
        if working.parent()? != self.work_root {
            return None;
        }
        let raw = working.file_name()?.to_str()?.parse::<u64>().ok()?;
        let job_id = JobId::new(raw);
        self.registry.contains(job_id).then_some(job_id)
    }

    fn record_engine<T>(&self, command: &'static str, result: &EngineResult<T>) {
        let status = if result.is_ok() { "ok" } else { "error" };
        self.metrics.inc_engine_command(command, status);
    }

    fn update_active_gauge(&self) {
        self.metrics
            .set_jobs_active(i64::try_from(self.registry.len()).unwrap_or(i64::MAX));
    }

    fn publish(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }
}

async fn discard_working_folder(job_id: JobId, working_folder: &Path) {
    if let Err(err) = hanamirip_fsops::remove_working_folder(working_folder).await {
        warn!(
            job_id = %job_id,
            folder = %working_folder.display(),
            error = %err.detail(),
            "failed to remove working folder"
        );
    }
}
