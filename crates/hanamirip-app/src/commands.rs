//! Command surface consumed by the UI.
//!
//! DTOs serialise in `camelCase`; failures serialise as `{ kind, message }`
//! with a stable `kind` tag.

use std::path::Path;
use std::time::Duration;

use hanamirip_fsops::PayloadFinalizer;
use hanamirip_transfer_core::{JobId, JobSnapshot, JobState, TransferEngine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::JobError;
use crate::orchestrator::DownloadOrchestrator;

/// Result alias for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;

/// Error payload returned to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CommandError {
    /// Stable tag: `invalid_source`, `not_found`, `invalid_state`, `engine_error` or `io_error`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl From<JobError> for CommandError {
    fn from(err: JobError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.detail(),
        }
    }
}

/// Reply to `start_torrent_download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStartResponse {
    /// Job id used by every later command.
    pub id: u64,
    /// Content id reported by the engine.
    pub info_hash: String,
    /// Display name, when the engine knows it.
    pub name: Option<String>,
    /// Working folder the engine writes into.
    pub output_folder: String,
    /// Destination folder the payload is moved to.
    pub final_folder: String,
}

impl From<&JobSnapshot> for TorrentStartResponse {
    fn from(job: &JobSnapshot) -> Self {
        Self {
            id: job.id.get(),
            info_hash: job.info_hash.clone(),
            name: job.name.clone(),
            output_folder: job.working_folder.display().to_string(),
            final_folder: job.destination_folder.display().to_string(),
        }
    }
}

/// Reply to `get_torrent_status` and element of `list_torrents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStatusResponse {
    /// Job id.
    pub id: u64,
    /// Lifecycle state.
    pub state: JobState,
    /// Bytes verified so far.
    pub progress_bytes: u64,
    /// Payload size, `0` while unknown.
    pub total_bytes: u64,
    /// Bytes uploaded to peers.
    pub uploaded_bytes: u64,
    /// Whether the download completed.
    pub finished: bool,
    /// Whether the payload reached the destination folder.
    pub finalized: bool,
    /// Failure or finalize error text.
    pub error: Option<String>,
    /// Download rate, e.g. `"1.50 MiB/s"`.
    pub download_speed: Option<String>,
    /// Upload rate, e.g. `"0.20 MiB/s"`.
    pub upload_speed: Option<String>,
    /// Estimated time left, e.g. `"1h 2m"`.
    pub time_remaining: Option<String>,
}

impl From<&JobSnapshot> for TorrentStatusResponse {
    fn from(job: &JobSnapshot) -> Self {
        Self {
            id: job.id.get(),
            state: job.state,
            progress_bytes: job.progress_bytes,
            total_bytes: job.total_bytes,
            uploaded_bytes: job.uploaded_bytes,
            finished: job.is_finished(),
            finalized: job.finalized,
            error: job.error.clone(),
            download_speed: job.download_mibps.map(format_speed),
            upload_speed: job.upload_mibps.map(format_speed),
            time_remaining: job.eta.map(format_remaining),
        }
    }
}

/// Start a download of `url` whose payload ends up in `output_dir`.
///
/// # Errors
///
/// Returns `invalid_source` or `engine_error` when the job cannot be admitted.
pub async fn start_torrent_download<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    url: &str,
    output_dir: &str,
) -> CommandResult<TorrentStartResponse>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    let job = orchestrator.start(url, Path::new(output_dir)).await?;
    Ok(TorrentStartResponse::from(&job))
}

/// Poll a job.
///
/// # Errors
///
/// Returns `not_found` for unknown or deleted ids.
pub async fn get_torrent_status<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    id: u64,
) -> CommandResult<TorrentStatusResponse>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    let job = orchestrator.get_status(JobId::new(id)).await?;
    Ok(TorrentStatusResponse::from(&job))
}

/// Pause a job.
///
/// # Errors
///
/// Returns `not_found`, `invalid_state` or `engine_error`.
pub async fn pause_torrent<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    id: u64,
) -> CommandResult<()>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    Ok(orchestrator.pause(JobId::new(id)).await?)
}

/// Resume a job.
///
/// # Errors
///
/// Returns `not_found`, `invalid_state` or `engine_error`.
pub async fn resume_torrent<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    id: u64,
) -> CommandResult<()>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    Ok(orchestrator.resume(JobId::new(id)).await?)
}

/// Delete a job; unknown ids succeed.
///
/// # Errors
///
/// Currently never fails.
pub async fn delete_torrent<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    id: u64,
) -> CommandResult<()>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    Ok(orchestrator.delete(JobId::new(id)).await?)
}

/// Move a finished payload from `temp_folder` into `final_folder`.
///
/// # Errors
///
/// Returns `invalid_state` when the owning job has not completed and
/// `io_error` when the move fails.
pub async fn finalize_torrent_download<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
    temp_folder: &str,
    final_folder: &str,
) -> CommandResult<()>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    Ok(orchestrator
        .finalize_folders(Path::new(temp_folder), Path::new(final_folder))
        .await?)
}

/// Status of every job, ordered by id.
pub async fn list_torrents<E, F>(
    orchestrator: &DownloadOrchestrator<E, F>,
) -> Vec<TorrentStatusResponse>
where
    E: TransferEngine + 'static,
    F: PayloadFinalizer + 'static,
{
    orchestrator
        .list()
        .await
        .iter()
        .map(TorrentStatusResponse::from)
        .collect()
}

fn format_speed(mibps: f64) -> String {
    format!("{mibps:.2} MiB/s")
}

fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let (hours, minutes, seconds) = (total / 3_600, (total % 3_600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
