//! Core transfer domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hanamirip_events::{JobId, JobState};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EngineError, EngineResult};
use crate::translate::translate;

const TORRENT_EXTENSION: &str = "torrent";

/// Where the engine should fetch the transfer metadata from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferSource {
    /// Magnet URI carrying a content hash.
    Magnet {
        /// Full magnet URI.
        uri: String,
    },
    /// HTTP(S) link to a `.torrent` document.
    Url {
        /// Absolute URL.
        url: String,
    },
    /// Local `.torrent` file.
    TorrentFile {
        /// Path to the metainfo file.
        path: PathBuf,
    },
}

impl TransferSource {
    /// Classify raw user input.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSource`] when the input is blank, a magnet
    /// URI without a content hash, a malformed URL, or a path that is not an
    /// existing `.torrent` file.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(EngineError::invalid_source(raw, "source is blank"));
        }

        let lowered = input.to_ascii_lowercase();
        if lowered.starts_with("magnet:") {
            return parse_magnet(input);
        }
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            let url = Url::parse(input)
                .map_err(|_| EngineError::invalid_source(input, "url is malformed"))?;
            if url.host_str().is_none_or(str::is_empty) {
                return Err(EngineError::invalid_source(input, "url has no host"));
            }
            return Ok(Self::Url {
                url: url.to_string(),
            });
        }

        let path = Path::new(input);
        let is_torrent = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TORRENT_EXTENSION));
        if !is_torrent {
            return Err(EngineError::invalid_source(
                input,
                "expected a magnet uri, an http(s) url, or a .torrent file",
            ));
        }
        if !path.is_file() {
            return Err(EngineError::invalid_source(
                input,
                "torrent file does not exist",
            ));
        }
        Ok(Self::TorrentFile {
            path: path.to_path_buf(),
        })
    }

    /// Text form handed to the engine.
    #[must_use]
    pub fn as_engine_input(&self) -> String {
        match self {
            Self::Magnet { uri } => uri.clone(),
            Self::Url { url } => url.clone(),
            Self::TorrentFile { path } => path.display().to_string(),
        }
    }
}

fn parse_magnet(input: &str) -> EngineResult<TransferSource> {
    let url =
        Url::parse(input).map_err(|_| EngineError::invalid_source(input, "magnet is malformed"))?;
    let has_hash = url.query_pairs().any(|(key, value)| {
        let value = value.to_ascii_lowercase();
        key.eq_ignore_ascii_case("xt")
            && (value.starts_with("urn:btih:") || value.starts_with("urn:btmh:"))
    });
    if !has_hash {
        return Err(EngineError::invalid_source(
            input,
            "magnet has no content hash",
        ));
    }
    Ok(TransferSource::Magnet {
        uri: input.to_string(),
    })
}

/// Engine-assigned identifier for an admitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineHandle(u64);

impl EngineHandle {
    /// Wrap a raw engine identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw engine identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for EngineHandle {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// What the engine reports back when it accepts a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAdmission {
    /// Handle used for every later command.
    pub handle: EngineHandle,
    /// Content identifier of the transfer.
    pub info_hash: String,
    /// Display name, when the metadata carries one.
    pub name: Option<String>,
    /// Folder the engine writes into.
    pub output_folder: PathBuf,
}

/// Point-in-time view of one transfer as the engine sees it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSnapshot {
    /// Engine-native state label.
    pub state: String,
    /// Bytes written so far.
    pub progress_bytes: u64,
    /// Payload size, `0` while unknown.
    pub total_bytes: u64,
    /// Bytes sent to peers.
    pub uploaded_bytes: u64,
    /// Whether every piece is present.
    pub finished: bool,
    /// Failure text reported by the engine.
    pub error: Option<String>,
    /// Current download rate in MiB/s.
    pub download_mibps: Option<f64>,
    /// Current upload rate in MiB/s.
    pub upload_mibps: Option<f64>,
    /// Estimated time to completion.
    pub eta: Option<Duration>,
}

impl EngineSnapshot {
    /// Snapshot of a transfer that has been admitted but not yet inspected.
    #[must_use]
    pub fn initializing() -> Self {
        Self {
            state: "initializing".to_string(),
            ..Self::default()
        }
    }
}

/// Authoritative record of a download job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Process-local identifier.
    pub id: JobId,
    /// Raw source text supplied at creation.
    pub source: String,
    /// Engine handle owning the transfer.
    pub handle: EngineHandle,
    /// Content identifier reported by the engine.
    pub info_hash: String,
    /// Display name reported by the engine.
    pub name: Option<String>,
    /// Engine-private folder the payload is written to.
    pub working_folder: PathBuf,
    /// Folder that receives the payload once finalized.
    pub destination_folder: PathBuf,
    /// Current lifecycle state.
    pub state: JobState,
    /// Bytes written so far; never decreases.
    pub progress_bytes: u64,
    /// Payload size, `0` while unknown.
    pub total_bytes: u64,
    /// Bytes sent to peers; never decreases.
    pub uploaded_bytes: u64,
    /// Last observed download rate in MiB/s.
    pub download_mibps: Option<f64>,
    /// Last observed upload rate in MiB/s.
    pub upload_mibps: Option<f64>,
    /// Last observed time to completion.
    pub eta: Option<Duration>,
    /// Failure text, or finalize failure text while `Completed`.
    pub error: Option<String>,
    /// Whether the payload has been moved to the destination.
    pub finalized: bool,
    /// When the job was registered.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
    /// When the job first reached `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of folding one engine snapshot into a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// State before the snapshot was applied.
    pub previous: JobState,
    /// State after the snapshot was applied.
    pub current: JobState,
    /// Whether either byte counter moved forward.
    pub progressed: bool,
}

impl Observation {
    /// Whether the lifecycle state changed.
    #[must_use]
    pub fn state_changed(&self) -> bool {
        self.previous != self.current
    }
}

impl Job {
    /// Build a freshly admitted job in the `Queued` state.
    #[must_use]
    pub fn admitted(
        id: JobId,
        source: impl Into<String>,
        admission: EngineAdmission,
        destination_folder: PathBuf,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            handle: admission.handle,
            info_hash: admission.info_hash,
            name: admission.name,
            working_folder: admission.output_folder,
            destination_folder,
            state: JobState::Queued,
            progress_bytes: 0,
            total_bytes: 0,
            uploaded_bytes: 0,
            download_mibps: None,
            upload_mibps: None,
            eta: None,
            error: None,
            finalized: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Fold an engine snapshot into the record.
    ///
    /// Byte counters only move forward, `progress_bytes` is clamped to a known
    /// total, and `Completed`/`Failed` never change once reached.
    pub fn observe(&mut self, snapshot: &EngineSnapshot, now: DateTime<Utc>) -> Observation {
        let previous = self.state;
        let before = (self.progress_bytes, self.uploaded_bytes);

        if snapshot.total_bytes > 0 {
            self.total_bytes = self.total_bytes.max(snapshot.total_bytes);
        }
        self.progress_bytes = self.progress_bytes.max(snapshot.progress_bytes);
        if self.total_bytes > 0 {
            self.progress_bytes = self.progress_bytes.min(self.total_bytes);
        }
        self.uploaded_bytes = self.uploaded_bytes.max(snapshot.uploaded_bytes);
        self.download_mibps = snapshot.download_mibps;
        self.upload_mibps = snapshot.upload_mibps;
        self.eta = snapshot.eta;

        if !previous.is_terminal() {
            let next = translate(snapshot);
            match next {
                JobState::Failed => {
                    self.error.clone_from(&snapshot.error);
                }
                JobState::Completed => {
                    self.completed_at.get_or_insert(now);
                    if self.total_bytes > 0 {
                        self.progress_bytes = self.total_bytes;
                    }
                }
                _ => {}
            }
            self.state = next;
        }

        let progressed = before != (self.progress_bytes, self.uploaded_bytes);
        if progressed || previous != self.state {
            self.updated_at = now;
        }
        Observation {
            previous,
            current: self.state,
            progressed,
        }
    }

    /// Flip a live job to `Failed`; terminal jobs are left untouched.
    ///
    /// Returns `true` when the state changed.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Failed;
        self.error = Some(message.into());
        self.updated_at = now;
        true
    }

    /// Record the outcome of a pause or resume command.
    pub fn set_state(&mut self, state: JobState, now: DateTime<Utc>) {
        if self.state != state {
            self.state = state;
            self.updated_at = now;
        }
    }

    /// Record a successful finalize.
    pub fn mark_finalized(&mut self, now: DateTime<Utc>) {
        self.finalized = true;
        self.error = None;
        self.updated_at = now;
    }

    /// Record a failed finalize; the job stays `Completed`.
    pub fn mark_finalize_failed(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.finalized = false;
        self.error = Some(message.into());
        self.updated_at = now;
    }

    /// Whether the Finalizer still has to run for this job.
    #[must_use]
    pub fn needs_finalize(&self) -> bool {
        self.state == JobState::Completed && !self.finalized
    }

    /// Read-only copy handed to callers.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            source: self.source.clone(),
            info_hash: self.info_hash.clone(),
            name: self.name.clone(),
            working_folder: self.working_folder.clone(),
            destination_folder: self.destination_folder.clone(),
            state: self.state,
            progress_bytes: self.progress_bytes,
            total_bytes: self.total_bytes,
            uploaded_bytes: self.uploaded_bytes,
            download_mibps: self.download_mibps,
            upload_mibps: self.upload_mibps,
            eta: self.eta,
            error: self.error.clone(),
            finalized: self.finalized,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }
}

/// Immutable view of a [`Job`] at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    /// Process-local identifier.
    pub id: JobId,
    /// Raw source text supplied at creation.
    pub source: String,
    /// Content identifier reported by the engine.
    pub info_hash: String,
    /// Display name reported by the engine.
    pub name: Option<String>,
    /// Engine-private working folder.
    pub working_folder: PathBuf,
    /// Final destination folder.
    pub destination_folder: PathBuf,
    /// Lifecycle state.
    pub state: JobState,
    /// Bytes written so far.
    pub progress_bytes: u64,
    /// Payload size, `0` while unknown.
    pub total_bytes: u64,
    /// Bytes sent to peers.
    pub uploaded_bytes: u64,
    /// Download rate in MiB/s.
    pub download_mibps: Option<f64>,
    /// Upload rate in MiB/s.
    pub upload_mibps: Option<f64>,
    /// Estimated time to completion.
    pub eta: Option<Duration>,
    /// Failure text.
    pub error: Option<String>,
    /// Whether the payload reached the destination.
    pub finalized: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// First time the job was seen `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Whether the transfer reached `Completed`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == JobState::Completed
    }

    /// Completion percentage in `0.0..=100.0`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.progress_bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }
}
