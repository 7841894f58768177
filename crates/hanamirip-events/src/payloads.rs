//! Event payload types carried across the workspace.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Process-local handle identifying a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Wrap a raw job number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw numeric value of the handle.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Externally visible lifecycle state of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Accepted by the engine, no status observed yet.
    Queued,
    /// Transfer is running.
    Downloading,
    /// Transfer is paused.
    Paused,
    /// Every byte arrived.
    Completed,
    /// Engine reported a failure.
    Failed,
}

impl JobState {
    /// Stable label used by UI payloads and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Downloading => "Downloading",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// `Completed` and `Failed` only ever leave through deletion.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for JobState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was admitted by the engine and registered.
    JobAdded {
        /// Identifier of the new job.
        job_id: JobId,
        /// Content identifier reported by the engine.
        info_hash: String,
    },
    /// Job moved to a new lifecycle state.
    StateChanged {
        /// Identifier of the job whose state changed.
        job_id: JobId,
        /// State after the transition.
        state: JobState,
    },
    /// Byte counters advanced during a poll.
    Progress {
        /// Identifier of the job being tracked.
        job_id: JobId,
        /// Bytes written so far.
        bytes_downloaded: u64,
        /// Total payload size, `0` while unknown.
        bytes_total: u64,
    },
    /// Finalize started moving the payload.
    FinalizeStarted {
        /// Identifier of the job being finalized.
        job_id: JobId,
    },
    /// Payload now lives under the destination folder.
    FinalizeCompleted {
        /// Identifier of the finalized job.
        job_id: JobId,
        /// Destination folder that received the payload.
        destination: String,
    },
    /// Finalize failed; the job stays completed and may be retried.
    FinalizeFailed {
        /// Identifier of the job whose finalize failed.
        job_id: JobId,
        /// Human-readable failure detail.
        message: String,
    },
    /// Job record was deleted.
    JobRemoved {
        /// Identifier of the removed job.
        job_id: JobId,
    },
}

impl Event {
    /// Machine-friendly discriminator for subscribers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobAdded { .. } => "job_added",
            Self::StateChanged { .. } => "state_changed",
            Self::Progress { .. } => "progress",
            Self::FinalizeStarted { .. } => "finalize_started",
            Self::FinalizeCompleted { .. } => "finalize_completed",
            Self::FinalizeFailed { .. } => "finalize_failed",
            Self::JobRemoved { .. } => "job_removed",
        }
    }

    /// Job the event refers to.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        match self {
            Self::JobAdded { job_id, .. }
            | Self::StateChanged { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::FinalizeStarted { job_id }
            | Self::FinalizeCompleted { job_id, .. }
            | Self::FinalizeFailed { job_id, .. }
            | Self::JobRemoved { job_id } => *job_id,
        }
    }
}

/// Metadata wrapper around events carrying the sequence id and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Wall-clock time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_labels_match_ui_vocabulary() {
        assert_eq!(JobState::Downloading.to_string(), "Downloading");
        assert_eq!(JobState::Paused.as_str(), "Paused");
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::StateChanged {
            job_id: JobId::new(7),
            state: JobState::Paused,
        };
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "state_changed");
        assert_eq!(value["job_id"], 7);
        assert_eq!(value["state"], "Paused");
        assert_eq!(event.kind(), "state_changed");
        assert_eq!(event.job_id(), JobId::new(7));
    }
}
