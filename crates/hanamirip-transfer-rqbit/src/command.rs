//! Command definitions and runtime configuration inputs for the engine worker.

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use hanamirip_transfer_core::{EngineAdmission, EngineHandle, EngineResult, TransferSource};
use tokio::sync::oneshot;

/// Reply channel carried by every command.
pub(crate) type Reply<T> = oneshot::Sender<EngineResult<T>>;

/// Requests handled by the background worker, each answered on its own channel.
#[derive(Debug)]
pub(crate) enum EngineCommand {
    /// Admit a transfer writing into `working_folder`.
    Begin {
        source: TransferSource,
        working_folder: PathBuf,
        respond_to: Reply<EngineAdmission>,
    },
    /// Pause a transfer.
    Pause {
        handle: EngineHandle,
        respond_to: Reply<()>,
    },
    /// Resume a transfer.
    Resume {
        handle: EngineHandle,
        respond_to: Reply<()>,
    },
    /// Forget a transfer.
    Remove {
        handle: EngineHandle,
        respond_to: Reply<()>,
    },
    /// Refresh every cached snapshot now.
    Refresh { respond_to: Reply<()> },
}

impl EngineCommand {
    /// Label used in logs.
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "begin",
            Self::Pause { .. } => "pause",
            Self::Resume { .. } => "resume",
            Self::Remove { .. } => "remove",
            Self::Refresh { .. } => "refresh",
        }
    }
}

/// Session tuning applied when the engine starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRuntimeConfig {
    /// Folder the session uses for its own state and default output.
    pub base_dir: PathBuf,
    /// Ports the session may listen on.
    pub listen_ports: Range<u16>,
    /// Ask the router for a port mapping.
    pub enable_upnp: bool,
    /// Peer connect timeout.
    pub connect_timeout: Duration,
    /// Peer read/write timeout.
    pub read_write_timeout: Duration,
    /// Peer keep-alive interval.
    pub keep_alive_interval: Duration,
    /// Pieces buffered before writes are flushed.
    pub defer_writes_up_to: usize,
    /// Transfers initialised in parallel.
    pub concurrent_init_limit: usize,
    /// Trackers appended to every transfer.
    pub trackers: Vec<String>,
}
