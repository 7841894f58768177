#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Transfer engine adapter backed by `librqbit`.
//!
//! A background worker receives mutating calls over a channel and runs each one
//! as its own task against the shared session; callers wait for the reply.
//! Snapshot reads come from a cache the worker refreshes on a fixed interval
//! and after every command.

mod cache;
/// Engine command definitions and runtime configuration.
pub mod command;
mod convert;
/// Session abstraction and native/in-memory implementations.
pub mod session;
mod worker;

pub use command::EngineRuntimeConfig;
pub use session::{StubCall, StubControl};
pub use worker::REFRESH_INTERVAL;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hanamirip_transfer_core::{
    EngineAdmission, EngineError, EngineHandle, EngineResult, EngineSnapshot, TransferEngine,
    TransferSource,
};
use tokio::sync::{mpsc, oneshot};

use cache::SnapshotCache;
use command::{EngineCommand, Reply};
use session::{StubSession, TransferSession};

const COMMAND_BUFFER: usize = 128;

/// Handle to the engine worker; cheap to clone.
#[derive(Clone)]
pub struct RqbitEngine {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: SnapshotCache,
}

impl RqbitEngine {
    /// Start a librqbit session with the given tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be initialised, or when the
    /// crate was built without the `librqbit` feature.
    pub async fn new(config: &EngineRuntimeConfig) -> Result<Self> {
        let session = session::create_session(config).await?;
        Ok(Self::with_session(session))
    }

    /// Start an engine backed by the in-memory session and return its control handle.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn in_memory() -> (Self, StubControl) {
        let (session, control) = StubSession::new();
        (Self::with_session(Arc::new(session)), control)
    }

    fn with_session(session: Arc<dyn TransferSession>) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let snapshots = SnapshotCache::default();
        worker::spawn(rx, session, snapshots.clone());
        Self {
            commands,
            snapshots,
        }
    }

    /// Refresh every cached snapshot and wait until the refresh finished.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] when the worker has stopped.
    pub async fn refresh(&self) -> EngineResult<()> {
        self.request("refresh", |respond_to| EngineCommand::Refresh { respond_to })
            .await
    }

    async fn request<T>(
        &self,
        operation: &'static str,
        build: impl FnOnce(Reply<T>) -> EngineCommand + Send,
    ) -> EngineResult<T>
    where
        T: Send,
    {
        let (respond_to, reply) = oneshot::channel();
        self.commands
            .send(build(respond_to))
            .await
            .map_err(|_| EngineError::Unavailable { operation })?;
        reply
            .await
            .map_err(|_| EngineError::Unavailable { operation })?
    }
}

#[async_trait]
impl TransferEngine for RqbitEngine {
    async fn begin(
        &self,
        source: &TransferSource,
        working_folder: &Path,
    ) -> EngineResult<EngineAdmission> {
        let source = source.clone();
        let working_folder = working_folder.to_path_buf();
        self.request("begin", move |respond_to| EngineCommand::Begin {
            source,
            working_folder,
            respond_to,
        })
        .await
    }

    async fn pause(&self, handle: EngineHandle) -> EngineResult<()> {
        self.request("pause", |respond_to| EngineCommand::Pause {
            handle,
            respond_to,
        })
        .await
    }

    async fn resume(&self, handle: EngineHandle) -> EngineResult<()> {
        self.request("resume", |respond_to| EngineCommand::Resume {
            handle,
            respond_to,
        })
        .await
    }

    async fn remove(&self, handle: EngineHandle) -> EngineResult<()> {
        self.request("remove", |respond_to| EngineCommand::Remove {
            handle,
            respond_to,
        })
        .await
    }

    async fn snapshot(&self, handle: EngineHandle) -> EngineResult<EngineSnapshot> {
        self.snapshots
            .get(handle)
            .ok_or(EngineError::UnknownHandle { handle })
    }
}
