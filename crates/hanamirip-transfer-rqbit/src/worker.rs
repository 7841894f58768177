#![allow(clippy::redundant_pub_crate)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hanamirip_transfer_core::{
    EngineAdmission, EngineError, EngineHandle, EngineResult, EngineSnapshot, TransferSource,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::command::{EngineCommand, Reply};
use crate::session::TransferSession;

/// How often every cached snapshot is refreshed from the session.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Dispatch commands until every engine handle is dropped.
///
/// Each command runs as its own task so a slow admission (magnet metadata can
/// take minutes) never delays commands for other transfers or the periodic
/// refresh. Callers serialise commands for one transfer themselves.
pub(crate) fn spawn(
    mut commands: mpsc::Receiver<EngineCommand>,
    session: Arc<dyn TransferSession>,
    cache: SnapshotCache,
) {
    tokio::spawn(async move {
        let worker = Worker { session, cache };
        let mut poll = tokio::time::interval(REFRESH_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refreshing: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => {
                            tokio::spawn(worker.clone().handle(command));
                        }
                        None => break,
                    }
                }
                _ = poll.tick() => {
                    // At most one periodic refresh in flight.
                    if refreshing.as_ref().is_none_or(JoinHandle::is_finished) {
                        let worker = worker.clone();
                        refreshing = Some(tokio::spawn(async move { worker.refresh_all().await }));
                    }
                }
            }
        }
        debug!("transfer engine worker stopped");
    });
}

#[derive(Clone)]
struct Worker {
    session: Arc<dyn TransferSession>,
    cache: SnapshotCache,
}

impl Worker {
    async fn handle(self, command: EngineCommand) {
        let name = command.name();
        debug!(command = name, "handling engine command");
        match command {
            EngineCommand::Begin {
                source,
                working_folder,
                respond_to,
            } => {
                let result = self.begin(&source, &working_folder).await;
                reply(name, respond_to, result);
            }
            EngineCommand::Pause { handle, respond_to } => {
                let result = self.pause(handle).await;
                reply(name, respond_to, result);
            }
            EngineCommand::Resume { handle, respond_to } => {
                let result = self.resume(handle).await;
                reply(name, respond_to, result);
            }
            EngineCommand::Remove { handle, respond_to } => {
                let result = self.remove(handle).await;
                reply(name, respond_to, result);
            }
            EngineCommand::Refresh { respond_to } => {
                self.refresh_all().await;
                reply(name, respond_to, Ok(()));
            }
        }
    }

    async fn begin(
        &self,
        source: &TransferSource,
        working_folder: &Path,
    ) -> EngineResult<EngineAdmission> {
        tokio::fs::create_dir_all(working_folder)
            .await
            .map_err(|err| EngineError::io("begin.create_working_folder", working_folder, err))?;
        let admission = self
            .session
            .add(source, working_folder)
            .await
            .map_err(|err| EngineError::rejected("begin", err))?;
        self.cache
            .insert(admission.handle, EngineSnapshot::initializing());
        self.refresh(admission.handle).await;
        info!(
            handle = %admission.handle,
            info_hash = %admission.info_hash,
            "transfer admitted"
        );
        Ok(admission)
    }

    async fn pause(&self, handle: EngineHandle) -> EngineResult<()> {
        self.ensure_known(handle)?;
        self.session
            .pause(handle)
            .await
            .map_err(|err| EngineError::rejected("pause", err))?;
        self.refresh(handle).await;
        Ok(())
    }

    async fn resume(&self, handle: EngineHandle) -> EngineResult<()> {
        self.ensure_known(handle)?;
        self.session
            .resume(handle)
            .await
            .map_err(|err| EngineError::rejected("resume", err))?;
        self.refresh(handle).await;
        Ok(())
    }

    async fn remove(&self, handle: EngineHandle) -> EngineResult<()> {
        if !self.cache.contains(handle) {
            debug!(handle = %handle, "remove for unknown handle ignored");
            return Ok(());
        }
        self.session
            .remove(handle)
            .await
            .map_err(|err| EngineError::rejected("remove", err))?;
        self.cache.remove(handle);
        Ok(())
    }

    fn ensure_known(&self, handle: EngineHandle) -> EngineResult<()> {
        if self.cache.contains(handle) {
            Ok(())
        } else {
            Err(EngineError::UnknownHandle { handle })
        }
    }

    async fn refresh(&self, handle: EngineHandle) {
        match self.session.stats(handle).await {
            Ok(snapshot) => self.cache.update(handle, snapshot),
            Err(err) => warn!(handle = %handle, error = %err, "failed to refresh transfer stats"),
        }
    }

    async fn refresh_all(&self) {
        for handle in self.cache.handles() {
            self.refresh(handle).await;
        }
    }
}

fn reply<T>(command: &'static str, respond_to: Reply<T>, result: EngineResult<T>) {
    if let Err(err) = &result {
        warn!(command, error = %err.detail(), "engine command failed");
    }
    if respond_to.send(result).is_err() {
        debug!(command, "engine caller went away before the reply");
    }
}
