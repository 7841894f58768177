//! Engine trait implemented by transfer adapters.

use std::path::Path;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::model::{EngineAdmission, EngineHandle, EngineSnapshot, TransferSource};

/// Façade over a peer-to-peer transfer engine.
///
/// `pause`, `resume` and `remove` are idempotent: pausing a paused transfer,
/// resuming a running one, or removing an unknown handle succeed without effect.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Admit a transfer that writes into `working_folder`.
    async fn begin(
        &self,
        source: &TransferSource,
        working_folder: &Path,
    ) -> EngineResult<EngineAdmission>;

    /// Pause a transfer.
    async fn pause(&self, handle: EngineHandle) -> EngineResult<()>;

    /// Resume a transfer.
    async fn resume(&self, handle: EngineHandle) -> EngineResult<()>;

    /// Forget a transfer and release its resources.
    async fn remove(&self, handle: EngineHandle) -> EngineResult<()>;

    /// Last cached snapshot; never waits on network I/O.
    async fn snapshot(&self, handle: EngineHandle) -> EngineResult<EngineSnapshot>;
}
