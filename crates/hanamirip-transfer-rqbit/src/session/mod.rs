#![allow(clippy::redundant_pub_crate)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use hanamirip_transfer_core::{EngineAdmission, EngineHandle, EngineSnapshot, TransferSource};

use crate::command::EngineRuntimeConfig;

#[cfg(feature = "librqbit")]
mod native;
mod stub;

pub use stub::{StubCall, StubControl};
pub(crate) use stub::StubSession;

/// Operations the worker needs from a concrete engine session.
///
/// Calls for different handles may run at the same time; an `add` waiting on
/// metadata must not hold anything the other calls need.
#[async_trait]
pub(crate) trait TransferSession: Send + Sync {
    async fn add(&self, source: &TransferSource, output_folder: &Path) -> Result<EngineAdmission>;
    async fn pause(&self, handle: EngineHandle) -> Result<()>;
    async fn resume(&self, handle: EngineHandle) -> Result<()>;
    async fn remove(&self, handle: EngineHandle) -> Result<()>;
    async fn stats(&self, handle: EngineHandle) -> Result<EngineSnapshot>;
}

/// Start the native session.
///
/// Fails when the crate was built without the `librqbit` feature; the
/// in-memory session is only reachable through `RqbitEngine::in_memory`.
#[cfg_attr(not(feature = "librqbit"), allow(clippy::unused_async))]
pub(crate) async fn create_session(
    config: &EngineRuntimeConfig,
) -> Result<Arc<dyn TransferSession>> {
    #[cfg(feature = "librqbit")]
    {
        native::create_session(config).await
    }

    #[cfg(not(feature = "librqbit"))]
    {
        Err(anyhow::anyhow!(
            "no transfer engine available for {}: built without the librqbit feature",
            config.base_dir.display()
        ))
    }
}
