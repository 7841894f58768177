use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use hanamirip_transfer_core::{EngineAdmission, EngineHandle, EngineSnapshot, TransferSource};
use url::Url;

use super::TransferSession;
use crate::convert::eta_from_rate;

/// Calls the in-memory session received, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubCall {
    /// A transfer was admitted.
    Add(EngineHandle),
    /// A pause request reached the session.
    Pause(EngineHandle),
    /// A resume request reached the session.
    Resume(EngineHandle),
    /// A removal request reached the session.
    Remove(EngineHandle),
}

#[derive(Default)]
struct StubState {
    next_id: u64,
    transfers: HashMap<EngineHandle, StubTransfer>,
    reject_next: Option<String>,
    calls: Vec<StubCall>,
}

struct StubTransfer {
    output_folder: PathBuf,
    paused: bool,
    progress_bytes: u64,
    total_bytes: u64,
    uploaded_bytes: u64,
    download_mibps: Option<f64>,
    finished: bool,
    error: Option<String>,
}

impl StubTransfer {
    fn snapshot(&self) -> EngineSnapshot {
        let state = if self.error.is_some() {
            "Error"
        } else if self.paused {
            "Paused"
        } else {
            "Live"
        };
        let download_mibps = if self.paused || self.finished {
            None
        } else {
            self.download_mibps
        };
        EngineSnapshot {
            state: state.to_string(),
            progress_bytes: self.progress_bytes,
            total_bytes: self.total_bytes,
            uploaded_bytes: self.uploaded_bytes,
            finished: self.finished,
            error: self.error.clone(),
            download_mibps,
            upload_mibps: None,
            eta: eta_from_rate(self.progress_bytes, self.total_bytes, download_mibps),
        }
    }
}

/// In-memory engine session used without the `librqbit` feature and in tests.
pub(crate) struct StubSession {
    state: Arc<Mutex<StubState>>,
}

impl StubSession {
    pub(crate) fn new() -> (Self, StubControl) {
        let state = Arc::new(Mutex::new(StubState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            StubControl { state },
        )
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransferSession for StubSession {
    async fn add(
        &self,
        source: &TransferSource,
        output_folder: &Path,
    ) -> Result<EngineAdmission> {
        let mut state = self.lock();
        if let Some(reason) = state.reject_next.take() {
            return Err(anyhow!(reason));
        }
        let handle = EngineHandle::new(state.next_id);
        state.next_id += 1;
        state.transfers.insert(
            handle,
            StubTransfer {
                output_folder: output_folder.to_path_buf(),
                paused: false,
                progress_bytes: 0,
                total_bytes: 0,
                uploaded_bytes: 0,
                download_mibps: None,
                finished: false,
                error: None,
            },
        );
        state.calls.push(StubCall::Add(handle));
        Ok(EngineAdmission {
            handle,
            info_hash: info_hash_for(source),
            name: display_name_for(source),
            output_folder: output_folder.to_path_buf(),
        })
    }

    async fn pause(&self, handle: EngineHandle) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StubCall::Pause(handle));
        let transfer = state
            .transfers
            .get_mut(&handle)
            .ok_or_else(|| anyhow!("unknown transfer {handle}"))?;
        transfer.paused = true;
        Ok(())
    }

    async fn resume(&self, handle: EngineHandle) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StubCall::Resume(handle));
        let transfer = state
            .transfers
            .get_mut(&handle)
            .ok_or_else(|| anyhow!("unknown transfer {handle}"))?;
        transfer.paused = false;
        Ok(())
    }

    async fn remove(&self, handle: EngineHandle) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StubCall::Remove(handle));
        state.transfers.remove(&handle);
        Ok(())
    }

    async fn stats(&self, handle: EngineHandle) -> Result<EngineSnapshot> {
        self.lock()
            .transfers
            .get(&handle)
            .map(StubTransfer::snapshot)
            .ok_or_else(|| anyhow!("unknown transfer {handle}"))
    }
}

/// Test handle steering the in-memory session.
///
/// Changes become visible to callers after the engine's next refresh.
#[derive(Clone)]
pub struct StubControl {
    state: Arc<Mutex<StubState>>,
}

impl StubControl {
    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_transfer(&self, handle: EngineHandle, apply: impl FnOnce(&mut StubTransfer)) -> bool {
        self.lock().transfers.get_mut(&handle).map(apply).is_some()
    }

    /// Handle of the transfer writing into `output_folder`.
    #[must_use]
    pub fn handle_for(&self, output_folder: &Path) -> Option<EngineHandle> {
        self.lock()
            .transfers
            .iter()
            .find(|(_, transfer)| transfer.output_folder == output_folder)
            .map(|(handle, _)| *handle)
    }

    /// Report progress; returns `false` for unknown handles.
    pub fn set_progress(
        &self,
        handle: EngineHandle,
        progress_bytes: u64,
        total_bytes: u64,
    ) -> bool {
        self.with_transfer(handle, |transfer| {
            transfer.progress_bytes = progress_bytes;
            transfer.total_bytes = total_bytes;
        })
    }

    /// Report a download rate in MiB/s.
    pub fn set_download_rate(&self, handle: EngineHandle, mibps: f64) -> bool {
        self.with_transfer(handle, |transfer| transfer.download_mibps = Some(mibps))
    }

    /// Mark every byte as present.
    pub fn complete(&self, handle: EngineHandle) -> bool {
        self.with_transfer(handle, |transfer| {
            transfer.progress_bytes = transfer.total_bytes;
            transfer.finished = true;
        })
    }

    /// Report an engine-side failure.
    pub fn fail(&self, handle: EngineHandle, message: impl Into<String>) -> bool {
        let message = message.into();
        self.with_transfer(handle, |transfer| transfer.error = Some(message))
    }

    /// Make the next admission fail with `reason`.
    pub fn reject_next_add(&self, reason: impl Into<String>) {
        self.lock().reject_next = Some(reason.into());
    }

    /// Whether the transfer is paused; `None` for unknown handles.
    #[must_use]
    pub fn is_paused(&self, handle: EngineHandle) -> Option<bool> {
        self.lock()
            .transfers
            .get(&handle)
            .map(|transfer| transfer.paused)
    }

    /// Number of transfers the session still tracks.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.lock().transfers.len()
    }

    /// Every call the session received, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<StubCall> {
        self.lock().calls.clone()
    }
}

fn info_hash_for(source: &TransferSource) -> String {
    if let TransferSource::Magnet { uri } = source
        && let Some(hash) = magnet_param(uri, "xt").and_then(|xt| {
            xt.strip_prefix("urn:btih:")
                .or_else(|| xt.strip_prefix("urn:btmh:"))
                .map(str::to_ascii_lowercase)
        })
    {
        return hash;
    }
    let mut hasher = DefaultHasher::new();
    source.as_engine_input().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn display_name_for(source: &TransferSource) -> Option<String> {
    match source {
        TransferSource::Magnet { uri } => magnet_param(uri, "dn"),
        TransferSource::Url { url } => Url::parse(url).ok().and_then(|url| {
            url.path_segments()?
                .next_back()
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.trim_end_matches(".torrent").to_string())
        }),
        TransferSource::TorrentFile { path } => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(ToString::to_string),
    }
}

fn magnet_param(uri: &str, key: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    url.query_pairs()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnet() -> TransferSource {
        TransferSource::Magnet {
            uri: "magnet:?xt=urn:btih:ABCDEF0123&dn=Show%2001".into(),
        }
    }

    #[tokio::test]
    async fn add_reports_hash_and_name_from_magnet() -> Result<()> {
        let (session, control) = StubSession::new();
        let admission = session.add(&magnet(), Path::new("/work/1")).await?;
        assert_eq!(admission.handle, EngineHandle::new(0));
        assert_eq!(admission.info_hash, "abcdef0123");
        assert_eq!(admission.name.as_deref(), Some("Show 01"));
        assert_eq!(control.handle_for(Path::new("/work/1")), Some(admission.handle));
        Ok(())
    }

    #[tokio::test]
    async fn stats_follow_control_changes() -> Result<()> {
        let (session, control) = StubSession::new();
        let handle = session.add(&magnet(), Path::new("/work/2")).await?.handle;

        assert!(control.set_progress(handle, 10, 40));
        let snapshot = session.stats(handle).await?;
        assert_eq!(snapshot.state, "Live");
        assert_eq!(snapshot.progress_bytes, 10);

        session.pause(handle).await?;
        assert_eq!(session.stats(handle).await?.state, "Paused");
        session.pause(handle).await?;
        assert_eq!(control.is_paused(handle), Some(true));

        assert!(control.complete(handle));
        let done = session.stats(handle).await?;
        assert!(done.finished);
        assert_eq!(done.progress_bytes, 40);
        Ok(())
    }

    #[tokio::test]
    async fn rejection_is_one_shot() -> Result<()> {
        let (session, control) = StubSession::new();
        control.reject_next_add("metadata fetch failed");
        let err = session
            .add(&magnet(), Path::new("/work/3"))
            .await
            .expect_err("first add is rejected");
        assert!(err.to_string().contains("metadata fetch failed"));
        session.add(&magnet(), Path::new("/work/3")).await?;
        assert_eq!(control.transfer_count(), 1);
        Ok(())
    }

    #[test]
    fn url_and_file_names() {
        let url = TransferSource::Url {
            url: "https://example.org/a/Show.torrent".into(),
        };
        assert_eq!(display_name_for(&url).as_deref(), Some("Show"));
        let file = TransferSource::TorrentFile {
            path: PathBuf::from("/tmp/Other.torrent"),
        };
        assert_eq!(display_name_for(&file).as_deref(), Some("Other"));
        assert_eq!(info_hash_for(&file).len(), 16);
    }
}
