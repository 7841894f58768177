use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use hanamirip_transfer_core::{EngineAdmission, EngineHandle, EngineSnapshot, TransferSource};
use librqbit::api::{Api, TorrentIdOrHash};
use librqbit::{
    AddTorrent, AddTorrentOptions, PeerConnectionOptions, Session, SessionOptions,
    TorrentStatsState,
};
use tracing::{info, warn};
use url::Url;

use super::TransferSession;
use crate::command::EngineRuntimeConfig;
use crate::convert::eta_from_rate;

pub(super) async fn create_session(
    config: &EngineRuntimeConfig,
) -> Result<Arc<dyn TransferSession>> {
    fs::create_dir_all(&config.base_dir).with_context(|| {
        format!(
            "failed to create engine base dir {}",
            config.base_dir.display()
        )
    })?;

    let mut opts = SessionOptions::default();
    opts.listen_port_range = Some(config.listen_ports.clone());
    opts.enable_upnp_port_forwarding = config.enable_upnp;
    opts.peer_opts = Some(PeerConnectionOptions {
        connect_timeout: Some(config.connect_timeout),
        read_write_timeout: Some(config.read_write_timeout),
        keep_alive_interval: Some(config.keep_alive_interval),
    });
    opts.defer_writes_up_to = Some(config.defer_writes_up_to);
    opts.concurrent_init_limit = Some(config.concurrent_init_limit);
    opts.trackers = tracker_set(&config.trackers);

    let session = Session::new_with_opts(config.base_dir.clone(), opts)
        .await
        .context("failed to initialise librqbit session")?;
    info!(base_dir = %config.base_dir.display(), "librqbit session started");
    Ok(Arc::new(NativeSession {
        api: Api::new(session, None),
    }))
}

fn tracker_set(trackers: &[String]) -> HashSet<Url> {
    trackers
        .iter()
        .filter_map(|tracker| match Url::parse(tracker) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(tracker = %tracker, error = %err, "skipping invalid tracker");
                None
            }
        })
        .collect()
}

struct NativeSession {
    api: Api,
}

impl NativeSession {
    fn id(handle: EngineHandle) -> Result<TorrentIdOrHash> {
        let id = usize::try_from(handle.get())
            .map_err(|_| anyhow!("transfer handle {handle} out of range"))?;
        Ok(TorrentIdOrHash::Id(id))
    }

    fn state(&self, handle: EngineHandle) -> Result<TorrentStatsState> {
        let stats = self
            .api
            .api_stats_v1(Self::id(handle)?)
            .context("failed to read transfer stats")?;
        Ok(stats.state)
    }
}

#[async_trait]
impl TransferSession for NativeSession {
    async fn add(
        &self,
        source: &TransferSource,
        output_folder: &Path,
    ) -> Result<EngineAdmission> {
        let request = match source {
            TransferSource::Magnet { uri } => AddTorrent::from_url(uri.clone()),
            TransferSource::Url { url } => AddTorrent::from_url(url.clone()),
            TransferSource::TorrentFile { path } => {
                let filename = path
                    .to_str()
                    .ok_or_else(|| anyhow!("torrent path is not valid utf-8"))?;
                AddTorrent::from_local_filename(filename)?
            }
        };
        let opts = AddTorrentOptions {
            output_folder: Some(output_folder.to_string_lossy().into_owned()),
            overwrite: true,
            ..Default::default()
        };

        let response = self
            .api
            .api_add_torrent(request, Some(opts))
            .await
            .context("librqbit refused the transfer")?;
        let id = response
            .id
            .or(response.details.id)
            .ok_or_else(|| anyhow!("librqbit did not assign a transfer id"))?;

        Ok(EngineAdmission {
            handle: EngineHandle::new(u64::try_from(id)?),
            info_hash: response.details.info_hash,
            name: response.details.name,
            output_folder: response.output_folder.into(),
        })
    }

    async fn pause(&self, handle: EngineHandle) -> Result<()> {
        if matches!(self.state(handle)?, TorrentStatsState::Paused) {
            return Ok(());
        }
        self.api
            .api_torrent_action_pause(Self::id(handle)?)
            .await
            .context("failed to pause transfer")?;
        Ok(())
    }

    async fn resume(&self, handle: EngineHandle) -> Result<()> {
        if !matches!(self.state(handle)?, TorrentStatsState::Paused) {
            return Ok(());
        }
        self.api
            .api_torrent_action_start(Self::id(handle)?)
            .await
            .context("failed to resume transfer")?;
        Ok(())
    }

    async fn remove(&self, handle: EngineHandle) -> Result<()> {
        self.api
            .api_torrent_action_delete(Self::id(handle)?)
            .await
            .context("failed to delete transfer")?;
        Ok(())
    }

    async fn stats(&self, handle: EngineHandle) -> Result<EngineSnapshot> {
        let stats = self
            .api
            .api_stats_v1(Self::id(handle)?)
            .context("failed to read transfer stats")?;
        let (download_mibps, upload_mibps) = stats
            .live
            .as_ref()
            .map_or((None, None), |live| {
                (Some(live.download_speed.mbps), Some(live.upload_speed.mbps))
            });
        Ok(EngineSnapshot {
            state: format!("{:?}", stats.state),
            progress_bytes: stats.progress_bytes,
            total_bytes: stats.total_bytes,
            uploaded_bytes: stats.uploaded_bytes,
            finished: stats.finished,
            error: stats.error.clone(),
            download_mibps,
            upload_mibps,
            eta: eta_from_rate(stats.progress_bytes, stats.total_bytes, download_mibps),
        })
    }
}
