//! Default values for configuration fields.
//!
//! # Design
//! - Keep every default in one place so the loader, docs, and tests agree.
//! - Engine defaults mirror the session tuning the desktop backend shipped with.

use std::path::PathBuf;

/// Folder name under the platform data directory.
pub(crate) const APP_DIR_NAME: &str = "hanamirip-cn";
/// Subfolder holding per-job working folders.
pub(crate) const DOWNLOADS_DIR_NAME: &str = "downloads";
/// How often the UI polls job status, in milliseconds.
pub(crate) const POLL_INTERVAL_MS: u64 = 1_500;
/// Default log level.
pub(crate) const LOG_LEVEL: &str = "info";
/// First port of the listen range.
pub(crate) const LISTEN_PORT_START: u16 = 40_000;
/// One past the last port of the listen range.
pub(crate) const LISTEN_PORT_END: u16 = 50_000;
/// Peer connect timeout.
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 5;
/// Peer read/write timeout.
pub(crate) const READ_WRITE_TIMEOUT_SECS: u64 = 15;
/// Peer keep-alive interval.
pub(crate) const KEEP_ALIVE_SECS: u64 = 60;
/// Pieces buffered before writes are flushed.
pub(crate) const DEFER_WRITES_UP_TO: usize = 128;
/// Transfers initialised in parallel.
pub(crate) const CONCURRENT_INIT_LIMIT: usize = 8;

/// Trackers appended to every transfer.
pub(crate) const TRACKERS: [&str; 6] = [
    "udp://tracker.openbittorrent.com:80/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://tracker.internetwarriors.net:1337/announce",
    "udp://tracker.coppersurfer.tk:6969/announce",
    "udp://tracker.cyberia.is:6969/announce",
    "https://tracker2.ctix.cn/announce",
];

/// `<data_dir>/hanamirip-cn/downloads`, or the temp dir when no data dir exists.
pub(crate) fn work_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(DOWNLOADS_DIR_NAME)
}
