//! Helpers turning raw session figures into snapshot fields.

use std::time::Duration;

const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Remaining time at the current download rate; `None` while idle or unknown.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn eta_from_rate(
    progress: u64,
    total: u64,
    download_mibps: Option<f64>,
) -> Option<Duration> {
    let rate = download_mibps.filter(|rate| rate.is_finite() && *rate > 0.0)?;
    if total == 0 || progress >= total {
        return None;
    }
    let remaining = (total - progress) as f64;
    let secs = (remaining / (rate * BYTES_PER_MIB)).ceil();
    Some(Duration::from_secs(secs as u64))
}
