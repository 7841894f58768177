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

//! Download job orchestration for the desktop backend.
//!
//! Layout: `registry.rs` (job table and per-job locks), `orchestrator.rs`
//! (job lifecycle), `commands.rs` (UI-facing DTOs), `bootstrap.rs` (start-up).

/// Process start-up wiring.
pub mod bootstrap;
/// UI command surface.
pub mod commands;
/// Settings to engine tuning mapping.
pub mod engine_config;
/// Orchestrator and start-up errors.
pub mod error;
/// Job lifecycle coordination.
pub mod orchestrator;
/// In-memory job table.
pub mod registry;

pub use bootstrap::{App, AppOrchestrator};
pub use commands::{CommandError, CommandResult, TorrentStartResponse, TorrentStatusResponse};
pub use error::{AppError, AppResult, JobError, JobResult};
pub use orchestrator::DownloadOrchestrator;
pub use registry::JobRegistry;
