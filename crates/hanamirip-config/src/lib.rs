#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! File and environment backed configuration for the download orchestrator.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values),
//! `loader.rs` (TOML + environment layering), `validate.rs` (checks).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_POLL_INTERVAL_MS, ENV_PURGE_ORPHANS, ENV_WORK_ROOT, load,
    load_with_env, parse_toml,
};
pub use model::{AppConfig, EngineSettings, LoggingSettings};
pub use validate::validate;
