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

//! Filesystem work for completed downloads: finalizing payloads and
//! reconciling working folders.

pub mod error;
pub mod finalizer;
pub mod orphans;

pub use error::{FsOpsError, FsOpsResult};
pub use finalizer::{FinalizeReport, FsFinalizer, PayloadFinalizer};
pub use orphans::{purge_orphans, remove_working_folder, scan_orphans};
