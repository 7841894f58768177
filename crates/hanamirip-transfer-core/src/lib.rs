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

//! Engine-agnostic transfer interfaces, job model, and status translation.

pub mod error;
pub mod model;
pub mod service;
pub mod translate;

pub use error::{EngineError, EngineResult};
pub use hanamirip_events::{JobId, JobState};
pub use model::{
    EngineAdmission, EngineHandle, EngineSnapshot, Job, JobSnapshot, Observation, TransferSource,
};
pub use service::TransferEngine;
pub use translate::translate;
