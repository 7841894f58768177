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

//! Job lifecycle notifications.
//!
//! Every published [`Event`] is wrapped in an [`EventEnvelope`] with a
//! sequence number. The most recent envelopes stay in a ring so a late
//! subscriber can catch up from the last id it saw before following the live
//! feed. Slow subscribers skip what they missed; publishing never waits.

mod bus;
mod payloads;

pub use bus::{EventBus, EventStream};
pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, JobId, JobState};
