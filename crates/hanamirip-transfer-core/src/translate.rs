//! Maps engine-native snapshots onto the job lifecycle vocabulary.
//!
//! Every heuristic about engine state labels lives here so that a change in the
//! engine's wording touches one function.

use hanamirip_events::JobState;

use crate::model::EngineSnapshot;

const PAUSED_MARKERS: [&str; 2] = ["paus", "stop"];

/// Translate a snapshot into a [`JobState`]; the first matching rule wins.
///
/// 1. a non-empty error means `Failed`;
/// 2. a finished transfer is `Completed`;
/// 3. a state label mentioning pause or stop is `Paused`;
/// 4. anything else is `Downloading`.
#[must_use]
pub fn translate(snapshot: &EngineSnapshot) -> JobState {
    if snapshot
        .error
        .as_deref()
        .is_some_and(|error| !error.trim().is_empty())
    {
        return JobState::Failed;
    }
    if snapshot.finished {
        return JobState::Completed;
    }
    let label = snapshot.state.to_ascii_lowercase();
    if PAUSED_MARKERS.iter().any(|marker| label.contains(marker)) {
        return JobState::Paused;
    }
    JobState::Downloading
}
