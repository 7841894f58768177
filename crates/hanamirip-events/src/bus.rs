use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Sequence counter and replay ring, updated together so ring order matches id order.
struct Ledger {
    next_id: EventId,
    recent: VecDeque<EventEnvelope>,
    capacity: usize,
}

impl Ledger {
    fn record(&mut self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: self.next_id,
            timestamp: Utc::now(),
            event,
        };
        self.next_id += 1;
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(envelope.clone());
        envelope
    }
}

/// Cloneable handle to a shared event feed.
#[derive(Clone)]
pub struct EventBus {
    live: broadcast::Sender<EventEnvelope>,
    ledger: Arc<Mutex<Ledger>>,
}

impl EventBus {
    /// Bus whose live channel and replay ring both hold `capacity` envelopes (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(capacity);
        Self {
            live,
            ledger: Arc::new(Mutex::new(Ledger {
                next_id: 1,
                recent: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Bus sized with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Record `event` and fan it out to live subscribers.
    pub fn publish(&self, event: Event) -> EventId {
        let mut ledger = self.ledger();
        let envelope = ledger.record(event);
        let id = envelope.id;
        // Sent under the ledger lock so live order matches id order.
        let _ = self.live.send(envelope);
        id
    }

    /// Follow the feed. With `since`, retained envelopes newer than that id come first.
    #[must_use]
    pub fn subscribe(&self, since: Option<EventId>) -> EventStream {
        let ledger = self.ledger();
        let receiver = self.live.subscribe();
        let backlog: VecDeque<_> = since.map_or_else(VecDeque::new, |since| {
            ledger
                .recent
                .iter()
                .filter(|envelope| envelope.id > since)
                .cloned()
                .collect()
        });
        EventStream { backlog, receiver }
    }

    /// Id of the newest retained envelope.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.ledger().recent.back().map(|envelope| envelope.id)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Replayed envelopes followed by live ones.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventStream {
    /// Next envelope, or `None` once every bus handle is dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{JobId, JobState};
    use tokio::time::{Duration, timeout};

    const WAIT: Duration = Duration::from_secs(1);

    fn progress(job: u64, bytes: u64) -> Event {
        Event::Progress {
            job_id: JobId::new(job),
            bytes_downloaded: bytes,
            bytes_total: 1_000,
        }
    }

    async fn ids(stream: &mut EventStream, count: usize) -> Vec<EventId> {
        let mut seen = Vec::with_capacity(count);
        for _ in 0..count {
            let envelope = timeout(WAIT, stream.next())
                .await
                .expect("event arrives")
                .expect("bus still open");
            seen.push(envelope.id);
        }
        seen
    }

    #[tokio::test]
    async fn catch_up_starts_after_the_given_id() {
        let bus = EventBus::with_capacity(8);
        for bytes in [10, 20, 30, 40] {
            bus.publish(progress(1, bytes));
        }
        assert_eq!(bus.last_event_id(), Some(4));

        let mut stream = bus.subscribe(Some(1));
        assert_eq!(ids(&mut stream, 3).await, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn ring_forgets_the_oldest() {
        let bus = EventBus::with_capacity(3);
        for bytes in 0..5 {
            bus.publish(progress(2, bytes));
        }
        let mut stream = bus.subscribe(Some(0));
        assert_eq!(ids(&mut stream, 3).await, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn replay_does_not_repeat_on_the_live_feed() {
        let bus = EventBus::with_capacity(8);
        bus.publish(Event::JobAdded {
            job_id: JobId::new(5),
            info_hash: "abc".into(),
        });
        let mut stream = bus.subscribe(Some(0));
        bus.publish(Event::StateChanged {
            job_id: JobId::new(5),
            state: JobState::Downloading,
        });
        bus.publish(Event::JobRemoved {
            job_id: JobId::new(5),
        });
        assert_eq!(ids(&mut stream, 3).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn without_since_only_live_events_arrive() {
        let bus = EventBus::new();
        bus.publish(progress(3, 1));
        let mut stream = bus.subscribe(None);
        let id = bus.publish(progress(3, 2));
        assert_eq!(ids(&mut stream, 1).await, vec![id]);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = EventBus::with_capacity(4);
        let mut stream = bus.subscribe(None);
        for bytes in 0..10 {
            bus.publish(progress(4, bytes));
        }
        let first = ids(&mut stream, 1).await[0];
        assert!(first > 1, "dropped envelopes are skipped");
    }

    #[tokio::test]
    async fn closed_bus_ends_the_stream() {
        let bus = EventBus::with_capacity(2);
        let mut stream = bus.subscribe(None);
        drop(bus);
        assert!(stream.next().await.is_none());
    }
}
