#![forbid(unsafe_code)]

//! Bounded queue of encoded canonical events, drained by the embedding page.

use keybridge_core::{CanonicalEvent, EventSink};
use tracing::warn;

/// Queue limit for host-drained canonical events.
pub const MAX_ENCODED_EVENTS: usize = 4096;

/// Push `item`, evicting the oldest entries once `limit` is reached.
///
/// Returns how many entries were evicted.
pub(crate) fn push_bounded<T>(queue: &mut Vec<T>, item: T, limit: usize) -> usize {
    let mut evicted = 0;
    if limit > 0 && queue.len() >= limit {
        evicted = queue.len() - limit + 1;
        queue.drain(..evicted);
    }
    queue.push(item);
    evicted
}

/// Event sink that stores each canonical event as its JSON encoding.
///
/// When the page stops draining, the oldest events are dropped first and
/// counted in [`dropped`](Self::dropped).
#[derive(Debug, Clone)]
pub struct EncodedEventQueue {
    items: Vec<String>,
    limit: usize,
    dropped: u64,
}

impl Default for EncodedEventQueue {
    fn default() -> Self {
        Self::with_limit(MAX_ENCODED_EVENTS)
    }
}

impl EncodedEventQueue {
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit: limit.max(1),
            dropped: 0,
        }
    }

    pub fn encode(event: &CanonicalEvent) -> Result<String, serde_json::Error> {
        event.to_json_string()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total events evicted because the queue was full.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for EncodedEventQueue {
    fn accept(&mut self, event: CanonicalEvent) {
        match Self::encode(&event) {
            Ok(line) => {
                let evicted = push_bounded(&mut self.items, line, self.limit);
                if evicted > 0 {
                    self.dropped += evicted as u64;
                    warn!(dropped_total = self.dropped, "event queue full, oldest evicted");
                }
            }
            Err(err) => warn!(error = %err, "failed to encode canonical event"),
        }
    }
}
