//! Bounded FIFO of envelopes waiting for the link

use chatlink_shared::Envelope;
use std::collections::VecDeque;
use tracing::warn;

/// Drop-oldest queue: when full, a new envelope displaces the stalest one.
#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<Envelope>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an envelope, returning the evicted head if the queue was full
    pub fn enqueue(&mut self, envelope: Envelope) -> Option<Envelope> {
        if self.capacity == 0 {
            self.dropped += 1;
            return Some(envelope);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            self.dropped += 1;
            warn!(
                "Outbound queue full ({}), dropping oldest '{}' envelope",
                self.capacity,
                old.kind()
            );
        }

        self.entries.push_back(envelope);
        evicted
    }

    /// Take the oldest envelope
    pub fn pop_front(&mut self) -> Option<Envelope> {
        self.entries.pop_front()
    }

    /// Put back an envelope whose send failed so it is retried first.
    ///
    /// If newer envelopes filled the queue meanwhile, the returned envelope
    /// is the one that lost out, which is always the restored one.
    pub fn requeue_front(&mut self, envelope: Envelope) -> Option<Envelope> {
        if self.entries.len() >= self.capacity {
            self.dropped += 1;
            return Some(envelope);
        }
        self.entries.push_front(envelope);
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Envelopes evicted since creation
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.entries.iter()
    }
}
