//! Latest-request-wins guard for asynchronous loads.
//!
//! Each request takes a [`Ticket`] from a shared [`RequestSequencer`]. When
//! the response arrives it is offered to a [`Latest`] slot, which accepts it
//! only if no newer request has been issued since. A slow early response can
//! therefore never overwrite the result of a faster later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Monotonic request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues tickets. Cheap to clone; clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: Arc<AtomicU64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Supersedes every ticket issued before it.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `ticket` belongs to the most recently issued request.
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// The most recently issued ticket number (0 before the first request).
    pub fn current(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

/// Holds the value produced by the latest request.
#[derive(Debug)]
pub struct Latest<T> {
    sequencer: RequestSequencer,
    slot: Mutex<Option<(Ticket, T)>>,
}

impl<T: Clone> Latest<T> {
    pub fn new(sequencer: RequestSequencer) -> Self {
        Self {
            sequencer,
            slot: Mutex::new(None),
        }
    }

    /// Store `value` if `ticket` is still the latest request.
    ///
    /// Returns `false` and drops the value when a newer request has been
    /// issued or a newer value is already held.
    pub fn offer(&self, ticket: Ticket, value: T) -> bool {
        if !self.sequencer.is_latest(ticket) {
            log::debug!(
                "Discarding stale response #{} (latest #{})",
                ticket.0,
                self.sequencer.current()
            );
            return false;
        }

        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(&*slot, Some((held, _)) if *held > ticket) {
            return false;
        }
        *slot = Some((ticket, value));
        true
    }

    /// Current value, if any request has completed.
    pub fn get(&self) -> Option<T> {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().map(|(_, value)| value.clone())
    }

    /// Ticket of the held value.
    pub fn ticket(&self) -> Option<Ticket> {
        let slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().map(|(ticket, _)| *ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_increase() {
        let seq = RequestSequencer::new();
        assert_eq!(seq.current(), 0);
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert!(!seq.is_latest(a));
        assert!(seq.is_latest(b));
    }

    #[test]
    fn test_clones_share_counter() {
        let seq = RequestSequencer::new();
        let other = seq.clone();
        seq.issue();
        let t = other.issue();
        assert_eq!(t.value(), 2);
        assert!(seq.is_latest(t));
    }

    #[test]
    fn test_stale_response_rejected() {
        let seq = RequestSequencer::new();
        let results = Latest::new(seq.clone());

        let slow = seq.issue();
        let fast = seq.issue();

        assert!(results.offer(fast, "fast"));
        assert!(!results.offer(slow, "slow"));
        assert_eq!(results.get(), Some("fast"));
        assert_eq!(results.ticket(), Some(fast));
    }

    #[test]
    fn test_superseded_before_response() {
        let seq = RequestSequencer::new();
        let results: Latest<u32> = Latest::new(seq.clone());

        let first = seq.issue();
        let _second = seq.issue();
        assert!(!results.offer(first, 1));
        assert_eq!(results.get(), None);
    }

    #[test]
    fn test_concurrent_offers_keep_latest() {
        let seq = RequestSequencer::new();
        let results = Arc::new(Latest::new(seq.clone()));
        let tickets: Vec<_> = (0..8).map(|_| seq.issue()).collect();
        let last = *tickets.last().unwrap();

        let handles: Vec<_> = tickets
            .into_iter()
            .map(|t| {
                let results = results.clone();
                std::thread::spawn(move || results.offer(t, t.value()))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(results.get(), Some(last.value()));
    }
}
