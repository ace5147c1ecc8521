//! Sliding-window duplicate detection for catch-up replay.
//!
//! After a reconnect a consumer replays history while also receiving live
//! events. Anything already seen live would be emitted twice; the window
//! remembers the most recent fingerprints so the consumer can skip them.
//! The window is consumer state and is never consulted by the history store.

use std::collections::VecDeque;

use crate::event::Event;

#[derive(Debug, Clone)]
struct Fingerprint {
    id: i64,
    session_id: i64,
    payload: Vec<u8>,
}

impl Fingerprint {
    fn matches(&self, event: &Event) -> bool {
        self.id == event.id && self.session_id == event.session_id && self.payload == event.payload
    }
}

/// Fixed-capacity FIFO of recently seen event fingerprints.
///
/// Identity is `(id, session_id)` plus byte-equal payloads, which guards
/// against unrelated producers reusing an id within one session.
#[derive(Debug, Clone)]
pub struct DuplicateWindow {
    items: VecDeque<Fingerprint>,
    capacity: usize,
}

impl DuplicateWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Returns `true` if the event was already seen.
    ///
    /// The event is recorded on every call, duplicates included, and the
    /// oldest entry is evicted once the window is over capacity.
    pub fn check(&mut self, event: &Event) -> bool {
        let duplicate = self.items.iter().any(|seen| seen.matches(event));

        self.items.push_back(Fingerprint {
            id: event.id,
            session_id: event.session_id,
            payload: event.payload.clone(),
        });
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }

        duplicate
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DuplicateWindow {
    fn default() -> Self {
        Self::new(crate::defaults::DUPLICATE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: i64, session_id: i64, payload: &str) -> Event {
        Event::new(id, "k", "msg", payload).with_session(session_id)
    }

    #[test]
    fn test_first_sighting_is_not_duplicate() {
        let mut window = DuplicateWindow::new(4);
        assert!(!window.check(&ev(42, 7, "x")));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_second_sighting_is_duplicate() {
        let mut window = DuplicateWindow::new(4);
        assert!(!window.check(&ev(42, 7, "x")));
        assert!(window.check(&ev(42, 7, "x")));
    }

    #[test]
    fn test_identity_requires_payload_equality() {
        let mut window = DuplicateWindow::new(4);
        window.check(&ev(42, 7, "x"));
        assert!(!window.check(&ev(42, 7, "y")));
        assert!(!window.check(&ev(42, 8, "x")));
        assert!(!window.check(&ev(43, 7, "x")));
    }

    #[test]
    fn test_user_id_and_type_not_part_of_identity() {
        let mut window = DuplicateWindow::new(4);
        window.check(&ev(1, 2, "p"));
        let other = Event::new(1, "other", "typing", "p")
            .with_session(2)
            .with_user(99);
        assert!(window.check(&other));
    }

    #[test]
    fn test_duplicates_are_recorded_too() {
        let mut window = DuplicateWindow::new(8);
        window.check(&ev(1, 0, "a"));
        window.check(&ev(1, 0, "a"));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut window = DuplicateWindow::new(2);
        window.check(&ev(1, 0, "a"));
        window.check(&ev(2, 0, "b"));
        window.check(&ev(3, 0, "c"));
        assert_eq!(window.len(), 2);

        // 1 fell out of the window; seeing it again is new (and evicts 2)
        assert!(!window.check(&ev(1, 0, "a")));
        assert!(window.check(&ev(3, 0, "c")));
    }

    #[test]
    fn test_refresh_keeps_duplicate_alive() {
        let mut window = DuplicateWindow::new(2);
        window.check(&ev(1, 0, "a"));
        window.check(&ev(2, 0, "b"));
        // re-seeing 1 pushes a fresh copy, evicting the old copy of 1
        assert!(window.check(&ev(1, 0, "a")));
        // window now holds [2, 1]; adding 3 evicts 2 but 1 survives
        window.check(&ev(3, 0, "c"));
        assert!(window.check(&ev(1, 0, "a")));
    }

    #[test]
    fn test_zero_capacity_never_remembers() {
        let mut window = DuplicateWindow::new(0);
        assert!(!window.check(&ev(1, 0, "a")));
        assert!(!window.check(&ev(1, 0, "a")));
        assert!(window.is_empty());
    }

    #[test]
    fn test_default_capacity() {
        let window = DuplicateWindow::default();
        assert_eq!(window.capacity(), crate::defaults::DUPLICATE_WINDOW);
    }
}
