//! Thread-safe cycling write cursor.

use std::sync::Mutex;

/// Hands out slot indices 0, 1, ..., capacity-1, 0, 1, ... to callers.
///
/// The whole read-modify-write in [`advance`](CyclicCursor::advance) is
/// under one mutex: two concurrent callers can never be assigned the
/// same slot for the same logical position, which is what keeps
/// concurrent window writes from silently clobbering each other.
pub struct CyclicCursor {
    capacity: usize,
    next: Mutex<usize>,
}

impl CyclicCursor {
    /// `capacity` must be > 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cursor capacity must be positive");
        Self {
            capacity,
            next: Mutex::new(0),
        }
    }

    /// Claim the next slot. The first call returns 0; each call
    /// increments by one and wraps back to 0 at capacity.
    pub fn advance(&self) -> usize {
        let mut next = self.next.lock().expect("cursor lock poisoned");
        let index = *next;
        *next = (index + 1) % self.capacity;
        index
    }

    /// Index the next call to [`advance`](CyclicCursor::advance) will
    /// return. Always in `[0, capacity)`.
    pub fn position(&self) -> usize {
        *self.next.lock().expect("cursor lock poisoned")
    }

    /// Back to the pre-first-call state: the next `advance()` returns 0.
    pub fn reset(&self) {
        *self.next.lock().expect("cursor lock poisoned") = 0;
    }
}
