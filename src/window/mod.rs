//! Per-key sliding windows -- the circular buffer of recent records,
//! the thread-safe write cursor, and the key -> window store.

pub mod cursor;
pub mod store;

use crate::features::FeatureVector;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

pub use cursor::CyclicCursor;
pub use store::WindowStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no window exists for key '{0}'")]
    NotFound(String),
}

/// Identifies one window: stream name and field name, joined with `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowKey(String);

impl WindowKey {
    pub fn new(stream: &str, field: &str) -> Self {
        Self(format!("{stream}#{field}"))
    }

    /// Wrap an already-joined key, e.g. from a reset request.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation for one window key. Immutable once built; the
/// window keeps its own copy after a write.
#[derive(Debug, Clone)]
pub struct Record {
    pub key: WindowKey,
    pub features: FeatureVector,
    pub group_id: Uuid,
    pub observed_at: DateTime<Utc>,
}

impl Record {
    pub fn new(key: WindowKey, features: FeatureVector, group_id: Uuid) -> Self {
        Self {
            key,
            features,
            group_id,
            observed_at: Utc::now(),
        }
    }
}

struct Slots {
    records: Vec<Option<Record>>,
    total_writes: u64,
}

/// Fixed-capacity circular buffer of the most recent records for one
/// key. Writes overwrite the oldest slot round-robin; capacity never
/// changes after construction.
pub struct Window {
    capacity: usize,
    cursor: CyclicCursor,
    slots: Mutex<Slots>,
}

impl Window {
    /// `capacity` must be > 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be positive");
        Self {
            capacity,
            cursor: CyclicCursor::new(capacity),
            slots: Mutex::new(Slots {
                records: (0..capacity).map(|_| None).collect(),
                total_writes: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write a record into the cursor-assigned slot and bump the write
    /// counter. Concurrent writers receive distinct slots from the
    /// cursor, so no two writes clobber the same logical position.
    pub fn write(&self, record: Record) {
        let slot = self.cursor.advance();
        let mut slots = self.slots.lock().expect("window lock poisoned");
        slots.records[slot] = Some(record);
        slots.total_writes += 1;
    }

    /// Number of writes since construction or the last reset.
    pub fn total_writes(&self) -> u64 {
        self.slots.lock().expect("window lock poisoned").total_writes
    }

    /// Slot index the next write will land in.
    pub fn cursor_position(&self) -> usize {
        self.cursor.position()
    }

    /// Copy of every slot's feature vector, taken under the window
    /// lock so a concurrent writer can never be observed mid-slot.
    pub fn snapshot(&self) -> Vec<Option<FeatureVector>> {
        let slots = self.slots.lock().expect("window lock poisoned");
        slots
            .records
            .iter()
            .map(|slot| slot.as_ref().map(|r| r.features))
            .collect()
    }

    /// Restart the cursor and write counter. Slot contents are left in
    /// place: stale records linger until overwritten, masked by the
    /// sufficiency gate until the window fills again.
    pub fn reset(&self) {
        self.cursor.reset();
        self.slots.lock().expect("window lock poisoned").total_writes = 0;
    }
}
