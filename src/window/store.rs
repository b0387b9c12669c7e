//! Key -> window map with lazy, race-free window creation.

use super::{StoreError, Window, WindowKey};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Summary row for one window, as exposed by the status endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WindowOverview {
    pub key: String,
    pub total_writes: u64,
    pub cursor: usize,
}

/// All live windows, one per distinct [`WindowKey`]. Windows are
/// created lazily on first use and never dropped (no persistence, no
/// eviction).
///
/// The map lock only guards lookups and inserts; each window carries
/// its own lock, so writes to different keys never serialize behind
/// each other.
pub struct WindowStore {
    capacity: usize,
    windows: RwLock<HashMap<WindowKey, Arc<Window>>>,
}

impl WindowStore {
    /// `capacity` applies to every window this store creates.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch the window for `key`, constructing an empty one if the key
    /// has never been seen. The check-then-insert runs under the map's
    /// write lock, so two concurrent first-writers for the same key end
    /// up sharing a single window rather than overwriting each other's.
    pub fn get_or_create(&self, key: &WindowKey) -> Arc<Window> {
        {
            let windows = self.windows.read().expect("store lock poisoned");
            if let Some(window) = windows.get(key) {
                return Arc::clone(window);
            }
        }

        let mut windows = self.windows.write().expect("store lock poisoned");
        let window = windows
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(key = %key, capacity = self.capacity, "creating window");
                Arc::new(Window::new(self.capacity))
            });
        Arc::clone(window)
    }

    pub fn get(&self, key: &WindowKey) -> Option<Arc<Window>> {
        let windows = self.windows.read().expect("store lock poisoned");
        windows.get(key).map(Arc::clone)
    }

    /// Restart the cursor and write counter of `key`'s window; slot
    /// contents stay in place. Fails when the key has no window yet.
    pub fn reset(&self, key: &WindowKey) -> Result<(), StoreError> {
        match self.get(key) {
            Some(window) => {
                window.reset();
                tracing::info!(key = %key, "window reset");
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.windows.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-key snapshot for the status endpoint, sorted by key.
    pub fn overview(&self) -> Vec<WindowOverview> {
        let windows = self.windows.read().expect("store lock poisoned");
        let mut rows: Vec<WindowOverview> = windows
            .iter()
            .map(|(key, window)| WindowOverview {
                key: key.to_string(),
                total_writes: window.total_writes(),
                cursor: window.cursor_position(),
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract_numeric;
    use crate::window::Record;
    use uuid::Uuid;

    #[test]
    fn get_or_create_returns_the_same_window() {
        let store = WindowStore::new(7);
        let key = WindowKey::new("stream", "field");
        let first = store.get_or_create(&key);
        let second = store.get_or_create(&key);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_windows() {
        let store = WindowStore::new(7);
        let a = store.get_or_create(&WindowKey::new("stream", "a"));
        let b = store.get_or_create(&WindowKey::new("stream", "b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn reset_unknown_key_is_not_found() {
        let store = WindowStore::new(7);
        let err = store.reset(&WindowKey::new("stream", "ghost")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn reset_known_key_clears_counters_only() {
        let store = WindowStore::new(3);
        let key = WindowKey::new("stream", "field");
        let window = store.get_or_create(&key);
        for v in [1.0, 2.0, 3.0] {
            window.write(Record::new(key.clone(), extract_numeric(v), Uuid::new_v4()));
        }

        store.reset(&key).unwrap();
        assert_eq!(window.total_writes(), 0);
        assert_eq!(window.cursor_position(), 0);
        assert!(window.snapshot().iter().all(|slot| slot.is_some()));
    }

    #[test]
    fn concurrent_first_writers_share_one_window() {
        let store = Arc::new(WindowStore::new(7));
        let key = WindowKey::new("stream", "contested");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || store.get_or_create(&key))
            })
            .collect();

        let windows: Vec<Arc<Window>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(windows.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(store.len(), 1);
    }
}
