/// Record store gateway.
///
/// The store is an external collaborator: the service appends readings,
/// fetches the newest by `recorded_at`, fetches the newest N, and rewrites a
/// label in place. One store value is built at startup and handed to every
/// component that needs it; nothing here is global.
///
/// Implementations:
/// - `pg`: `PgReadingStore`, the production store.
/// - `memory`: `MemoryStore`, used by `--dev` runs and tests.
///
/// `StoreAccess` hands out the store one call at a time, so a caller that
/// shares it (the HTTP server) never holds it across slow work.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::{PgReadingStore, TlsMode};

use std::cell::RefCell;
use std::sync::Mutex;

use crate::model::{Reading, StoredReading, StoreError, Tier};

pub trait ReadingStore {
    /// Persists a reading with its ingestion-time overall status and
    /// returns the new record id.
    fn append(&mut self, reading: &Reading, status: Tier) -> Result<i32, StoreError>;

    /// Newest reading for the device by `recorded_at`, not by insertion order.
    fn latest(&mut self, device_id: &str) -> Result<Option<StoredReading>, StoreError>;

    /// Up to `n` readings for the device, newest `recorded_at` first.
    fn latest_n(&mut self, device_id: &str, n: usize) -> Result<Vec<StoredReading>, StoreError>;

    /// Replaces the label of one record and returns the updated record.
    fn update_label(&mut self, id: i32, label: &str) -> Result<StoredReading, StoreError>;

    /// Cheap reachability check.
    fn ping(&mut self) -> Result<(), StoreError>;
}

impl<S: ReadingStore + ?Sized> ReadingStore for Box<S> {
    fn append(&mut self, reading: &Reading, status: Tier) -> Result<i32, StoreError> {
        (**self).append(reading, status)
    }

    fn latest(&mut self, device_id: &str) -> Result<Option<StoredReading>, StoreError> {
        (**self).latest(device_id)
    }

    fn latest_n(&mut self, device_id: &str, n: usize) -> Result<Vec<StoredReading>, StoreError> {
        (**self).latest_n(device_id, n)
    }

    fn update_label(&mut self, id: i32, label: &str) -> Result<StoredReading, StoreError> {
        (**self).update_label(id, label)
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        (**self).ping()
    }
}

// ---------------------------------------------------------------------------
// Scoped access
// ---------------------------------------------------------------------------

/// Lends out a store for the duration of one closure.
pub trait StoreAccess {
    type Store: ReadingStore + ?Sized;

    fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Self::Store) -> Result<T, StoreError>;
}

/// Shared store. The lock is held only while `f` runs; a poisoned lock is
/// reported as an unavailable store.
impl<S: ReadingStore + ?Sized> StoreAccess for Mutex<S> {
    type Store = S;

    fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut S) -> Result<T, StoreError>,
    {
        let mut guard = self
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        f(&mut *guard)
    }
}

/// Exclusively borrowed store, for single-threaded callers.
impl<S: ReadingStore + ?Sized> StoreAccess for RefCell<&mut S> {
    type Store = S;

    fn with_store<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut S) -> Result<T, StoreError>,
    {
        let mut store = self
            .try_borrow_mut()
            .map_err(|_| StoreError::Unavailable("store already borrowed".to_string()))?;
        f(&mut **store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading() -> Reading {
        Reading {
            device_id: "kitchen-tap".to_string(),
            temperature: 20.0,
            ph: 7.0,
            turbidity: 0.5,
            conductivity: 300.0,
            tds: 200.0,
            label: None,
            recorded_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            raw_payload: serde_json::json!({}),
        }
    }

    #[test]
    fn test_mutex_access_releases_lock_between_calls() {
        let shared = Mutex::new(MemoryStore::new());
        shared.with_store(|s| s.append(&reading(), Tier::Excellent)).unwrap();

        assert!(shared.try_lock().is_ok(), "lock is free after the call");
        let latest = shared.with_store(|s| s.latest("kitchen-tap")).unwrap();
        assert_eq!(latest.map(|r| r.reading.ph), Some(7.0));
    }

    #[test]
    fn test_poisoned_lock_is_unavailable() {
        let shared = std::sync::Arc::new(Mutex::new(MemoryStore::new()));
        let clone = std::sync::Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let result = shared.with_store(|s| s.ping());
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_refcell_access_forwards_errors() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let access = RefCell::new(&mut store);

        assert!(matches!(access.with_store(|s| s.ping()), Err(StoreError::Unavailable(_))));
    }
}
