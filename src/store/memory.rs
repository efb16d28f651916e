/// In-memory record store for development runs and tests.
///
/// When no database is available, `--dev` runs the whole service against
/// this store, seeded with a short labelled history so the dashboard has
/// something to show. Tests use it directly and flip it unavailable to
/// exercise the hard-fault paths.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::model::{Reading, StoredReading, StoreError, Tier};
use crate::quality::rating::overall_tier;
use crate::store::ReadingStore;

/// Sample water sources used to seed a demo history:
/// (label, ph, tds, turbidity).
const DEMO_SOURCES: &[(&str, f64, f64, f64)] = &[
    ("Brita Filtered Water", 7.2, 200.0, 0.5),
    ("Tap Water", 7.1, 250.0, 1.0),
    ("Bottled Water (Evian)", 7.2, 300.0, 0.3),
    ("Well Water", 7.0, 325.0, 1.6),
    ("Spring Water", 7.4, 180.0, 0.6),
    ("RO Filtered Water", 6.8, 40.0, 0.2),
    ("Distilled Water", 6.7, 12.0, 0.2),
    ("Lake Water", 7.9, 240.0, 2.4),
    ("Rainwater", 6.2, 30.0, 0.9),
    ("Bottled Water (Aquafina)", 6.9, 90.0, 0.3),
];

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<StoredReading>,
    next_id: i32,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            unavailable: false,
        }
    }

    /// Store pre-filled with `count` labelled readings for `device_id`, one
    /// every two hours going back from `now`.
    pub fn with_demo_history(device_id: &str, count: usize, now: DateTime<Utc>) -> Self {
        let mut store = Self::new();
        for i in (0..count).rev() {
            let (label, ph, tds, turbidity) = DEMO_SOURCES[i % DEMO_SOURCES.len()];
            let reading = Reading {
                device_id: device_id.to_string(),
                temperature: 20.0 + (i % 5) as f64,
                ph,
                turbidity,
                conductivity: (tds * 1.2_f64).round(),
                tds,
                label: Some(label.to_string()),
                recorded_at: now - Duration::hours(2 * i as i64),
                raw_payload: json!({ "source": "demo" }),
            };
            let status = overall_tier(&reading);
            // Infallible while available.
            let _ = store.append(&reading, status);
        }
        store
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[StoredReading] {
        &self.records
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn newest_first(&self, device_id: &str) -> Vec<&StoredReading> {
        let mut rows: Vec<&StoredReading> = self
            .records
            .iter()
            .filter(|r| r.reading.device_id == device_id)
            .collect();
        rows.sort_by(|a, b| {
            b.reading
                .recorded_at
                .cmp(&a.reading.recorded_at)
                .then(b.id.cmp(&a.id))
        });
        rows
    }
}

impl ReadingStore for MemoryStore {
    fn append(&mut self, reading: &Reading, status: Tier) -> Result<i32, StoreError> {
        self.check()?;
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.records.push(StoredReading {
            id,
            status,
            created_at: Utc::now(),
            reading: reading.clone(),
        });
        Ok(id)
    }

    fn latest(&mut self, device_id: &str) -> Result<Option<StoredReading>, StoreError> {
        self.check()?;
        Ok(self.newest_first(device_id).first().map(|r| (*r).clone()))
    }

    fn latest_n(&mut self, device_id: &str, n: usize) -> Result<Vec<StoredReading>, StoreError> {
        self.check()?;
        Ok(self
            .newest_first(device_id)
            .into_iter()
            .take(n)
            .cloned()
            .collect())
    }

    fn update_label(&mut self, id: i32, label: &str) -> Result<StoredReading, StoreError> {
        self.check()?;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RecordNotFound(id))?;
        record.reading.label = Some(label.to_string());
        Ok(record.clone())
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn reading_at(device: &str, minutes_ago: i64) -> Reading {
        Reading {
            device_id: device.to_string(),
            temperature: 21.0,
            ph: 7.2,
            turbidity: 0.8,
            conductivity: 350.0,
            tds: 280.0,
            label: None,
            recorded_at: fixed_now() - Duration::minutes(minutes_ago),
            raw_payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_latest_orders_by_recorded_at_not_insertion() {
        let mut store = MemoryStore::new();
        store.append(&reading_at("dev-a", 5), Tier::Excellent).unwrap();
        let late_arrival = store.append(&reading_at("dev-a", 60), Tier::Excellent).unwrap();

        let latest = store.latest("dev-a").unwrap().expect("has data");
        assert_ne!(latest.id, late_arrival, "backfilled reading must not win");
        assert_eq!(latest.reading.recorded_at, fixed_now() - Duration::minutes(5));
    }

    #[test]
    fn test_latest_n_is_newest_first_and_per_device() {
        let mut store = MemoryStore::new();
        for m in [30, 10, 20] {
            store.append(&reading_at("dev-a", m), Tier::Excellent).unwrap();
        }
        store.append(&reading_at("dev-b", 1), Tier::Excellent).unwrap();

        let rows = store.latest_n("dev-a", 2).unwrap();
        let ages: Vec<i64> = rows
            .iter()
            .map(|r| (fixed_now() - r.reading.recorded_at).num_minutes())
            .collect();
        assert_eq!(ages, vec![10, 20]);
    }

    #[test]
    fn test_update_label_touches_only_the_label() {
        let mut store = MemoryStore::new();
        let id = store.append(&reading_at("dev-a", 5), Tier::Excellent).unwrap();
        let before = store.latest("dev-a").unwrap().unwrap();

        let after = store.update_label(id, "Tap Water").unwrap();
        assert_eq!(after.reading.label.as_deref(), Some("Tap Water"));
        assert_eq!(after.reading.ph, before.reading.ph);
        assert_eq!(after.reading.recorded_at, before.reading.recorded_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_label_unknown_id() {
        let mut store = MemoryStore::new();
        assert_eq!(store.update_label(42, "x"), Err(StoreError::RecordNotFound(42)));
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.latest("dev-a"), Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.append(&reading_at("dev-a", 1), Tier::Excellent),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_demo_history_is_labelled_and_newest_first() {
        let mut store = MemoryStore::with_demo_history("water-monitor", 20, fixed_now());
        assert_eq!(store.len(), 20);

        let rows = store.latest_n("water-monitor", 20).unwrap();
        assert_eq!(rows[0].reading.recorded_at, fixed_now());
        assert_eq!(rows[0].reading.label.as_deref(), Some("Brita Filtered Water"));
        assert!(rows.windows(2).all(|w| w[0].reading.recorded_at > w[1].reading.recorded_at));
        assert!(rows.iter().all(|r| r.status == overall_tier(&r.reading)));
    }
}
