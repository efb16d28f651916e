/// Resolver scenarios with a scripted upstream that returns a sequence of
/// answers, one per call, so multi-request behaviour can be checked.
///
/// Run with: cargo test --test resolver_integration

use std::cell::RefCell;
use std::collections::VecDeque;

use aquamon_service::ingest::UplinkSource;
use aquamon_service::model::{Reading, StoreError, Tier, UpstreamError};
use aquamon_service::resolve::{resolve, ResolverPolicy, SourceKind};
use aquamon_service::store::{MemoryStore, ReadingStore};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
}

fn reading_at(recorded_at: DateTime<Utc>, ph: f64) -> Reading {
    Reading {
        device_id: "water-monitor".to_string(),
        temperature: 18.0,
        ph,
        turbidity: 0.6,
        conductivity: 310.0,
        tds: 240.0,
        label: None,
        recorded_at,
        raw_payload: json!({ "source": "ttn_storage" }),
    }
}

/// Replays answers in order; once exhausted, reports a timeout.
struct ScriptedUpstream {
    answers: RefCell<VecDeque<Result<Option<Reading>, UpstreamError>>>,
    calls: RefCell<usize>,
}

impl ScriptedUpstream {
    fn new(answers: Vec<Result<Option<Reading>, UpstreamError>>) -> Self {
        Self { answers: RefCell::new(answers.into()), calls: RefCell::new(0) }
    }

    fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl UplinkSource for ScriptedUpstream {
    fn fetch_latest_uplink(&self, _device_id: &str) -> Result<Option<Reading>, UpstreamError> {
        *self.calls.borrow_mut() += 1;
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(UpstreamError::Timeout(5)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_live_upstream_sample_is_fresh_on_the_next_request() {
    let mut store = MemoryStore::new();
    store.append(&reading_at(fixed_now() - Duration::hours(2), 7.0), Tier::Excellent).unwrap();
    let upstream = ScriptedUpstream::new(vec![Ok(Some(reading_at(fixed_now() - Duration::minutes(1), 7.3)))]);
    let policy = ResolverPolicy::default();

    let first = resolve(&mut store, &upstream, &policy, "water-monitor", fixed_now()).unwrap();
    assert_eq!(first.source, SourceKind::LiveUpstream);

    let second = resolve(&mut store, &upstream, &policy, "water-monitor", fixed_now()).unwrap();
    assert_eq!(second.source, SourceKind::FreshStore);
    assert_eq!(second.record_id, first.record_id);
    assert_eq!(second.reading.ph, 7.3);
    assert_eq!(upstream.calls(), 1, "second request never reaches upstream");
}

#[test]
fn test_persisted_upstream_sample_carries_its_computed_status() {
    let mut store = MemoryStore::new();
    let unsafe_sample = Reading { ph: 4.5, tds: 700.0, ..reading_at(fixed_now(), 0.0) };
    let upstream = ScriptedUpstream::new(vec![Ok(Some(unsafe_sample))]);

    let c = resolve(&mut store, &upstream, &ResolverPolicy::default(), "water-monitor", fixed_now()).unwrap();

    let stored = store.latest("water-monitor").unwrap().unwrap();
    assert_eq!(Some(stored.id), c.record_id);
    assert_eq!(stored.status, Tier::Unsafe);
}

#[test]
fn test_window_is_configurable() {
    let mut store = MemoryStore::new();
    store.append(&reading_at(fixed_now() - Duration::minutes(25), 7.0), Tier::Excellent).unwrap();
    let upstream = ScriptedUpstream::new(vec![]);
    let policy = ResolverPolicy { freshness_window: Duration::minutes(30), refresh_stale_from_upstream: true };

    let c = resolve(&mut store, &upstream, &policy, "water-monitor", fixed_now()).unwrap();

    assert_eq!(c.source, SourceKind::FreshStore);
    assert_eq!(upstream.calls(), 0);
}

#[test]
fn test_repeated_upstream_failures_keep_serving_stale_reading() {
    let mut store = MemoryStore::new();
    let stale = reading_at(fixed_now() - Duration::hours(5), 6.9);
    let id = store.append(&stale, Tier::Excellent).unwrap();
    let upstream = ScriptedUpstream::new(vec![
        Err(UpstreamError::HttpError(503)),
        Err(UpstreamError::Transport("dns failure".into())),
        Ok(None),
    ]);

    for _ in 0..3 {
        let c = resolve(&mut store, &upstream, &ResolverPolicy::default(), "water-monitor", fixed_now()).unwrap();
        assert_eq!(c.source, SourceKind::StaleStore);
        assert_eq!(c.record_id, Some(id));
        assert_eq!(c.reading, stale);
    }
    assert_eq!(store.len(), 1);
    assert_eq!(upstream.calls(), 3);
}

#[test]
fn test_store_failure_while_persisting_still_returns_live_sample() {
    /// Store whose reads work but whose writes fail.
    struct ReadOnly(MemoryStore);

    impl ReadingStore for ReadOnly {
        fn append(&mut self, _reading: &Reading, _status: Tier) -> Result<i32, StoreError> {
            Err(StoreError::Query("permission denied for table".into()))
        }
        fn latest(&mut self, device_id: &str) -> Result<Option<aquamon_service::model::StoredReading>, StoreError> {
            self.0.latest(device_id)
        }
        fn latest_n(&mut self, device_id: &str, n: usize) -> Result<Vec<aquamon_service::model::StoredReading>, StoreError> {
            self.0.latest_n(device_id, n)
        }
        fn update_label(&mut self, id: i32, label: &str) -> Result<aquamon_service::model::StoredReading, StoreError> {
            self.0.update_label(id, label)
        }
        fn ping(&mut self) -> Result<(), StoreError> {
            self.0.ping()
        }
    }

    let mut store = ReadOnly(MemoryStore::new());
    let upstream = ScriptedUpstream::new(vec![Ok(Some(reading_at(fixed_now(), 7.1)))]);

    let c = resolve(&mut store, &upstream, &ResolverPolicy::default(), "water-monitor", fixed_now()).unwrap();

    assert_eq!(c.source, SourceKind::LiveUpstream);
    assert_eq!(c.record_id, None);
    assert_eq!(c.reading.ph, 7.1);
}

#[test]
fn test_placeholder_when_nothing_anywhere() {
    let mut store = MemoryStore::new();
    let upstream = ScriptedUpstream::new(vec![Ok(None)]);

    let c = resolve(&mut store, &upstream, &ResolverPolicy::default(), "water-monitor", fixed_now()).unwrap();

    assert_eq!(c.source, SourceKind::Placeholder);
    assert_eq!(c.reading.temperature, 22.5);
    assert_eq!(c.reading.recorded_at, fixed_now());
    assert!(store.is_empty(), "placeholder is never persisted");
}
