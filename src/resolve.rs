/// Source resolution: which reading should the dashboard show right now?
///
/// The fallback chain runs as a small state machine:
///
/// ```text
/// LookupStore ──fresh──────────────────────────────▶ FreshStore
///      │ stale                     │ empty
///      ▼                           ▼
/// QueryUpstream(stale) ◀──── QueryUpstream(none)
///      │ newer sample              │ sample           │ nothing / error
///      ▼                           ▼                  ▼
/// PersistUpstream ─────────▶ LiveUpstream     StaleStore or Placeholder
/// ```
///
/// Only the store lookup can fail the whole resolution. Upstream failures
/// and persistence failures of an upstream sample are logged and absorbed.
///
/// The store is held for the lookup and for the append, never while the
/// upstream is being queried. Two concurrent resolutions may therefore both
/// persist the same upstream sample; that duplicate is tolerated.

use std::cell::RefCell;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::ResolverConfig;
use crate::ingest::ttn::UplinkSource;
use crate::logging::{self, DataSource};
use crate::model::{Reading, StoreError, StoredReading};
use crate::quality::freshness::{age_seconds, is_stale_at};
use crate::quality::rating::overall_tier;
use crate::store::{ReadingStore, StoreAccess};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Where the resolved reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Newest stored reading, within the freshness window.
    FreshStore,
    /// Newest stored reading, older than the window, upstream had nothing newer.
    StaleStore,
    /// Fetched from the network server during this resolution.
    LiveUpstream,
    /// Fixed synthetic sample; nothing real is available.
    Placeholder,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::FreshStore => "fresh-store",
            SourceKind::StaleStore => "stale-store",
            SourceKind::LiveUpstream => "live-upstream",
            SourceKind::Placeholder => "placeholder",
        }
    }

    /// Dashboard label for the data source badge.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::FreshStore => "Local database (real-time)",
            SourceKind::StaleStore => "Local database (older data)",
            SourceKind::LiveUpstream => "TTN message storage",
            SourceKind::Placeholder => "Demo data",
        }
    }

    /// True when the reading describes real water, not the placeholder.
    pub fn is_real(self) -> bool {
        self != SourceKind::Placeholder
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCandidate {
    pub source: SourceKind,
    pub reading: Reading,
    /// Store id, when the reading exists in the store.
    pub record_id: Option<i32>,
    /// Human-readable note on how the reading was obtained.
    pub provenance: String,
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverPolicy {
    pub freshness_window: Duration,
    pub refresh_stale_from_upstream: bool,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        ResolverPolicy::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for ResolverPolicy {
    fn from(config: &ResolverConfig) -> Self {
        ResolverPolicy {
            freshness_window: config.freshness_window(),
            refresh_stale_from_upstream: config.refresh_stale_from_upstream,
        }
    }
}

// ---------------------------------------------------------------------------
// Placeholder
// ---------------------------------------------------------------------------

/// The fixed synthetic sample shown when no real data exists. Classifies as
/// `Excellent`.
pub fn placeholder_reading(device_id: &str, now: DateTime<Utc>) -> Reading {
    Reading {
        device_id: device_id.to_string(),
        temperature: 22.5,
        ph: 7.2,
        turbidity: 0.8,
        conductivity: 350.0,
        tds: 280.0,
        label: None,
        recorded_at: now,
        raw_payload: json!({ "source": "placeholder" }),
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

enum Step {
    LookupStore,
    /// `stale` is the stored reading being refreshed, if there is one.
    QueryUpstream { stale: Option<StoredReading> },
    PersistUpstream(Reading),
    Done(SourceCandidate),
}

fn from_store(record: StoredReading, source: SourceKind, now: DateTime<Utc>) -> SourceCandidate {
    let age = age_seconds(record.reading.recorded_at, now);
    let provenance = match source {
        SourceKind::FreshStore => format!("Fresh database data ({}s ago)", age),
        _ => format!("Older database data ({}min ago)", rounded_minutes(age)),
    };
    SourceCandidate {
        source,
        reading: record.reading,
        record_id: Some(record.id),
        provenance,
    }
}

fn rounded_minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0).round() as i64
}

fn placeholder(device_id: &str, now: DateTime<Utc>) -> SourceCandidate {
    SourceCandidate {
        source: SourceKind::Placeholder,
        reading: placeholder_reading(device_id, now),
        record_id: None,
        provenance: "No real data available".to_string(),
    }
}

/// Resolves the reading to display for `device_id` at `now`.
///
/// Returns `Err` only when the initial store lookup fails; that is never
/// papered over with placeholder data.
pub fn resolve<S, U>(
    store: &mut S,
    upstream: &U,
    policy: &ResolverPolicy,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<SourceCandidate, StoreError>
where
    S: ReadingStore + ?Sized,
    U: UplinkSource + ?Sized,
{
    resolve_shared(&RefCell::new(store), upstream, policy, device_id, now)
}

/// `resolve` over a store that other requests may be using at the same time.
pub fn resolve_shared<A, U>(
    store: &A,
    upstream: &U,
    policy: &ResolverPolicy,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<SourceCandidate, StoreError>
where
    A: StoreAccess + ?Sized,
    U: UplinkSource + ?Sized,
{
    let mut step = Step::LookupStore;

    loop {
        step = match step {
            Step::LookupStore => {
                let latest = store.with_store(|s| s.latest(device_id)).map_err(|e| {
                    logging::log_store_failure(device_id, "latest reading lookup", &e);
                    e
                })?;
                match latest {
                    Some(record)
                        if !is_stale_at(record.reading.recorded_at, policy.freshness_window, now) =>
                    {
                        Step::Done(from_store(record, SourceKind::FreshStore, now))
                    }
                    Some(record) if policy.refresh_stale_from_upstream => {
                        Step::QueryUpstream { stale: Some(record) }
                    }
                    Some(record) => Step::Done(from_store(record, SourceKind::StaleStore, now)),
                    None => Step::QueryUpstream { stale: None },
                }
            }

            Step::QueryUpstream { stale } => {
                let fetched = match upstream.fetch_latest_uplink(device_id) {
                    Ok(sample) => sample,
                    Err(e) => {
                        logging::log_upstream_failure(device_id, "latest uplink fetch", &e);
                        None
                    }
                };
                match (fetched, stale) {
                    (Some(sample), Some(record)) if sample.recorded_at > record.reading.recorded_at => {
                        Step::PersistUpstream(sample)
                    }
                    (Some(_), Some(record)) => {
                        logging::debug(
                            DataSource::Resolver,
                            Some(device_id),
                            "upstream has nothing newer than the stored reading",
                        );
                        Step::Done(from_store(record, SourceKind::StaleStore, now))
                    }
                    (None, Some(record)) => Step::Done(from_store(record, SourceKind::StaleStore, now)),
                    (Some(sample), None) => Step::PersistUpstream(sample),
                    (None, None) => {
                        logging::warn(DataSource::Resolver, Some(device_id), "no data available, serving placeholder");
                        Step::Done(placeholder(device_id, now))
                    }
                }
            }

            Step::PersistUpstream(sample) => {
                let record_id = match store.with_store(|s| s.append(&sample, overall_tier(&sample))) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        logging::log_store_failure(device_id, "persist upstream sample", &e);
                        None
                    }
                };
                let provenance = match record_id {
                    Some(_) => "Data from TTN (saved to database)",
                    None => "Data from TTN (not saved)",
                };
                Step::Done(SourceCandidate {
                    source: SourceKind::LiveUpstream,
                    reading: sample,
                    record_id,
                    provenance: provenance.to_string(),
                })
            }

            Step::Done(candidate) => {
                logging::debug(
                    DataSource::Resolver,
                    Some(device_id),
                    &format!("resolved from {}: {}", candidate.source, candidate.provenance),
                );
                return Ok(candidate);
            }
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
