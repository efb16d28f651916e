/// Display views: the current reading panel and the recent history list.
///
/// Tiers are recomputed from the numeric fields on every call; the status
/// snapshot stored at ingestion is never shown.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::ttn::UplinkSource;
use crate::model::{Parameter, Reading, StoreError, StoredReading, Tier};
use crate::quality::freshness::{age_seconds, format_data_age, Freshness};
use crate::quality::rating::{Classification, ParameterTiers};
use crate::quality::reference;
use crate::resolve::{resolve_shared, ResolverPolicy, SourceKind};
use crate::store::{ReadingStore, StoreAccess};

/// One parameter card on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterCard {
    pub parameter: Parameter,
    pub value: f64,
    pub unit: &'static str,
    pub tier: Tier,
    pub rationale: &'static str,
    pub reference_ranges: &'static str,
    pub tooltip: &'static str,
}

impl ParameterCard {
    fn build(reading: &Reading, tiers: &ParameterTiers, parameter: Parameter) -> Self {
        let value = reading.value(parameter);
        let tier = tiers.get(parameter);
        ParameterCard {
            parameter,
            value,
            unit: parameter.unit(),
            tier,
            rationale: reference::rationale(parameter, tier, value),
            reference_ranges: reference::reference_ranges(parameter),
            tooltip: reference::tooltip(parameter),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentView {
    pub reading: Reading,
    pub record_id: Option<i32>,
    pub overall_tier: Tier,
    pub score: u8,
    pub parameter_tiers: ParameterTiers,
    pub status_text: &'static str,
    pub status_color: &'static str,
    pub description: &'static str,
    /// Cards in display order.
    pub parameters: Vec<ParameterCard>,
    pub source: SourceKind,
    pub source_label: &'static str,
    pub provenance: String,
    /// `None` for the placeholder, which has no real measurement time.
    pub data_age_seconds: Option<i64>,
    pub data_age: String,
    pub freshness: Freshness,
}

/// Resolves and classifies the reading to show for `device_id`.
pub fn current_view<S, U>(
    store: &mut S,
    upstream: &U,
    policy: &ResolverPolicy,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<CurrentView, StoreError>
where
    S: ReadingStore + ?Sized,
    U: UplinkSource + ?Sized,
{
    current_view_shared(&RefCell::new(store), upstream, policy, device_id, now)
}

/// `current_view` over a shared store; see `resolve_shared`.
pub fn current_view_shared<A, U>(
    store: &A,
    upstream: &U,
    policy: &ResolverPolicy,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<CurrentView, StoreError>
where
    A: StoreAccess + ?Sized,
    U: UplinkSource + ?Sized,
{
    let candidate = resolve_shared(store, upstream, policy, device_id, now)?;
    let classification = Classification::of(&candidate.reading);
    let data_age_seconds = candidate
        .source
        .is_real()
        .then(|| age_seconds(candidate.reading.recorded_at, now));

    let parameters = Parameter::ALL
        .iter()
        .map(|&p| ParameterCard::build(&candidate.reading, &classification.parameters, p))
        .collect();

    Ok(CurrentView {
        overall_tier: classification.overall,
        score: classification.score,
        parameter_tiers: classification.parameters,
        status_text: reference::status_text(classification.overall),
        status_color: reference::status_color(classification.overall),
        description: reference::overall_description(classification.overall),
        parameters,
        source: candidate.source,
        source_label: candidate.source.label(),
        provenance: candidate.provenance,
        data_age_seconds,
        data_age: format_data_age(data_age_seconds),
        freshness: Freshness::from_age(data_age_seconds),
        record_id: candidate.record_id,
        reading: candidate.reading,
    })
}

/// One row of the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub record: StoredReading,
    pub tiers: ParameterTiers,
    pub overall: Tier,
}

impl From<StoredReading> for HistoryEntry {
    fn from(record: StoredReading) -> Self {
        let classification = Classification::of(&record.reading);
        HistoryEntry {
            record,
            tiers: classification.parameters,
            overall: classification.overall,
        }
    }
}

/// Up to `limit` classified readings, newest first. An empty list means
/// no history, not an error.
pub fn recent_history<S>(store: &mut S, device_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>
where
    S: ReadingStore + ?Sized,
{
    Ok(store
        .latest_n(device_id, limit)?
        .into_iter()
        .map(HistoryEntry::from)
        .collect())
}
