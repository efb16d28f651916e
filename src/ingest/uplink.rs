/// Ingestion boundary: decoded uplink fields → validated `Reading` → store.
///
/// Everything downstream assumes finite, physically plausible numbers, so
/// defaulting and clamping happen here and only here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ingest::ttn::{parse_webhook_body, UplinkPayload};
use crate::logging::{self, DataSource};
use crate::model::{IngestError, Reading, Tier};
use crate::quality::rating::overall_tier;
use crate::store::ReadingStore;

/// Neutral pH, used when the field is missing or out of range.
pub const DEFAULT_PH: f64 = 7.0;
/// Substitute for an implausible temperature reading.
pub const FALLBACK_TEMPERATURE: f64 = 25.0;

/// Plausible temperature span for a submerged probe, °C.
const TEMPERATURE_RANGE: (f64, f64) = (-50.0, 100.0);

/// Numeric field from a decoded payload. Accepts JSON numbers and numeric
/// strings; anything else, or a non-finite number, yields `default`.
pub fn field_value(fields: &Map<String, Value>, key: &str, default: f64) -> f64 {
    let parsed = match fields.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(default)
}

/// Builds a reading from decoded fields, applying defaults and clamps:
/// - temperature outside [-50, 100] °C → 25
/// - pH outside [0, 14] → 7
/// - negative turbidity, conductivity or TDS → 0
pub fn build_reading(payload: UplinkPayload) -> Reading {
    let f = &payload.fields;

    let mut temperature = field_value(f, "temperature", 0.0);
    if temperature < TEMPERATURE_RANGE.0 || temperature > TEMPERATURE_RANGE.1 {
        temperature = FALLBACK_TEMPERATURE;
    }
    let mut ph = field_value(f, "ph", DEFAULT_PH);
    if !(0.0..=14.0).contains(&ph) {
        ph = DEFAULT_PH;
    }

    Reading {
        device_id: payload.device_id,
        temperature,
        ph,
        turbidity: field_value(f, "turbidity", 0.0).max(0.0),
        conductivity: field_value(f, "conductivity", 0.0).max(0.0),
        tds: field_value(f, "tds", 0.0).max(0.0),
        label: None,
        recorded_at: payload.received_at,
        raw_payload: payload.raw,
    }
}

/// Acknowledgement returned to the network server for a stored uplink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReceipt {
    pub record_id: i32,
    pub device_id: String,
    pub status: Tier,
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
}

/// Classifies and appends one decoded uplink.
pub fn ingest_payload<S>(store: &mut S, payload: UplinkPayload) -> Result<IngestReceipt, IngestError>
where
    S: ReadingStore + ?Sized,
{
    let reading = build_reading(payload);
    let status = overall_tier(&reading);

    let record_id = store.append(&reading, status).map_err(|e| {
        logging::log_store_failure(&reading.device_id, "append uplink", &e);
        e
    })?;

    logging::info(
        DataSource::Webhook,
        Some(&reading.device_id),
        &format!(
            "stored record {} ({} | {:.1}°C, pH {:.2}, {:.1} NTU, {:.0} μS/cm, {:.0} ppm)",
            record_id,
            status,
            reading.temperature,
            reading.ph,
            reading.turbidity,
            reading.conductivity,
            reading.tds
        ),
    );

    Ok(IngestReceipt {
        record_id,
        device_id: reading.device_id.clone(),
        status,
        timestamp: reading.recorded_at,
        reading,
    })
}

/// Full webhook path: parse the POST body, then classify and append.
///
/// Malformed bodies are logged and returned as validation errors so the
/// endpoint can acknowledge them as rejected instead of failing.
pub fn ingest_webhook<S>(store: &mut S, body: &str, now: DateTime<Utc>) -> Result<IngestReceipt, IngestError>
where
    S: ReadingStore + ?Sized,
{
    let payload = parse_webhook_body(body, now).map_err(|e| {
        logging::warn(DataSource::Webhook, None, &format!("uplink rejected: {}", e));
        e
    })?;
    ingest_payload(store, payload)
}
