/// The Things Network (TTN) v3 wire format and Storage Integration client.
///
/// Two inputs arrive in the same uplink shape:
/// - webhook pushes, one JSON object per POST (`parse_webhook_body`)
/// - Storage Integration queries, newline-delimited `{"result": …}`
///   objects (`parse_storage_response`), used when the local store has
///   nothing fresh.
///
/// API Documentation: https://www.thethingsindustries.com/docs/integrations/storage/retrieve/

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::UpstreamConfig;
use crate::model::{Reading, UpstreamError, ValidationError, DEFAULT_DEVICE_ID};
use crate::quality::freshness::parse_timestamp;

// ============================================================================
// TTN Uplink Structures
// ============================================================================

/// Uplink message as delivered by a TTN webhook or the storage API.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TtnUplink {
    /// Kept as raw JSON so the whole identifier block can be archived.
    #[serde(default)]
    pub end_device_ids: Option<Value>,
    #[serde(default)]
    pub received_at: Option<String>,
    #[serde(default)]
    pub uplink_message: Option<UplinkMessage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UplinkMessage {
    /// Output of the application payload formatter.
    #[serde(default)]
    pub decoded_payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub received_at: Option<String>,
}

/// One line of a Storage Integration response.
#[derive(Debug, Deserialize)]
struct StorageEnvelope {
    result: TtnUplink,
}

/// Decoded sensor fields of one uplink, ready to become a `Reading`.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkPayload {
    pub device_id: String,
    pub fields: Map<String, Value>,
    pub received_at: DateTime<Utc>,
    /// Archived alongside the reading as `raw_payload`.
    pub raw: Value,
}

impl TtnUplink {
    pub fn device_id(&self) -> String {
        self.end_device_ids
            .as_ref()
            .and_then(|ids| ids.get("device_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_DEVICE_ID)
            .to_string()
    }

    /// Top-level `received_at`, else the one inside `uplink_message`.
    fn received_at_raw(&self) -> Option<&str> {
        self.received_at
            .as_deref()
            .or_else(|| self.uplink_message.as_ref().and_then(|m| m.received_at.as_deref()))
    }

    /// Extracts the decoded payload. `now` stands in for a missing
    /// timestamp; a present but unparseable one is rejected.
    pub fn into_payload(self, source: &str, now: DateTime<Utc>) -> Result<UplinkPayload, ValidationError> {
        let received_at = match self.received_at_raw() {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };
        let device_id = self.device_id();
        let fields = self
            .uplink_message
            .and_then(|m| m.decoded_payload)
            .ok_or(ValidationError::MissingPayload)?;
        let raw = json!({
            "source": source,
            "original_payload": Value::Object(fields.clone()),
            "device_info": self.end_device_ids.unwrap_or(Value::Null),
            "received_at": received_at.to_rfc3339(),
        });
        Ok(UplinkPayload { device_id, fields, received_at, raw })
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a webhook POST body.
pub fn parse_webhook_body(body: &str, now: DateTime<Utc>) -> Result<UplinkPayload, ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::Malformed("No data received".to_string()));
    }
    let uplink: TtnUplink =
        serde_json::from_str(body).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    uplink.into_payload("ttn_webhook", now)
}

/// Parses a Storage Integration response and returns the newest uplink
/// that carries a decoded payload and a timestamp.
///
/// An empty body means the device has no stored uplinks. Entries without a
/// decoded payload or timestamp are skipped; the storage API returns those
/// for join requests and undecodable frames.
pub fn parse_storage_response(body: &str) -> Result<Option<UplinkPayload>, UpstreamError> {
    let mut newest: Option<UplinkPayload> = None;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let envelope: StorageEnvelope =
            serde_json::from_str(line).map_err(|e| UpstreamError::ParseError(e.to_string()))?;
        let uplink = envelope.result;
        if uplink.received_at_raw().is_none() {
            continue;
        }
        // Timestamp present, so `now` is never used here.
        let payload = match uplink.into_payload("ttn_storage", DateTime::<Utc>::MIN_UTC) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if newest.as_ref().map_or(true, |n| payload.received_at > n.received_at) {
            newest = Some(payload);
        }
    }

    Ok(newest)
}

// ============================================================================
// Upstream gateway
// ============================================================================

/// Source of the most recent uplink held outside the local store.
///
/// Every failure is soft: the resolver logs it and moves on to the next
/// fallback.
pub trait UplinkSource {
    fn fetch_latest_uplink(&self, device_id: &str) -> Result<Option<Reading>, UpstreamError>;
}

/// Builds the Storage Integration URL for the newest uplink of one device.
/// `base` is the API root, see `UpstreamConfig::api_base`.
pub fn build_storage_url(base: &str, app_id: &str, device_id: &str) -> String {
    format!(
        "{}/api/v3/as/applications/{}/devices/{}/packages/storage/uplink_message?limit=1&order=-received_at",
        base, app_id, device_id
    )
}

/// Blocking TTN Storage Integration client.
pub struct TtnClient {
    http: reqwest::blocking::Client,
    config: UpstreamConfig,
}

impl TtnClient {
    /// Builds the client with the configured request timeout. Must be
    /// called outside an async runtime.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Ok(Self { http, config: config.clone() })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn credentials(&self) -> Result<(&str, &str), UpstreamError> {
        let app_id = self
            .config
            .app_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UpstreamError::NotConfigured("TTN_APP_ID not set".to_string()))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UpstreamError::NotConfigured("TTN_API_KEY not set".to_string()))?;
        Ok((app_id, api_key))
    }

    fn map_transport(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.timeout().as_secs())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }

    /// Raw storage API body for the device.
    pub fn fetch_storage_body(&self, device_id: &str) -> Result<String, UpstreamError> {
        let (app_id, api_key) = self.credentials()?;
        let url = build_storage_url(&self.config.api_base(), app_id, device_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| self.map_transport(e))?;

        if !response.status().is_success() {
            return Err(UpstreamError::HttpError(response.status().as_u16()));
        }
        response.text().map_err(|e| self.map_transport(e))
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

impl UplinkSource for TtnClient {
    fn fetch_latest_uplink(&self, device_id: &str) -> Result<Option<Reading>, UpstreamError> {
        let body = self.fetch_storage_body(device_id)?;
        Ok(parse_storage_response(&body)?.map(crate::ingest::uplink::build_reading))
    }
}

// ============================================================================
// Tests
// ============================================================================
