/// Core data types for the water quality monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// readings, tiers, parameter names and the error families. It holds no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Identity defaults
// ---------------------------------------------------------------------------

/// Device id used when an uplink or request does not name one.
pub const DEFAULT_DEVICE_ID: &str = "water-monitor";

/// Longest provenance label accepted, counted in characters after trimming.
pub const MAX_LABEL_CHARS: usize = 50;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Water safety classification for a single parameter or a whole sample.
///
/// Severity order is `Excellent < Marginal < Unsafe`. `Unknown` marks
/// absent or unclassifiable input and does not compare with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Excellent,
    Marginal,
    Unsafe,
    Unknown,
}

impl Tier {
    /// Position on the severity scale, `None` for `Unknown`.
    pub fn severity(self) -> Option<u8> {
        match self {
            Tier::Excellent => Some(0),
            Tier::Marginal => Some(1),
            Tier::Unsafe => Some(2),
            Tier::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Excellent => "EXCELLENT",
            Tier::Marginal => "MARGINAL",
            Tier::Unsafe => "UNSAFE",
            Tier::Unknown => "UNKNOWN",
        }
    }

    /// Parses a stored status column. Anything unrecognised is `Unknown`.
    pub fn from_status(status: &str) -> Tier {
        match status.trim().to_ascii_uppercase().as_str() {
            "EXCELLENT" => Tier::Excellent,
            "MARGINAL" => Tier::Marginal,
            "UNSAFE" => Tier::Unsafe,
            _ => Tier::Unknown,
        }
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// The five measured water parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Ph,
    Turbidity,
    Tds,
    Conductivity,
    Temperature,
}

impl Parameter {
    /// All parameters in display order.
    pub const ALL: [Parameter; 5] = [
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::Turbidity,
        Parameter::Conductivity,
        Parameter::Tds,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::Ph => "ph",
            Parameter::Turbidity => "turbidity",
            Parameter::Tds => "tds",
            Parameter::Conductivity => "conductivity",
            Parameter::Temperature => "temperature",
        }
    }

    /// Case-insensitive lookup by name. Returns `None` for unrecognised names.
    pub fn from_name(name: &str) -> Option<Parameter> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ph" => Some(Parameter::Ph),
            "turbidity" => Some(Parameter::Turbidity),
            "tds" => Some(Parameter::Tds),
            "conductivity" => Some(Parameter::Conductivity),
            "temperature" => Some(Parameter::Temperature),
            _ => None,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Ph => "",
            Parameter::Turbidity => "NTU",
            Parameter::Tds => "ppm",
            Parameter::Conductivity => "μS/cm",
            Parameter::Temperature => "°C",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// One timestamped sample from a sensing unit.
///
/// Numeric fields are assumed validated by the ingestion boundary
/// (`ingest::uplink`). `recorded_at` is the physical measurement time, not
/// the time the row was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64, // °C
    pub ph: f64,
    pub turbidity: f64,    // NTU
    pub conductivity: f64, // μS/cm
    pub tds: f64,          // ppm
    pub label: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Auxiliary data kept verbatim, never interpreted.
    pub raw_payload: serde_json::Value,
}

impl Reading {
    /// Value of one parameter in this sample.
    pub fn value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Ph => self.ph,
            Parameter::Turbidity => self.turbidity,
            Parameter::Tds => self.tds,
            Parameter::Conductivity => self.conductivity,
            Parameter::Temperature => self.temperature,
        }
    }
}

/// A reading as held by the record store.
///
/// `status` is the overall tier computed when the row was appended. Display
/// paths recompute classification from the numeric fields instead of
/// trusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: i32,
    pub status: Tier,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub reading: Reading,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Record store failures. Always a hard fault for callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, closed, lock poisoned).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store answered but the statement failed.
    #[error("store query failed: {0}")]
    Query(String),
    /// An update targeted a record id that does not exist.
    #[error("record {0} not found")]
    RecordNotFound(i32),
}

/// Upstream network failures. Always soft: they only steer the resolver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpstreamError {
    /// Application id or API key missing from configuration.
    #[error("upstream not configured: {0}")]
    NotConfigured(String),
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpError(u16),
    /// The request did not complete within the configured bound.
    #[error("upstream request timed out after {0}s")]
    Timeout(u64),
    /// Connection, TLS or I/O failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Input rejected at a boundary. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Water label is required and must be a non-empty string")]
    EmptyLabel,
    #[error("Water label must be {max} characters or less (got {len})")]
    LabelTooLong { len: usize, max: usize },
    #[error("No decoded payload found")]
    MissingPayload,
    #[error("invalid received_at timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("malformed uplink: {0}")]
    Malformed(String),
    /// Request body or query string the HTTP layer could not decode.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures of the label annotator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No reading exists for the device, so there is nothing to label.
    #[error("No recent measurement found to label for device {0}")]
    NothingToLabel(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the ingestion path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
