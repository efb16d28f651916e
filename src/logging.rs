/// Structured logging for the water quality service
///
/// Events carry the data source and device id as fields so a log line can
/// be traced back to the uplink or request that caused it. Output goes to
/// the console and, when configured, to a log file for daemon operation.

use std::fmt;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::model::{StoreError, UpstreamError};

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The Things Network storage API.
    Ttn,
    /// Uplinks pushed to the webhook endpoint.
    Webhook,
    Database,
    Resolver,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Ttn => write!(f, "TTN"),
            DataSource::Webhook => write!(f, "HOOK"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Resolver => write!(f, "RSLV"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Normal operation: upstream deliberately left unconfigured.
    Expected,
    /// Misconfiguration or a broken dependency; needs attention.
    Unexpected,
    /// Possibly transient (timeouts, 5xx).
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. When `log_file` is given, events
/// are also written there without ANSI colours; keep the returned guard
/// alive for the life of the process or buffered lines are lost.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "aquamon.log".into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            warn_if_not_installed(installed);
            Some(guard)
        }
        None => {
            warn_if_not_installed(tracing_subscriber::fmt().with_env_filter(filter()).try_init());
            None
        }
    }
}

/// A subscriber is already installed (tests, embedding) or the log
/// bridge is taken. Events keep flowing to the existing one.
fn warn_if_not_installed<E: fmt::Display>(result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("{}", init_failure_message(&e));
            false
        }
    }
}

fn init_failure_message(err: &dyn fmt::Display) -> String {
    format!("warning: logging not initialised, keeping existing subscriber: {}", err)
}

// ---------------------------------------------------------------------------
// Leveled helpers
// ---------------------------------------------------------------------------

pub fn info(source: DataSource, device_id: Option<&str>, message: &str) {
    tracing::info!(source = %source, device = device_id.unwrap_or("-"), "{}", message);
}

pub fn warn(source: DataSource, device_id: Option<&str>, message: &str) {
    tracing::warn!(source = %source, device = device_id.unwrap_or("-"), "{}", message);
}

pub fn error(source: DataSource, device_id: Option<&str>, message: &str) {
    tracing::error!(source = %source, device = device_id.unwrap_or("-"), "{}", message);
}

pub fn debug(source: DataSource, device_id: Option<&str>, message: &str) {
    tracing::debug!(source = %source, device = device_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an upstream (TTN) failure.
pub fn classify_upstream_failure(err: &UpstreamError) -> FailureType {
    match err {
        // Running without TTN credentials is a supported setup.
        UpstreamError::NotConfigured(_) => FailureType::Expected,
        // Credentials rejected or application/device unknown: misconfiguration.
        UpstreamError::HttpError(401 | 403 | 404) => FailureType::Unexpected,
        UpstreamError::HttpError(code) if *code >= 500 => FailureType::Unknown,
        UpstreamError::HttpError(_) => FailureType::Unexpected,
        // Unparseable body: the storage API format changed.
        UpstreamError::ParseError(_) => FailureType::Unexpected,
        UpstreamError::Timeout(_) | UpstreamError::Transport(_) => FailureType::Unknown,
    }
}

/// Classify a record store failure.
pub fn classify_store_failure(err: &StoreError) -> FailureType {
    match err {
        StoreError::Unavailable(_) | StoreError::Query(_) => FailureType::Unexpected,
        StoreError::RecordNotFound(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

fn log_classified(source: DataSource, device_id: &str, failure_type: FailureType, message: &str) {
    match failure_type {
        FailureType::Expected => debug(source, Some(device_id), message),
        FailureType::Unexpected => error(source, Some(device_id), message),
        FailureType::Unknown => warn(source, Some(device_id), message),
    }
}

/// Log an upstream failure with automatic classification
pub fn log_upstream_failure(device_id: &str, operation: &str, err: &UpstreamError) {
    let failure_type = classify_upstream_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    log_classified(DataSource::Ttn, device_id, failure_type, &message);
}

/// Log a store failure with automatic classification
pub fn log_store_failure(device_id: &str, operation: &str, err: &StoreError) {
    let failure_type = classify_store_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    log_classified(DataSource::Database, device_id, failure_type, &message);
}
