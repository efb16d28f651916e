//! Reachability verification for the record store and the TTN upstream.
//!
//! Run with `aquamon --verify` before deploying, or read the same report
//! from `GET /api/status` on a running service.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::ttn::UplinkSource;
use crate::model::UpstreamError;
use crate::store::ReadingStore;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Reachable and holding data.
    Success,
    /// Reachable but empty.
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreVerification {
    pub status: VerificationStatus,
    pub reachable: bool,
    pub latest_record_id: Option<i32>,
    pub latest_recorded_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpstreamVerification {
    pub status: VerificationStatus,
    /// False only when credentials are missing.
    pub configured: bool,
    pub responsive: bool,
    pub latest_recorded_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub store: StoreVerification,
    pub upstream: UpstreamVerification,
}

impl VerificationReport {
    /// The service can run without upstream, but not without its store.
    pub fn is_operational(&self) -> bool {
        self.store.status != VerificationStatus::Failed
    }
}

// ============================================================================
// Checks
// ============================================================================

pub fn verify_store<S>(store: &mut S, device_id: &str) -> StoreVerification
where
    S: ReadingStore + ?Sized,
{
    let mut result = StoreVerification {
        status: VerificationStatus::Failed,
        reachable: false,
        latest_record_id: None,
        latest_recorded_at: None,
        error_message: None,
    };

    if let Err(e) = store.ping() {
        result.error_message = Some(e.to_string());
        return result;
    }
    result.reachable = true;

    match store.latest(device_id) {
        Ok(Some(record)) => {
            result.latest_record_id = Some(record.id);
            result.latest_recorded_at = Some(record.reading.recorded_at);
            result.status = VerificationStatus::Success;
        }
        Ok(None) => result.status = VerificationStatus::PartialSuccess,
        Err(e) => result.error_message = Some(e.to_string()),
    }
    result
}

pub fn verify_upstream<U>(upstream: &U, device_id: &str) -> UpstreamVerification
where
    U: UplinkSource + ?Sized,
{
    let mut result = UpstreamVerification {
        status: VerificationStatus::Failed,
        configured: true,
        responsive: false,
        latest_recorded_at: None,
        error_message: None,
    };

    match upstream.fetch_latest_uplink(device_id) {
        Ok(Some(reading)) => {
            result.responsive = true;
            result.latest_recorded_at = Some(reading.recorded_at);
            result.status = VerificationStatus::Success;
        }
        Ok(None) => {
            result.responsive = true;
            result.status = VerificationStatus::PartialSuccess;
        }
        Err(e) => {
            result.configured = !matches!(e, UpstreamError::NotConfigured(_));
            result.error_message = Some(e.to_string());
        }
    }
    result
}

pub fn run_verification<S, U>(store: &mut S, upstream: &U, device_id: &str, now: DateTime<Utc>) -> VerificationReport
where
    S: ReadingStore + ?Sized,
    U: UplinkSource + ?Sized,
{
    VerificationReport {
        timestamp: now,
        device_id: device_id.to_string(),
        store: verify_store(store, device_id),
        upstream: verify_upstream(upstream, device_id),
    }
}

fn status_line(status: VerificationStatus, detail: &str) -> String {
    match status {
        VerificationStatus::Success => format!("✓ OK ({})", detail),
        VerificationStatus::PartialSuccess => format!("⚠ Reachable, {}", detail),
        VerificationStatus::Failed => format!("✗ FAILED: {}", detail),
    }
}

pub fn print_summary(report: &VerificationReport) {
    let store_detail = match (&report.store.error_message, report.store.latest_record_id) {
        (Some(msg), _) => msg.clone(),
        (None, Some(id)) => format!(
            "latest record {} at {}",
            id,
            report.store.latest_recorded_at.map(|t| t.to_rfc3339()).unwrap_or_default()
        ),
        (None, None) => "no readings yet".to_string(),
    };
    let upstream_detail = match (&report.upstream.error_message, report.upstream.latest_recorded_at) {
        (Some(msg), _) => msg.clone(),
        (None, Some(t)) => format!("latest uplink at {}", t.to_rfc3339()),
        (None, None) => "no stored uplinks".to_string(),
    };

    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY  ({})", report.device_id);
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Record store:   {}", status_line(report.store.status, &store_detail));
    println!("TTN upstream:   {}", status_line(report.upstream.status, &upstream_detail));
    println!();
    println!(
        "Service is {}",
        if report.is_operational() { "operational" } else { "NOT operational (store unreachable)" }
    );
    println!("═══════════════════════════════════════════════════════════");
}
