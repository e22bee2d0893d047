//! Compliance export: signed, structured reports over a requested window.
//!
//! The report body is serialized deterministically (struct fields in
//! declaration order, context maps already sorted) and tagged with
//! HMAC-SHA256 under the report key, so a recipient can later prove the
//! export was not altered after generation.  Reports carry decrypted event
//! content and derived aggregates only — never key material.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use vigil_contracts::{AuditEvent, EventResult, RiskLevel, VigilError, VigilResult};

type HmacSha256 = Hmac<Sha256>;

/// Aggregates computed in one pass over the exported events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: u64,
    /// Events at `High` or `Critical` risk.
    pub high_risk_events: u64,
    /// Events whose result was `Failure` or `Denied`.
    pub failed_operations: u64,
    /// Distinct actor user ids across the window.
    pub unique_users: u64,
}

/// A signed compliance export for one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Matching events in ascending sequence order.
    pub events: Vec<AuditEvent>,
    pub summary: ReportSummary,
    /// HMAC-SHA256 (hex) over the canonical serialization of every
    /// preceding field.
    pub integrity_tag: String,
}

/// The tag-covered portion of a report, borrowed for serialization.
///
/// Field order here defines the canonical byte layout — it must match
/// `ComplianceReport` and never change for deployed installations.
#[derive(Serialize)]
struct ReportBody<'a> {
    generated_at: &'a DateTime<Utc>,
    window_start: &'a DateTime<Utc>,
    window_end: &'a DateTime<Utc>,
    events: &'a [AuditEvent],
    summary: &'a ReportSummary,
}

/// Summarize verified events in one pass.
pub fn summarize(events: &[AuditEvent]) -> ReportSummary {
    let mut high_risk_events = 0u64;
    let mut failed_operations = 0u64;
    let mut users = BTreeSet::new();

    for event in events {
        if event.risk_level >= RiskLevel::High {
            high_risk_events += 1;
        }
        if matches!(event.result, EventResult::Failure | EventResult::Denied) {
            failed_operations += 1;
        }
        if let Some(actor) = &event.actor {
            users.insert(actor.user_id.as_str());
        }
    }

    ReportSummary {
        total_events: events.len() as u64,
        high_risk_events,
        failed_operations,
        unique_users: users.len() as u64,
    }
}

/// Assemble and sign a report over already-verified events.
pub fn build_report(
    report_key: &[u8; 32],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    events: Vec<AuditEvent>,
) -> VigilResult<ComplianceReport> {
    let generated_at = Utc::now();
    let summary = summarize(&events);
    let integrity_tag = compute_tag(
        report_key,
        &ReportBody {
            generated_at: &generated_at,
            window_start: &window_start,
            window_end: &window_end,
            events: &events,
            summary: &summary,
        },
    )?;

    Ok(ComplianceReport {
        generated_at,
        window_start,
        window_end,
        events,
        summary,
        integrity_tag,
    })
}

/// Re-check a report's trailing tag.
///
/// Returns `ExportIntegrityFailure` if the report was altered after
/// generation (or signed under a different report key).
pub fn verify_report(report_key: &[u8; 32], report: &ComplianceReport) -> VigilResult<()> {
    let expected = compute_tag(
        report_key,
        &ReportBody {
            generated_at: &report.generated_at,
            window_start: &report.window_start,
            window_end: &report.window_end,
            events: &report.events,
            summary: &report.summary,
        },
    )?;

    let (Ok(stored), Ok(fresh)) = (
        hex::decode(&report.integrity_tag),
        hex::decode(&expected),
    ) else {
        return Err(VigilError::ExportIntegrityFailure {
            reason: "report tag is not valid hex".to_string(),
        });
    };
    if !bool::from(stored.ct_eq(&fresh)) {
        return Err(VigilError::ExportIntegrityFailure {
            reason: "report tag does not match report content".to_string(),
        });
    }
    Ok(())
}

fn compute_tag(report_key: &[u8; 32], body: &ReportBody<'_>) -> VigilResult<String> {
    let canonical =
        serde_json::to_vec(body).map_err(|e| VigilError::ExportIntegrityFailure {
            reason: format!("report serialization failed: {}", e),
        })?;
    let mut mac =
        HmacSha256::new_from_slice(report_key).expect("HMAC accepts any key size");
    mac.update(&canonical);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
