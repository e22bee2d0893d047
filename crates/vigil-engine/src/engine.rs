//! The constructed engine facade.
//!
//! One `AuditEngine` instance owns its key material and store handle and is
//! passed explicitly wherever auditing is needed — no global state.  It
//! wires the recorder (write side), query engine (read side), and export
//! together, and handles the tamper-incident policy: a detected tampering
//! is itself recorded as a `SecurityViolation` event in the still-healthy
//! active segment before the error is surfaced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use vigil_contracts::{AuditEvent, EngineConfig, VigilError, VigilResult};
use vigil_crypto::{KeySet, RootSecretProvider};
use vigil_store::{AlertNotifier, AuditRecorder, AuditStore, SegmentStorage};

use crate::export::{self, ComplianceReport};
use crate::query::{EventFilter, QueryEngine, QueryIter};

/// Key generation used for newly sealed envelopes.
const CURRENT_KEY_VERSION: u32 = 1;

/// The engine: key material, store handle, and the read/write surfaces.
pub struct AuditEngine {
    keys: Arc<KeySet>,
    store: Arc<AuditStore>,
    recorder: AuditRecorder,
    query_engine: QueryEngine,
}

impl AuditEngine {
    /// Construct an engine over the given storage and collaborators.
    ///
    /// Keys are derived from the provider's root secret; the engine never
    /// generates or stores that secret itself.  Chain state is recovered
    /// from storage, so reopening an existing installation resumes the
    /// chain seamlessly.
    pub fn new(
        config: EngineConfig,
        secret_provider: &dyn RootSecretProvider,
        storage: Arc<dyn SegmentStorage>,
        notifier: Option<Arc<dyn AlertNotifier>>,
    ) -> VigilResult<Self> {
        let keys = Arc::new(KeySet::derive(secret_provider, CURRENT_KEY_VERSION)?);
        let store = Arc::new(AuditStore::open(config, keys.clone(), storage, notifier)?);
        let recorder = AuditRecorder::new(store.clone());
        let query_engine = QueryEngine::new(store.clone(), keys.clone());

        Ok(Self {
            keys,
            store,
            recorder,
            query_engine,
        })
    }

    /// The typed write surface.
    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// The underlying store, for rotation and retention maintenance.
    pub fn store(&self) -> &Arc<AuditStore> {
        &self.store
    }

    /// Lazy query pass; see `QueryEngine::query`.
    pub fn query_iter(&self, filter: &EventFilter) -> VigilResult<QueryIter<'_>> {
        self.query_engine.query(filter)
    }

    /// All-or-nothing query.
    ///
    /// On tamper detection the incident is recorded as a
    /// `SecurityViolation` event before the error is returned — a tampered
    /// range is a security incident, never a quiet failure.
    pub fn query(&self, filter: &EventFilter) -> VigilResult<Vec<AuditEvent>> {
        match self.query_engine.query_all(filter) {
            Ok(events) => Ok(events),
            Err(e @ VigilError::TamperDetected { .. }) => {
                error!("tampering detected during query: {}", e);
                if let Err(record_err) = self.recorder.record_tamper_incident(&e) {
                    error!("failed to record tamper incident: {}", record_err);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Produce a signed compliance report for the window.
    pub fn export(&self, filter: &EventFilter) -> VigilResult<ComplianceReport> {
        let events = self.query(filter)?;
        let report = export::build_report(
            self.keys.report_key(),
            filter.from,
            filter.to,
            events,
        )?;
        info!(
            total_events = report.summary.total_events,
            high_risk_events = report.summary.high_risk_events,
            "compliance report generated"
        );
        Ok(report)
    }

    /// Re-verify a previously generated report's integrity tag.
    pub fn verify_report(&self, report: &ComplianceReport) -> VigilResult<()> {
        export::verify_report(self.keys.report_key(), report)
    }

    /// Run the retention sweep; intended for a daily cadence or on demand.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> VigilResult<Vec<u64>> {
        self.store.purge_expired(now)
    }
}
