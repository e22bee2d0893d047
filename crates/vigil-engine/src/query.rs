//! Query/filter engine: decrypt, verify, and filter stored envelopes.
//!
//! Every pass re-verifies the chain linkage of the events it reads,
//! including across segment boundaries, before yielding anything.  A
//! verification failure aborts the pass — compliance correctness requires
//! all-or-nothing trust in a returned range, never silent skipping.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use vigil_contracts::{
    AuditEvent, EncryptedEnvelope, EventType, RiskLevel, VigilError, VigilResult,
};
use vigil_crypto::{chain, EnvelopeCipher, KeySet};
use vigil_store::AuditStore;

/// Time window plus optional type/risk filters.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// When set, only these event types are yielded.
    pub event_types: Option<Vec<EventType>>,
    /// When set, only these risk levels are yielded.
    pub risk_levels: Option<Vec<RiskLevel>>,
}

impl EventFilter {
    /// Filter covering `[from, to]` with no type or risk restriction.
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            event_types: None,
            risk_levels: None,
        }
    }

    /// Restrict to the given event types.
    pub fn with_event_types(mut self, event_types: Vec<EventType>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Restrict to the given risk levels.
    pub fn with_risk_levels(mut self, risk_levels: Vec<RiskLevel>) -> Self {
        self.risk_levels = Some(risk_levels);
        self
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        if event.timestamp < self.from || event.timestamp > self.to {
            return false;
        }
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(risks) = &self.risk_levels {
            if !risks.contains(&event.risk_level) {
                return false;
            }
        }
        true
    }
}

/// Read-side engine over one store's envelopes and keys.
pub struct QueryEngine {
    store: Arc<AuditStore>,
    keys: Arc<KeySet>,
    cipher: EnvelopeCipher,
}

impl QueryEngine {
    pub fn new(store: Arc<AuditStore>, keys: Arc<KeySet>) -> Self {
        let cipher = EnvelopeCipher::new(keys.aead_key(), keys.version());
        Self {
            store,
            keys,
            cipher,
        }
    }

    /// Start a lazy, forward-only pass over the filtered window.
    ///
    /// Storage is read once up front (segments overlapping the window);
    /// decryption and verification happen per `next()` call, so a consumer
    /// that stops early never pays for the unread remainder.  Re-invoke to
    /// restart from scratch.
    pub fn query(&self, filter: &EventFilter) -> VigilResult<QueryIter<'_>> {
        let envelopes = self.store.read_window(filter.from, filter.to)?;
        Ok(QueryIter {
            engine: self,
            filter: filter.clone(),
            envelopes: envelopes.into_iter(),
            expected_prior: None,
            failed: false,
        })
    }

    /// Run a pass to completion, all-or-nothing.
    ///
    /// Any tamper detection yields `Err` and zero events — a partially
    /// trusted range is never returned.
    pub fn query_all(&self, filter: &EventFilter) -> VigilResult<Vec<AuditEvent>> {
        let mut events = Vec::new();
        for item in self.query(filter)? {
            events.push(item?);
        }
        Ok(events)
    }
}

/// One verification pass over a window of envelopes.
///
/// Yields events in ascending sequence order.  The first tamper detection
/// is yielded as `Err` and fuses the iterator — nothing after a failure is
/// ever yielded.
pub struct QueryIter<'a> {
    engine: &'a QueryEngine,
    filter: EventFilter,
    envelopes: std::vec::IntoIter<EncryptedEnvelope>,
    /// Chain value the next event must link to; `None` until the first
    /// event of the pass has been verified.
    expected_prior: Option<String>,
    failed: bool,
}

impl QueryIter<'_> {
    fn verify_next(&mut self, envelope: &EncryptedEnvelope) -> VigilResult<AuditEvent> {
        let event = self.engine.cipher.open(envelope)?;

        // The first event of a pass may start mid-chain: its stored prior
        // value is taken as the linkage expectation, and its own tag is
        // what gets checked.  Every later event must link to its
        // predecessor in this pass.
        let expected = self
            .expected_prior
            .clone()
            .unwrap_or_else(|| event.prior_chain_value.clone());
        if !chain::verify(self.engine.keys.chain_key(), &event, &expected) {
            return Err(VigilError::TamperDetected {
                sequence: event.sequence,
                reason: "chain verification failed".to_string(),
            });
        }

        self.expected_prior = Some(event.chain_value.clone());
        Ok(event)
    }
}

impl Iterator for QueryIter<'_> {
    type Item = VigilResult<AuditEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let envelope = self.envelopes.next()?;
            match self.verify_next(&envelope) {
                Ok(event) => {
                    // Verification always runs over the full contiguous
                    // run; filtering only decides what is yielded.
                    if self.filter.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
