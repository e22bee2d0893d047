//! Typed recording facade — the caller-facing surface of the engine.
//!
//! One method per logging category, each safe to call from any concurrent
//! context.  The recorder builds the `NewEvent`, screens context keys the
//! configuration forbids, and hands off to the store's append path.

use std::collections::BTreeMap;
use std::sync::Arc;

use vigil_contracts::{
    EventResult, EventType, NewEvent, RiskLevel, VigilError, VigilResult,
};

use crate::store::AuditStore;

/// Credential lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOp {
    Created,
    Accessed,
    Modified,
    Deleted,
}

impl CredentialOp {
    fn event_type(self) -> EventType {
        match self {
            CredentialOp::Created => EventType::CredentialCreated,
            CredentialOp::Accessed => EventType::CredentialAccessed,
            CredentialOp::Modified => EventType::CredentialModified,
            CredentialOp::Deleted => EventType::CredentialDeleted,
        }
    }
}

/// Key lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOp {
    Generated,
    Accessed,
    Deleted,
}

impl KeyOp {
    fn event_type(self) -> EventType {
        match self {
            KeyOp::Generated => EventType::KeyGenerated,
            KeyOp::Accessed => EventType::KeyAccessed,
            KeyOp::Deleted => EventType::KeyDeleted,
        }
    }
}

/// Security incident categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityIncident {
    Violation,
    UnauthorizedAccess,
    SuspiciousActivity,
}

impl SecurityIncident {
    fn event_type(self) -> EventType {
        match self {
            SecurityIncident::Violation => EventType::SecurityViolation,
            SecurityIncident::UnauthorizedAccess => EventType::UnauthorizedAccess,
            SecurityIncident::SuspiciousActivity => EventType::SuspiciousActivity,
        }
    }
}

/// Structured event construction, one method per logging category.
///
/// Cheap to clone; every method returns once the event is durably
/// persisted or the append has failed.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<AuditStore>,
    denied_context_keys: Vec<String>,
}

impl AuditRecorder {
    pub fn new(store: Arc<AuditStore>) -> Self {
        let denied_context_keys = store.config().denied_context_keys.clone();
        Self {
            store,
            denied_context_keys,
        }
    }

    /// Password or token authentication.  The event type follows the
    /// result: success maps to `AuthenticationSuccess`, anything else to
    /// `AuthenticationFailure`.
    pub fn record_authentication(
        &self,
        user_id: &str,
        session_id: Option<String>,
        result: EventResult,
        risk_level: RiskLevel,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        let event_type = match result {
            EventResult::Success => EventType::AuthenticationSuccess,
            EventResult::Failure | EventResult::Denied => EventType::AuthenticationFailure,
        };
        self.record(
            NewEvent {
                event_type,
                result,
                risk_level,
                actor: None,
                context,
            }
            .with_actor(user_id, session_id),
        )
    }

    /// Biometric authentication attempt.
    pub fn record_biometric_authentication(
        &self,
        user_id: &str,
        result: EventResult,
        risk_level: RiskLevel,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        self.record(
            NewEvent {
                event_type: EventType::BiometricAuthentication,
                result,
                risk_level,
                actor: None,
                context,
            }
            .with_actor(user_id, None),
        )
    }

    /// Account lockout after repeated failures.
    pub fn record_lockout(
        &self,
        user_id: &str,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        self.record(
            NewEvent {
                event_type: EventType::AccountLockout,
                result: EventResult::Denied,
                risk_level: RiskLevel::High,
                actor: None,
                context,
            }
            .with_actor(user_id, None),
        )
    }

    /// Credential lifecycle operation.
    pub fn record_credential_event(
        &self,
        op: CredentialOp,
        user_id: &str,
        result: EventResult,
        risk_level: RiskLevel,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        self.record(
            NewEvent {
                event_type: op.event_type(),
                result,
                risk_level,
                actor: None,
                context,
            }
            .with_actor(user_id, None),
        )
    }

    /// Cryptographic key lifecycle operation.
    pub fn record_key_event(
        &self,
        op: KeyOp,
        user_id: &str,
        result: EventResult,
        risk_level: RiskLevel,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        self.record(
            NewEvent {
                event_type: op.event_type(),
                result,
                risk_level,
                actor: None,
                context,
            }
            .with_actor(user_id, None),
        )
    }

    /// Read access to protected data.
    pub fn record_data_access(
        &self,
        user_id: &str,
        resource: &str,
        result: EventResult,
        risk_level: RiskLevel,
    ) -> VigilResult<u64> {
        let mut context = BTreeMap::new();
        context.insert("resource".to_string(), resource.to_string());
        self.record(
            NewEvent {
                event_type: EventType::DataAccess,
                result,
                risk_level,
                actor: None,
                context,
            }
            .with_actor(user_id, None),
        )
    }

    /// Security incident (violation, unauthorized access, suspicious
    /// activity).
    pub fn record_security_event(
        &self,
        incident: SecurityIncident,
        user_id: Option<&str>,
        result: EventResult,
        risk_level: RiskLevel,
        context: BTreeMap<String, String>,
    ) -> VigilResult<u64> {
        let mut new = NewEvent {
            event_type: incident.event_type(),
            result,
            risk_level,
            actor: None,
            context,
        };
        if let Some(user_id) = user_id {
            new = new.with_actor(user_id, None);
        }
        self.record(new)
    }

    /// Event the system itself originates; carries no actor.
    pub fn record_system_event(
        &self,
        description: &str,
        result: EventResult,
        risk_level: RiskLevel,
    ) -> VigilResult<u64> {
        let mut context = BTreeMap::new();
        context.insert("description".to_string(), description.to_string());
        self.record(NewEvent {
            event_type: EventType::SystemEvent,
            result,
            risk_level,
            actor: None,
            context,
        })
    }

    /// Record a detected tampering incident in a still-healthy segment.
    ///
    /// Called by the read side when verification fails, before the error
    /// is surfaced to the caller.
    pub fn record_tamper_incident(&self, source: &VigilError) -> VigilResult<u64> {
        let mut context = BTreeMap::new();
        context.insert("detail".to_string(), source.to_string());
        self.record(NewEvent {
            event_type: EventType::SecurityViolation,
            result: EventResult::Failure,
            risk_level: RiskLevel::Critical,
            actor: None,
            context,
        })
    }

    fn record(&self, new: NewEvent) -> VigilResult<u64> {
        for key in new.context.keys() {
            let lowered = key.to_lowercase();
            if self
                .denied_context_keys
                .iter()
                .any(|denied| lowered == *denied)
            {
                return Err(VigilError::ConfigError {
                    reason: format!("context key '{}' is denied by configuration", key),
                });
            }
        }
        self.store.append(new)
    }
}
