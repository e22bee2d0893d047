//! Audit event model and its canonical serialization rule.
//!
//! `AuditEvent` is a single entry in the tamper-evident log — immutable once
//! stamped, linked to its predecessor through `prior_chain_value`, and
//! identified globally by `sequence`.  The canonical byte encoding defined
//! here is the input to the integrity MAC, so every field that contributes
//! is listed explicitly and serialized in a fixed order.
//!
//! Canonical layout (bytes, in order):
//!   1. id as 16 raw UUID bytes
//!   2. timestamp as 8-byte little-endian microseconds since the Unix epoch
//!   3. sequence as 8-byte little-endian
//!   4. event_type wire name, length-prefixed
//!   5. result wire name, length-prefixed
//!   6. risk_level wire name, length-prefixed
//!   7. actor user_id and session_id, each length-prefixed (absent fields
//!      encode as a zero-length string)
//!   8. context entries in key order, each key and value length-prefixed

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of operations the engine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AuthenticationSuccess,
    AuthenticationFailure,
    BiometricAuthentication,
    AccountLockout,
    CredentialCreated,
    CredentialAccessed,
    CredentialModified,
    CredentialDeleted,
    KeyGenerated,
    KeyAccessed,
    KeyDeleted,
    SecurityViolation,
    UnauthorizedAccess,
    SuspiciousActivity,
    SystemEvent,
    DataAccess,
}

impl EventType {
    /// Stable wire name used in canonical serialization.
    ///
    /// These strings are part of the on-disk format — never change them for
    /// an existing installation or every stored chain value breaks.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AuthenticationSuccess => "authentication_success",
            EventType::AuthenticationFailure => "authentication_failure",
            EventType::BiometricAuthentication => "biometric_authentication",
            EventType::AccountLockout => "account_lockout",
            EventType::CredentialCreated => "credential_created",
            EventType::CredentialAccessed => "credential_accessed",
            EventType::CredentialModified => "credential_modified",
            EventType::CredentialDeleted => "credential_deleted",
            EventType::KeyGenerated => "key_generated",
            EventType::KeyAccessed => "key_accessed",
            EventType::KeyDeleted => "key_deleted",
            EventType::SecurityViolation => "security_violation",
            EventType::UnauthorizedAccess => "unauthorized_access",
            EventType::SuspiciousActivity => "suspicious_activity",
            EventType::SystemEvent => "system_event",
            EventType::DataAccess => "data_access",
        }
    }
}

/// Outcome of the recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResult {
    Success,
    Failure,
    Denied,
}

impl EventResult {
    /// Stable wire name used in canonical serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventResult::Success => "success",
            EventResult::Failure => "failure",
            EventResult::Denied => "denied",
        }
    }
}

/// Risk classification, ordered from least to most severe.
///
/// The `Ord` derive is load-bearing: filtering and the alert threshold both
/// compare risk levels, so variant declaration order must stay
/// least-to-most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Stable wire name used in canonical serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Info => "info",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// The user or session an event is attributed to.
///
/// Absent entirely for events the system itself originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable user identifier.
    pub user_id: String,
    /// Session the operation ran under, if any.
    pub session_id: Option<String>,
}

/// One immutable record in the tamper-evident log.
///
/// Created exactly once by the integrity chain's `stamp` operation and never
/// mutated afterwards.  Modifying any field — including a single context
/// value — changes the canonical bytes and therefore invalidates
/// `chain_value` and every subsequent `prior_chain_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Globally unique identifier, assigned at creation, never reused.
    pub id: Uuid,

    /// Creation instant, clamped by the store so it never decreases as
    /// `sequence` increases.
    pub timestamp: DateTime<Utc>,

    /// Strictly increasing position in the store, the true ordering key.
    pub sequence: u64,

    /// What kind of operation this records.
    pub event_type: EventType,

    /// How the operation concluded.
    pub result: EventResult,

    /// Risk classification, used for filtering and alerting.
    pub risk_level: RiskLevel,

    /// Who performed the operation, when attributable.
    pub actor: Option<Actor>,

    /// Free-form operation metadata.  A `BTreeMap` so iteration order — and
    /// therefore canonical serialization — is deterministic.
    pub context: BTreeMap<String, String>,

    /// The `chain_value` of the immediately preceding event, or
    /// `GENESIS_CHAIN_VALUE` for the first event in a store.
    pub prior_chain_value: String,

    /// This event's own integrity tag: a keyed MAC over the canonical bytes
    /// and `prior_chain_value` (lowercase hex).
    pub chain_value: String,
}

impl AuditEvent {
    /// The sentinel `prior_chain_value` for the first event in every store.
    ///
    /// 64 hex zeros — a value a keyed MAC over real data can never produce,
    /// making genesis detection unambiguous.
    pub const GENESIS_CHAIN_VALUE: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// Serialize every MAC-covered field in the fixed canonical order.
    ///
    /// Excludes `prior_chain_value` and `chain_value`: the chain feeds the
    /// prior value into the MAC separately, and the tag cannot cover itself.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(&self.timestamp.timestamp_micros().to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        push_str(&mut buf, self.event_type.as_str());
        push_str(&mut buf, self.result.as_str());
        push_str(&mut buf, self.risk_level.as_str());
        match &self.actor {
            Some(actor) => {
                push_str(&mut buf, &actor.user_id);
                push_str(&mut buf, actor.session_id.as_deref().unwrap_or(""));
            }
            None => {
                push_str(&mut buf, "");
                push_str(&mut buf, "");
            }
        }
        for (key, value) in &self.context {
            push_str(&mut buf, key);
            push_str(&mut buf, value);
        }
        buf
    }
}

/// A partially constructed event: everything the caller decides, nothing the
/// store or chain assigns.
///
/// The store turns a `NewEvent` into an `AuditEvent` by assigning `id`,
/// `timestamp`, and `sequence` and having the chain stamp it.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub result: EventResult,
    pub risk_level: RiskLevel,
    pub actor: Option<Actor>,
    pub context: BTreeMap<String, String>,
}

impl NewEvent {
    /// Build a new event with empty context.
    pub fn new(event_type: EventType, result: EventResult, risk_level: RiskLevel) -> Self {
        Self {
            event_type,
            result,
            risk_level,
            actor: None,
            context: BTreeMap::new(),
        }
    }

    /// Attribute the event to a user, optionally with a session.
    pub fn with_actor(mut self, user_id: impl Into<String>, session_id: Option<String>) -> Self {
        self.actor = Some(Actor {
            user_id: user_id.into(),
            session_id,
        });
        self
    }

    /// Attach one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Append a length-prefixed UTF-8 string to the canonical buffer.
fn push_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}
