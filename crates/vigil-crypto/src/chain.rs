//! Integrity chain: keyed-MAC stamping and chain verification.
//!
//! Every event's `chain_value` is an HMAC-SHA256 over its canonical bytes
//! concatenated with the previous event's `chain_value`, keyed with the
//! chain key.  An attacker without the key cannot forge a valid tag, and
//! modifying any stored event breaks its own tag and every later link.
//!
//! MAC input layout (bytes, in order):
//!   1. canonical bytes of the event (see `AuditEvent::canonical_bytes`)
//!   2. prior chain value as UTF-8 bytes (64 ASCII hex chars)

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use vigil_contracts::{AuditEvent, NewEvent};

type HmacSha256 = Hmac<Sha256>;

/// Compute the chain value for an already-populated event.
///
/// Covers the event's canonical bytes and `prior` — not the stored
/// `prior_chain_value` field, so verification can supply an independently
/// tracked expectation.
///
/// Returns a lowercase 64-character hex string.
pub fn chain_value(chain_key: &[u8; 32], event: &AuditEvent, prior: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(chain_key).expect("HMAC accepts any key size");
    mac.update(&event.canonical_bytes());
    mac.update(prior.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Create and stamp the next event in the chain.
///
/// This is the single place `AuditEvent`s come into existence: the store
/// supplies the fields it owns (`timestamp`, `sequence`, the current chain
/// head as `prior`), the caller's `NewEvent` supplies the rest, and a fresh
/// `id` is assigned here.
pub fn stamp(
    chain_key: &[u8; 32],
    new: NewEvent,
    timestamp: DateTime<Utc>,
    sequence: u64,
    prior: &str,
) -> AuditEvent {
    let mut event = AuditEvent {
        id: Uuid::new_v4(),
        timestamp,
        sequence,
        event_type: new.event_type,
        result: new.result,
        risk_level: new.risk_level,
        actor: new.actor,
        context: new.context,
        prior_chain_value: prior.to_string(),
        chain_value: String::new(),
    };
    event.chain_value = chain_value(chain_key, &event, prior);
    event
}

/// Verify one event's tag against an independently tracked prior value.
///
/// Recomputes the MAC and compares in constant time.  Returns `false` on
/// any mismatch, including a malformed stored tag.
pub fn verify(chain_key: &[u8; 32], event: &AuditEvent, expected_prior: &str) -> bool {
    if event.prior_chain_value != expected_prior {
        return false;
    }
    let recomputed = chain_value(chain_key, event, expected_prior);
    let (Ok(stored), Ok(fresh)) = (hex::decode(&event.chain_value), hex::decode(&recomputed))
    else {
        return false;
    };
    stored.ct_eq(&fresh).into()
}

/// Verify the integrity of a complete chain starting at genesis.
///
/// Returns `true` when both rules hold for every event:
///
/// 1. **Linkage** — each event's `prior_chain_value` equals the
///    `chain_value` of the preceding event (or `GENESIS_CHAIN_VALUE` for
///    the first).
/// 2. **Tag correctness** — each event's `chain_value` matches the value
///    recomputed from its own canonical bytes.
///
/// Returns `false` the moment any mismatch is detected.  An empty chain is
/// defined as valid.
pub fn verify_chain(chain_key: &[u8; 32], events: &[AuditEvent]) -> bool {
    let mut expected_prior = AuditEvent::GENESIS_CHAIN_VALUE.to_string();

    for event in events {
        if !verify(chain_key, event, &expected_prior) {
            return false;
        }
        expected_prior = event.chain_value.clone();
    }

    true
}
