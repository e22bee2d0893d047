//! # vigil-crypto
//!
//! Key derivation, integrity chain, and encryption envelope for the vigil
//! audit engine.
//!
//! ## Overview
//!
//! Three independent 256-bit keys are derived per version from a
//! device-protected root secret (`KeySet::derive`).  The chain key stamps
//! each event with an HMAC-SHA256 tag bound to the previous event
//! (`chain::stamp`), the AEAD key seals stamped events into opaque
//! envelopes (`EnvelopeCipher::seal`), and the report key signs compliance
//! exports.  Tampering with any sealed envelope or any stamped event is
//! detected on the read path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_crypto::{chain, EnvelopeCipher, KeySet, StaticSecretProvider};
//!
//! let provider = StaticSecretProvider::new([7u8; 32]);
//! let keys = KeySet::derive(&provider, 1)?;
//! let cipher = EnvelopeCipher::new(keys.aead_key(), keys.version());
//!
//! let event = chain::stamp(keys.chain_key(), new_event, now, 0, genesis);
//! let envelope = cipher.seal(&event)?;
//! assert_eq!(cipher.open(&envelope)?, event);
//! ```

pub mod chain;
pub mod envelope;
pub mod keys;

pub use envelope::EnvelopeCipher;
pub use keys::{KeySet, RootSecretProvider, StaticSecretProvider};

// ── Tests ─────────────────────────────────────────────────────────────────────
