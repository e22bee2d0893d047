//! Encrypted envelope — the only form in which events are ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated-encryption wrapper around one serialized `AuditEvent`.
///
/// One-to-one with an event; the store persists envelopes, never plaintext.
/// `sequence` and `key_version` are stored in the clear but bound into the
/// AEAD's associated data, so moving an envelope to a different position or
/// claiming a different key generation is detected on `open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Position of the enclosed event in the store.
    pub sequence: u64,

    /// Which derived key generation sealed this envelope.
    pub key_version: u32,

    /// 96-bit AEAD nonce, unique per envelope under a given key.
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,

    /// Ciphertext with the authentication tag appended.
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,

    /// Timestamp of the contained event, copied out so segment selection
    /// and retention can see it without decrypting.
    pub created_at: DateTime<Utc>,
}

impl EncryptedEnvelope {
    /// Approximate persisted size in bytes, used for segment rotation
    /// accounting.
    pub fn byte_size(&self) -> usize {
        // Fixed fields plus the two variable-length byte strings.
        8 + 4 + 8 + self.nonce.len() + self.ciphertext.len()
    }
}

/// Serde adapter storing byte fields as lowercase hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
