//! AEAD envelope: seals stamped events into opaque ciphertext records.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per envelope.  The
//! envelope's `sequence` and `key_version` are bound in as associated
//! data, so an envelope cannot be moved to another position in the store
//! or re-labelled to a different key generation without failing
//! authentication on `open`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use vigil_contracts::{AuditEvent, EncryptedEnvelope, VigilError, VigilResult};

const NONCE_SIZE: usize = 12; // 96 bits for AES-GCM

/// Seals and opens `EncryptedEnvelope`s under one key version.
pub struct EnvelopeCipher {
    cipher: Aes256Gcm,
    key_version: u32,
}

impl EnvelopeCipher {
    /// Build a cipher from a derived AEAD key and its version.
    pub fn new(aead_key: &[u8; 32], key_version: u32) -> Self {
        Self {
            cipher: Aes256Gcm::new(aead_key.into()),
            key_version,
        }
    }

    /// Encrypt a stamped event into an envelope.
    ///
    /// The envelope's `created_at` is the event's own timestamp, so segment
    /// time ranges, retention cutoffs, and query windows all see the one
    /// clock the chain ordered events by.
    ///
    /// Fails with `EncryptionFailure` if serialization or encryption fails;
    /// nothing partial is ever returned.
    pub fn seal(&self, event: &AuditEvent) -> VigilResult<EncryptedEnvelope> {
        let plaintext =
            serde_json::to_vec(event).map_err(|e| VigilError::EncryptionFailure {
                reason: format!("event serialization failed: {}", e),
            })?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let aad = associated_data(event.sequence, self.key_version);
        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| VigilError::EncryptionFailure {
                reason: format!("AEAD seal failed: {}", e),
            })?;

        Ok(EncryptedEnvelope {
            sequence: event.sequence,
            key_version: self.key_version,
            nonce: nonce_bytes.to_vec(),
            ciphertext,
            created_at: event.timestamp,
        })
    }

    /// Decrypt and authenticate an envelope back into its event.
    ///
    /// Fails closed: any authentication failure — corrupted ciphertext, a
    /// moved sequence number, a re-labelled key version — returns
    /// `TamperDetected` and never partially decrypted data.
    pub fn open(&self, envelope: &EncryptedEnvelope) -> VigilResult<AuditEvent> {
        if envelope.key_version != self.key_version {
            return Err(VigilError::EncryptionFailure {
                reason: format!(
                    "envelope sealed with key version {}, cipher holds version {}",
                    envelope.key_version, self.key_version
                ),
            });
        }
        if envelope.nonce.len() != NONCE_SIZE {
            return Err(VigilError::TamperDetected {
                sequence: envelope.sequence,
                reason: format!("nonce has {} bytes, expected {}", envelope.nonce.len(), NONCE_SIZE),
            });
        }

        let nonce = Nonce::from_slice(&envelope.nonce);
        let aad = associated_data(envelope.sequence, envelope.key_version);
        let plaintext = self
            .cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &envelope.ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| VigilError::TamperDetected {
                sequence: envelope.sequence,
                reason: "envelope authentication failed".to_string(),
            })?;

        let event: AuditEvent =
            serde_json::from_slice(&plaintext).map_err(|e| VigilError::TamperDetected {
                sequence: envelope.sequence,
                reason: format!("authenticated plaintext is not a valid event: {}", e),
            })?;

        if event.sequence != envelope.sequence {
            return Err(VigilError::TamperDetected {
                sequence: envelope.sequence,
                reason: format!(
                    "envelope claims sequence {} but event carries {}",
                    envelope.sequence, event.sequence
                ),
            });
        }

        Ok(event)
    }
}

/// Associated data binding an envelope to its position and key generation.
fn associated_data(sequence: u64, key_version: u32) -> [u8; 12] {
    let mut aad = [0u8; 12];
    aad[..8].copy_from_slice(&sequence.to_le_bytes());
    aad[8..].copy_from_slice(&key_version.to_le_bytes());
    aad
}
