//! Key material: root-secret capability and versioned key derivation.
//!
//! The engine never generates or stores the root secret itself — a
//! `RootSecretProvider` supplies it (OS keystore, HSM, or a
//! software-protected equivalent).  From that root, HKDF-SHA256 derives
//! three independent 256-bit keys per version: one for the integrity chain
//! MAC, one for the AEAD envelope, one for signing compliance reports.
//! The version is baked into each derivation's info string, so rotating to
//! a new version yields entirely unrelated keys while old envelopes remain
//! openable with their recorded version.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vigil_contracts::{VigilError, VigilResult};

/// Capability interface supplying the device-protected root secret.
///
/// Implementations decide where the secret lives; the engine only requires
/// that the same installation always returns the same bytes.
pub trait RootSecretProvider: Send + Sync {
    /// Return the root secret bytes.  Must be at least 16 bytes.
    fn provide_root_secret(&self) -> VigilResult<Vec<u8>>;
}

/// A `RootSecretProvider` holding the secret in process memory.
///
/// Suitable for tests and for hosts that already unwrap the secret from a
/// platform keystore before constructing the engine.
pub struct StaticSecretProvider {
    secret: Vec<u8>,
}

impl StaticSecretProvider {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl Drop for StaticSecretProvider {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl RootSecretProvider for StaticSecretProvider {
    fn provide_root_secret(&self) -> VigilResult<Vec<u8>> {
        if self.secret.len() < 16 {
            return Err(VigilError::EncryptionFailure {
                reason: "root secret must be at least 16 bytes".to_string(),
            });
        }
        Ok(self.secret.clone())
    }
}

/// The three derived keys for one key version.
///
/// Chain, envelope, and report keys are cryptographically independent: a
/// compromise of one derivation does not reveal the others.  All key bytes
/// are zeroized when the set is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeySet {
    #[zeroize(skip)]
    version: u32,
    chain_key: [u8; 32],
    aead_key: [u8; 32],
    report_key: [u8; 32],
}

impl KeySet {
    /// Derive the key set for `version` from the provider's root secret.
    pub fn derive(provider: &dyn RootSecretProvider, version: u32) -> VigilResult<Self> {
        let mut root = provider.provide_root_secret()?;
        let hk = Hkdf::<Sha256>::new(None, &root);
        root.zeroize();

        let chain_key = expand(&hk, &format!("vigil/v{}/chain", version))?;
        let aead_key = expand(&hk, &format!("vigil/v{}/aead", version))?;
        let report_key = expand(&hk, &format!("vigil/v{}/report", version))?;

        Ok(Self {
            version,
            chain_key,
            aead_key,
            report_key,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn chain_key(&self) -> &[u8; 32] {
        &self.chain_key
    }

    pub fn aead_key(&self) -> &[u8; 32] {
        &self.aead_key
    }

    pub fn report_key(&self) -> &[u8; 32] {
        &self.report_key
    }
}

/// Expand one labelled 256-bit key from the HKDF PRK.
fn expand(hk: &Hkdf<Sha256>, info: &str) -> VigilResult<[u8; 32]> {
    let mut okm = [0u8; 32];
    hk.expand(info.as_bytes(), &mut okm)
        .map_err(|e| VigilError::EncryptionFailure {
            reason: format!("hkdf expand failed for '{}': {:?}", info, e),
        })?;
    Ok(okm)
}
