//! Error types for the vigil audit engine.
//!
//! All fallible operations across the vigil crates return `VigilResult<T>`.
//! Error variants carry enough context to produce actionable diagnostics
//! without ever embedding key material or plaintext event content.

use thiserror::Error;

/// The unified error type for the vigil audit engine.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Chain or envelope verification failed on read.
    ///
    /// Fatal for the affected range — the caller must treat this as a
    /// security incident, not a transient fault.
    #[error("tamper detected at sequence {sequence}: {reason}")]
    TamperDetected { sequence: u64, reason: String },

    /// Encryption could not be performed at write time.
    ///
    /// Nothing was persisted and the chain state did not advance.
    #[error("encryption failure: {reason}")]
    EncryptionFailure { reason: String },

    /// The underlying persistence substrate failed.
    #[error("storage failure: {reason}")]
    StorageFailure { reason: String },

    /// A retention period below the compliance floor was requested.
    #[error("retention of {requested_days} days is below the compliance floor of {floor_days}")]
    RetentionViolation {
        requested_days: u32,
        floor_days: u32,
    },

    /// A previously generated compliance report failed tag verification.
    #[error("export integrity failure: {reason}")]
    ExportIntegrityFailure { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the vigil crates.
pub type VigilResult<T> = Result<T, VigilError>;
