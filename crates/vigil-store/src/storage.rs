//! Segment storage abstraction and the in-memory reference backend.
//!
//! The engine owns segmentation logic; a `SegmentStorage` implementation
//! only needs to persist envelopes durably, in order, per segment.  Every
//! append must be atomic — a crashed write must never surface later as a
//! valid envelope.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use vigil_contracts::{EncryptedEnvelope, VigilError, VigilResult};

/// Bookkeeping the store needs about one persisted segment.
#[derive(Debug, Clone)]
pub struct SegmentMeta {
    /// Monotonically increasing segment index.
    pub index: u64,
    /// Sealed segments are immutable and eligible for retention deletion.
    pub sealed: bool,
    /// Number of envelopes currently in the segment.
    pub envelope_count: usize,
    /// `created_at` of the newest envelope, if any — drives retention.
    pub newest_created_at: Option<DateTime<Utc>>,
}

/// Durable, ordered, per-segment envelope persistence.
///
/// Implementations must keep envelopes in append order within a segment
/// and must make `append_envelope` atomic: after a crash, a partially
/// written envelope is either absent or ignored, never returned by
/// `read_segment`.
pub trait SegmentStorage: Send + Sync {
    /// Create an empty, unsealed segment with the given index.
    fn create_segment(&self, index: u64) -> VigilResult<()>;

    /// Append one envelope to an unsealed segment.
    fn append_envelope(&self, index: u64, envelope: &EncryptedEnvelope) -> VigilResult<()>;

    /// Read a segment's envelopes in append order.
    fn read_segment(&self, index: u64) -> VigilResult<Vec<EncryptedEnvelope>>;

    /// List all segments in ascending index order.
    fn list_segments(&self) -> VigilResult<Vec<SegmentMeta>>;

    /// Mark a segment immutable.  Appending to it afterwards is an error.
    fn seal_segment(&self, index: u64) -> VigilResult<()>;

    /// Irreversibly destroy a segment with secure-erase semantics
    /// (overwrite, then delete).
    fn secure_delete_segment(&self, index: u64) -> VigilResult<()>;
}

// ── In-memory backend ─────────────────────────────────────────────────────────

struct MemorySegment {
    sealed: bool,
    envelopes: Vec<EncryptedEnvelope>,
}

/// The in-memory reference backend.
///
/// Keeps all segments behind one `RwLock`, so readers proceed concurrently
/// with each other while appends take the write lock briefly.  Used by
/// tests and by hosts that persist elsewhere and only need the engine's
/// integrity semantics.
pub struct MemoryStorage {
    segments: RwLock<BTreeMap<u64, MemorySegment>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(BTreeMap::new()),
        }
    }

    /// Flip one ciphertext byte of the envelope at `sequence`.
    ///
    /// Returns `true` if the envelope was found.  Simulates storage-level
    /// corruption for tamper-detection tests; not part of the storage
    /// contract.
    #[doc(hidden)]
    pub fn tamper_ciphertext(&self, sequence: u64) -> bool {
        let mut segments = self.segments.write().expect("storage lock poisoned");
        for segment in segments.values_mut() {
            for envelope in &mut segment.envelopes {
                if envelope.sequence == sequence {
                    envelope.ciphertext[0] ^= 0x01;
                    return true;
                }
            }
        }
        false
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStorage for MemoryStorage {
    fn create_segment(&self, index: u64) -> VigilResult<()> {
        let mut segments = lock_write(&self.segments)?;
        if segments.contains_key(&index) {
            return Err(VigilError::StorageFailure {
                reason: format!("segment {} already exists", index),
            });
        }
        segments.insert(
            index,
            MemorySegment {
                sealed: false,
                envelopes: Vec::new(),
            },
        );
        Ok(())
    }

    fn append_envelope(&self, index: u64, envelope: &EncryptedEnvelope) -> VigilResult<()> {
        let mut segments = lock_write(&self.segments)?;
        let segment = segments.get_mut(&index).ok_or_else(|| missing(index))?;
        if segment.sealed {
            return Err(VigilError::StorageFailure {
                reason: format!("segment {} is sealed", index),
            });
        }
        segment.envelopes.push(envelope.clone());
        Ok(())
    }

    fn read_segment(&self, index: u64) -> VigilResult<Vec<EncryptedEnvelope>> {
        let segments = lock_read(&self.segments)?;
        let segment = segments.get(&index).ok_or_else(|| missing(index))?;
        Ok(segment.envelopes.clone())
    }

    fn list_segments(&self) -> VigilResult<Vec<SegmentMeta>> {
        let segments = lock_read(&self.segments)?;
        Ok(segments
            .iter()
            .map(|(&index, segment)| SegmentMeta {
                index,
                sealed: segment.sealed,
                envelope_count: segment.envelopes.len(),
                newest_created_at: segment.envelopes.last().map(|e| e.created_at),
            })
            .collect())
    }

    fn seal_segment(&self, index: u64) -> VigilResult<()> {
        let mut segments = lock_write(&self.segments)?;
        let segment = segments.get_mut(&index).ok_or_else(|| missing(index))?;
        segment.sealed = true;
        Ok(())
    }

    fn secure_delete_segment(&self, index: u64) -> VigilResult<()> {
        let mut segments = lock_write(&self.segments)?;
        let mut segment = segments.remove(&index).ok_or_else(|| missing(index))?;
        // Overwrite before dropping so the ciphertext does not linger in
        // freed allocations.
        for envelope in &mut segment.envelopes {
            envelope.ciphertext.fill(0);
            envelope.nonce.fill(0);
        }
        Ok(())
    }
}

fn missing(index: u64) -> VigilError {
    VigilError::StorageFailure {
        reason: format!("segment {} does not exist", index),
    }
}

fn lock_read<T>(lock: &RwLock<T>) -> VigilResult<std::sync::RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| VigilError::StorageFailure {
        reason: format!("storage lock poisoned: {}", e),
    })
}

fn lock_write<T>(lock: &RwLock<T>) -> VigilResult<std::sync::RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| VigilError::StorageFailure {
        reason: format!("storage lock poisoned: {}", e),
    })
}
