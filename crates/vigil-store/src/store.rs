//! The append-only store: the single serialization point of the engine.
//!
//! `append` assigns the next sequence number, stamps the event against the
//! current chain head, seals it, persists the envelope, and only then
//! advances the in-memory chain state.  The state is never persisted
//! separately — at startup it is re-derived from the newest stored
//! envelope, so a crash between persistence and state update loses nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use vigil_contracts::{
    AuditEvent, EncryptedEnvelope, EngineConfig, NewEvent, VigilError, VigilResult,
};
use vigil_crypto::{chain, EnvelopeCipher, KeySet};

use crate::alert::AlertNotifier;
use crate::storage::SegmentStorage;

/// Running chain state, owned exclusively by the append critical section.
struct ChainState {
    /// Sequence of the newest committed event; 0 when the store is empty.
    last_sequence: u64,
    /// `chain_value` of the newest committed event, or the genesis value.
    last_chain_value: String,
    /// Timestamp of the newest committed event — appends clamp to this so
    /// clock skew cannot reorder the chain.
    last_timestamp: DateTime<Utc>,
    /// Index of the segment currently accepting appends.
    active_segment: u64,
    /// Accumulated envelope bytes in the active segment.
    active_segment_bytes: usize,
}

/// Ordered, segmented persistence of encrypted envelopes.
///
/// # Thread safety
///
/// `append` is internally serialized behind a `Mutex` — chain-state
/// advancement is strictly sequential.  Reads go straight to storage and
/// proceed concurrently with appends and each other.
pub struct AuditStore {
    config: EngineConfig,
    keys: Arc<KeySet>,
    cipher: EnvelopeCipher,
    storage: Arc<dyn SegmentStorage>,
    notifier: Option<Arc<dyn AlertNotifier>>,
    state: Mutex<ChainState>,
}

impl AuditStore {
    /// Open a store over existing storage, recovering chain state from the
    /// newest persisted envelope (or genesis if the storage is empty).
    pub fn open(
        config: EngineConfig,
        keys: Arc<KeySet>,
        storage: Arc<dyn SegmentStorage>,
        notifier: Option<Arc<dyn AlertNotifier>>,
    ) -> VigilResult<Self> {
        config.validate()?;
        let cipher = EnvelopeCipher::new(keys.aead_key(), keys.version());

        let metas = storage.list_segments()?;
        let state = if metas.is_empty() {
            storage.create_segment(0)?;
            ChainState {
                last_sequence: 0,
                last_chain_value: AuditEvent::GENESIS_CHAIN_VALUE.to_string(),
                last_timestamp: DateTime::<Utc>::MIN_UTC,
                active_segment: 0,
                active_segment_bytes: 0,
            }
        } else {
            // The newest non-empty segment holds the chain head.
            let mut recovered = None;
            for meta in metas.iter().rev() {
                if meta.envelope_count > 0 {
                    let envelopes = storage.read_segment(meta.index)?;
                    let newest = envelopes.last().ok_or_else(|| VigilError::StorageFailure {
                        reason: format!("segment {} emptied during recovery", meta.index),
                    })?;
                    let event = cipher.open(newest)?;
                    recovered = Some((event.sequence, event.chain_value, event.timestamp));
                    break;
                }
            }
            let (last_sequence, last_chain_value, last_timestamp) = recovered.unwrap_or((
                0,
                AuditEvent::GENESIS_CHAIN_VALUE.to_string(),
                DateTime::<Utc>::MIN_UTC,
            ));

            // Resume the newest segment if it is still open; otherwise a
            // rotation completed just before shutdown and a fresh segment
            // is needed.
            let newest = metas.last().ok_or_else(|| VigilError::StorageFailure {
                reason: "segment listing emptied during recovery".to_string(),
            })?;
            let (active_segment, active_segment_bytes) = if newest.sealed {
                storage.create_segment(newest.index + 1)?;
                (newest.index + 1, 0)
            } else {
                let bytes: usize = storage
                    .read_segment(newest.index)?
                    .iter()
                    .map(EncryptedEnvelope::byte_size)
                    .sum();
                (newest.index, bytes)
            };

            info!(
                last_sequence,
                active_segment, "audit store recovered from persisted state"
            );

            ChainState {
                last_sequence,
                last_chain_value,
                last_timestamp,
                active_segment,
                active_segment_bytes,
            }
        };

        Ok(Self {
            config,
            keys,
            cipher,
            storage,
            notifier,
            state: Mutex::new(state),
        })
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stamp, seal, and persist one event; returns its sequence number.
    ///
    /// The chain state advances only after the envelope is durably
    /// persisted — any failure before that leaves the store exactly as it
    /// was.  After commit, events at or above the alert threshold are
    /// handed to the notifier; notifier failures are logged and swallowed.
    pub fn append(&self, new: NewEvent) -> VigilResult<u64> {
        let event = {
            let mut state = self.lock_state()?;

            let sequence = state.last_sequence + 1;
            let timestamp = Utc::now().max(state.last_timestamp);
            let event = chain::stamp(
                self.keys.chain_key(),
                new,
                timestamp,
                sequence,
                &state.last_chain_value,
            );
            let envelope = self.cipher.seal(&event)?;

            let size = envelope.byte_size();
            if state.active_segment_bytes > 0
                && state.active_segment_bytes + size > self.config.max_segment_bytes
            {
                self.rotate_locked(&mut state)?;
            }

            self.storage.append_envelope(state.active_segment, &envelope)?;

            state.last_sequence = sequence;
            state.last_chain_value = event.chain_value.clone();
            state.last_timestamp = timestamp;
            state.active_segment_bytes += size;

            event
        };

        debug!(
            sequence = event.sequence,
            event_type = event.event_type.as_str(),
            risk = event.risk_level.as_str(),
            "audit event appended"
        );

        if event.risk_level >= self.config.alert_threshold {
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify(&event) {
                    warn!(
                        sequence = event.sequence,
                        "alert notifier failed (append unaffected): {}", e
                    );
                }
            }
        }

        Ok(event.sequence)
    }

    /// Read envelopes with sequence numbers in `[from, to]`, ascending.
    pub fn read_range(&self, from: u64, to: u64) -> VigilResult<Vec<EncryptedEnvelope>> {
        let mut result = Vec::new();
        for meta in self.storage.list_segments()? {
            if meta.envelope_count == 0 {
                continue;
            }
            for envelope in self.storage.read_segment(meta.index)? {
                if envelope.sequence >= from && envelope.sequence <= to {
                    result.push(envelope);
                }
            }
        }
        Ok(result)
    }

    /// Read all envelopes from segments overlapping `[from, to]`,
    /// ascending by sequence.
    ///
    /// Envelope `created_at` carries the event's clamped timestamp, so
    /// segment overlap and the read side's post-verification trim use the
    /// same clock.  Deliberately returns the full contiguous run of every
    /// overlapping segment rather than trimming to the window: the read
    /// side needs an unbroken chain to verify linkage.
    pub fn read_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> VigilResult<Vec<EncryptedEnvelope>> {
        let mut result = Vec::new();
        for meta in self.storage.list_segments()? {
            if meta.envelope_count == 0 {
                continue;
            }
            let envelopes = self.storage.read_segment(meta.index)?;
            let (Some(oldest), Some(newest)) = (envelopes.first(), envelopes.last()) else {
                continue;
            };
            if newest.created_at < from || oldest.created_at > to {
                continue;
            }
            result.extend(envelopes);
        }
        Ok(result)
    }

    /// Seal the active segment and open a new one if the active segment
    /// has reached the rotation threshold.  Returns whether rotation
    /// happened.  `append` performs the same check internally.
    pub fn rotate_if_needed(&self) -> VigilResult<bool> {
        let mut state = self.lock_state()?;
        if state.active_segment_bytes >= self.config.max_segment_bytes {
            self.rotate_locked(&mut state)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Delete sealed segments whose newest envelope is older than the
    /// retention period.  Returns the deleted segment indexes.
    ///
    /// Only the segment being deleted is locked (inside the storage
    /// backend); appends to the active segment proceed unaffected.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> VigilResult<Vec<u64>> {
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let mut deleted = Vec::new();

        for meta in self.storage.list_segments()? {
            if !meta.sealed {
                continue;
            }
            let Some(newest) = meta.newest_created_at else {
                continue;
            };
            if newest < cutoff {
                self.storage.secure_delete_segment(meta.index)?;
                info!(
                    segment = meta.index,
                    "expired segment securely deleted by retention"
                );
                deleted.push(meta.index);
            }
        }
        Ok(deleted)
    }

    fn rotate_locked(&self, state: &mut MutexGuard<'_, ChainState>) -> VigilResult<()> {
        self.storage.seal_segment(state.active_segment)?;
        let next = state.active_segment + 1;
        self.storage.create_segment(next)?;
        info!(
            sealed = state.active_segment,
            opened = next,
            "segment rotated"
        );
        state.active_segment = next;
        state.active_segment_bytes = 0;
        Ok(())
    }

    fn lock_state(&self) -> VigilResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| VigilError::StorageFailure {
            reason: format!("store state lock poisoned: {}", e),
        })
    }
}
