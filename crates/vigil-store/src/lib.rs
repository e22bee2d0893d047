//! # vigil-store
//!
//! Append-only segmented persistence for the vigil audit engine.
//!
//! ## Overview
//!
//! `AuditStore` is the single serialization point: it assigns sequence
//! numbers, stamps events into the integrity chain, seals them into AEAD
//! envelopes, and persists them through a pluggable `SegmentStorage`
//! backend.  Segments rotate at a configured byte threshold; sealed
//! segments age out under the retention policy via secure deletion.
//! High-risk events are handed to an `AlertNotifier` synchronously after
//! commit.  `AuditRecorder` is the typed, caller-facing construction
//! surface.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_store::{AuditRecorder, AuditStore, MemoryStorage};
//!
//! let store = Arc::new(AuditStore::open(config, keys, storage, None)?);
//! let recorder = AuditRecorder::new(store.clone());
//! recorder.record_authentication("user-1", None, EventResult::Success,
//!                                RiskLevel::Info, BTreeMap::new())?;
//! ```

pub mod alert;
pub mod file;
pub mod recorder;
pub mod storage;
pub mod store;

pub use alert::AlertNotifier;
pub use file::FileStorage;
pub use recorder::{AuditRecorder, CredentialOp, KeyOp, SecurityIncident};
pub use storage::{MemoryStorage, SegmentMeta, SegmentStorage};
pub use store::AuditStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use chrono::{Duration, Utc};

    use vigil_contracts::{
        AuditEvent, EngineConfig, EventResult, EventType, NewEvent, RiskLevel, VigilError,
    };
    use vigil_crypto::{chain, EnvelopeCipher, KeySet, StaticSecretProvider};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn test_keys() -> Arc<KeySet> {
        let provider = StaticSecretProvider::new(vec![0x5Au8; 32]);
        Arc::new(KeySet::derive(&provider, 1).unwrap())
    }

    fn test_config() -> EngineConfig {
        EngineConfig::default()
    }

    fn open_store(
        config: EngineConfig,
        storage: Arc<MemoryStorage>,
        notifier: Option<Arc<dyn AlertNotifier>>,
    ) -> Arc<AuditStore> {
        Arc::new(AuditStore::open(config, test_keys(), storage, notifier).unwrap())
    }

    fn low_risk_event(detail: &str) -> NewEvent {
        NewEvent::new(
            EventType::CredentialAccessed,
            EventResult::Success,
            RiskLevel::Low,
        )
        .with_actor("user-1", None)
        .with_context("operation", detail)
    }

    fn decrypt_all(store: &AuditStore, keys: &KeySet) -> Vec<AuditEvent> {
        let cipher = EnvelopeCipher::new(keys.aead_key(), keys.version());
        store
            .read_range(0, u64::MAX)
            .unwrap()
            .iter()
            .map(|envelope| cipher.open(envelope).unwrap())
            .collect()
    }

    /// Notifier that records the sequence of every event it sees.
    struct RecordingNotifier {
        seen: Mutex<Vec<u64>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl AlertNotifier for RecordingNotifier {
        fn notify(&self, event: &AuditEvent) -> vigil_contracts::VigilResult<()> {
            self.seen.lock().unwrap().push(event.sequence);
            Ok(())
        }
    }

    /// Notifier that always fails.
    struct FailingNotifier;

    impl AlertNotifier for FailingNotifier {
        fn notify(&self, _event: &AuditEvent) -> vigil_contracts::VigilResult<()> {
            Err(VigilError::StorageFailure {
                reason: "notifier unavailable".to_string(),
            })
        }
    }

    // ── Append & sequencing ───────────────────────────────────────────────────

    /// Sequences start at 1 and increase by exactly one.
    #[test]
    fn append_assigns_contiguous_sequences() {
        let store = open_store(test_config(), Arc::new(MemoryStorage::new()), None);
        for expected in 1..=5 {
            let seq = store.append(low_risk_event("op")).unwrap();
            assert_eq!(seq, expected);
        }
    }

    /// K threads × M events yield K×M distinct, contiguous sequences.
    #[test]
    fn concurrent_appends_yield_contiguous_sequences() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 25;

        let store = open_store(test_config(), Arc::new(MemoryStorage::new()), None);

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            store
                                .append(low_risk_event(&format!("t{}-{}", t, i)))
                                .unwrap()
                        })
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut sequences: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        sequences.sort_unstable();

        let expected: Vec<u64> = (1..=(THREADS * PER_THREAD) as u64).collect();
        assert_eq!(sequences, expected, "no gaps, no duplicates");

        // The persisted chain must also verify end to end.
        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        assert!(chain::verify_chain(keys.chain_key(), &events));
    }

    /// Timestamps never decrease as sequences increase.
    #[test]
    fn timestamps_are_non_decreasing() {
        let store = open_store(test_config(), Arc::new(MemoryStorage::new()), None);
        for _ in 0..10 {
            store.append(low_risk_event("op")).unwrap();
        }
        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    // ── Rotation ──────────────────────────────────────────────────────────────

    /// Exceeding the segment byte threshold seals the segment and opens a
    /// new one; reads span the boundary with no duplicates or omissions.
    #[test]
    fn rotation_is_transparent_to_reads() {
        let storage = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            max_segment_bytes: 700,
            ..EngineConfig::default()
        };
        let store = open_store(config, storage.clone(), None);

        for _ in 0..8 {
            store.append(low_risk_event("rotation-filler")).unwrap();
        }

        let metas = storage.list_segments().unwrap();
        assert!(metas.len() >= 2, "expected at least one rotation");
        assert!(metas[0].sealed, "rotated-out segment must be sealed");
        assert!(!metas.last().unwrap().sealed, "active segment stays open");

        let envelopes = store.read_range(0, u64::MAX).unwrap();
        let sequences: Vec<u64> = envelopes.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());

        // The chain must verify across the segment boundary.
        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        assert!(chain::verify_chain(keys.chain_key(), &events));
    }

    /// An explicit `rotate_if_needed` call seals an over-threshold active
    /// segment without requiring another append.
    #[test]
    fn rotate_if_needed_seals_full_segment() {
        let storage = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            max_segment_bytes: 64,
            ..EngineConfig::default()
        };
        let store = open_store(config, storage.clone(), None);

        store.append(low_risk_event("oversized")).unwrap();
        assert!(store.rotate_if_needed().unwrap());
        assert!(!store.rotate_if_needed().unwrap(), "fresh segment is empty");

        let metas = storage.list_segments().unwrap();
        assert_eq!(metas.len(), 2);
        assert!(metas[0].sealed);
        assert!(!metas[1].sealed);
    }

    /// A sealed segment refuses further appends at the storage level.
    #[test]
    fn sealed_segment_rejects_appends() {
        let storage = MemoryStorage::new();
        storage.create_segment(0).unwrap();
        storage.seal_segment(0).unwrap();

        let envelope = vigil_contracts::EncryptedEnvelope {
            sequence: 1,
            key_version: 1,
            nonce: vec![0; 12],
            ciphertext: vec![0; 16],
            created_at: Utc::now(),
        };
        assert!(matches!(
            storage.append_envelope(0, &envelope),
            Err(VigilError::StorageFailure { .. })
        ));
    }

    // ── Recovery ──────────────────────────────────────────────────────────────

    /// Reopening over existing storage resumes the chain exactly where it
    /// left off.
    #[test]
    fn reopen_resumes_chain_state() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = open_store(test_config(), storage.clone(), None);
            for _ in 0..3 {
                store.append(low_risk_event("before-restart")).unwrap();
            }
        }

        let store = open_store(test_config(), storage, None);
        let seq = store.append(low_risk_event("after-restart")).unwrap();
        assert_eq!(seq, 4, "sequence continues across restart");

        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        assert_eq!(events.len(), 4);
        assert!(
            chain::verify_chain(keys.chain_key(), &events),
            "chain links across the restart boundary"
        );
    }

    /// After a backward clock step, appends clamp to the chain head's
    /// timestamp; time-window reads must still cover those events.
    #[test]
    fn read_window_covers_clock_skewed_events() {
        let storage = Arc::new(MemoryStorage::new());
        let keys = test_keys();
        let cipher = EnvelopeCipher::new(keys.aead_key(), keys.version());

        // Chain head stamped while the clock ran three hours fast.
        let ahead = Utc::now() + Duration::hours(3);
        let head = chain::stamp(
            keys.chain_key(),
            low_risk_event("fast-clock"),
            ahead,
            1,
            AuditEvent::GENESIS_CHAIN_VALUE,
        );
        storage.create_segment(0).unwrap();
        storage
            .append_envelope(0, &cipher.seal(&head).unwrap())
            .unwrap();

        // The clock has since stepped back; this append clamps to the head.
        let store = open_store(test_config(), storage, None);
        assert_eq!(store.append(low_risk_event("after-step")).unwrap(), 2);

        let window = store
            .read_window(ahead - Duration::hours(1), ahead + Duration::hours(1))
            .unwrap();
        let sequences: Vec<u64> = window.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2], "clamped events stay in their window");
    }

    // ── Retention ─────────────────────────────────────────────────────────────

    /// Purge deletes sealed segments past retention and leaves the active
    /// segment readable and verifiable.
    #[test]
    fn purge_deletes_only_expired_sealed_segments() {
        let storage = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            max_segment_bytes: 700,
            ..EngineConfig::default()
        };
        let retention_days = config.retention_days;
        let store = open_store(config, storage.clone(), None);

        for _ in 0..8 {
            store.append(low_risk_event("rotation-filler")).unwrap();
        }
        let sealed_before = storage
            .list_segments()
            .unwrap()
            .iter()
            .filter(|m| m.sealed)
            .count();
        assert!(sealed_before >= 1);

        // Within retention: nothing deleted.
        assert!(store.purge_expired(Utc::now()).unwrap().is_empty());

        // Far future: every sealed segment has aged out.
        let later = Utc::now() + Duration::days(i64::from(retention_days) + 1);
        let deleted = store.purge_expired(later).unwrap();
        assert_eq!(deleted.len(), sealed_before);

        // The active segment survives and still verifies.
        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        assert!(!events.is_empty());
        let first = &events[0];
        assert!(chain::verify(
            keys.chain_key(),
            first,
            &first.prior_chain_value
        ));

        // Purged events are gone for good.
        let all: Vec<u64> = store
            .read_range(0, u64::MAX)
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert!(all[0] > 1, "oldest events were purged");
    }

    /// A retention period below the floor is rejected when opening.
    #[test]
    fn open_rejects_retention_below_floor() {
        let config = EngineConfig {
            retention_days: 30,
            ..EngineConfig::default()
        };
        let result = AuditStore::open(
            config,
            test_keys(),
            Arc::new(MemoryStorage::new()),
            None,
        );
        assert!(matches!(
            result,
            Err(VigilError::RetentionViolation { .. })
        ));
    }

    // ── Alerting ──────────────────────────────────────────────────────────────

    /// Risk levels [info, low, high, info, critical] trigger alerts for
    /// sequences 3 and 5 exactly.
    #[test]
    fn alerts_fire_for_high_and_critical_only() {
        let notifier = RecordingNotifier::new();
        let store = open_store(
            test_config(),
            Arc::new(MemoryStorage::new()),
            Some(notifier.clone()),
        );

        let risks = [
            RiskLevel::Info,
            RiskLevel::Low,
            RiskLevel::High,
            RiskLevel::Info,
            RiskLevel::Critical,
        ];
        for risk in risks {
            let new = NewEvent::new(EventType::DataAccess, EventResult::Success, risk)
                .with_actor("user-1", None);
            store.append(new).unwrap();
        }

        assert_eq!(*notifier.seen.lock().unwrap(), vec![3, 5]);
    }

    /// A failing notifier never fails the append.
    #[test]
    fn notifier_failure_does_not_fail_append() {
        let store = open_store(
            test_config(),
            Arc::new(MemoryStorage::new()),
            Some(Arc::new(FailingNotifier)),
        );
        let new = NewEvent::new(
            EventType::SecurityViolation,
            EventResult::Denied,
            RiskLevel::Critical,
        );
        assert_eq!(store.append(new).unwrap(), 1);
    }

    // ── Recorder ──────────────────────────────────────────────────────────────

    /// Each recorder category maps to the expected event type.
    #[test]
    fn recorder_maps_categories_to_event_types() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open_store(test_config(), storage, None);
        let recorder = AuditRecorder::new(store.clone());

        recorder
            .record_authentication(
                "alice",
                Some("session-1".to_string()),
                EventResult::Success,
                RiskLevel::Info,
                BTreeMap::new(),
            )
            .unwrap();
        recorder
            .record_authentication(
                "alice",
                None,
                EventResult::Failure,
                RiskLevel::Medium,
                BTreeMap::new(),
            )
            .unwrap();
        recorder
            .record_credential_event(
                CredentialOp::Deleted,
                "alice",
                EventResult::Success,
                RiskLevel::Medium,
                BTreeMap::new(),
            )
            .unwrap();
        recorder
            .record_key_event(
                KeyOp::Generated,
                "alice",
                EventResult::Success,
                RiskLevel::Low,
                BTreeMap::new(),
            )
            .unwrap();
        recorder
            .record_data_access("alice", "vault/item-9", EventResult::Denied, RiskLevel::Medium)
            .unwrap();
        recorder
            .record_system_event("retention sweep", EventResult::Success, RiskLevel::Info)
            .unwrap();

        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::AuthenticationSuccess,
                EventType::AuthenticationFailure,
                EventType::CredentialDeleted,
                EventType::KeyGenerated,
                EventType::DataAccess,
                EventType::SystemEvent,
            ]
        );

        // System events carry no actor.
        assert!(events[5].actor.is_none());
        // Data access records the resource in context.
        assert_eq!(
            events[4].context.get("resource").map(String::as_str),
            Some("vault/item-9")
        );
    }

    /// Context keys announcing secrets are rejected before anything is
    /// persisted.
    #[test]
    fn recorder_rejects_denied_context_keys() {
        let store = open_store(test_config(), Arc::new(MemoryStorage::new()), None);
        let recorder = AuditRecorder::new(store.clone());

        let mut context = BTreeMap::new();
        context.insert("Password".to_string(), "hunter2".to_string());
        let result = recorder.record_authentication(
            "alice",
            None,
            EventResult::Success,
            RiskLevel::Info,
            context,
        );
        assert!(matches!(result, Err(VigilError::ConfigError { .. })));
        assert!(store.read_range(0, u64::MAX).unwrap().is_empty());
    }

    // ── File storage ──────────────────────────────────────────────────────────

    /// Events persisted to files survive a full reopen.
    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
            let store =
                Arc::new(AuditStore::open(test_config(), test_keys(), storage, None).unwrap());
            for _ in 0..3 {
                store.append(low_risk_event("on-disk")).unwrap();
            }
        }

        let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
        let store = Arc::new(AuditStore::open(test_config(), test_keys(), storage, None).unwrap());
        assert_eq!(store.append(low_risk_event("after")).unwrap(), 4);

        let keys = test_keys();
        let events = decrypt_all(&store, &keys);
        assert_eq!(events.len(), 4);
        assert!(chain::verify_chain(keys.chain_key(), &events));
    }

    /// A torn final line (crashed append) is discarded, not surfaced.
    #[test]
    fn file_storage_discards_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.create_segment(0).unwrap();

        let envelope = vigil_contracts::EncryptedEnvelope {
            sequence: 1,
            key_version: 1,
            nonce: vec![1; 12],
            ciphertext: vec![2; 16],
            created_at: Utc::now(),
        };
        storage.append_envelope(0, &envelope).unwrap();

        // Simulate a crash mid-append: half a JSON object, no newline.
        let path = dir.path().join("segment-00000000.jsonl");
        let mut contents = std::fs::read_to_string(&path).unwrap();
        contents.push_str("{\"sequence\":2,\"key_ver");
        std::fs::write(&path, contents).unwrap();

        let envelopes = storage.read_segment(0).unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].sequence, 1);
    }

    /// Secure deletion removes the segment file entirely.
    #[test]
    fn file_storage_secure_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.create_segment(0).unwrap();

        let envelope = vigil_contracts::EncryptedEnvelope {
            sequence: 1,
            key_version: 1,
            nonce: vec![1; 12],
            ciphertext: vec![2; 64],
            created_at: Utc::now(),
        };
        storage.append_envelope(0, &envelope).unwrap();
        storage.seal_segment(0).unwrap();

        storage.secure_delete_segment(0).unwrap();
        assert!(!dir.path().join("segment-00000000.jsonl").exists());
        assert!(!dir.path().join("segment-00000000.sealed").exists());
        assert!(storage.list_segments().unwrap().is_empty());
    }
}
