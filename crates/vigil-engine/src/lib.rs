//! # vigil-engine
//!
//! Read side and facade of the vigil audit engine: the query/filter
//! engine, the compliance export engine, and the constructed `AuditEngine`
//! that owns key material and the store handle.
//!
//! ## Overview
//!
//! `QueryEngine` decrypts and chain-verifies stored envelopes before
//! yielding events; any verification failure aborts the pass as
//! `TamperDetected`.  `export` turns a verified window into a signed
//! `ComplianceReport` whose trailing HMAC tag recipients can re-check.
//! `AuditEngine` wires recorder, query, and export together behind one
//! explicitly passed instance — no global state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_engine::{AuditEngine, EventFilter};
//!
//! let engine = AuditEngine::new(config, &provider, storage, Some(notifier))?;
//! engine.recorder().record_authentication("alice", None, result, risk, ctx)?;
//!
//! let filter = EventFilter::window(start, end);
//! let report = engine.export(&filter)?;
//! engine.verify_report(&report)?;
//! ```

pub mod engine;
pub mod export;
pub mod query;

pub use engine::AuditEngine;
pub use export::{ComplianceReport, ReportSummary};
pub use query::{EventFilter, QueryEngine, QueryIter};

// ── Tests ─────────────────────────────────────────────────────────────────────
