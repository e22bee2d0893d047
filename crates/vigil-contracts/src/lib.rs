//! # vigil-contracts
//!
//! Shared types, configuration, and error contracts for the vigil audit
//! engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, the canonical serialization rule,
//! and error types.

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;

pub use config::{EngineConfig, RETENTION_FLOOR_DAYS};
pub use envelope::EncryptedEnvelope;
pub use error::{VigilError, VigilResult};
pub use event::{Actor, AuditEvent, EventResult, EventType, NewEvent, RiskLevel};
