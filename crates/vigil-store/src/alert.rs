//! Alert notification seam.
//!
//! The store invokes the notifier synchronously after a high-risk event
//! commits, with the plaintext event, so a responder does not pay a
//! read-back/decrypt round trip.  Delivery is entirely the notifier's
//! responsibility; a notifier failure never fails the append.

use vigil_contracts::{AuditEvent, VigilResult};

/// Receives events at or above the configured alert threshold.
///
/// Invoked inside `append`, post-commit, while no store locks are held.
/// Implementations should be fast and must not panic; errors are logged by
/// the store and otherwise ignored.
pub trait AlertNotifier: Send + Sync {
    /// Called once per committed high-risk event.
    fn notify(&self, event: &AuditEvent) -> VigilResult<()>;
}
