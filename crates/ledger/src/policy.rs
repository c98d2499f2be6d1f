//! Resolution of payments whose outcome is unknown.

use crate::error::{LedgerError, LedgerResult};
use crate::submitter::PaymentOutcome;
use tracing::warn;

pub use vellum_core::FailurePolicy;

/// Apply `policy` to a failed payment.
///
/// Definite failures always propagate. Ambiguous ones become
/// [`PaymentOutcome::Unconfirmed`] only under [`FailurePolicy::FailOpen`].
pub fn resolve(policy: FailurePolicy, err: LedgerError) -> LedgerResult<PaymentOutcome> {
    if !err.is_ambiguous() {
        return Err(err);
    }
    match policy {
        FailurePolicy::FailClosed => Err(err),
        FailurePolicy::FailOpen => {
            let tx_hash = err.tx_hash();
            warn!(
                tx_hash = ?tx_hash,
                error = %err,
                "payment outcome unknown, continuing under fail-open policy"
            );
            Ok(PaymentOutcome::Unconfirmed {
                tx_hash,
                reason: err.to_string(),
            })
        }
    }
}
