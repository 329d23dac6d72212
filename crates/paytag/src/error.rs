use thiserror::Error;

use crate::validate::MismatchReason;

/// Errors returned by paytag operations.
///
/// Every ledger-interaction failure is typed so callers can tell "try again"
/// apart from "stop and tell the user": [`PayError::LedgerUnreachable`] is
/// transient, everything else is permanent for the operation that produced it.
#[derive(Debug, Error)]
pub enum PayError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("ledger unreachable: {0}")]
    LedgerUnreachable(String),

    #[error("submission rejected: {0}")]
    SubmitRejected(String),

    #[error("found transaction failed validation: {0}")]
    ValidationFailed(MismatchReason),

    #[error("a watcher is already active for reference {0}")]
    WatchActive(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
