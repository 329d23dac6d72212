//! Ledger value types and the client capability consumed by the engine.
//!
//! The engine never talks to a ledger node directly: the environment hands it
//! a [`LedgerClient`] implementation (an RPC client, a test double, ...) and
//! the watcher and builder drive it through this interface.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::PayError;
use crate::reference::ReferenceId;

/// A 32-byte ledger account address.
///
/// Hex-encoded (64 lowercase chars) in display and wire form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| PayError::InvalidAddress(format!("{s}: {e}")))?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| PayError::InvalidAddress(format!("expected 32 bytes, got {}", raw.len())))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ledger-assigned transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub String);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a recent ledger block, anchoring a transaction's validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHandle(pub String);

/// A non-signing participant attached to a transfer solely to make it
/// discoverable through [`LedgerClient::find_by_reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTag {
    pub reference: ReferenceId,
    pub signer: bool,
    pub writable: bool,
}

impl ReferenceTag {
    /// Tag as emitted by the outbound builder: present on the transaction
    /// but never signing and never written to.
    pub fn passive(reference: ReferenceId) -> Self {
        Self {
            reference,
            signer: false,
            writable: false,
        }
    }
}

/// A single transfer instruction moving `units` from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInstruction {
    pub from: Address,
    pub to: Address,
    /// Amount in the ledger's smallest native unit.
    pub units: u64,
    pub tags: Vec<ReferenceTag>,
}

/// An unsubmitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub recent_block: BlockHandle,
    pub fee_payer: Address,
    pub instructions: Vec<TransferInstruction>,
}

/// What the ledger reports about a settled transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub signature: Signature,
    pub source: Address,
    pub destination: Address,
    /// Transferred amount in the smallest native unit.
    pub units: u64,
    /// References attached to the transfer, in instruction order.
    pub references: Vec<ReferenceId>,
    /// Whether the ledger considers the transaction unlikely to revert.
    pub finalized: bool,
}

/// Outcome of a reference lookup.
///
/// "No transaction yet" is the expected steady state while a request is
/// outstanding, so it is a value here, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindResult {
    Found(Signature),
    NotYet,
}

/// Errors surfaced by a [`LedgerClient`].
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Node unreachable or query failed; safe to retry.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the submission; retrying the same transaction
    /// will not help.
    #[error("rejected by ledger: {0}")]
    Rejected(String),
}

impl From<LedgerError> for PayError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Unavailable(msg) => PayError::LedgerUnreachable(msg),
            LedgerError::Rejected(msg) => PayError::SubmitRejected(msg),
        }
    }
}

/// Ledger capability consumed by the engine.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait LedgerClient: Send + Sync {
    /// Fetch a recent block handle for a transaction validity window.
    fn recent_block_handle(
        &self,
    ) -> impl Future<Output = Result<BlockHandle, LedgerError>> + Send;

    /// Submit a transaction, returning its signature.
    fn submit(
        &self,
        tx: &Transaction,
    ) -> impl Future<Output = Result<Signature, LedgerError>> + Send;

    /// Look up the transaction tagged with `reference`, if one exists yet.
    fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> impl Future<Output = Result<FindResult, LedgerError>> + Send;

    /// Fetch full detail for a previously found signature.
    fn transaction_detail(
        &self,
        signature: &Signature,
    ) -> impl Future<Output = Result<TransactionDetail, LedgerError>> + Send;
}
