//! Local transaction history: an append-only, most-recent-first record of
//! completed payments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::constants::PASSTHROUGH_SENTINEL;
use crate::error::PayError;
use crate::record_store::RecordStore;

/// One side of a payment as shown in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    pub handle: String,
    pub avatar_ref: String,
    pub verified: bool,
}

/// Record status. Only completed payments are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Completed,
}

/// A completed payment as persisted in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub from: Party,
    pub to: Party,
    pub description: String,
    /// When the record was made, not the ledger's own timestamp.
    pub transaction_date: DateTime<Utc>,
    pub status: RecordStatus,
    pub amount: Decimal,
    /// Reserved passthrough field.
    pub source: String,
    /// Reserved passthrough field.
    pub identifier: String,
}

/// Everything needed to append a record; id and timestamp are assigned at
/// append time.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub from: Party,
    pub to: Party,
    pub description: String,
    pub amount: Decimal,
    pub source: String,
    pub identifier: String,
}

impl RecordDraft {
    pub fn new(from: Party, to: Party, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            from,
            to,
            description: description.into(),
            amount,
            source: PASSTHROUGH_SENTINEL.to_string(),
            identifier: PASSTHROUGH_SENTINEL.to_string(),
        }
    }
}

/// Persisted blob: the record sequence plus the id counter.
///
/// The counter lives next to the sequence so ids stay monotonic even if the
/// sequence were ever pruned out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub next_id: u64,
    pub records: Vec<TransactionRecord>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

/// Append-only history with a single writer.
///
/// Appends from the send- and receive-flows are serialized through one async
/// mutex and persisted before returning, so concurrent appends cannot lose
/// updates. Records are never updated or deleted.
pub struct TransactionLedger {
    store: Arc<dyn RecordStore>,
    key: String,
    inner: Mutex<LedgerSnapshot>,
}

impl TransactionLedger {
    /// Open the history stored under `key`, loading any persisted records.
    pub fn open(store: Arc<dyn RecordStore>, key: impl Into<String>) -> Result<Self, PayError> {
        let key = key.into();
        let snapshot = store.load(&key)?.unwrap_or_default();
        tracing::debug!(key = %key, records = snapshot.records.len(), "transaction history loaded");
        Ok(Self {
            store,
            key,
            inner: Mutex::new(snapshot),
        })
    }

    /// Append a completed payment.
    ///
    /// Assigns the next id, stamps the current time, inserts at the front
    /// (most recent first), and persists synchronously before returning.
    pub async fn append(&self, draft: RecordDraft) -> Result<TransactionRecord, PayError> {
        let mut snapshot = self.inner.lock().await;

        let record = TransactionRecord {
            id: snapshot.next_id.to_string(),
            from: draft.from,
            to: draft.to,
            description: draft.description,
            transaction_date: Utc::now(),
            status: RecordStatus::Completed,
            amount: draft.amount,
            source: draft.source,
            identifier: draft.identifier,
        };

        snapshot.next_id += 1;
        snapshot.records.insert(0, record.clone());

        // The append only becomes observable once persisted; roll back the
        // in-memory state if the store refuses it.
        if let Err(e) = self.store.save(&self.key, &snapshot) {
            snapshot.records.remove(0);
            snapshot.next_id -= 1;
            return Err(e);
        }

        tracing::info!(id = %record.id, amount = %record.amount, "payment recorded");
        Ok(record)
    }

    /// All records, most recent first.
    pub async fn list(&self) -> Vec<TransactionRecord> {
        self.inner.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_store::{InMemoryRecordStore, SqliteRecordStore};

    fn party(name: &str) -> Party {
        Party {
            name: name.to_string(),
            handle: name.to_string(),
            avatar_ref: format!("avatar:{name}"),
            verified: false,
        }
    }

    fn draft(description: &str) -> RecordDraft {
        RecordDraft::new(party("alice"), party("bob"), description, Decimal::ONE)
    }

    #[tokio::test]
    async fn test_append_assigns_descending_ids_in_list() {
        let ledger =
            TransactionLedger::open(Arc::new(InMemoryRecordStore::new()), "transactions").unwrap();

        for i in 0..3 {
            ledger.append(draft(&format!("payment {i}"))).await.unwrap();
        }

        let ids: Vec<String> = ledger.list().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let ledger =
            TransactionLedger::open(Arc::new(InMemoryRecordStore::new()), "transactions").unwrap();

        ledger.append(draft("first")).await.unwrap();
        ledger.append(draft("second")).await.unwrap();

        let records = ledger.list().await;
        assert_eq!(records[0].description, "second");
        assert_eq!(records[1].description, "first");
    }

    #[tokio::test]
    async fn test_reload_returns_identical_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open(path.to_str().unwrap()).unwrap());

        let before = {
            let ledger = TransactionLedger::open(Arc::clone(&store), "transactions").unwrap();
            for i in 0..4 {
                ledger.append(draft(&format!("payment {i}"))).await.unwrap();
            }
            ledger.list().await
        };

        // Fresh store handle over the same file, as after a process restart
        let store = Arc::new(SqliteRecordStore::open(path.to_str().unwrap()).unwrap());
        let ledger = TransactionLedger::open(store, "transactions").unwrap();
        assert_eq!(ledger.list().await, before);

        // Ids keep counting from where the previous process stopped
        let record = ledger.append(draft("after restart")).await.unwrap();
        assert_eq!(record.id, "5");
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        struct RefusingStore;

        impl RecordStore for RefusingStore {
            fn load(&self, _key: &str) -> Result<Option<LedgerSnapshot>, PayError> {
                Ok(None)
            }

            fn save(&self, _key: &str, _snapshot: &LedgerSnapshot) -> Result<(), PayError> {
                Err(PayError::Store("disk full".into()))
            }
        }

        let ledger = TransactionLedger::open(Arc::new(RefusingStore), "transactions").unwrap();
        assert!(ledger.append(draft("doomed")).await.is_err());
        assert!(ledger.is_empty().await);
    }
}
