//! Reference-tagged ledger payments: request, watch, validate, send, record.
//!
//! The engine lets an application receive a payment by presenting a
//! scannable request and watching the ledger for the transaction that
//! settles it, and send payments carrying the same reference scheme so they
//! are discoverable the same way. Completed payments land in a local,
//! persisted history.
//!
//! The ledger itself stays behind the [`LedgerClient`] capability the
//! environment provides; rendering the request URI as a scannable code is
//! likewise external. The engine stops at the URI string.
//!
//! # Receive flow
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paytag::{
//!     Address, InMemoryRecordStore, LedgerClient, LedgerConfig, PayError, PaySession,
//!     Profile, TransactionLedger, WatchOptions,
//! };
//! use rust_decimal::Decimal;
//!
//! async fn receive<C: LedgerClient + 'static>(client: Arc<C>) -> Result<(), PayError> {
//!     let config = LedgerConfig::default();
//!     let history =
//!         TransactionLedger::open(Arc::new(InMemoryRecordStore::new()), &config.history_key)?;
//!     let account: Address = "7f".repeat(32).parse()?;
//!     let profile = Profile {
//!         name: "Evil Cookies Inc".into(),
//!         handle: "@evilcookies".into(),
//!         verified: true,
//!     };
//!     let session = PaySession::new(client, config, account, profile, history);
//!
//!     let request = session.payment_request(
//!         Decimal::new(15, 1),
//!         Some("Evil Cookies Inc"),
//!         Some("Thanks for the coins!"),
//!     )?;
//!     let _uri = session.request_uri(&request); // hand this to the QR renderer
//!
//!     let handle = session.watch(request, WatchOptions::default())?;
//!     let record = session.settle_watch(handle).await?;
//!     println!("recorded: {record:?}");
//!     Ok(())
//! }
//! ```

// Core types
pub mod constants;
pub mod error;
pub mod ledger;
pub mod reference;
pub mod request;

// Engine
pub mod transfer;
pub mod validate;
pub mod watcher;

// Local history
pub mod history;
pub mod record_store;
pub mod session;

// Re-exports
pub use constants::{LedgerConfig, DEFAULT_POLL_INTERVAL};
pub use error::PayError;
pub use ledger::{
    Address, BlockHandle, FindResult, LedgerClient, LedgerError, ReferenceTag, Signature,
    Transaction, TransactionDetail, TransferInstruction,
};
pub use reference::ReferenceId;
pub use request::PaymentRequest;

pub use transfer::OutboundTransferBuilder;
pub use validate::{validate_transfer, MismatchReason, Validation};
pub use watcher::{PaymentWatcher, WatchHandle, WatchOptions, WatchOutcome, WatchState};

pub use history::{LedgerSnapshot, Party, RecordDraft, RecordStatus, TransactionLedger, TransactionRecord};
pub use record_store::{InMemoryRecordStore, RecordStore, SqliteRecordStore};
pub use session::{avatar_ref, PaySession, Profile};
