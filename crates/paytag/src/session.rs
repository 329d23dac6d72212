//! A payment session: the owned context tying the flows together.
//!
//! One session per running application instance. It owns the transaction
//! history, carries the account requests and transfers are made for, and
//! wires request → watch → record and build → submit → record.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::constants::{LedgerConfig, PASSTHROUGH_SENTINEL};
use crate::error::PayError;
use crate::history::{Party, RecordDraft, TransactionLedger, TransactionRecord};
use crate::ledger::{Address, LedgerClient, Signature, TransactionDetail};
use crate::request::PaymentRequest;
use crate::transfer::OutboundTransferBuilder;
use crate::watcher::{PaymentWatcher, WatchHandle, WatchOptions, WatchOutcome};

/// Display profile for the session account.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub handle: String,
    pub verified: bool,
}

/// Deterministic avatar reference for an address, consumed by the external
/// avatar-lookup collaborator.
pub fn avatar_ref(address: &Address) -> String {
    format!("avatar:{address}")
}

pub struct PaySession<C> {
    config: LedgerConfig,
    account: Address,
    profile: Profile,
    ledger: TransactionLedger,
    builder: OutboundTransferBuilder<C>,
    watcher: PaymentWatcher<C>,
}

impl<C> PaySession<C>
where
    C: LedgerClient + 'static,
{
    pub fn new(
        client: Arc<C>,
        config: LedgerConfig,
        account: Address,
        profile: Profile,
        ledger: TransactionLedger,
    ) -> Self {
        Self {
            builder: OutboundTransferBuilder::new(Arc::clone(&client), config.clone()),
            watcher: PaymentWatcher::new(client, config.clone()),
            config,
            account,
            profile,
            ledger,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Start a receive flow: a request for `amount` paid to this session's
    /// account. Hand [`PaySession::request_uri`] of the result to the
    /// scannable-code renderer, then call [`PaySession::watch`].
    pub fn payment_request(
        &self,
        amount: Decimal,
        label: Option<&str>,
        message: Option<&str>,
    ) -> Result<PaymentRequest, PayError> {
        PaymentRequest::for_recipient(self.account, amount, label, message)
    }

    /// The request URI to render as a scannable code.
    pub fn request_uri(&self, request: &PaymentRequest) -> String {
        request.to_request_uri(&self.config)
    }

    /// Watch the ledger for the transaction settling `request`.
    pub fn watch(
        &self,
        request: PaymentRequest,
        opts: WatchOptions,
    ) -> Result<WatchHandle, PayError> {
        self.watcher.start(request, opts)
    }

    /// Wait out a watch and record the matched payment.
    ///
    /// Returns the appended record on a match, `Ok(None)` if the watch was
    /// cancelled or expired, and [`PayError::ValidationFailed`] if a
    /// transaction was found but did not satisfy the request; the user must
    /// be told and may need to issue a new request.
    ///
    /// The record is derived from the validated on-ledger transaction, not
    /// from the request: the ledger is the source of truth for what was
    /// actually transferred.
    pub async fn settle_watch(
        &self,
        handle: WatchHandle,
    ) -> Result<Option<TransactionRecord>, PayError> {
        match handle.outcome().await {
            WatchOutcome::Matched { transaction, .. } => {
                Ok(Some(self.record_received(&transaction).await?))
            }
            WatchOutcome::Mismatched(reason) => Err(PayError::ValidationFailed(reason)),
            WatchOutcome::Cancelled | WatchOutcome::Expired => Ok(None),
        }
    }

    async fn record_received(
        &self,
        transaction: &TransactionDetail,
    ) -> Result<TransactionRecord, PayError> {
        let amount =
            Decimal::from_i128_with_scale(transaction.units as i128, self.config.native_decimals)
                .normalize();

        // Only the payer's address is known; the display fields mirror it.
        let from = Party {
            name: transaction.source.to_string(),
            handle: transaction.source.to_string(),
            avatar_ref: avatar_ref(&transaction.source),
            verified: false,
        };
        let to = Party {
            name: self.profile.name.clone(),
            handle: self.profile.handle.clone(),
            avatar_ref: avatar_ref(&self.account),
            verified: self.profile.verified,
        };

        let draft = RecordDraft::new(from, to, "Incoming ledger payment", amount);
        self.ledger.append(draft).await
    }

    /// Send flow: build, submit, and record a transfer to `to`.
    ///
    /// Submission success is the confirmation signal for the sender, so no
    /// watcher is involved; the returned record pairs with the submission
    /// signature. To additionally await finality, watch
    /// [`PaymentRequest::for_transfer`] built from the same reference.
    pub async fn send(
        &self,
        to: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<(TransactionRecord, Signature), PayError> {
        // Fail fast on the address before any ledger interaction.
        let recipient: Address = to.parse()?;

        let (tx, reference) = self.builder.build(self.account, to, amount).await?;
        let signature = self.builder.submit(&tx).await?;
        tracing::info!(signature = %signature, reference = %reference, "transfer sent");

        let from = Party {
            name: self.profile.name.clone(),
            handle: self.profile.handle.clone(),
            avatar_ref: avatar_ref(&self.account),
            verified: self.profile.verified,
        };
        let to_party = Party {
            name: recipient.to_string(),
            handle: PASSTHROUGH_SENTINEL.to_string(),
            avatar_ref: avatar_ref(&recipient),
            verified: false,
        };

        let draft = RecordDraft::new(from, to_party, description, amount);
        let record = self.ledger.append(draft).await?;
        Ok((record, signature))
    }

    /// History, most recent first.
    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.list().await
    }
}
