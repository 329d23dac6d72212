//! Outbound transfers: construct a reference-tagged transfer and hand it to
//! the ledger.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::constants::LedgerConfig;
use crate::error::PayError;
use crate::ledger::{
    Address, LedgerClient, ReferenceTag, Signature, Transaction, TransferInstruction,
};
use crate::reference::ReferenceId;

/// Builds transfers that embed a fresh [`ReferenceId`] as a passive tag, so
/// sent payments are discoverable through the same reference lookup as
/// received ones.
pub struct OutboundTransferBuilder<C> {
    client: Arc<C>,
    config: LedgerConfig,
}

impl<C> OutboundTransferBuilder<C>
where
    C: LedgerClient,
{
    pub fn new(client: Arc<C>, config: LedgerConfig) -> Self {
        Self { client, config }
    }

    /// Construct a transfer of `amount` from `from` to `to`.
    ///
    /// Fetches a recent block handle for the validity window and attaches a
    /// fresh reference as a non-signing, non-writable tag. Construction does
    /// not submit; call [`OutboundTransferBuilder::submit`] as a separate
    /// step so the caller controls retries.
    pub async fn build(
        &self,
        from: Address,
        to: &str,
        amount: Decimal,
    ) -> Result<(Transaction, ReferenceId), PayError> {
        let to: Address = to.parse()?;
        let units = to_native_units(amount, self.config.native_decimals)?;

        let recent_block = self.client.recent_block_handle().await?;
        let reference = ReferenceId::generate();

        let tx = Transaction {
            recent_block,
            fee_payer: from,
            instructions: vec![TransferInstruction {
                from,
                to,
                units,
                tags: vec![ReferenceTag::passive(reference)],
            }],
        };

        tracing::debug!(reference = %reference, to = %to, units, "outbound transfer built");
        Ok((tx, reference))
    }

    /// Submit a built transaction.
    ///
    /// No retries here: a rejection surfaces as
    /// [`PayError::SubmitRejected`] and the caller decides whether to
    /// resubmit.
    pub async fn submit(&self, tx: &Transaction) -> Result<Signature, PayError> {
        let signature = self.client.submit(tx).await?;
        tracing::info!(signature = %signature, "transaction submitted");
        Ok(signature)
    }
}

/// Convert an exact decimal amount to the ledger's smallest native unit.
///
/// Integer-only: the decimal is rescaled, never routed through floats.
pub fn to_native_units(amount: Decimal, native_decimals: u32) -> Result<u64, PayError> {
    if amount <= Decimal::ZERO {
        return Err(PayError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    let mut scaled = amount.normalize();
    if scaled.scale() > native_decimals {
        return Err(PayError::InvalidAmount(format!(
            "amount {amount} has more than {native_decimals} decimal places"
        )));
    }
    scaled.rescale(native_decimals);
    u64::try_from(scaled.mantissa()).map_err(|_| {
        PayError::InvalidAmount(format!("amount {amount} overflows the native unit range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NATIVE_DECIMALS;
    use crate::ledger::{BlockHandle, FindResult, LedgerError, TransactionDetail};

    /// Client that only answers the calls the builder makes.
    struct StaticLedger {
        reachable: bool,
    }

    impl LedgerClient for StaticLedger {
        async fn recent_block_handle(&self) -> Result<BlockHandle, LedgerError> {
            if self.reachable {
                Ok(BlockHandle("block-42".into()))
            } else {
                Err(LedgerError::Unavailable("connection refused".into()))
            }
        }

        async fn submit(&self, _tx: &Transaction) -> Result<Signature, LedgerError> {
            Ok(Signature("sig-static".into()))
        }

        async fn find_by_reference(
            &self,
            _reference: &ReferenceId,
        ) -> Result<FindResult, LedgerError> {
            Ok(FindResult::NotYet)
        }

        async fn transaction_detail(
            &self,
            signature: &Signature,
        ) -> Result<TransactionDetail, LedgerError> {
            Err(LedgerError::Unavailable(format!("unknown {signature}")))
        }
    }

    fn builder(reachable: bool) -> OutboundTransferBuilder<StaticLedger> {
        OutboundTransferBuilder::new(
            Arc::new(StaticLedger { reachable }),
            LedgerConfig::default(),
        )
    }

    #[test]
    fn test_to_native_units_whole() {
        assert_eq!(to_native_units("1".parse().unwrap(), NATIVE_DECIMALS).unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_to_native_units_fractional() {
        assert_eq!(to_native_units("2.5".parse().unwrap(), NATIVE_DECIMALS).unwrap(), 2_500_000_000);
        assert_eq!(to_native_units("0.000000001".parse().unwrap(), NATIVE_DECIMALS).unwrap(), 1);
    }

    #[test]
    fn test_to_native_units_rejects_non_positive() {
        assert!(to_native_units(Decimal::ZERO, NATIVE_DECIMALS).is_err());
        assert!(to_native_units("-1".parse().unwrap(), NATIVE_DECIMALS).is_err());
    }

    #[test]
    fn test_to_native_units_rejects_excess_precision() {
        assert!(to_native_units("0.0000000001".parse().unwrap(), NATIVE_DECIMALS).is_err());
    }

    #[test]
    fn test_to_native_units_rejects_overflow() {
        // u64::MAX units is ~18.4e9 coins at 9 decimals
        assert!(to_native_units("99999999999".parse().unwrap(), NATIVE_DECIMALS).is_err());
    }

    #[tokio::test]
    async fn test_build_attaches_passive_tag() {
        let from = Address::from_bytes([1; 32]);
        let to = Address::from_bytes([2; 32]).to_string();

        let (tx, reference) = builder(true)
            .build(from, &to, "2.5".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(tx.recent_block, BlockHandle("block-42".into()));
        assert_eq!(tx.fee_payer, from);
        assert_eq!(tx.instructions.len(), 1);

        let instruction = &tx.instructions[0];
        assert_eq!(instruction.units, 2_500_000_000);
        assert_eq!(instruction.tags, vec![ReferenceTag::passive(reference)]);
    }

    #[tokio::test]
    async fn test_build_rejects_bad_recipient_before_ledger_call() {
        // An unreachable ledger must not matter when the address is bad
        let err = builder(false)
            .build(Address::from_bytes([1; 32]), "bogus", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_build_surfaces_unreachable_ledger() {
        let to = Address::from_bytes([2; 32]).to_string();
        let err = builder(false)
            .build(Address::from_bytes([1; 32]), &to, Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::LedgerUnreachable(_)));
    }
}
