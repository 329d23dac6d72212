//! Payment requests and the scannable request URI.

use rust_decimal::Decimal;

use crate::constants::{LedgerConfig, NATIVE_DECIMALS};
use crate::error::PayError;
use crate::ledger::Address;
use crate::reference::ReferenceId;

/// An immutable request for payment: who gets paid, how much, and the unique
/// reference the settling transaction must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    recipient: Address,
    amount: Decimal,
    reference: ReferenceId,
    label: Option<String>,
    message: Option<String>,
}

impl PaymentRequest {
    /// Build a request for `amount` paid to `recipient`.
    ///
    /// A fresh [`ReferenceId`] is generated internally; callers never supply
    /// one, which is what keeps references unique across outstanding
    /// requests. Fails fast on an unparseable recipient or an amount that is
    /// not positive or carries more precision than the ledger's native unit.
    pub fn new(
        recipient: &str,
        amount: Decimal,
        label: Option<&str>,
        message: Option<&str>,
    ) -> Result<Self, PayError> {
        let recipient: Address = recipient.parse()?;
        Self::for_recipient(recipient, amount, label, message)
    }

    /// Like [`PaymentRequest::new`] for an already-parsed recipient.
    pub fn for_recipient(
        recipient: Address,
        amount: Decimal,
        label: Option<&str>,
        message: Option<&str>,
    ) -> Result<Self, PayError> {
        check_amount(amount)?;
        Ok(Self {
            recipient,
            amount,
            reference: ReferenceId::generate(),
            label: label.map(str::to_owned),
            message: message.map(str::to_owned),
        })
    }

    /// Pair an already-issued reference with the recipient and amount it was
    /// attached to, for watching a transfer you just built and submitted
    /// (the outbound builder returns the reference) until finality.
    pub fn for_transfer(
        recipient: Address,
        amount: Decimal,
        reference: ReferenceId,
    ) -> Result<Self, PayError> {
        check_amount(amount)?;
        Ok(Self {
            recipient,
            amount,
            reference,
            label: None,
            message: None,
        })
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn reference(&self) -> ReferenceId {
        self.reference
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Encode as a request URI for the scannable-code renderer.
    ///
    /// Deterministic key order: `amount`, `reference`, then the optional
    /// `label` and `message`, values percent-encoded. The amount is a plain
    /// decimal string, never scientific notation. One-way: nothing in the
    /// engine parses it back.
    pub fn to_request_uri(&self, config: &LedgerConfig) -> String {
        let mut uri = format!(
            "{}:{}?amount={}&reference={}",
            config.uri_scheme, self.recipient, self.amount, self.reference
        );
        if let Some(label) = &self.label {
            uri.push_str("&label=");
            uri.push_str(&urlencoding::encode(label));
        }
        if let Some(message) = &self.message {
            uri.push_str("&message=");
            uri.push_str(&urlencoding::encode(message));
        }
        uri
    }
}

fn check_amount(amount: Decimal) -> Result<(), PayError> {
    if amount <= Decimal::ZERO {
        return Err(PayError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount.normalize().scale() > NATIVE_DECIMALS {
        return Err(PayError::InvalidAmount(format!(
            "amount {amount} has more than {NATIVE_DECIMALS} decimal places"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient_hex() -> String {
        "1f".repeat(32)
    }

    #[test]
    fn test_new_generates_distinct_references() {
        let a = PaymentRequest::new(&recipient_hex(), Decimal::ONE, None, None).unwrap();
        let b = PaymentRequest::new(&recipient_hex(), Decimal::ONE, None, None).unwrap();
        assert_ne!(a.reference(), b.reference());
    }

    #[test]
    fn test_new_rejects_bad_recipient() {
        let err = PaymentRequest::new("nope", Decimal::ONE, None, None).unwrap_err();
        assert!(matches!(err, PayError::InvalidAddress(_)));
    }

    #[test]
    fn test_new_rejects_non_positive_amount() {
        let err = PaymentRequest::new(&recipient_hex(), Decimal::ZERO, None, None).unwrap_err();
        assert!(matches!(err, PayError::InvalidAmount(_)));

        let err =
            PaymentRequest::new(&recipient_hex(), Decimal::new(-5, 1), None, None).unwrap_err();
        assert!(matches!(err, PayError::InvalidAmount(_)));
    }

    #[test]
    fn test_new_rejects_excess_precision() {
        // 10 fractional digits, one more than the native unit carries
        let amount = Decimal::new(1, 10);
        let err = PaymentRequest::new(&recipient_hex(), amount, None, None).unwrap_err();
        assert!(matches!(err, PayError::InvalidAmount(_)));
    }

    #[test]
    fn test_request_uri_minimal() {
        let request =
            PaymentRequest::new(&recipient_hex(), Decimal::new(15, 1), None, None).unwrap();
        let uri = request.to_request_uri(&LedgerConfig::default());
        assert_eq!(
            uri,
            format!(
                "pay:{}?amount=1.5&reference={}",
                recipient_hex(),
                request.reference()
            )
        );
    }

    #[test]
    fn test_request_uri_encodes_label_and_message() {
        let request = PaymentRequest::new(
            &recipient_hex(),
            Decimal::ONE,
            Some("Evil Cookies Inc"),
            Some("Thanks for the coins!"),
        )
        .unwrap();
        let uri = request.to_request_uri(&LedgerConfig::default());
        assert!(uri.contains("&label=Evil%20Cookies%20Inc"));
        assert!(uri.contains("&message=Thanks%20for%20the%20coins%21"));
    }

    #[test]
    fn test_request_uri_preserves_amount_precision() {
        let request =
            PaymentRequest::new(&recipient_hex(), "1.0".parse().unwrap(), None, None).unwrap();
        let uri = request.to_request_uri(&LedgerConfig::default());
        assert!(uri.contains("amount=1.0&"));
    }
}
