//! Transfer validation: does a found transaction actually satisfy a request?

use std::fmt;

use rust_decimal::Decimal;

use crate::ledger::TransactionDetail;
use crate::request::PaymentRequest;

/// Why a candidate transaction failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// The transfer pays someone other than the requested recipient.
    WrongRecipient,
    /// The transferred amount differs from the requested amount.
    WrongAmount,
    /// The transaction does not carry the request's reference; an unrelated
    /// transfer that happens to touch the recipient.
    UntaggedOrForeign,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::WrongRecipient => "wrong recipient",
            Self::WrongAmount => "wrong amount",
            Self::UntaggedOrForeign => "untagged or foreign transaction",
        };
        f.write_str(text)
    }
}

/// Validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Match,
    Mismatch(MismatchReason),
}

/// Decide whether `candidate` settles `request`.
///
/// Checks in order: recipient, exact amount (decimal equality, no
/// tolerance), and that the candidate carries the request's reference.
/// Pure: any ledger detail the caller needs must already be in `candidate`.
pub fn validate_transfer(
    request: &PaymentRequest,
    candidate: &TransactionDetail,
    native_decimals: u32,
) -> Validation {
    if candidate.destination != request.recipient() {
        return Validation::Mismatch(MismatchReason::WrongRecipient);
    }

    let transferred = Decimal::from_i128_with_scale(candidate.units as i128, native_decimals);
    if transferred.normalize() != request.amount().normalize() {
        return Validation::Mismatch(MismatchReason::WrongAmount);
    }

    if !candidate.references.contains(&request.reference()) {
        return Validation::Mismatch(MismatchReason::UntaggedOrForeign);
    }

    Validation::Match
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NATIVE_DECIMALS;
    use crate::ledger::{Address, Signature};
    use crate::reference::ReferenceId;

    fn request(amount: &str) -> PaymentRequest {
        PaymentRequest::for_recipient(
            Address::from_bytes([7; 32]),
            amount.parse().unwrap(),
            None,
            None,
        )
        .unwrap()
    }

    fn candidate(request: &PaymentRequest, units: u64) -> TransactionDetail {
        TransactionDetail {
            signature: Signature("sig-1".into()),
            source: Address::from_bytes([9; 32]),
            destination: request.recipient(),
            units,
            references: vec![request.reference()],
            finalized: true,
        }
    }

    #[test]
    fn test_exact_transfer_matches() {
        let request = request("1.0");
        let detail = candidate(&request, 1_000_000_000);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Match
        );
    }

    #[test]
    fn test_trailing_zeros_still_match() {
        let request = request("2.50");
        let detail = candidate(&request, 2_500_000_000);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Match
        );
    }

    #[test]
    fn test_short_amount_is_wrong_amount() {
        // 0.999999 against a request for 1.0, no tolerance and no rounding
        let request = request("1.0");
        let detail = candidate(&request, 999_999_000);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Mismatch(MismatchReason::WrongAmount)
        );
    }

    #[test]
    fn test_one_unit_short_is_wrong_amount() {
        let request = request("1.0");
        let detail = candidate(&request, 999_999_999);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Mismatch(MismatchReason::WrongAmount)
        );
    }

    #[test]
    fn test_wrong_destination() {
        let request = request("1.0");
        let mut detail = candidate(&request, 1_000_000_000);
        detail.destination = Address::from_bytes([8; 32]);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Mismatch(MismatchReason::WrongRecipient)
        );
    }

    #[test]
    fn test_foreign_reference_rejected_despite_matching_payment() {
        let request = request("1.0");
        let mut detail = candidate(&request, 1_000_000_000);
        detail.references = vec![ReferenceId::generate()];
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Mismatch(MismatchReason::UntaggedOrForeign)
        );
    }

    #[test]
    fn test_recipient_checked_before_amount() {
        let request = request("1.0");
        let mut detail = candidate(&request, 42);
        detail.destination = Address::from_bytes([8; 32]);
        assert_eq!(
            validate_transfer(&request, &detail, NATIVE_DECIMALS),
            Validation::Mismatch(MismatchReason::WrongRecipient)
        );
    }
}
