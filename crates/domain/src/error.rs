//! Business rule failures.
//!
//! The display strings are returned verbatim to the client as the rejection
//! reason.

use thiserror::Error;

/// A checkout payload failed transaction verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cart can not be empty.")]
    EmptyCart,

    /// A required billing address field is blank; carries the field label.
    #[error("{0} can not be empty or blank.")]
    BlankAddressField(&'static str),

    #[error("ZIP code should be numeric.")]
    ZipNotNumeric,

    #[error("ZIP code should contain exactly 5 numbers.")]
    ZipLength,

    #[error("CVV should be numeric.")]
    CvvNotNumeric,

    #[error("CVV should contain exactly 3 numbers.")]
    CvvLength,

    #[error("Invalid input format for expiration date. Please use MM/YY.")]
    ExpirationFormat,

    #[error("Card is expired.")]
    CardExpired,

    #[error("Card number should be numeric.")]
    CardNumberNotNumeric,

    #[error("Card number should contain at least 8 and at most 19 numbers.")]
    CardNumberLength,
}

/// A checkout payload looks fraudulent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FraudError {
    #[error("Suspicious CVV code, potentially fraudulent transaction!")]
    SuspiciousCvv,

    #[error("{0} can not be trusted, potentially fraudulent transaction!")]
    UntrustedCountry(String),
}
