//! Business rules applied during the verification chain.
//!
//! Transaction verification runs [`validate_cart`], [`validate_billing_address`]
//! and [`validate_credit_card`] in that order; fraud detection runs
//! [`check_cvv`] and [`check_country`]. Each rule reports the first problem it
//! finds.

use chrono::NaiveDate;

use crate::checkout::{BillingAddress, CreditCard, OrderItem};
use crate::error::{FraudError, ValidationError};

/// Countries whose billing addresses are always treated as fraudulent.
pub const UNTRUSTED_COUNTRIES: &[&str] = &["Finland"];

/// CVV codes that are never issued to real cards.
pub const SUSPICIOUS_CVVS: &[&str] = &["000"];

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn validate_cart(items: &[OrderItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }
    Ok(())
}

pub fn validate_billing_address(address: &BillingAddress) -> Result<(), ValidationError> {
    let required = [
        ("Country", &address.country),
        ("State", &address.state),
        ("City", &address.city),
        ("Street", &address.street),
    ];
    if let Some((label, _)) = required.iter().find(|(_, value)| is_blank(value)) {
        return Err(ValidationError::BlankAddressField(*label));
    }

    if !is_numeric(&address.zip) {
        return Err(ValidationError::ZipNotNumeric);
    }
    if address.zip.len() != 5 {
        return Err(ValidationError::ZipLength);
    }
    Ok(())
}

/// Validates card format and expiry relative to `today`.
pub fn validate_credit_card(card: &CreditCard, today: NaiveDate) -> Result<(), ValidationError> {
    if !is_numeric(&card.cvv) {
        return Err(ValidationError::CvvNotNumeric);
    }
    if card.cvv.len() != 3 {
        return Err(ValidationError::CvvLength);
    }

    let valid_through =
        expiration_last_day(&card.expiration_date).ok_or(ValidationError::ExpirationFormat)?;
    if today > valid_through {
        return Err(ValidationError::CardExpired);
    }

    if !is_numeric(&card.number) {
        return Err(ValidationError::CardNumberNotNumeric);
    }
    if !(8..=19).contains(&card.number.len()) {
        return Err(ValidationError::CardNumberLength);
    }
    Ok(())
}

/// Parses `MM/YY` into the last calendar day the card is valid.
pub fn expiration_last_day(raw: &str) -> Option<NaiveDate> {
    let (month, year) = raw.trim().split_once('/')?;
    if !is_numeric(month) || month.len() > 2 || !is_numeric(year) || year.len() != 2 {
        return None;
    }
    let month: u32 = month.parse().ok()?;
    let year: i32 = 2000 + year.parse::<i32>().ok()?;

    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        // Rejects month 0 and months above 12.
        NaiveDate::from_ymd_opt(year, month, 1)?;
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt()
}

pub fn check_cvv(card: &CreditCard) -> Result<(), FraudError> {
    if SUSPICIOUS_CVVS.contains(&card.cvv.as_str()) {
        return Err(FraudError::SuspiciousCvv);
    }
    Ok(())
}

pub fn check_country(address: &BillingAddress) -> Result<(), FraudError> {
    let country = address.country.trim();
    if let Some(untrusted) = UNTRUSTED_COUNTRIES
        .iter()
        .find(|untrusted| untrusted.eq_ignore_ascii_case(country))
    {
        return Err(FraudError::UntrustedCountry((*untrusted).to_string()));
    }
    Ok(())
}
