//! Validation utilities for the TBS trading platform
//!
//! Includes Indonesia-specific checks for vehicle plates, business
//! registration numbers and phone numbers.

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Measurement Validations
// ============================================================================

/// Validate a percentage measurement (oil, moisture, impurity) is within
/// 0-100 with at most 2 decimals
pub fn validate_percentage(field: &'static str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(field, "must be between 0 and 100 percent"));
    }
    validate_scale(field, value, 2)
}

/// Validate a weight or quantity in kilograms is strictly positive and
/// fits the two decimal places the ledger stores
pub fn validate_positive_kg(field: &'static str, value: Decimal) -> DomainResult<()> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(field, "must be greater than zero"));
    }
    validate_scale(field, value, 2)
}

/// Reject values carrying more than `dp` significant decimal places.
///
/// Trailing zeros do not count, so `12.500` passes with `dp = 2`.
pub fn validate_scale(field: &'static str, value: Decimal, dp: u32) -> DomainResult<()> {
    if value.normalize().scale() > dp {
        return Err(DomainError::validation(
            field,
            format!("must have at most {} decimal places", dp),
        ));
    }
    Ok(())
}

/// Validate a rupiah amount is strictly positive with at most 2 decimals
pub fn validate_positive_amount(field: &'static str, value: Decimal) -> DomainResult<()> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(field, "must be greater than zero"));
    }
    validate_scale(field, value, 2)
}

// ============================================================================
// Indonesia-Specific Validations
// ============================================================================

/// Normalise an Indonesian vehicle plate to the "BK 1234 ABC" form.
///
/// Accepts 1-2 region letters, 1-4 digits and up to 3 suffix letters, with
/// or without spaces and in any case.
pub fn normalize_plate_number(plate: &str) -> DomainResult<String> {
    let compact: String = plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let region: String = compact.chars().take_while(|c| c.is_ascii_uppercase()).collect();
    let rest = &compact[region.len()..];
    let number: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = &rest[number.len()..];

    let valid = (1..=2).contains(&region.len())
        && (1..=4).contains(&number.len())
        && suffix.len() <= 3
        && suffix.chars().all(|c| c.is_ascii_uppercase());
    if !valid {
        return Err(DomainError::validation(
            "plat_nomor",
            "invalid vehicle plate number, expected e.g. BK 1234 ABC",
        ));
    }

    if suffix.is_empty() {
        Ok(format!("{} {}", region, number))
    } else {
        Ok(format!("{} {} {}", region, number, suffix))
    }
}

/// Validate NIB (Nomor Induk Berusaha): 13 digits
pub fn validate_nib(nib: &str) -> Result<(), &'static str> {
    let trimmed = nib.trim();
    if trimmed.len() != 13 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err("NIB must be 13 digits");
    }
    Ok(())
}

/// Validate Indonesian phone number format
/// Accepts: 081234567890, 0812-3456-7890, +6281234567890
pub fn validate_indonesian_phone(phone: &str) -> Result<(), &'static str> {
    if phone
        .chars()
        .any(|c| !(c.is_ascii_digit() || c == '+' || c == '-' || c == ' '))
    {
        return Err("Invalid Indonesian phone number format");
    }
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // Domestic: leading 0, 10-13 digits
    if digits.starts_with('0') && (10..=13).contains(&digits.len()) {
        return Ok(());
    }
    // International: country code 62, 11-14 digits
    if digits.starts_with("62") && (11..=14).contains(&digits.len()) {
        return Ok(());
    }

    Err("Invalid Indonesian phone number format")
}

/// `validator` adapter for [`validate_nib`]
pub fn check_nib(nib: &str) -> Result<(), ValidationError> {
    if nib.trim().is_empty() {
        return Ok(());
    }
    validate_nib(nib).map_err(|msg| {
        let mut err = ValidationError::new("nib");
        err.message = Some(msg.into());
        err
    })
}

/// `validator` adapter for [`validate_indonesian_phone`]
pub fn check_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.trim().is_empty() {
        return Ok(());
    }
    validate_indonesian_phone(phone).map_err(|msg| {
        let mut err = ValidationError::new("phone");
        err.message = Some(msg.into());
        err
    })
}
