//! Decimal amount conversion at the system boundary
//!
//! Chains store integer minor units; the surrounding ERP speaks in decimal
//! strings ("1250.50"). These helpers convert exactly, rejecting anything
//! finer than two decimal places.

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::types::{LedgerError, LedgerResult};

/// Minor units per major currency unit (paise per rupee, cents per dollar)
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Parse a decimal amount string into minor units
pub fn parse_minor_units(text: &str) -> LedgerResult<i64> {
    let value: BigDecimal = text
        .trim()
        .parse()
        .map_err(|_| LedgerError::Validation(format!("Invalid amount: '{}'", text)))?;

    let scaled = value * BigDecimal::from(MINOR_UNITS_PER_MAJOR);
    if !scaled.is_integer() {
        return Err(LedgerError::Validation(format!(
            "Amount '{}' has more than two decimal places",
            text
        )));
    }

    scaled
        .to_i64()
        .ok_or_else(|| LedgerError::Validation(format!("Amount '{}' is out of range", text)))
}

/// Format minor units as a two-decimal amount string
pub fn format_minor_units(amount: i64) -> String {
    (BigDecimal::from(amount) / BigDecimal::from(MINOR_UNITS_PER_MAJOR))
        .with_scale(2)
        .to_string()
}
