//! Validation utilities

use crate::traits::*;
use crate::types::*;

/// Validate that an amount in minor units is positive
pub fn validate_positive_amount(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an account ID is valid
pub fn validate_account_id(account_id: &str) -> LedgerResult<()> {
    if account_id.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account ID cannot be empty".to_string(),
        ));
    }

    if account_id.len() > 50 {
        return Err(LedgerError::Validation(
            "Account ID cannot exceed 50 characters".to_string(),
        ));
    }

    // Check for valid characters (alphanumeric, dashes, underscores)
    if !account_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::Validation(
            "Account ID can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that an entry description is valid
pub fn validate_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced entry validator with detailed shape checks
pub struct EnhancedEntryValidator;

impl EntryValidator for EnhancedEntryValidator {
    fn validate_request(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
    ) -> LedgerResult<()> {
        validate_account_id(account_id)?;
        validate_positive_amount(amount)?;
        validate_description(description)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_shape_is_enforced() {
        assert!(validate_account_id("emp-42").is_ok());
        assert!(validate_account_id("").is_err());
        assert!(validate_account_id("emp 42").is_err());
        assert!(validate_account_id(&"x".repeat(51)).is_err());
    }

    #[test]
    fn description_length_is_bounded() {
        assert!(validate_description("Diesel for generator").is_ok());
        assert!(validate_description("  ").is_err());
        assert!(validate_description(&"d".repeat(501)).is_err());
    }

    #[test]
    fn enhanced_validator_combines_the_checks() {
        let validator = EnhancedEntryValidator;
        assert!(validator.validate_request("emp-1", 100, "Cement").is_ok());
        assert!(validator.validate_request("emp 1", 100, "Cement").is_err());
        assert!(validator.validate_request("emp-1", 0, "Cement").is_err());
        assert!(validator.validate_request("emp-1", 100, "").is_err());
    }
}
