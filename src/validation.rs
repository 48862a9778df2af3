//! Input validation for order numbers and withdrawal amounts
//!
//! Validated types keep their fields private so every value that reaches the
//! store has passed through `new()`.

use rust_decimal::Decimal;
use std::fmt;

// ============================================================================
// Validation Errors
// ============================================================================

/// Validation errors raised at the service boundary
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Order number must not be empty")]
    EmptyOrderNumber,

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Order number '{0}' fails the Luhn checksum")]
    ChecksumMismatch(String),

    #[error("Amount must be greater than zero: got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Amount has more than {max} decimal places: got {got}")]
    PrecisionOverflow { got: Decimal, max: u32 },
}

// ============================================================================
// OrderNumber - Luhn-valid digit string
// ============================================================================

/// Maximum number of digits accepted in an order number
pub const MAX_ORDER_NUMBER_LEN: usize = 32;

/// Validated order number (ASCII digits passing the Luhn checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Validate and wrap an order number
    ///
    /// # Validation Rules
    /// - Surrounding whitespace is trimmed
    /// - 1 to 32 ASCII digits
    /// - Luhn checksum must hold
    ///
    /// # Examples
    /// ```
    /// use bonus_accrual::validation::OrderNumber;
    ///
    /// let number = OrderNumber::new("79927398713").unwrap();
    /// assert_eq!(number.as_str(), "79927398713");
    ///
    /// assert!(OrderNumber::new("79927398710").is_err()); // bad check digit
    /// ```
    pub fn new(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(ValidationError::EmptyOrderNumber);
        }

        if raw.len() > MAX_ORDER_NUMBER_LEN || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "order",
                value: raw.to_string(),
                expected: "1-32 ASCII digits",
            });
        }

        if !luhn_valid(raw) {
            return Err(ValidationError::ChecksumMismatch(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Luhn checksum over a string of ASCII digits.
///
/// Starting from the rightmost digit, every second digit is doubled and
/// reduced by 9 when it exceeds 9; the total must be divisible by 10.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return false;
        }
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

// ============================================================================
// Amounts
// ============================================================================

/// Scale of the `NUMERIC(15,2)` amount columns
pub const AMOUNT_SCALE: u32 = 2;

/// Validate a withdrawal amount: strictly positive, at most two decimals.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    let normalized = amount.normalize();
    if normalized.scale() > AMOUNT_SCALE {
        return Err(ValidationError::PrecisionOverflow {
            got: amount,
            max: AMOUNT_SCALE,
        });
    }
    Ok(normalized)
}
