use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Number of decimal places carried by every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Format an amount with exactly two decimal places.
/// Example: 2450 -> "2450.00", -12.5 -> "-12.50"
pub fn format_amount(amount: Decimal) -> String {
    let mut normalized = amount.round_dp(MONEY_SCALE);
    normalized.rescale(MONEY_SCALE);
    normalized.to_string()
}

/// Parse a decimal string into an amount.
/// Accepts at most two decimal places; anything finer is rejected rather than truncated.
pub fn parse_amount(input: &str) -> Result<Decimal, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    let amount = Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat)?;
    if !has_money_scale(amount) {
        return Err(ParseAmountError::TooPrecise);
    }
    Ok(amount)
}

/// Returns true when the amount fits the two-decimal money scale.
pub fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat,
    TooPrecise,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "empty amount"),
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
            ParseAmountError::TooPrecise => {
                write!(f, "amount has more than {} decimal places", MONEY_SCALE)
            }
        }
    }
}

impl std::error::Error for ParseAmountError {}
