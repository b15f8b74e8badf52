use rust_decimal::{Decimal, RoundingStrategy};

use crate::utils::error::{AppError, AppResult};

/// Decimal places of every stored amount (`NUMERIC(12, 2)`).
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(12, 2)` column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, MONEY_SCALE)
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects amounts the money columns cannot store exactly: negative values,
/// more than two decimal places, or anything above [`max_amount`].
pub fn check_amount(field: &str, value: Decimal) -> AppResult<()> {
    if value.is_sign_negative() {
        return Err(AppError::ValidationError(format!(
            "{field} must not be negative"
        )));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(AppError::ValidationError(format!(
            "{field} must have at most {MONEY_SCALE} decimal places"
        )));
    }
    if value > max_amount() {
        return Err(AppError::ValidationError(format!(
            "{field} exceeds the maximum of {}",
            max_amount()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_zeros_are_not_extra_precision() {
        assert!(check_amount("total_amount", Decimal::new(204000, 3)).is_ok());
        assert!(check_amount("total_amount", Decimal::new(204005, 3)).is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(check_amount("subtotal", max_amount()).is_ok());
        assert!(check_amount("subtotal", max_amount() + Decimal::new(1, 2)).is_err());
        assert!(check_amount("subtotal", Decimal::new(-1, 2)).is_err());
        assert!(check_amount("subtotal", Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(2045, 3)), Decimal::new(205, 2));
    }
}
