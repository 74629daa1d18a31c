//! Exact conversion between the gateway's minor unit (millimes) and the
//! major unit (dinars) used in API responses. 1 TND = 1000 millimes.
//! All arithmetic is decimal; floats never touch money.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

pub const MILLIMES_PER_DINAR: i64 = 1000;

pub fn millimes_to_dinars(millimes: i64) -> Decimal {
    Decimal::new(millimes, 3)
}

pub fn dinars_to_millimes(dinars: Decimal) -> AppResult<i64> {
    let scaled = dinars * Decimal::from(MILLIMES_PER_DINAR);
    if !scaled.fract().is_zero() {
        return Err(AppError::ValidationError(format!(
            "Amount {dinars} is not representable in millimes"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| AppError::ValidationError(format!("Amount {dinars} is out of range")))
}

/// Gateway-bound amounts must be positive integers in millimes.
pub fn validate_positive_millimes(amount: i64) -> AppResult<i64> {
    if amount <= 0 {
        return Err(AppError::ValidationError(
            "Amount must be a positive number of millimes".to_string(),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_exact() {
        for millimes in [1i64, 1000, 1234567, 999, 5000, i64::from(u32::MAX)] {
            let dinars = millimes_to_dinars(millimes);
            assert_eq!(dinars_to_millimes(dinars).unwrap(), millimes);
        }
    }

    #[test]
    fn test_major_unit_formatting() {
        assert_eq!(millimes_to_dinars(5000).to_string(), "5.000");
        assert_eq!(millimes_to_dinars(1).to_string(), "0.001");
        assert_eq!(millimes_to_dinars(1234567).to_string(), "1234.567");
    }

    #[test]
    fn test_sub_millime_amount_rejected() {
        let dinars = Decimal::new(50005, 4); // 5.0005
        assert!(dinars_to_millimes(dinars).is_err());
    }

    #[test]
    fn test_validate_positive_millimes() {
        assert!(validate_positive_millimes(1).is_ok());
        assert!(validate_positive_millimes(0).is_err());
        assert!(validate_positive_millimes(-5000).is_err());
    }
}
