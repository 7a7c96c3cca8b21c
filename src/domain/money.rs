//! 定点金额运算
//!
//! All ledger amounts are `rust_decimal::Decimal` carried at 8 fractional digits.
//! Every fee, gross and net figure goes through [`quantize`], so the rounding
//! policy (round-half-even at 8 digits) is the same for every operation.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fractional digits kept in balances and journals (`NUMERIC(28, 8)`).
pub const LEDGER_SCALE: u32 = 8;

/// Exclusive upper bound of any stored amount: `NUMERIC(28, 8)` holds 20
/// integer digits, so every value must stay below 10^20.
pub const MAX_LEDGER_AMOUNT: Decimal =
    Decimal::from_parts(0x6310_0000, 0x6BC7_5E2D, 0x5, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("fee rate must be within [0, 1), got {0}")]
    InvalidRate(Decimal),
    #[error("invalid decimal `{0}`")]
    Parse(String),
    #[error("amount out of range")]
    Overflow,
    #[error("amount {0} exceeds the ledger maximum of {max}", max = MAX_LEDGER_AMOUNT)]
    AboveMaximum(Decimal),
}

/// Rejects values the balance column cannot hold.
pub fn ensure_storable(value: Decimal) -> Result<Decimal, MoneyError> {
    if value >= MAX_LEDGER_AMOUNT {
        return Err(MoneyError::AboveMaximum(value));
    }
    Ok(value)
}

/// Rounds to ledger precision using banker's rounding.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// 费率（小数形式，0.01 = 1%）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FeeRate(Decimal);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(Decimal::ZERO);

    pub fn new(rate: Decimal) -> Result<Self, MoneyError> {
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(MoneyError::InvalidRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `quantize(amount * rate)`
    pub fn fee_for(&self, amount: Decimal) -> Result<Decimal, MoneyError> {
        amount
            .checked_mul(self.0)
            .map(quantize)
            .ok_or(MoneyError::Overflow)
    }
}

impl TryFrom<Decimal> for FeeRate {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeeRate> for Decimal {
    fn from(rate: FeeRate) -> Self {
        rate.0
    }
}

impl FromStr for FeeRate {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Parse(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fee rates applied by the ledger engine, injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub withdrawal: FeeRate,
    pub conversion: FeeRate,
    pub transfer: FeeRate,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            withdrawal: FeeRate(Decimal::new(1, 2)),
            conversion: FeeRate(Decimal::new(2, 2)),
            transfer: FeeRate(Decimal::new(1, 2)),
        }
    }
}

/// Amount debited by a fee-bearing outflow (withdrawal, transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
}

pub fn debit_with_fee(amount: Decimal, rate: FeeRate) -> Result<FeeBreakdown, MoneyError> {
    let fee = rate.fee_for(amount)?;
    let total = amount.checked_add(fee).ok_or(MoneyError::Overflow)?;
    ensure_storable(total)?;
    Ok(FeeBreakdown { amount, fee, total })
}

/// 兑换明细：源金额按汇率换算后扣除兑换费
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionBreakdown {
    pub source_amount: Decimal,
    pub rate: Decimal,
    pub gross: Decimal,
    pub fee_rate: FeeRate,
    pub fee: Decimal,
    pub net: Decimal,
}

pub fn convert(
    amount: Decimal,
    rate: Decimal,
    fee_rate: FeeRate,
) -> Result<ConversionBreakdown, MoneyError> {
    let gross = amount
        .checked_mul(rate)
        .map(quantize)
        .ok_or(MoneyError::Overflow)?;
    ensure_storable(gross)?;
    let fee = fee_rate.fee_for(gross)?;
    let net = gross - fee;
    Ok(ConversionBreakdown {
        source_amount: amount,
        rate,
        gross,
        fee_rate,
        fee,
        net,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_withdrawal_fee_on_ten_usd() {
        let rate = FeeRate::new(dec!(0.01)).unwrap();
        let breakdown = debit_with_fee(dec!(10), rate).unwrap();
        assert_eq!(breakdown.fee, dec!(0.10));
        assert_eq!(breakdown.total, dec!(10.10));
    }

    #[test]
    fn test_conversion_usd_to_btc() {
        let fee_rate = FeeRate::new(dec!(0.02)).unwrap();
        let c = convert(dec!(10), dec!(0.00002), fee_rate).unwrap();
        assert_eq!(c.gross, dec!(0.0002));
        assert_eq!(c.fee, dec!(0.000004));
        assert_eq!(c.net, dec!(0.000196));
        assert_eq!(c.source_amount, dec!(10));
    }

    #[test]
    fn test_quantize_rounds_half_to_even() {
        assert_eq!(quantize(dec!(0.000000025)), dec!(0.00000002));
        assert_eq!(quantize(dec!(0.000000075)), dec!(0.00000008));
        assert_eq!(quantize(dec!(0.000000026)), dec!(0.00000003));
    }

    #[test]
    fn test_fee_rate_bounds() {
        assert!(FeeRate::new(dec!(0)).is_ok());
        assert!(FeeRate::new(dec!(0.99)).is_ok());
        assert_eq!(
            FeeRate::new(dec!(1)),
            Err(MoneyError::InvalidRate(dec!(1)))
        );
        assert!(FeeRate::new(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_fee_rate_from_str() {
        assert_eq!("0.015".parse::<FeeRate>().unwrap().as_decimal(), dec!(0.015));
        assert!(matches!("abc".parse::<FeeRate>(), Err(MoneyError::Parse(_))));
    }

    #[test]
    fn test_max_ledger_amount_is_ten_to_the_twentieth() {
        assert_eq!(MAX_LEDGER_AMOUNT, dec!(100000000000000000000));
        assert!(ensure_storable(dec!(99999999999999999999.99999999)).is_ok());
        assert_eq!(
            ensure_storable(MAX_LEDGER_AMOUNT),
            Err(MoneyError::AboveMaximum(MAX_LEDGER_AMOUNT))
        );
    }

    #[test]
    fn test_results_above_maximum_rejected() {
        let rate = FeeRate::new(dec!(0.01)).unwrap();
        // amount fits, amount + fee does not
        assert!(matches!(
            debit_with_fee(dec!(99999999999999999999), rate),
            Err(MoneyError::AboveMaximum(_))
        ));
        assert!(matches!(
            convert(dec!(1000), dec!(1000000000000000000), rate),
            Err(MoneyError::AboveMaximum(_))
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        let rate = FeeRate::new(dec!(0.5)).unwrap();
        assert_eq!(
            convert(Decimal::MAX, dec!(2), rate),
            Err(MoneyError::Overflow)
        );
    }
}
