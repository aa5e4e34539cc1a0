use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fiat amount, always stored to 2 decimal places, rounded half-to-even
/// at every assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fiat(Decimal);

impl Fiat {
    pub const ZERO: Fiat = Fiat(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
    }

    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Decimal::from_str(s).map(Self::new)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, other: Fiat) -> Option<Fiat> {
        self.0.checked_add(other.0).map(Fiat::new)
    }

    pub fn checked_sub(self, other: Fiat) -> Option<Fiat> {
        self.0.checked_sub(other.0).map(Fiat::new)
    }

    pub fn min(self, other: Fiat) -> Fiat {
        if self.0 <= other.0 { self } else { other }
    }

    pub fn max(self, other: Fiat) -> Fiat {
        if self.0 >= other.0 { self } else { other }
    }

    /// Percentage of this amount, e.g. `percent_of(Decimal::from(5))` for 5%.
    pub fn percent(self, percent: Decimal) -> Fiat {
        Fiat::new(self.0 * percent / Decimal::ONE_HUNDRED)
    }
}

impl fmt::Display for Fiat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Fiat {
    fn from(value: Decimal) -> Self {
        Fiat::new(value)
    }
}

/// Currencies the core is able to reconcile crypto payments in. Precision is
/// the number of decimal places that make up one "smallest unit" (e.g. a
/// satoshi is 1e-8 BTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CryptoCurrency {
    Btc,
    Ltc,
    Eth,
    Sol,
    Bnb,
    UsdtTrc20,
    UsdtErc20,
    UsdcErc20,
}

impl CryptoCurrency {
    /// Smallest-unit precision, overridable at startup via the
    /// `CRYPTO_DECIMAL_PLACES` configuration table.
    pub fn default_decimal_places(self) -> u32 {
        match self {
            CryptoCurrency::Btc => 8,
            CryptoCurrency::Ltc => 8,
            CryptoCurrency::Eth => 18,
            CryptoCurrency::Sol => 9,
            CryptoCurrency::Bnb => 18,
            CryptoCurrency::UsdtTrc20 => 6,
            CryptoCurrency::UsdtErc20 => 6,
            CryptoCurrency::UsdcErc20 => 6,
        }
    }
}

/// A crypto amount normalized to an integer count of the currency's smallest
/// unit. All comparisons between paid and required amounts must go through
/// this type rather than raw floats or decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CryptoAmount {
    smallest_units: i128,
    decimal_places: u32,
}

impl CryptoAmount {
    pub fn normalize(amount: Decimal, decimal_places: u32) -> Self {
        let scale = Decimal::from(10i64.pow(decimal_places));
        let smallest_units = (amount * scale)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .mantissa();
        Self { smallest_units, decimal_places }
    }

    pub fn smallest_units(&self) -> i128 {
        self.smallest_units
    }

    /// `self / (1 + percent/100)` comparisons are done by scaling the
    /// threshold, not by converting back to a float.
    pub fn within_tolerance_of(&self, required: CryptoAmount, tolerance_percent: Decimal) -> bool {
        debug_assert_eq!(self.decimal_places, required.decimal_places);
        let ceiling = Decimal::from(required.smallest_units)
            * (Decimal::ONE + tolerance_percent / Decimal::ONE_HUNDRED);
        let ceiling = ceiling.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven).mantissa();
        self.smallest_units > required.smallest_units && self.smallest_units <= ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fiat_rounds_half_to_even() {
        assert_eq!(Fiat::new(dec!(10.125)).to_string(), "10.12");
        assert_eq!(Fiat::new(dec!(10.135)).to_string(), "10.14");
    }

    #[test]
    fn crypto_amount_normalizes_to_smallest_unit() {
        let btc = CryptoAmount::normalize(dec!(0.00020000), CryptoCurrency::Btc.default_decimal_places());
        assert_eq!(btc.smallest_units(), 20_000);
    }

    #[test]
    fn tolerance_excludes_exact_match() {
        let required = CryptoAmount::normalize(dec!(0.00020000), 8);
        let exact = CryptoAmount::normalize(dec!(0.00020000), 8);
        assert!(!exact.within_tolerance_of(required, dec!(0.1)));

        let minor_over = CryptoAmount::normalize(dec!(0.00020015), 8);
        assert!(minor_over.within_tolerance_of(required, dec!(0.1)));

        let major_over = CryptoAmount::normalize(dec!(0.00021000), 8);
        assert!(!major_over.within_tolerance_of(required, dec!(0.1)));
    }
}
