//! Money and tax primitives.
//!
//! All monetary amounts in this workspace are unsigned integers in the
//! smallest currency unit (e.g. cents). Rounding to currency precision is
//! therefore inherent: tax computation rounds half-up to the nearest minor
//! unit and never touches floating point.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Basis points per whole (100%).
const BPS_SCALE: u32 = 10_000;

/// Tax rate expressed in basis points (1/100th of a percent).
///
/// Covers the [0, 1] fractional range at 0.01% resolution: `0` is tax-free,
/// `2100` is 21%, `10_000` is 100%.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u16);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(0);

    pub fn from_basis_points(bps: u16) -> DomainResult<Self> {
        if u32::from(bps) > BPS_SCALE {
            return Err(DomainError::validation(format!(
                "tax rate must be between 0 and {BPS_SCALE} basis points, got {bps}"
            )));
        }
        Ok(Self(bps))
    }

    /// Whole-percent convenience constructor (21 → 21.00%).
    pub fn from_percent(percent: u8) -> DomainResult<Self> {
        let bps = u32::from(percent) * 100;
        if bps > BPS_SCALE {
            return Err(DomainError::validation(format!(
                "tax rate must not exceed 100%, got {percent}%"
            )));
        }
        Ok(Self(bps as u16))
    }

    pub fn basis_points(&self) -> u16 {
        self.0
    }

    /// Tax owed on `amount` minor units, rounded half-up to the minor unit.
    pub fn tax_on(&self, amount: u64) -> u64 {
        let product = u128::from(amount) * u128::from(self.0);
        let half = u128::from(BPS_SCALE) / 2;
        ((product + half) / u128::from(BPS_SCALE)) as u64
    }
}

impl core::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl ValueObject for TaxRate {}

/// Currency configuration: ISO code plus minor-unit exponent.
///
/// No conversion happens anywhere in the workspace; the exponent only
/// drives display formatting of minor-unit amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    exponent: u8,
}

impl Currency {
    pub fn new(code: impl Into<String>, exponent: u8) -> DomainResult<Self> {
        let code = code.into();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "currency code must be three uppercase ASCII letters, got {code:?}"
            )));
        }
        Ok(Self { code, exponent })
    }

    pub fn eur() -> Self {
        Self {
            code: "EUR".to_string(),
            exponent: 2,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exponent(&self) -> u8 {
        self.exponent
    }

    /// Render a minor-unit amount in major units, e.g. 12345 → "123.45 EUR".
    pub fn format_minor(&self, amount: u64) -> String {
        if self.exponent == 0 {
            return format!("{} {}", amount, self.code);
        }
        let divisor = 10u64.pow(u32::from(self.exponent));
        format!(
            "{}.{:0width$} {}",
            amount / divisor,
            amount % divisor,
            self.code,
            width = usize::from(self.exponent)
        )
    }
}

impl ValueObject for Currency {}

/// `amount + tax`, guarded against overflow.
pub fn checked_total(amount: u64, tax_amount: u64) -> DomainResult<u64> {
    amount
        .checked_add(tax_amount)
        .ok_or_else(|| DomainError::validation("expense total overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_on_rounds_half_up() {
        // 21% of 0.10 = 0.021 → 0.02
        let rate = TaxRate::from_percent(21).unwrap();
        assert_eq!(rate.tax_on(10), 2);
        // 5% of 0.10 = 0.005 → 0.01 (half rounds up)
        let rate = TaxRate::from_percent(5).unwrap();
        assert_eq!(rate.tax_on(10), 1);
        // 10.5% of 100.00 = 10.50 exactly
        let rate = TaxRate::from_basis_points(1050).unwrap();
        assert_eq!(rate.tax_on(10_000), 1_050);
    }

    #[test]
    fn zero_rate_yields_zero_tax() {
        assert_eq!(TaxRate::ZERO.tax_on(u64::MAX), 0);
    }

    #[test]
    fn full_rate_doubles_total() {
        let rate = TaxRate::from_basis_points(10_000).unwrap();
        assert_eq!(rate.tax_on(12_345), 12_345);
    }

    #[test]
    fn rejects_rate_above_one() {
        assert!(TaxRate::from_basis_points(10_001).is_err());
        assert!(TaxRate::from_percent(101).is_err());
    }

    #[test]
    fn currency_code_must_be_iso_like() {
        assert!(Currency::new("EUR", 2).is_ok());
        assert!(Currency::new("eur", 2).is_err());
        assert!(Currency::new("EURO", 2).is_err());
    }

    #[test]
    fn formats_minor_units_with_exponent() {
        let eur = Currency::eur();
        assert_eq!(eur.format_minor(12_345), "123.45 EUR");
        assert_eq!(eur.format_minor(5), "0.05 EUR");
        let jpy = Currency::new("JPY", 0).unwrap();
        assert_eq!(jpy.format_minor(500), "500 JPY");
    }

    #[test]
    fn checked_total_detects_overflow() {
        assert_eq!(checked_total(2, 3).unwrap(), 5);
        assert!(checked_total(u64::MAX, 1).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: tax never exceeds the taxed amount (rate ≤ 100%).
            #[test]
            fn tax_bounded_by_amount(amount in 0u64..=1_000_000_000_000, bps in 0u16..=10_000) {
                let rate = TaxRate::from_basis_points(bps).unwrap();
                prop_assert!(rate.tax_on(amount) <= amount.saturating_add(1));
            }

            /// Property: tax is monotonic in the rate for a fixed amount.
            #[test]
            fn tax_monotonic_in_rate(amount in 0u64..=1_000_000_000_000, bps in 0u16..10_000) {
                let low = TaxRate::from_basis_points(bps).unwrap();
                let high = TaxRate::from_basis_points(bps + 1).unwrap();
                prop_assert!(low.tax_on(amount) <= high.tax_on(amount));
            }
        }
    }
}
