//! Price representation using decimal arithmetic.
//!
//! Amounts are stored as `rust_decimal::Decimal` and travel as plain JSON
//! numbers (see the `rust_decimal::serde::float` annotations on the models).
//! The shop sells in Moroccan dirham only; no rounding contract is enforced
//! beyond two-decimal display.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A price in the shop currency.
    #[must_use]
    pub const fn mad(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::MAD)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency_code)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    /// Moroccan dirham.
    #[default]
    MAD,
    EUR,
    USD,
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::MAD => "MAD",
            Self::EUR => "EUR",
            Self::USD => "USD",
        };
        f.write_str(code)
    }
}
