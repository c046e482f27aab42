use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary amount in the smallest currency unit (cents for USD)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into().trim().to_uppercase(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Share of this amount for a 0-100 percentage, rounded half away from zero
    pub fn percentage(&self, percent: u8) -> Self {
        let scaled = i128::from(self.amount) * i128::from(percent);
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };

        Self {
            amount: i64::try_from(rounded).unwrap_or(i64::MAX),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
