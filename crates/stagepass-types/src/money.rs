//! Money types in integral minor-currency units
//!
//! Ticketing flows charge whole minor units (cents) in a single configured
//! currency, so amounts are plain i64 cents rather than fixed-point decimals.
//! All arithmetic is overflow-checked and currency-aware.

use crate::error::{Result, StagepassError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }

    /// Parse an ISO code (case-insensitive); unknown codes are a validation error
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            other => Err(StagepassError::validation(
                "currency",
                format!("unsupported currency {other}"),
            )),
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::Usd
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A non-negative amount of money in minor units (cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Value in minor units (e.g. cents for USD)
    pub minor: i64,
    /// The currency
    pub currency: Currency,
}

impl Amount {
    /// Create a new amount from minor units
    pub fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Create a zero amount
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Checked addition (currencies must match)
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.require_same_currency(&other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(StagepassError::AmountOverflow)?;
        Ok(Self { minor, ..self })
    }

    /// Checked subtraction; going below zero is an error
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.require_same_currency(&other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .filter(|m| *m >= 0)
            .ok_or(StagepassError::AmountUnderflow)?;
        Ok(Self { minor, ..self })
    }

    /// Checked multiplication by a unit count (quantity x unit price)
    pub fn checked_mul(self, units: u32) -> Result<Self> {
        let minor = self
            .minor
            .checked_mul(units as i64)
            .ok_or(StagepassError::AmountOverflow)?;
        Ok(Self { minor, ..self })
    }

    /// Subtract a fee, saturating at zero when the fee exceeds the amount
    pub fn saturating_sub(self, other: Self) -> Self {
        if self.currency != other.currency {
            return self;
        }
        Self {
            minor: (self.minor - other.minor).max(0),
            ..self
        }
    }

    fn require_same_currency(&self, other: &Self) -> Result<()> {
        if self.currency != other.currency {
            return Err(StagepassError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: other.currency.code().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero(Currency::default())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02} {}",
            self.minor / 100,
            (self.minor % 100).abs(),
            self.currency
        )
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.minor.partial_cmp(&other.minor)
    }
}
