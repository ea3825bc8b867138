//! Core type definitions and value objects for the domain model
//!
//! Strongly-typed wrappers for plans, intents and SOL amounts so that
//! lamports and decimal SOL values are never mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::core::domain::LAMPORTS_PER_SOL;
use crate::core::error::AppError;
use crate::core::result::AppResult;

/// Unique identifier for a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentId(pub Uuid);

impl IntentId {
    /// Create a new random intent ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A purchasable block of bot trading time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Hours of trading time granted
    pub hours: u32,
    /// Price in SOL
    #[serde(rename = "sol")]
    pub price_sol: Decimal,
    /// Display label
    pub label: String,
}

impl Plan {
    /// Create a validated plan
    pub fn new<S: Into<String>>(hours: u32, price_sol: Decimal, label: S) -> AppResult<Self> {
        let plan = Self {
            hours,
            price_sol,
            label: label.into(),
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Check the plan invariants (positive hours and price, non-empty label)
    pub fn validate(&self) -> AppResult<()> {
        if self.hours == 0 {
            return Err(AppError::Validation {
                message: "Plan hours must be positive".to_string(),
                field: Some("hours".to_string()),
                value: Some(self.hours.to_string()),
            });
        }
        if self.price_sol <= Decimal::ZERO {
            return Err(AppError::Validation {
                message: "Plan price must be positive".to_string(),
                field: Some("sol".to_string()),
                value: Some(self.price_sol.to_string()),
            });
        }
        if self.label.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Plan label cannot be empty".to_string(),
                field: Some("label".to_string()),
                value: None,
            });
        }
        Ok(())
    }

    /// Plan price in lamports
    pub fn price_lamports(&self) -> AppResult<u64> {
        sol_to_lamports(self.price_sol)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} h, {} SOL)", self.label, self.hours, self.price_sol)
    }
}

/// Convert a SOL amount into lamports
///
/// Fractions below one lamport are rejected rather than truncated.
pub fn sol_to_lamports(sol: Decimal) -> AppResult<u64> {
    let lamports = sol
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .ok_or_else(|| AppError::validation(format!("Amount {} SOL is out of range", sol)))?;
    if lamports.fract() != Decimal::ZERO {
        return Err(AppError::validation(format!(
            "Amount {} SOL is not a whole number of lamports",
            sol
        )));
    }
    lamports
        .to_u64()
        .ok_or_else(|| AppError::validation(format!("Amount {} SOL is out of range", sol)))
}

/// Convert lamports into a SOL amount
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// Shorten an address or signature for logs (`abcdefgh...`)
pub fn abbreviate(value: &str) -> String {
    match value.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
