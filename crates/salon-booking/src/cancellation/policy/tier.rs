use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::PolicyError;
use crate::cancellation::domain::TierId;

/// Monetary amounts are kept to cents.
const MONEY_DECIMAL_PLACES: u32 = 2;

/// How a tier turns the service price into a cancellation fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    Percentage,
    Fixed,
}

impl FeeType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

/// One advance-notice threshold with its fee rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub name: String,
    pub advance_notice_hours: u32,
    pub fee_type: FeeType,
    pub fee_value: Decimal,
    pub allows_refund: bool,
    /// Presentation order in client-facing policy summaries; ignored by evaluation.
    pub display_order: u32,
}

impl Tier {
    /// Fee owed when this tier applies to a booking priced at `service_price`.
    ///
    /// Fixed fees are returned as configured and are not capped at the price. Prices too
    /// large for a percentage to be taken exactly are rejected.
    pub fn calculate_fee(&self, service_price: Decimal) -> Result<Decimal, PolicyError> {
        match self.fee_type {
            FeeType::Percentage => service_price
                .checked_mul(self.fee_value)
                .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
                .map(|fee| {
                    fee.round_dp_with_strategy(
                        MONEY_DECIMAL_PLACES,
                        RoundingStrategy::MidpointAwayFromZero,
                    )
                })
                .ok_or_else(|| PolicyError::FeeOverflow {
                    tier: self.name.clone(),
                    price: service_price,
                }),
            FeeType::Fixed => Ok(self.fee_value),
        }
    }

    /// Whether the actual notice (possibly fractional or negative) meets this threshold.
    pub fn applies_to(&self, advance_notice_hours: Decimal) -> bool {
        advance_notice_hours >= Decimal::from(self.advance_notice_hours)
    }

    pub(crate) fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::UnnamedTier(self.id.clone()));
        }

        let in_range = match self.fee_type {
            FeeType::Percentage => {
                self.fee_value >= Decimal::ZERO && self.fee_value <= Decimal::ONE_HUNDRED
            }
            FeeType::Fixed => self.fee_value >= Decimal::ZERO,
        };

        if in_range {
            Ok(())
        } else {
            Err(PolicyError::FeeOutOfRange {
                tier: self.name.clone(),
                fee_type: self.fee_type,
                value: self.fee_value,
            })
        }
    }
}
