use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use super::{Policy, PolicyError, Tier};
use crate::cancellation::domain::{Booking, BookingId, ClientId, ProfessionalId, SalonId};

const MILLISECONDS_PER_HOUR: i64 = 3_600_000;

/// Booking timing and price captured at the instant a cancellation is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub booking_id: BookingId,
    pub scheduled_time: DateTime<Utc>,
    pub cancellation_time: DateTime<Utc>,
    pub service_price: Decimal,
    pub client_id: ClientId,
    pub professional_id: ProfessionalId,
    pub salon_id: Option<SalonId>,
}

impl EvaluationContext {
    pub fn for_booking(booking: &Booking, cancellation_time: DateTime<Utc>) -> Self {
        Self {
            booking_id: booking.id.clone(),
            scheduled_time: booking.scheduled_time,
            cancellation_time,
            service_price: booking.service_price,
            client_id: booking.client_id.clone(),
            professional_id: booking.professional_id.clone(),
            salon_id: booking.salon_id.clone(),
        }
    }

    /// Hours of notice given, to the millisecond, and negative once the appointment
    /// has started.
    pub fn advance_notice_hours(&self) -> Decimal {
        let millis = (self.scheduled_time - self.cancellation_time).num_milliseconds();
        Decimal::from(millis) / Decimal::from(MILLISECONDS_PER_HOUR)
    }

    pub fn has_started(&self) -> bool {
        self.scheduled_time < self.cancellation_time
    }

    /// Whole hours of notice, truncated toward zero.
    pub fn advance_notice_whole_hours(&self) -> i64 {
        (self.scheduled_time - self.cancellation_time).num_hours()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationResult {
    AllowedNoFee,
    AllowedWithFee,
    NotAllowed,
}

impl EvaluationResult {
    pub const fn is_allowed(self) -> bool {
        !matches!(self, Self::NotAllowed)
    }
}

/// Outcome of applying a policy to a cancellation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub result: EvaluationResult,
    pub applicable_tier: Option<Tier>,
    pub fee_amount: Decimal,
    pub refund_amount: Decimal,
    pub message: String,
    pub policy_used: Option<Policy>,
    /// Set when a fixed fee is larger than the service price, leaving a negative refund.
    pub fee_exceeds_price: bool,
}

impl Evaluation {
    fn not_allowed(policy: &Policy, tier: Option<&Tier>, message: String) -> Self {
        Self {
            result: EvaluationResult::NotAllowed,
            applicable_tier: tier.cloned(),
            fee_amount: Decimal::ZERO,
            refund_amount: Decimal::ZERO,
            message,
            policy_used: Some(policy.clone()),
            fee_exceeds_price: false,
        }
    }
}

impl Policy {
    /// Decide whether the context may be cancelled under this policy and at what cost.
    ///
    /// Only fails when the fee cannot be represented for the booking's price.
    pub fn evaluate(&self, context: &EvaluationContext) -> Result<Evaluation, PolicyError> {
        if !self.is_effective_at(context.cancellation_time) {
            return Ok(Evaluation::not_allowed(
                self,
                None,
                "policy not effective".to_string(),
            ));
        }

        let Some(tier) = self.find_applicable_tier(context.advance_notice_hours()) else {
            return Ok(Evaluation::not_allowed(
                self,
                None,
                "insufficient advance notice".to_string(),
            ));
        };

        if !tier.allows_refund {
            return Ok(non_refundable_outcome(self, tier));
        }

        let fee_amount = tier.calculate_fee(context.service_price)?;
        let refund_amount = context
            .service_price
            .checked_sub(fee_amount)
            .ok_or_else(|| PolicyError::FeeOverflow {
                tier: tier.name.clone(),
                price: context.service_price,
            })?;
        let fee_exceeds_price = refund_amount < Decimal::ZERO;

        let (result, message) = if fee_amount.is_zero() {
            (
                EvaluationResult::AllowedNoFee,
                format!("cancellation allowed without fee under tier '{}'", tier.name),
            )
        } else {
            (
                EvaluationResult::AllowedWithFee,
                format!(
                    "cancellation allowed with fee of {} under tier '{}'",
                    fee_amount, tier.name
                ),
            )
        };

        Ok(Evaluation {
            result,
            applicable_tier: Some(tier.clone()),
            fee_amount,
            refund_amount,
            message,
            policy_used: Some(self.clone()),
            fee_exceeds_price,
        })
    }
}

/// A tier that does not allow refunds blocks the cancellation outright rather than
/// charging the full price.
fn non_refundable_outcome(policy: &Policy, tier: &Tier) -> Evaluation {
    Evaluation::not_allowed(
        policy,
        Some(tier),
        format!("refund not allowed for tier '{}'", tier.name),
    )
}
