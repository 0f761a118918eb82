use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Booking, BookingCancellation, BookingId, BookingStatus, PolicyId, UserId,
};
use super::policy::{Evaluation, EvaluationContext, EvaluationResult, Policy, PolicyScope};
use super::repository::{BookingStore, PolicyStore, RepositoryError};
use super::resolver::PolicyResolver;

/// Fee quote for cancelling a booking at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeSummary {
    pub fee_amount: Decimal,
    pub refund_amount: Decimal,
    pub tier_name: Option<String>,
    pub allows_refund: bool,
    pub policy_id: PolicyId,
    pub policy_name: String,
    pub advance_hours: i64,
    pub result: EvaluationResult,
    pub message: String,
    pub fee_exceeds_price: bool,
}

impl FeeSummary {
    fn new(policy: &Policy, evaluation: &Evaluation, context: &EvaluationContext) -> Self {
        let tier = evaluation.applicable_tier.as_ref();
        Self {
            fee_amount: evaluation.fee_amount,
            refund_amount: evaluation.refund_amount,
            tier_name: tier.map(|tier| tier.name.clone()),
            allows_refund: tier.map_or(false, |tier| tier.allows_refund),
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            advance_hours: context.advance_notice_whole_hours(),
            result: evaluation.result,
            message: evaluation.message.clone(),
            fee_exceeds_price: evaluation.fee_exceeds_price,
        }
    }
}

/// Yes/no answer for a prospective cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub can_cancel: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_info: Option<FeeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPolicy {
    pub id: PolicyId,
    pub name: String,
}

/// Result of a completed cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationOutcome {
    pub success: bool,
    pub message: String,
    pub cancellation_fee: Decimal,
    pub refund_amount: Decimal,
    /// The fee is larger than the deposit already held, so the client owes the difference.
    pub payment_required: bool,
    pub policy_applied: AppliedPolicy,
    pub booking: Booking,
}

/// Everything learned about a booking while deciding whether it may be cancelled.
struct Assessment {
    booking: Booking,
    policy: Policy,
    evaluation: Evaluation,
    summary: FeeSummary,
}

enum Verdict {
    Eligible(Box<Assessment>),
    Ineligible {
        reason: String,
        fee_info: Option<FeeSummary>,
    },
}

/// Service computing cancellation fees and executing booking cancellations.
pub struct CancellationOrchestrator<B, P> {
    bookings: Arc<B>,
    resolver: PolicyResolver<P>,
}

impl<B, P> CancellationOrchestrator<B, P>
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    pub fn new(bookings: Arc<B>, policies: Arc<P>) -> Self {
        Self {
            bookings,
            resolver: PolicyResolver::new(policies),
        }
    }

    /// Quote the fee and refund for cancelling `booking_id` at `cancellation_time`.
    pub fn calculate_fee(
        &self,
        booking_id: &BookingId,
        cancellation_time: DateTime<Utc>,
    ) -> Result<FeeSummary, CancellationError> {
        let booking = self.load_booking(booking_id)?;
        if booking.is_cancelled() {
            return Err(CancellationError::AlreadyCancelled(booking.id));
        }

        let context = EvaluationContext::for_booking(&booking, cancellation_time);
        let (_, _, summary) = self.evaluate_booking(&booking, &context)?;
        Ok(summary)
    }

    /// Whether the booking may be cancelled at `cancellation_time`.
    ///
    /// Ineligibility is reported in the returned value; only store failures are errors.
    pub fn can_cancel(
        &self,
        booking_id: &BookingId,
        cancellation_time: DateTime<Utc>,
    ) -> Result<Eligibility, CancellationError> {
        let eligibility = match self.verdict(booking_id, cancellation_time)? {
            Verdict::Eligible(assessment) => {
                let Assessment {
                    evaluation,
                    summary,
                    ..
                } = *assessment;
                Eligibility {
                    can_cancel: true,
                    reason: evaluation.message,
                    fee_info: Some(summary),
                }
            }
            Verdict::Ineligible { reason, fee_info } => Eligibility {
                can_cancel: false,
                reason,
                fee_info,
            },
        };
        Ok(eligibility)
    }

    /// Cancel the booking, recording the fee and the policy that produced it.
    ///
    /// The write is conditional on the status read during the eligibility check, so of
    /// two concurrent requests at most one succeeds.
    pub fn cancel(
        &self,
        booking_id: &BookingId,
        cancelled_by: &UserId,
        reason: &str,
        cancellation_time: DateTime<Utc>,
    ) -> Result<CancellationOutcome, CancellationError> {
        let assessment = match self.verdict(booking_id, cancellation_time)? {
            Verdict::Eligible(assessment) => *assessment,
            Verdict::Ineligible { reason, .. } => {
                return Err(CancellationError::CancellationNotAllowed(reason))
            }
        };

        let Assessment {
            booking,
            policy,
            evaluation,
            ..
        } = assessment;

        let payment_required = evaluation.fee_amount > booking.deposit_held();
        let cancellation = BookingCancellation {
            cancelled_at: cancellation_time,
            reason: reason.to_string(),
            cancelled_by_id: cancelled_by.clone(),
            fee_amount: evaluation.fee_amount,
            policy_id: booking
                .cancellation_policy_id
                .is_none()
                .then(|| policy.id.clone()),
        };

        let Some(updated) =
            self.bookings
                .apply_cancellation(&booking.id, booking.status, cancellation)?
        else {
            warn!(
                booking_id = %booking.id,
                expected_status = booking.status.label(),
                "booking changed before cancellation could be recorded"
            );
            return Err(CancellationError::ConcurrentModification(booking.id));
        };

        info!(
            booking_id = %updated.id,
            policy_id = %policy.id,
            fee = %evaluation.fee_amount,
            refund = %evaluation.refund_amount,
            payment_required,
            "booking cancelled"
        );

        let message = match evaluation.result {
            EvaluationResult::AllowedNoFee => "booking cancelled without fee".to_string(),
            _ => format!("booking cancelled with fee of {}", evaluation.fee_amount),
        };

        Ok(CancellationOutcome {
            success: true,
            message,
            cancellation_fee: evaluation.fee_amount,
            refund_amount: evaluation.refund_amount,
            payment_required,
            policy_applied: AppliedPolicy {
                id: policy.id,
                name: policy.name,
            },
            booking: updated,
        })
    }

    /// Bind a specific policy to a booking, or the platform default effective at `at`.
    ///
    /// Cancelled bookings keep the policy that produced their recorded fee.
    pub fn assign_policy(
        &self,
        booking_id: &BookingId,
        policy_id: Option<&PolicyId>,
        at: DateTime<Utc>,
    ) -> Result<Booking, CancellationError> {
        let booking = self.load_booking(booking_id)?;
        if booking.is_cancelled() {
            return Err(CancellationError::AlreadyCancelled(booking.id));
        }

        let policy = match policy_id {
            Some(policy_id) => self
                .resolver
                .store()
                .get_by_id(policy_id)?
                .ok_or_else(|| CancellationError::policy_not_found(policy_id))?,
            None => self
                .resolver
                .resolve(None, at)?
                .ok_or_else(|| CancellationError::NoPolicyAvailable(booking.id.clone()))?,
        };

        if let PolicyScope::Salon(policy_salon) = &policy.scope {
            if booking.salon_id.as_ref() != Some(policy_salon) {
                return Err(CancellationError::InvalidConfiguration(format!(
                    "policy {} is scoped to salon {} which does not own booking {}",
                    policy.id, policy_salon, booking.id
                )));
            }
        }

        let bound = self
            .bookings
            .bind_policy(&booking.id, &policy.id)
            .map_err(|err| match err {
                RepositoryError::NotFound => CancellationError::booking_not_found(&booking.id),
                other => other.into(),
            })?;

        info!(booking_id = %bound.id, policy_id = %policy.id, "cancellation policy assigned");
        Ok(bound)
    }

    fn load_booking(&self, booking_id: &BookingId) -> Result<Booking, CancellationError> {
        self.bookings
            .get_by_id(booking_id)?
            .ok_or_else(|| CancellationError::booking_not_found(booking_id))
    }

    /// Bound policy when it still exists, otherwise the salon policy, otherwise the
    /// platform default.
    fn policy_for(
        &self,
        booking: &Booking,
        at: DateTime<Utc>,
    ) -> Result<Policy, CancellationError> {
        if let Some(policy_id) = &booking.cancellation_policy_id {
            if let Some(policy) = self.resolver.store().get_by_id(policy_id)? {
                return Ok(policy);
            }
            warn!(
                booking_id = %booking.id,
                %policy_id,
                "bound cancellation policy no longer exists, resolving by salon"
            );
        }

        self.resolver
            .resolve(booking.salon_id.as_ref(), at)?
            .ok_or_else(|| CancellationError::NoPolicyAvailable(booking.id.clone()))
    }

    fn evaluate_booking(
        &self,
        booking: &Booking,
        context: &EvaluationContext,
    ) -> Result<(Policy, Evaluation, FeeSummary), CancellationError> {
        let policy = self.policy_for(booking, context.cancellation_time)?;
        let evaluation = policy
            .evaluate(context)
            .map_err(|err| CancellationError::InvalidConfiguration(err.to_string()))?;

        if evaluation.fee_exceeds_price {
            warn!(
                booking_id = %booking.id,
                policy_id = %policy.id,
                fee = %evaluation.fee_amount,
                service_price = %booking.service_price,
                "cancellation fee exceeds service price"
            );
        }

        let summary = FeeSummary::new(&policy, &evaluation, context);
        Ok((policy, evaluation, summary))
    }

    fn assess(
        &self,
        booking_id: &BookingId,
        cancellation_time: DateTime<Utc>,
    ) -> Result<Assessment, CancellationError> {
        let booking = self.load_booking(booking_id)?;

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(CancellationError::AlreadyCancelled(booking.id));
            }
            BookingStatus::Completed => {
                return Err(CancellationError::CancellationNotAllowed(
                    "completed bookings cannot be cancelled".to_string(),
                ));
            }
            _ => {}
        }

        let context = EvaluationContext::for_booking(&booking, cancellation_time);
        if context.has_started() {
            return Err(CancellationError::CancellationNotAllowed(
                "appointment time has already passed".to_string(),
            ));
        }

        let (policy, evaluation, summary) = self.evaluate_booking(&booking, &context)?;
        Ok(Assessment {
            booking,
            policy,
            evaluation,
            summary,
        })
    }

    fn verdict(
        &self,
        booking_id: &BookingId,
        cancellation_time: DateTime<Utc>,
    ) -> Result<Verdict, CancellationError> {
        match self.assess(booking_id, cancellation_time) {
            Ok(assessment) if assessment.evaluation.result.is_allowed() => {
                Ok(Verdict::Eligible(Box::new(assessment)))
            }
            Ok(assessment) => Ok(Verdict::Ineligible {
                reason: assessment.evaluation.message,
                fee_info: Some(assessment.summary),
            }),
            Err(err) if err.is_infrastructure() => Err(err),
            Err(CancellationError::CancellationNotAllowed(reason)) => Ok(Verdict::Ineligible {
                reason,
                fee_info: None,
            }),
            Err(err) => Ok(Verdict::Ineligible {
                reason: err.to_string(),
                fee_info: None,
            }),
        }
    }
}

/// Error raised by the cancellation orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CancellationError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("booking {0} is already cancelled")]
    AlreadyCancelled(BookingId),
    #[error("no cancellation policy available for booking {0}")]
    NoPolicyAvailable(BookingId),
    #[error("cancellation not allowed: {0}")]
    CancellationNotAllowed(String),
    #[error("booking {0} was modified by another request and may already be cancelled")]
    ConcurrentModification(BookingId),
    #[error("invalid cancellation policy configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CancellationError {
    /// Store failures, as opposed to reasons a booking cannot be cancelled.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Repository(_))
    }

    pub(crate) fn booking_not_found(id: &BookingId) -> Self {
        Self::NotFound {
            entity: "booking",
            id: id.to_string(),
        }
    }

    pub(crate) fn policy_not_found(id: &PolicyId) -> Self {
        Self::NotFound {
            entity: "policy",
            id: id.to_string(),
        }
    }
}
