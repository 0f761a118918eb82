use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{BookingId, PolicyId, UserId};
use super::repository::{BookingStore, PolicyStore, RepositoryError};
use super::service::{CancellationError, CancellationOrchestrator};

/// Router builder exposing the cancellation operations for a booking.
pub fn cancellation_router<B, P>(service: Arc<CancellationOrchestrator<B, P>>) -> Router
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/bookings/:booking_id/cancellation/fee",
            get(fee_handler::<B, P>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancellation/eligibility",
            get(eligibility_handler::<B, P>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancellation",
            post(cancel_handler::<B, P>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancellation/policy",
            put(assign_policy_handler::<B, P>),
        )
        .with_state(service)
}

/// Evaluation instant; the wall clock is only consulted when the caller omits it.
#[derive(Debug, Default, Deserialize)]
pub struct AtQuery {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub cancelled_by: UserId,
    pub reason: String,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignPolicyRequest {
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

pub(crate) async fn fee_handler<B, P>(
    State(service): State<Arc<CancellationOrchestrator<B, P>>>,
    Path(booking_id): Path<String>,
    Query(query): Query<AtQuery>,
) -> Response
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    let at = query.at.unwrap_or_else(Utc::now);
    match service.calculate_fee(&BookingId(booking_id), at) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn eligibility_handler<B, P>(
    State(service): State<Arc<CancellationOrchestrator<B, P>>>,
    Path(booking_id): Path<String>,
    Query(query): Query<AtQuery>,
) -> Response
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    let at = query.at.unwrap_or_else(Utc::now);
    match service.can_cancel(&BookingId(booking_id), at) {
        Ok(eligibility) => (StatusCode::OK, axum::Json(eligibility)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<B, P>(
    State(service): State<Arc<CancellationOrchestrator<B, P>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    let at = request.at.unwrap_or_else(Utc::now);
    match service.cancel(
        &BookingId(booking_id),
        &request.cancelled_by,
        &request.reason,
        at,
    ) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn assign_policy_handler<B, P>(
    State(service): State<Arc<CancellationOrchestrator<B, P>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<AssignPolicyRequest>,
) -> Response
where
    B: BookingStore + 'static,
    P: PolicyStore + 'static,
{
    let at = request.at.unwrap_or_else(Utc::now);
    match service.assign_policy(&BookingId(booking_id), request.policy_id.as_ref(), at) {
        Ok(booking) => (StatusCode::OK, axum::Json(booking)).into_response(),
        Err(err) => error_response(err),
    }
}

pub fn status_for(error: &CancellationError) -> StatusCode {
    match error {
        CancellationError::NotFound { .. } => StatusCode::NOT_FOUND,
        CancellationError::AlreadyCancelled(_) | CancellationError::ConcurrentModification(_) => {
            StatusCode::CONFLICT
        }
        CancellationError::NoPolicyAvailable(_)
        | CancellationError::CancellationNotAllowed(_)
        | CancellationError::InvalidConfiguration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CancellationError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CancellationError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: CancellationError) -> Response {
    let status = status_for(&error);
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
