use chrono::{DateTime, Utc};

use super::domain::{Booking, BookingCancellation, BookingId, BookingStatus, PolicyId, SalonId};
use super::policy::Policy;

/// Booking storage owned by the booking service.
pub trait BookingStore: Send + Sync {
    fn get_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError>;

    /// Write the cancellation fields only if the stored status still equals
    /// `expected_status`. Returns `Ok(None)` when no record matched the guard.
    fn apply_cancellation(
        &self,
        id: &BookingId,
        expected_status: BookingStatus,
        cancellation: BookingCancellation,
    ) -> Result<Option<Booking>, RepositoryError>;

    fn bind_policy(&self, id: &BookingId, policy_id: &PolicyId) -> Result<Booking, RepositoryError>;
}

/// Read access to cancellation policies and their tiers.
pub trait PolicyStore: Send + Sync {
    fn get_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError>;

    /// Active salon-scoped policy whose validity window contains `at`.
    fn get_effective_for_salon(
        &self,
        salon_id: &SalonId,
        at: DateTime<Utc>,
    ) -> Result<Option<Policy>, RepositoryError>;

    /// Active platform-wide default policy whose validity window contains `at`.
    fn get_effective_default(&self, at: DateTime<Utc>) -> Result<Option<Policy>, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record conflicts with existing data")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
