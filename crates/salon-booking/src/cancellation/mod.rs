//! Booking cancellation policy engine.
//!
//! Tiers, policies and their evaluation form a pure core with no I/O. The
//! [`CancellationOrchestrator`] is the imperative shell: it loads bookings and
//! policies through the store traits, evaluates, and records the cancellation with a
//! single status-guarded update.

pub mod domain;
pub mod policy;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Booking, BookingCancellation, BookingId, BookingStatus, ClientId, PolicyId, ProfessionalId,
    SalonId, TierId, UserId,
};
pub use policy::{
    Evaluation, EvaluationContext, EvaluationResult, FeeType, Policy, PolicyDraft, PolicyError,
    PolicyScope, PolicyStatus, Tier,
};
pub use repository::{BookingStore, PolicyStore, RepositoryError};
pub use resolver::PolicyResolver;
pub use router::cancellation_router;
pub use service::{
    AppliedPolicy, CancellationError, CancellationOrchestrator, CancellationOutcome, Eligibility,
    FeeSummary,
};
