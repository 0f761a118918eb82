use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::domain::SalonId;
use super::policy::Policy;
use super::repository::{PolicyStore, RepositoryError};

/// Selects the single policy governing a booking: salon-specific first, then the
/// platform default. Reads through the store on every call.
pub struct PolicyResolver<P> {
    policies: Arc<P>,
}

impl<P> Clone for PolicyResolver<P> {
    fn clone(&self) -> Self {
        Self {
            policies: Arc::clone(&self.policies),
        }
    }
}

impl<P> PolicyResolver<P>
where
    P: PolicyStore + 'static,
{
    pub fn new(policies: Arc<P>) -> Self {
        Self { policies }
    }

    pub fn resolve(
        &self,
        salon_id: Option<&SalonId>,
        at: DateTime<Utc>,
    ) -> Result<Option<Policy>, RepositoryError> {
        if let Some(salon_id) = salon_id {
            // Stores are trusted to filter, but a stale row must not win.
            if let Some(policy) = self
                .policies
                .get_effective_for_salon(salon_id, at)?
                .filter(|policy| policy.is_effective_at(at))
            {
                debug!(%salon_id, policy_id = %policy.id, "resolved salon cancellation policy");
                return Ok(Some(policy));
            }
        }

        let default = self
            .policies
            .get_effective_default(at)?
            .filter(|policy| policy.is_platform_default() && policy.is_effective_at(at));

        match &default {
            Some(policy) => debug!(policy_id = %policy.id, "resolved platform default policy"),
            None => debug!(salon_id = ?salon_id, "no effective cancellation policy"),
        }

        Ok(default)
    }

    pub(crate) fn store(&self) -> &P {
        &self.policies
    }
}
