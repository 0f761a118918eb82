use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use salon_booking::cancellation::{
    Booking, BookingCancellation, BookingId, BookingStatus, BookingStore, Policy, PolicyId,
    PolicyStore, RepositoryError, SalonId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, store: &str) -> Result<MutexGuard<'a, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable(format!("{store} store lock poisoned")))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryBookingStore {
    records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    pub(crate) fn insert(&self, booking: Booking) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records, "booking")?;
        if guard.contains_key(&booking.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(booking.id.clone(), booking);
        Ok(())
    }

    pub(crate) fn all(&self) -> Result<Vec<Booking>, RepositoryError> {
        let guard = lock(&self.records, "booking")?;
        let mut bookings: Vec<Booking> = guard.values().cloned().collect();
        bookings.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time));
        Ok(bookings)
    }
}

impl BookingStore for InMemoryBookingStore {
    fn get_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let guard = lock(&self.records, "booking")?;
        Ok(guard.get(id).cloned())
    }

    fn apply_cancellation(
        &self,
        id: &BookingId,
        expected_status: BookingStatus,
        cancellation: BookingCancellation,
    ) -> Result<Option<Booking>, RepositoryError> {
        let mut guard = lock(&self.records, "booking")?;
        match guard.get_mut(id) {
            Some(booking) if booking.status == expected_status => {
                cancellation.apply_to(booking);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    fn bind_policy(&self, id: &BookingId, policy_id: &PolicyId) -> Result<Booking, RepositoryError> {
        let mut guard = lock(&self.records, "booking")?;
        let booking = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        booking.cancellation_policy_id = Some(policy_id.clone());
        Ok(booking.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPolicyStore {
    policies: Arc<Mutex<Vec<Policy>>>,
}

impl InMemoryPolicyStore {
    /// Store a policy, refusing a second active platform default.
    pub(crate) fn insert(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.policies, "policy")?;
        let duplicate_id = guard.iter().any(|existing| existing.id == policy.id);
        let competing_default = policy.is_platform_default()
            && guard.iter().any(|existing| {
                existing.is_platform_default()
                    && existing.status() == policy.status()
                    && windows_overlap(existing, &policy)
            });
        if duplicate_id || competing_default {
            return Err(RepositoryError::Conflict);
        }
        guard.push(policy);
        Ok(())
    }
}

fn windows_overlap(a: &Policy, b: &Policy) -> bool {
    let ends_after = |policy: &Policy, instant: DateTime<Utc>| {
        policy.effective_until.map_or(true, |until| instant < until)
    };
    ends_after(a, b.effective_from) && ends_after(b, a.effective_from)
}

impl PolicyStore for InMemoryPolicyStore {
    fn get_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let guard = lock(&self.policies, "policy")?;
        Ok(guard.iter().find(|policy| &policy.id == id).cloned())
    }

    fn get_effective_for_salon(
        &self,
        salon_id: &SalonId,
        at: DateTime<Utc>,
    ) -> Result<Option<Policy>, RepositoryError> {
        let guard = lock(&self.policies, "policy")?;
        Ok(guard
            .iter()
            .find(|policy| policy.scope.salon_id() == Some(salon_id) && policy.is_effective_at(at))
            .cloned())
    }

    fn get_effective_default(&self, at: DateTime<Utc>) -> Result<Option<Policy>, RepositoryError> {
        let guard = lock(&self.policies, "policy")?;
        Ok(guard
            .iter()
            .find(|policy| policy.is_platform_default() && policy.is_effective_at(at))
            .cloned())
    }
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
