use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::cancellation::domain::{
    Booking, BookingCancellation, BookingId, BookingStatus, ClientId, PolicyId, ProfessionalId,
    SalonId, TierId,
};
use crate::cancellation::policy::{FeeType, Policy, PolicyDraft, PolicyScope, PolicyStatus, Tier};
use crate::cancellation::repository::{BookingStore, PolicyStore, RepositoryError};
use crate::cancellation::service::CancellationOrchestrator;

pub(super) fn policy_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .expect("valid epoch")
}

/// Reference instant used as "now" across the suite.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn hours_ahead(hours: i64) -> DateTime<Utc> {
    now() + Duration::hours(hours)
}

pub(super) fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub(super) fn tier(
    id: &str,
    name: &str,
    advance_notice_hours: u32,
    fee_type: FeeType,
    fee_value: Decimal,
) -> Tier {
    Tier {
        id: TierId::new(id),
        name: name.to_string(),
        advance_notice_hours,
        fee_type,
        fee_value,
        allows_refund: true,
        display_order: 0,
    }
}

/// Tiers `[72h -> 0%, 24h -> 20%, 2h -> fixed 50]`, deliberately listed out of order.
pub(super) fn standard_tiers() -> Vec<Tier> {
    vec![
        Tier {
            display_order: 2,
            ..tier("tier-std", "Standard", 24, FeeType::Percentage, Decimal::from(20))
        },
        Tier {
            display_order: 3,
            ..tier("tier-late", "Late", 2, FeeType::Fixed, money(5_000))
        },
        Tier {
            display_order: 1,
            ..tier("tier-flex", "Flexible", 72, FeeType::Percentage, Decimal::ZERO)
        },
    ]
}

pub(super) fn draft(id: &str, scope: PolicyScope, is_default: bool, tiers: Vec<Tier>) -> PolicyDraft {
    PolicyDraft {
        id: PolicyId::new(id),
        name: format!("{id} policy"),
        description: None,
        scope,
        is_default,
        effective_from: policy_epoch(),
        effective_until: None,
        tiers,
    }
}

pub(super) fn active(draft: PolicyDraft) -> Policy {
    draft
        .restore(PolicyStatus::Active)
        .expect("fixture policy is valid")
}

pub(super) fn platform_default() -> Policy {
    active(draft(
        "platform-default",
        PolicyScope::PlatformWide,
        true,
        standard_tiers(),
    ))
}

pub(super) fn salon_policy(salon: &str) -> Policy {
    active(draft(
        &format!("salon-{salon}"),
        PolicyScope::Salon(SalonId::new(salon)),
        false,
        vec![
            tier("tier-salon-early", "Early", 48, FeeType::Percentage, Decimal::ZERO),
            tier("tier-salon-late", "Short notice", 0, FeeType::Percentage, Decimal::from(50)),
        ],
    ))
}

pub(super) fn booking(id: &str, scheduled_in_hours: i64, price_cents: i64) -> Booking {
    Booking {
        id: BookingId::new(id),
        client_id: ClientId::new("client-1"),
        professional_id: ProfessionalId::new("pro-1"),
        salon_id: None,
        scheduled_time: hours_ahead(scheduled_in_hours),
        service_price: money(price_cents),
        status: BookingStatus::Confirmed,
        cancellation_policy_id: None,
        cancelled_at: None,
        cancellation_reason: None,
        cancelled_by_id: None,
        cancellation_fee_amount: None,
        deposit_amount: None,
    }
}

pub(super) fn build_service(
    bookings: Vec<Booking>,
    policies: Vec<Policy>,
) -> (
    CancellationOrchestrator<MemoryBookingStore, MemoryPolicyStore>,
    Arc<MemoryBookingStore>,
) {
    let booking_store = Arc::new(MemoryBookingStore::with(bookings));
    let policy_store = Arc::new(MemoryPolicyStore::with(policies));
    let service = CancellationOrchestrator::new(booking_store.clone(), policy_store);
    (service, booking_store)
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[derive(Default, Clone)]
pub(super) struct MemoryBookingStore {
    pub(super) records: Arc<Mutex<HashMap<BookingId, Booking>>>,
}

impl MemoryBookingStore {
    pub(super) fn with(bookings: Vec<Booking>) -> Self {
        let records = bookings
            .into_iter()
            .map(|booking| (booking.id.clone(), booking))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    pub(super) fn stored(&self, id: &str) -> Booking {
        self.records
            .lock()
            .expect("booking mutex poisoned")
            .get(&BookingId::new(id))
            .cloned()
            .expect("booking stored")
    }
}

impl BookingStore for MemoryBookingStore {
    fn get_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let guard = self.records.lock().expect("booking mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn apply_cancellation(
        &self,
        id: &BookingId,
        expected_status: BookingStatus,
        cancellation: BookingCancellation,
    ) -> Result<Option<Booking>, RepositoryError> {
        let mut guard = self.records.lock().expect("booking mutex poisoned");
        match guard.get_mut(id) {
            Some(booking) if booking.status == expected_status => {
                cancellation.apply_to(booking);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    fn bind_policy(&self, id: &BookingId, policy_id: &PolicyId) -> Result<Booking, RepositoryError> {
        let mut guard = self.records.lock().expect("booking mutex poisoned");
        let booking = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        booking.cancellation_policy_id = Some(policy_id.clone());
        Ok(booking.clone())
    }
}

/// Store that lets another writer cancel the booking between the read and the write.
#[derive(Default, Clone)]
pub(super) struct RacingBookingStore {
    pub(super) inner: MemoryBookingStore,
}

impl BookingStore for RacingBookingStore {
    fn get_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.inner.get_by_id(id)
    }

    fn apply_cancellation(
        &self,
        id: &BookingId,
        expected_status: BookingStatus,
        cancellation: BookingCancellation,
    ) -> Result<Option<Booking>, RepositoryError> {
        if let Some(booking) = self
            .inner
            .records
            .lock()
            .expect("booking mutex poisoned")
            .get_mut(id)
        {
            booking.status = BookingStatus::Cancelled;
        }
        self.inner.apply_cancellation(id, expected_status, cancellation)
    }

    fn bind_policy(&self, id: &BookingId, policy_id: &PolicyId) -> Result<Booking, RepositoryError> {
        self.inner.bind_policy(id, policy_id)
    }
}

pub(super) struct UnavailableBookingStore;

impl BookingStore for UnavailableBookingStore {
    fn get_by_id(&self, _id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn apply_cancellation(
        &self,
        _id: &BookingId,
        _expected_status: BookingStatus,
        _cancellation: BookingCancellation,
    ) -> Result<Option<Booking>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn bind_policy(&self, _id: &BookingId, _policy_id: &PolicyId) -> Result<Booking, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryPolicyStore {
    policies: Arc<Mutex<Vec<Policy>>>,
}

impl MemoryPolicyStore {
    pub(super) fn with(policies: Vec<Policy>) -> Self {
        Self {
            policies: Arc::new(Mutex::new(policies)),
        }
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn get_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("policy mutex poisoned");
        Ok(guard.iter().find(|policy| &policy.id == id).cloned())
    }

    fn get_effective_for_salon(
        &self,
        salon_id: &SalonId,
        at: DateTime<Utc>,
    ) -> Result<Option<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("policy mutex poisoned");
        Ok(guard
            .iter()
            .find(|policy| policy.scope.salon_id() == Some(salon_id) && policy.is_effective_at(at))
            .cloned())
    }

    fn get_effective_default(&self, at: DateTime<Utc>) -> Result<Option<Policy>, RepositoryError> {
        let guard = self.policies.lock().expect("policy mutex poisoned");
        Ok(guard
            .iter()
            .find(|policy| policy.is_platform_default() && policy.is_effective_at(at))
            .cloned())
    }
}

/// Policy store that ignores validity windows, as a stale cache might.
pub(super) struct StalePolicyStore(pub(super) Vec<Policy>);

impl PolicyStore for StalePolicyStore {
    fn get_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.0.iter().find(|policy| &policy.id == id).cloned())
    }

    fn get_effective_for_salon(
        &self,
        salon_id: &SalonId,
        _at: DateTime<Utc>,
    ) -> Result<Option<Policy>, RepositoryError> {
        Ok(self
            .0
            .iter()
            .find(|policy| policy.scope.salon_id() == Some(salon_id))
            .cloned())
    }

    fn get_effective_default(&self, _at: DateTime<Utc>) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.0.iter().find(|policy| policy.is_default).cloned())
    }
}
