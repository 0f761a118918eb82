//! End-to-end scenarios for booking cancellation driven through the public orchestrator
//! facade with in-memory stores.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use salon_booking::cancellation::{
        Booking, BookingCancellation, BookingId, BookingStatus, BookingStore, ClientId, FeeType,
        Policy, PolicyDraft, PolicyId, PolicyScope, PolicyStore, ProfessionalId, RepositoryError,
        SalonId, Tier, TierId,
    };

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 14, 15, 30, 0)
            .single()
            .expect("valid instant")
    }

    pub(super) fn dollars(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    fn tier(id: &str, name: &str, hours: u32, fee_type: FeeType, value: Decimal) -> Tier {
        Tier {
            id: TierId::new(id),
            name: name.to_string(),
            advance_notice_hours: hours,
            fee_type,
            fee_value: value,
            allows_refund: true,
            display_order: hours,
        }
    }

    /// Platform default: `[72h -> 0%, 24h -> 20% "Standard", 2h -> fixed $50]`.
    pub(super) fn platform_policy() -> Policy {
        let mut policy = PolicyDraft {
            id: PolicyId::new("platform-standard"),
            name: "Platform standard".to_string(),
            description: Some("Default marketplace cancellation terms".to_string()),
            scope: PolicyScope::PlatformWide,
            is_default: true,
            effective_from: now() - Duration::days(90),
            effective_until: None,
            tiers: vec![
                tier("free", "Free", 72, FeeType::Percentage, Decimal::ZERO),
                tier("standard", "Standard", 24, FeeType::Percentage, dollars(20)),
                tier("late", "Late", 2, FeeType::Fixed, dollars(50)),
            ],
        }
        .build()
        .expect("valid platform policy");
        policy.activate().expect("draft activates");
        policy
    }

    pub(super) fn booking(id: &str, notice_hours: i64, price: i64) -> Booking {
        Booking {
            id: BookingId::new(id),
            client_id: ClientId::new("client-ada"),
            professional_id: ProfessionalId::new("stylist-ruth"),
            salon_id: Some(SalonId::new("salon-north")),
            scheduled_time: now() + Duration::hours(notice_hours),
            service_price: dollars(price),
            status: BookingStatus::Confirmed,
            cancellation_policy_id: None,
            cancelled_at: None,
            cancellation_reason: None,
            cancelled_by_id: None,
            cancellation_fee_amount: None,
            deposit_amount: None,
        }
    }

    #[derive(Default)]
    pub(super) struct Bookings {
        records: Mutex<HashMap<BookingId, Booking>>,
    }

    impl Bookings {
        pub(super) fn with(bookings: Vec<Booking>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(
                    bookings
                        .into_iter()
                        .map(|booking| (booking.id.clone(), booking))
                        .collect(),
                ),
            })
        }

        pub(super) fn stored(&self, id: &BookingId) -> Booking {
            self.records
                .lock()
                .expect("booking mutex poisoned")
                .get(id)
                .cloned()
                .expect("booking stored")
        }
    }

    impl BookingStore for Bookings {
        fn get_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("booking mutex poisoned")
                .get(id)
                .cloned())
        }

        fn apply_cancellation(
            &self,
            id: &BookingId,
            expected_status: BookingStatus,
            cancellation: BookingCancellation,
        ) -> Result<Option<Booking>, RepositoryError> {
            let mut guard = self.records.lock().expect("booking mutex poisoned");
            Ok(guard
                .get_mut(id)
                .filter(|booking| booking.status == expected_status)
                .map(|booking| {
                    cancellation.apply_to(booking);
                    booking.clone()
                }))
        }

        fn bind_policy(
            &self,
            id: &BookingId,
            policy_id: &PolicyId,
        ) -> Result<Booking, RepositoryError> {
            let mut guard = self.records.lock().expect("booking mutex poisoned");
            let booking = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
            booking.cancellation_policy_id = Some(policy_id.clone());
            Ok(booking.clone())
        }
    }

    pub(super) struct Policies(pub(super) Vec<Policy>);

    impl PolicyStore for Policies {
        fn get_by_id(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
            Ok(self.0.iter().find(|policy| &policy.id == id).cloned())
        }

        fn get_effective_for_salon(
            &self,
            salon_id: &SalonId,
            at: DateTime<Utc>,
        ) -> Result<Option<Policy>, RepositoryError> {
            Ok(self
                .0
                .iter()
                .find(|policy| {
                    policy.scope.salon_id() == Some(salon_id) && policy.is_effective_at(at)
                })
                .cloned())
        }

        fn get_effective_default(
            &self,
            at: DateTime<Utc>,
        ) -> Result<Option<Policy>, RepositoryError> {
            Ok(self
                .0
                .iter()
                .find(|policy| policy.is_platform_default() && policy.is_effective_at(at))
                .cloned())
        }
    }
}

use std::sync::{Arc, Barrier};
use std::thread;

use rust_decimal::Decimal;
use salon_booking::cancellation::{
    BookingId, BookingStatus, CancellationError, CancellationOrchestrator, EvaluationResult,
    UserId,
};

use common::*;

fn orchestrator(
    bookings: Vec<salon_booking::cancellation::Booking>,
) -> (
    CancellationOrchestrator<Bookings, Policies>,
    Arc<Bookings>,
) {
    let store = Bookings::with(bookings);
    let service = CancellationOrchestrator::new(
        Arc::clone(&store),
        Arc::new(Policies(vec![platform_policy()])),
    );
    (service, store)
}

#[test]
fn notice_scenarios_follow_the_platform_tiers() {
    struct Case {
        notice_hours: i64,
        result: EvaluationResult,
        fee: i64,
        refund: i64,
        tier: Option<&'static str>,
    }

    let cases = [
        Case { notice_hours: 72, result: EvaluationResult::AllowedNoFee, fee: 0, refund: 100, tier: Some("Free") },
        Case { notice_hours: 24, result: EvaluationResult::AllowedWithFee, fee: 20, refund: 80, tier: Some("Standard") },
        Case { notice_hours: 2, result: EvaluationResult::AllowedWithFee, fee: 50, refund: 50, tier: Some("Late") },
        Case { notice_hours: 1, result: EvaluationResult::NotAllowed, fee: 0, refund: 0, tier: None },
    ];

    for case in cases {
        let id = format!("booking-{}h", case.notice_hours);
        let (service, _) = orchestrator(vec![booking(&id, case.notice_hours, 100)]);

        let summary = service
            .calculate_fee(&BookingId::new(id.as_str()), now())
            .expect("fee computed");

        assert_eq!(summary.result, case.result, "{}h notice", case.notice_hours);
        assert_eq!(summary.fee_amount, dollars(case.fee), "{}h notice", case.notice_hours);
        assert_eq!(summary.refund_amount, dollars(case.refund), "{}h notice", case.notice_hours);
        assert_eq!(summary.tier_name.as_deref(), case.tier, "{}h notice", case.notice_hours);
        if case.result == EvaluationResult::NotAllowed {
            assert!(summary.message.contains("insufficient advance notice"));
        }
    }
}

#[test]
fn full_cancellation_flow_records_outcome() {
    let mut held = booking("booking-flow", 30, 120);
    held.deposit_amount = Some(dollars(30));
    let (service, store) = orchestrator(vec![held]);
    let id = BookingId::new("booking-flow");

    let eligibility = service.can_cancel(&id, now()).expect("query succeeds");
    assert!(eligibility.can_cancel);
    assert_eq!(
        eligibility.fee_info.as_ref().map(|fee| fee.fee_amount),
        Some(dollars(24))
    );

    let outcome = service
        .cancel(&id, &UserId::new("client-ada"), "running late", now())
        .expect("cancellation succeeds");

    assert!(outcome.success);
    assert_eq!(outcome.cancellation_fee, dollars(24));
    assert_eq!(outcome.refund_amount, dollars(96));
    assert!(!outcome.payment_required, "deposit covers the fee");
    assert_eq!(outcome.policy_applied.name, "Platform standard");
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);

    let stored = store.stored(&id);
    assert_eq!(stored, outcome.booking);

    let after = service.can_cancel(&id, now()).expect("query succeeds");
    assert!(!after.can_cancel);
    assert!(matches!(
        service.calculate_fee(&id, now()),
        Err(CancellationError::AlreadyCancelled(_))
    ));
}

#[test]
fn deposit_determines_whether_payment_is_required() {
    let mut owes = booking("booking-owes", 24, 100);
    owes.deposit_amount = Some(dollars(10));
    let mut covered = booking("booking-covered", 24, 25);
    covered.deposit_amount = Some(dollars(10));
    let (service, _) = orchestrator(vec![owes, covered]);
    let staff = UserId::new("front-desk");

    let owes = service
        .cancel(&BookingId::new("booking-owes"), &staff, "closing early", now())
        .expect("cancels");
    let covered = service
        .cancel(&BookingId::new("booking-covered"), &staff, "closing early", now())
        .expect("cancels");

    assert_eq!(owes.cancellation_fee, dollars(20));
    assert!(owes.payment_required);
    assert_eq!(covered.cancellation_fee, Decimal::new(500, 2));
    assert!(!covered.payment_required);
}

#[test]
fn racing_cancellations_only_apply_once() {
    let (service, store) = orchestrator(vec![booking("booking-race", 48, 100)]);
    let service = Arc::new(service);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["client-ada", "stylist-ruth"]
        .into_iter()
        .map(|user| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.cancel(&BookingId::new("booking-race"), &UserId::new(user), "race", now())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(CancellationError::ConcurrentModification(_))
            | Err(CancellationError::CancellationNotAllowed(_))
    )));

    let stored = store.stored(&BookingId::new("booking-race"));
    assert_eq!(stored.cancelled_by_id, winners[0].booking.cancelled_by_id);
}
