use crate::infra::{parse_instant, InMemoryBookingStore, InMemoryPolicyStore};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rust_decimal::Decimal;
use salon_booking::cancellation::{
    Booking, BookingId, BookingStatus, CancellationError, CancellationOrchestrator, ClientId,
    FeeType, Policy, PolicyDraft, PolicyError, PolicyId, PolicyScope, PolicyStore,
    ProfessionalId, SalonId, Tier, TierId,
};
use salon_booking::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Only quote this demo booking
    #[arg(long)]
    booking: Option<String>,
    /// Cancellation instant as RFC 3339 (defaults to now)
    #[arg(long, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,
}

fn tier(
    id: &str,
    name: &str,
    advance_notice_hours: u32,
    fee_type: FeeType,
    fee_value: Decimal,
    display_order: u32,
) -> Tier {
    Tier {
        id: TierId::new(id),
        name: name.to_string(),
        advance_notice_hours,
        fee_type,
        fee_value,
        allows_refund: true,
        display_order,
    }
}

pub(crate) fn platform_policy(now: DateTime<Utc>) -> Result<Policy, PolicyError> {
    let mut policy = PolicyDraft {
        id: PolicyId::new("platform-standard"),
        name: "Platform standard".to_string(),
        description: Some("Free up to three days ahead, reduced refunds after".to_string()),
        scope: PolicyScope::PlatformWide,
        is_default: true,
        effective_from: now - Duration::days(365),
        effective_until: None,
        tiers: vec![
            tier("ps-free", "Free", 72, FeeType::Percentage, Decimal::ZERO, 1),
            tier("ps-standard", "Standard", 24, FeeType::Percentage, Decimal::from(20), 2),
            tier("ps-late", "Late", 2, FeeType::Fixed, Decimal::from(50), 3),
        ],
    }
    .build()?;
    policy.activate()?;
    Ok(policy)
}

fn salon_policy(now: DateTime<Utc>) -> Result<Policy, PolicyError> {
    let mut policy = PolicyDraft {
        id: PolicyId::new("studio-lumen-strict"),
        name: "Studio Lumen strict".to_string(),
        description: None,
        scope: PolicyScope::Salon(SalonId::new("studio-lumen")),
        is_default: false,
        effective_from: now - Duration::days(30),
        effective_until: Some(now + Duration::days(335)),
        tiers: vec![
            tier("sl-early", "Early", 48, FeeType::Percentage, Decimal::from(10), 1),
            Tier {
                allows_refund: false,
                ..tier("sl-same-day", "Same day", 0, FeeType::Percentage, Decimal::from(100), 2)
            },
        ],
    }
    .build()?;
    policy.activate()?;
    Ok(policy)
}

fn booking(
    id: &str,
    salon: Option<&str>,
    scheduled_time: DateTime<Utc>,
    price: Decimal,
    deposit: Option<Decimal>,
) -> Booking {
    Booking {
        id: BookingId::new(id),
        client_id: ClientId::new("client-demo"),
        professional_id: ProfessionalId::new("pro-demo"),
        salon_id: salon.map(SalonId::new),
        scheduled_time,
        service_price: price,
        status: BookingStatus::Confirmed,
        cancellation_policy_id: None,
        cancelled_at: None,
        cancellation_reason: None,
        cancelled_by_id: None,
        cancellation_fee_amount: None,
        deposit_amount: deposit,
    }
}

fn demo_bookings(now: DateTime<Utc>) -> Vec<Booking> {
    vec![
        booking(
            "demo-colour",
            None,
            now + Duration::hours(5),
            Decimal::from(140),
            Some(Decimal::from(20)),
        ),
        booking(
            "demo-cut",
            None,
            now + Duration::hours(30),
            Decimal::from(65),
            None,
        ),
        booking(
            "demo-lumen-facial",
            Some("studio-lumen"),
            now + Duration::hours(60),
            Decimal::from(90),
            Some(Decimal::from(30)),
        ),
        booking(
            "demo-lumen-nails",
            Some("studio-lumen"),
            now + Duration::hours(6),
            Decimal::from(45),
            None,
        ),
        booking(
            "demo-blowdry",
            None,
            now + Duration::days(5),
            Decimal::from(40),
            None,
        ),
    ]
}

/// One-line tier schedule in client-facing order, e.g. `72h+ 0% | 2h+ 50`.
fn describe_tiers(policy: &Policy) -> String {
    policy
        .tiers_for_display()
        .into_iter()
        .map(|tier| {
            let fee = match tier.fee_type {
                FeeType::Percentage => format!("{}%", tier.fee_value),
                FeeType::Fixed => tier.fee_value.to_string(),
            };
            let refund = if tier.allows_refund { "" } else { " no refund" };
            format!("{}h+ {fee}{refund}", tier.advance_notice_hours)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Load demo policies and bookings, scheduled relative to `now`.
pub(crate) fn seed_demo_data(
    bookings: &InMemoryBookingStore,
    policies: &InMemoryPolicyStore,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    policies
        .insert(platform_policy(now)?)
        .map_err(CancellationError::from)?;
    policies
        .insert(salon_policy(now)?)
        .map_err(CancellationError::from)?;

    for booking in demo_bookings(now) {
        bookings.insert(booking).map_err(CancellationError::from)?;
    }
    Ok(())
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs { booking, at } = args;
    let at = at.unwrap_or_else(Utc::now);

    let bookings = Arc::new(InMemoryBookingStore::default());
    let policies = Arc::new(InMemoryPolicyStore::default());
    seed_demo_data(&bookings, &policies, at)?;

    let service = CancellationOrchestrator::new(bookings.clone(), policies.clone());

    let targets = match booking {
        Some(id) => vec![BookingId::new(id)],
        None => bookings
            .all()
            .map_err(CancellationError::from)?
            .into_iter()
            .map(|booking| booking.id)
            .collect(),
    };

    println!("Cancellation quotes as of {}", at.to_rfc3339());
    for id in targets {
        let eligibility = service.can_cancel(&id, at)?;
        let verdict = if eligibility.can_cancel {
            "cancellable"
        } else {
            "not cancellable"
        };
        println!("\n{id}: {verdict} ({})", eligibility.reason);

        if let Some(fee) = eligibility.fee_info {
            println!(
                "- policy {} | tier {} | {}h notice",
                fee.policy_name,
                fee.tier_name.as_deref().unwrap_or("none"),
                fee.advance_hours
            );
            if let Some(policy) = policies
                .get_by_id(&fee.policy_id)
                .map_err(CancellationError::from)?
            {
                println!("- terms {}", describe_tiers(&policy));
            }
            println!("- fee {} | refund {}", fee.fee_amount, fee.refund_amount);
            if fee.fee_exceeds_price {
                println!("- warning: fee exceeds the service price");
            }
        }
    }

    Ok(())
}
