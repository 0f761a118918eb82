use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for appointments booked through the marketplace.
    BookingId
);
identifier!(
    /// Identifier wrapper for cancellation policies.
    PolicyId
);
identifier!(TierId);
identifier!(SalonId);
identifier!(ClientId);
identifier!(ProfessionalId);
identifier!(
    /// The user (client, professional or staff) who requested a cancellation.
    UserId
);

/// Booking lifecycle as stored by the booking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no show",
        }
    }
}

/// Snapshot of the externally owned booking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: ClientId,
    pub professional_id: ProfessionalId,
    pub salon_id: Option<SalonId>,
    pub scheduled_time: DateTime<Utc>,
    pub service_price: Decimal,
    pub status: BookingStatus,
    pub cancellation_policy_id: Option<PolicyId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by_id: Option<UserId>,
    pub cancellation_fee_amount: Option<Decimal>,
    pub deposit_amount: Option<Decimal>,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Deposit already held for the booking; absent deposits count as zero.
    pub fn deposit_held(&self) -> Decimal {
        self.deposit_amount.unwrap_or(Decimal::ZERO)
    }
}

/// Field set written by the single cancellation update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingCancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: String,
    pub cancelled_by_id: UserId,
    pub fee_amount: Decimal,
    /// Only set when the booking had no policy bound before cancelling.
    pub policy_id: Option<PolicyId>,
}

impl BookingCancellation {
    /// Apply the cancellation fields to a booking record.
    pub fn apply_to(&self, booking: &mut Booking) {
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(self.cancelled_at);
        booking.cancellation_reason = Some(self.reason.clone());
        booking.cancelled_by_id = Some(self.cancelled_by_id.clone());
        booking.cancellation_fee_amount = Some(self.fee_amount);
        if let Some(policy_id) = &self.policy_id {
            booking.cancellation_policy_id = Some(policy_id.clone());
        }
    }
}
