mod evaluation;
mod tier;

pub use evaluation::{Evaluation, EvaluationContext, EvaluationResult};
pub use tier::{FeeType, Tier};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{PolicyId, SalonId, TierId};

/// Which bookings a policy may govern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "salon_id", rename_all = "snake_case")]
pub enum PolicyScope {
    PlatformWide,
    Salon(SalonId),
}

impl PolicyScope {
    pub fn salon_id(&self) -> Option<&SalonId> {
        match self {
            Self::PlatformWide => None,
            Self::Salon(salon_id) => Some(salon_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Draft,
    Active,
    Inactive,
}

impl PolicyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Cancellation policy: tiers ordered by descending notice threshold plus a validity window.
///
/// Instances only come out of [`PolicyDraft`], which enforces the tier and window
/// invariants the evaluation algorithm relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    pub description: Option<String>,
    pub scope: PolicyScope,
    pub is_default: bool,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    status: PolicyStatus,
    tiers: Vec<Tier>,
}

impl Policy {
    pub fn status(&self) -> PolicyStatus {
        self.status
    }

    /// Tiers in descending `advance_notice_hours` order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Tiers in client-facing presentation order.
    pub fn tiers_for_display(&self) -> Vec<&Tier> {
        let mut tiers: Vec<&Tier> = self.tiers.iter().collect();
        tiers.sort_by_key(|tier| tier.display_order);
        tiers
    }

    pub fn is_platform_default(&self) -> bool {
        self.is_default && self.scope == PolicyScope::PlatformWide
    }

    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.status == PolicyStatus::Active
            && self.effective_from <= at
            && self.effective_until.map_or(true, |until| at < until)
    }

    /// Most lenient tier whose threshold the actual notice still satisfies.
    pub fn find_applicable_tier(&self, advance_notice_hours: Decimal) -> Option<&Tier> {
        self.tiers
            .iter()
            .find(|tier| tier.applies_to(advance_notice_hours))
    }

    pub fn activate(&mut self) -> Result<(), PolicyError> {
        match self.status {
            PolicyStatus::Draft | PolicyStatus::Inactive => {
                self.status = PolicyStatus::Active;
                Ok(())
            }
            PolicyStatus::Active => Err(self.invalid_transition(PolicyStatus::Active)),
        }
    }

    pub fn deactivate(&mut self) -> Result<(), PolicyError> {
        match self.status {
            PolicyStatus::Draft | PolicyStatus::Active => {
                self.status = PolicyStatus::Inactive;
                Ok(())
            }
            PolicyStatus::Inactive => Err(self.invalid_transition(PolicyStatus::Inactive)),
        }
    }

    fn invalid_transition(&self, to: PolicyStatus) -> PolicyError {
        PolicyError::InvalidTransition {
            policy: self.id.clone(),
            from: self.status,
            to,
        }
    }
}

/// Unvalidated policy definition as authored by an administrator or read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub id: PolicyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scope: PolicyScope,
    #[serde(default)]
    pub is_default: bool,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
    pub tiers: Vec<Tier>,
}

impl PolicyDraft {
    /// Validate and create a new policy in `Draft` status.
    pub fn build(self) -> Result<Policy, PolicyError> {
        self.restore(PolicyStatus::Draft)
    }

    /// Validate a persisted definition and rehydrate it with its stored status.
    pub fn restore(self, status: PolicyStatus) -> Result<Policy, PolicyError> {
        self.validate()?;

        let PolicyDraft {
            id,
            name,
            description,
            scope,
            is_default,
            effective_from,
            effective_until,
            mut tiers,
        } = self;

        tiers.sort_by(|a, b| b.advance_notice_hours.cmp(&a.advance_notice_hours));

        Ok(Policy {
            id,
            name,
            description,
            scope,
            is_default,
            effective_from,
            effective_until,
            status,
            tiers,
        })
    }

    fn validate(&self) -> Result<(), PolicyError> {
        if self.tiers.is_empty() {
            return Err(PolicyError::EmptyTiers(self.id.clone()));
        }

        if let Some(until) = self.effective_until {
            if until <= self.effective_from {
                return Err(PolicyError::InvalidWindow {
                    from: self.effective_from,
                    until,
                });
            }
        }

        if self.is_default && self.scope != PolicyScope::PlatformWide {
            return Err(PolicyError::DefaultMustBePlatformWide(self.id.clone()));
        }

        let mut thresholds = BTreeSet::new();
        for tier in &self.tiers {
            tier.validate()?;
            if !thresholds.insert(tier.advance_notice_hours) {
                return Err(PolicyError::DuplicateThreshold(tier.advance_notice_hours));
            }
        }

        Ok(())
    }
}

/// Policy definition and lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy {0} must define at least one tier")]
    EmptyTiers(PolicyId),
    #[error("tiers must have unique advance notice thresholds ({0}h repeated)")]
    DuplicateThreshold(u32),
    #[error("tier '{tier}' has out of range {} fee {value}", .fee_type.label())]
    FeeOutOfRange {
        tier: String,
        fee_type: FeeType,
        value: Decimal,
    },
    #[error("tier {0} has no name")]
    UnnamedTier(TierId),
    #[error("effective_until {until} must be after effective_from {from}")]
    InvalidWindow {
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    #[error("default policy {0} must be platform wide")]
    DefaultMustBePlatformWide(PolicyId),
    #[error("fee for tier '{tier}' overflows on a service price of {price}")]
    FeeOverflow { tier: String, price: Decimal },
    #[error("policy {policy} cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        policy: PolicyId,
        from: PolicyStatus,
        to: PolicyStatus,
    },
}
