use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle status of a subscription.
///
/// Only `Active` subscriptions are eligible for renewal. `Cancelled` and
/// `Completed` are terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    /// Created from an order, waiting for the purchase to be confirmed
    #[default]
    Pending,
    /// Confirmed and renewing on its cadence
    Active,
    Cancelled,
    Completed,
}

impl SubscriptionStatus {
    /// Whether a scheduler tick may attempt a renewal for this status
    pub fn is_renewable(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Completed
        )
    }

    /// Valid transitions from this status
    pub fn valid_transitions(&self) -> &'static [SubscriptionStatus] {
        match self {
            SubscriptionStatus::Pending => {
                &[SubscriptionStatus::Active, SubscriptionStatus::Cancelled]
            }
            SubscriptionStatus::Active => {
                &[SubscriptionStatus::Cancelled, SubscriptionStatus::Completed]
            }
            SubscriptionStatus::Cancelled | SubscriptionStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: SubscriptionStatus) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}
