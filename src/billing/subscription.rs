//! Read-only mirror of the payment backend's subscription state.
//!
//! Subscriptions are owned by Stripe. The dashboard only reads the status and
//! price id carried in the user's session context.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stripe subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// Subscription is active and paid.
    Active,
    /// Subscription is in trial period.
    Trialing,
    /// Payment failed, subscription still active but past due.
    PastDue,
    /// Subscription has been canceled.
    Canceled,
    /// Subscription is incomplete (awaiting payment).
    Incomplete,
    /// Subscription expired after incomplete payment.
    IncompleteExpired,
    /// Subscription is paused.
    Paused,
    /// Subscription is unpaid.
    Unpaid,
}

impl SubscriptionStatus {
    /// Parse from a Stripe status string. Unknown statuses map to `Canceled`.
    #[must_use]
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "paused" => Self::Paused,
            "unpaid" => Self::Unpaid,
            _ => Self::Canceled,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Paused => "paused",
            Self::Unpaid => "unpaid",
        }
    }

    /// Whether the subscription has ended and can no longer be managed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::IncompleteExpired)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_stripe(&s))
    }
}

/// A user's current subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub status: SubscriptionStatus,
    #[serde(default, alias = "price_id")]
    pub price_id: Option<String>,
}

impl Subscription {
    #[must_use]
    pub fn new(status: SubscriptionStatus, price_id: Option<&str>) -> Self {
        Self {
            status,
            price_id: price_id.map(str::to_string),
        }
    }

    /// Status is exactly `active`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// The subscription still exists at the payment backend, so its tier is
    /// the user's current plan.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
            SubscriptionStatus::Paused,
            SubscriptionStatus::Unpaid,
        ] {
            assert_eq!(SubscriptionStatus::from_stripe(status.as_str()), status);
        }
    }

    #[test]
    fn test_unknown_status_is_canceled() {
        assert_eq!(SubscriptionStatus::from_stripe("bogus"), SubscriptionStatus::Canceled);
    }

    #[test]
    fn test_live_and_active() {
        let active = Subscription::new(SubscriptionStatus::Active, Some("price_1"));
        assert!(active.is_active());
        assert!(active.is_live());

        let trialing = Subscription::new(SubscriptionStatus::Trialing, Some("price_1"));
        assert!(!trialing.is_active());
        assert!(trialing.is_live());

        let canceled = Subscription::new(SubscriptionStatus::Canceled, Some("price_1"));
        assert!(!canceled.is_live());
    }

    #[test]
    fn test_deserialize_snake_case_row() {
        let sub: Subscription =
            serde_json::from_str(r#"{"status":"active","price_id":"price_123"}"#).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.price_id.as_deref(), Some("price_123"));
    }

    #[test]
    fn test_serialize_camel_case() {
        let sub = Subscription::new(SubscriptionStatus::PastDue, Some("price_9"));
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["status"], "past_due");
        assert_eq!(json["priceId"], "price_9");
    }
}
