use rust_decimal::Decimal;

use crate::entities::{features::FeatureEntity, subscriptions::SubscriptionEntity};

/// Domain notifications handed to an `EventDispatcher` after the state change is committed.
#[derive(Debug, Clone)]
pub enum BillingEvent {
    SubscriptionCreated {
        subscription: SubscriptionEntity,
    },
    UsageLimitWarning {
        subscription: SubscriptionEntity,
        feature: FeatureEntity,
        current_usage: Decimal,
        limit: Decimal,
    },
}

impl BillingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BillingEvent::SubscriptionCreated { .. } => "subscription_created",
            BillingEvent::UsageLimitWarning { .. } => "usage_limit_warning",
        }
    }

    pub fn subscription(&self) -> &SubscriptionEntity {
        match self {
            BillingEvent::SubscriptionCreated { subscription }
            | BillingEvent::UsageLimitWarning { subscription, .. } => subscription,
        }
    }
}
