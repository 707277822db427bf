use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::schema::subscription_items;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_items)]
pub struct SubscriptionItemEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub feature_id: Uuid,
    /// Copied from the package pivot at subscribe time.
    pub value: Option<String>,
    pub usage: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionItemEntity {
    /// Stored value read as a number. Missing or non-numeric values read as zero,
    /// which limit checks treat as unlimited.
    pub fn limit_value(&self) -> Decimal {
        self.value
            .as_deref()
            .and_then(|raw| raw.trim().parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO)
    }

    /// Stored value read as a flag: `1`, `true`, `on` and `yes` are true.
    pub fn enabled(&self) -> bool {
        self.value.as_deref().is_some_and(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            )
        })
    }

    pub fn over_limit(&self, additional: Decimal) -> bool {
        if self.value.is_none() {
            return false;
        }
        self.usage + additional > self.limit_value()
    }

    /// `None` means unlimited.
    pub fn remaining(&self) -> Option<Decimal> {
        self.value.as_ref()?;
        Some((self.limit_value() - self.usage).max(Decimal::ZERO))
    }

    pub fn usage_percentage(&self) -> Option<Decimal> {
        self.value.as_ref()?;
        let limit = self.limit_value();
        if limit.is_zero() {
            return None;
        }
        Some(
            (self.usage / limit * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscription_items)]
pub struct InsertSubscriptionItemEntity {
    pub subscription_id: Uuid,
    pub feature_id: Uuid,
    pub value: Option<String>,
    pub usage: Decimal,
}

/// Item to materialise for a subscription that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionItemSeed {
    pub feature_id: Uuid,
    pub value: Option<String>,
}

impl SubscriptionItemSeed {
    pub fn into_insert(self, subscription_id: Uuid) -> InsertSubscriptionItemEntity {
        InsertSubscriptionItemEntity {
            subscription_id,
            feature_id: self.feature_id,
            value: self.value,
            usage: Decimal::ZERO,
        }
    }
}
