use std::sync::Arc;

use anyhow::Result;
use domain::{
    entities::{
        features::FeatureEntity, subscription_items::SubscriptionItemEntity,
        subscriptions::SubscriptionEntity, usage_logs::InsertUsageLogEntity,
    },
    repositories::{
        events::EventDispatcher, subscription_items::SubscriptionItemRepository,
        usage_logs::UsageLogRepository,
    },
    value_objects::{enums::feature_types::FeatureType, events::BillingEvent},
};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

pub const USAGE_INCREMENT: &str = "Usage increment";
pub const USAGE_RESET: &str = "Usage reset";

pub struct UsageUseCase {
    item_repo: Arc<dyn SubscriptionItemRepository + Send + Sync>,
    usage_log_repo: Arc<dyn UsageLogRepository + Send + Sync>,
    event_dispatcher: Arc<dyn EventDispatcher + Send + Sync>,
}

impl UsageUseCase {
    pub fn new(
        item_repo: Arc<dyn SubscriptionItemRepository + Send + Sync>,
        usage_log_repo: Arc<dyn UsageLogRepository + Send + Sync>,
        event_dispatcher: Arc<dyn EventDispatcher + Send + Sync>,
    ) -> Self {
        Self {
            item_repo,
            usage_log_repo,
            event_dispatcher,
        }
    }

    /// Whether `amount` of the feature may be used right now. Requires a valid
    /// subscription and an active feature. A limit of zero means unlimited.
    pub async fn check(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
        amount: Decimal,
    ) -> Result<bool> {
        if !subscription.is_valid() {
            debug!(
                subscription_id = %subscription.id,
                feature_slug,
                "usage: subscription not valid; denying access"
            );
            return Ok(false);
        }

        let Some((item, feature)) = self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
        else {
            return Ok(false);
        };

        if !feature.is_active {
            return Ok(false);
        }

        Ok(match feature.kind() {
            Some(FeatureType::Limit) => {
                let limit = item.limit_value();
                limit <= Decimal::ZERO || item.usage + amount <= limit
            }
            Some(FeatureType::Boolean) => item.enabled(),
            _ => true,
        })
    }

    /// Adds `amount` to the feature's usage counter. Unlike `check`, the
    /// subscription's validity is not consulted. Returns `false` when there is
    /// no item or the limit would be exceeded.
    pub async fn increment(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
        amount: Decimal,
    ) -> Result<bool> {
        let Some((item, feature)) = self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
        else {
            debug!(
                subscription_id = %subscription.id,
                feature_slug,
                "usage: no item for feature"
            );
            return Ok(false);
        };

        let limit = item.limit_value();
        let enforced_limit = (feature.is_limit() && limit > Decimal::ZERO).then_some(limit);

        if enforced_limit.is_some_and(|limit| item.usage + amount > limit) {
            info!(
                subscription_id = %subscription.id,
                feature_slug,
                usage = %item.usage,
                %amount,
                %limit,
                "usage: increment rejected; limit exceeded"
            );
            return Ok(false);
        }

        let new_usage = match self
            .item_repo
            .increment_usage(item.id, amount, enforced_limit)
            .await
        {
            Ok(Some(usage)) => usage,
            Ok(None) => {
                // Another writer got there first and the limit no longer holds.
                info!(
                    subscription_id = %subscription.id,
                    feature_slug,
                    %amount,
                    "usage: increment rejected by conditional update"
                );
                return Ok(false);
            }
            Err(err) => {
                error!(
                    subscription_id = %subscription.id,
                    item_id = %item.id,
                    db_error = ?err,
                    "usage: failed to increment usage"
                );
                return Err(err);
            }
        };

        if feature.kind().is_some_and(|kind| kind.is_metered())
            && crossed_warning_threshold(new_usage - amount, new_usage, limit)
        {
            info!(
                subscription_id = %subscription.id,
                feature_slug,
                usage = %new_usage,
                %limit,
                "usage: warning threshold crossed"
            );
            self.event_dispatcher.dispatch(BillingEvent::UsageLimitWarning {
                subscription: subscription.clone(),
                feature: feature.clone(),
                current_usage: new_usage,
                limit,
            });
        }

        self.log(subscription, &item, amount, USAGE_INCREMENT).await?;

        Ok(true)
    }

    pub async fn reset_usage(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
    ) -> Result<bool> {
        let Some((item, _)) = self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
        else {
            return Ok(false);
        };

        self.item_repo.reset_usage(item.id).await?;
        self.log(subscription, &item, Decimal::ZERO, USAGE_RESET)
            .await?;

        info!(
            subscription_id = %subscription.id,
            feature_slug,
            "usage: usage reset"
        );
        Ok(true)
    }

    /// Zeroes every counter on the subscription. No audit rows are written.
    pub async fn reset_all_usage(&self, subscription: &SubscriptionEntity) -> Result<usize> {
        let reset = self.item_repo.reset_all_usage(subscription.id).await?;
        info!(
            subscription_id = %subscription.id,
            items = reset,
            "usage: all usage reset"
        );
        Ok(reset)
    }

    /// Raw configured value of the feature on this subscription.
    pub async fn feature_value(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
            .and_then(|(item, _)| item.value))
    }

    /// Current usage, zero when the subscription has no such feature.
    pub async fn feature_usage(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
    ) -> Result<Decimal> {
        Ok(self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
            .map(|(item, _)| item.usage)
            .unwrap_or(Decimal::ZERO))
    }

    /// Remaining allowance. `None` when unlimited or when there is no item.
    pub async fn feature_remaining(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
    ) -> Result<Option<Decimal>> {
        Ok(self
            .item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await?
            .and_then(|(item, _)| item.remaining()))
    }

    pub async fn item(
        &self,
        subscription: &SubscriptionEntity,
        feature_slug: &str,
    ) -> Result<Option<(SubscriptionItemEntity, FeatureEntity)>> {
        self.item_repo
            .find_by_feature_slug(subscription.id, feature_slug)
            .await
    }

    pub async fn items(
        &self,
        subscription: &SubscriptionEntity,
    ) -> Result<Vec<(SubscriptionItemEntity, FeatureEntity)>> {
        self.item_repo.list_for_subscription(subscription.id).await
    }

    async fn log(
        &self,
        subscription: &SubscriptionEntity,
        item: &SubscriptionItemEntity,
        amount: Decimal,
        description: &str,
    ) -> Result<()> {
        self.usage_log_repo
            .create(InsertUsageLogEntity {
                subscription_id: subscription.id,
                feature_id: item.feature_id,
                amount,
                description: Some(description.to_string()),
                metadata: None,
            })
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    feature_id = %item.feature_id,
                    db_error = ?err,
                    "usage: failed to write usage log"
                );
                err
            })?;
        Ok(())
    }
}

/// True only for the increment that moves usage from below 80% of `limit` to
/// 80% or more. Limits of zero never warn.
pub fn crossed_warning_threshold(previous: Decimal, current: Decimal, limit: Decimal) -> bool {
    if limit <= Decimal::ZERO {
        return false;
    }
    let threshold = Decimal::new(8, 1);
    current / limit >= threshold && previous / limit < threshold
}
