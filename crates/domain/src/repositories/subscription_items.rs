use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{features::FeatureEntity, subscription_items::SubscriptionItemEntity};

#[automock]
#[async_trait]
pub trait SubscriptionItemRepository {
    async fn find_by_feature_slug(
        &self,
        subscription_id: Uuid,
        feature_slug: &str,
    ) -> Result<Option<(SubscriptionItemEntity, FeatureEntity)>>;

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<(SubscriptionItemEntity, FeatureEntity)>>;

    /// Adds `amount` in a single conditional update. With a `limit`, the row is
    /// only touched while `usage + amount <= limit`. Returns the new usage, or
    /// `None` when nothing was updated.
    async fn increment_usage(
        &self,
        item_id: Uuid,
        amount: Decimal,
        limit: Option<Decimal>,
    ) -> Result<Option<Decimal>>;

    async fn reset_usage(&self, item_id: Uuid) -> Result<()>;

    async fn reset_all_usage(&self, subscription_id: Uuid) -> Result<usize>;
}
