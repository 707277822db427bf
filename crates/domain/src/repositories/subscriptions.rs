use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::subscription_items::SubscriptionItemSeed;
use crate::entities::subscriptions::{
    InsertSubscriptionEntity, SubscriptionChangeset, SubscriptionEntity,
};
use crate::value_objects::{
    analytics::{SubscriptionLifetime, SubscriptionPackageRow},
    enums::subscription_statuses::SubscriptionStatus,
    subscribers::SubscriberRef,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    /// Inserts the subscription and its items in one transaction.
    async fn create_with_items(
        &self,
        subscription: InsertSubscriptionEntity,
        items: Vec<SubscriptionItemSeed>,
    ) -> Result<SubscriptionEntity>;

    /// Applies `cancellation` to the old subscription and creates the
    /// replacement with its items in one transaction. Returns (old, new).
    async fn switch_plan(
        &self,
        subscription_id: Uuid,
        cancellation: SubscriptionChangeset,
        replacement: InsertSubscriptionEntity,
        items: Vec<SubscriptionItemSeed>,
    ) -> Result<(SubscriptionEntity, SubscriptionEntity)>;

    async fn update(
        &self,
        subscription_id: Uuid,
        changes: SubscriptionChangeset,
    ) -> Result<SubscriptionEntity>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Latest active or on-trial subscription by `starts_at`.
    async fn find_valid_for_subscriber(
        &self,
        subscriber: SubscriberRef,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn subscriber_has_valid_subscription(
        &self,
        subscriber: SubscriberRef,
        package_slug: Option<String>,
    ) -> Result<bool>;

    /// Latest cancelled subscription whose `ends_at` is still after `now`.
    async fn find_cancelled_resumable(
        &self,
        subscriber: SubscriberRef,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>>;

    async fn list_for_subscriber(
        &self,
        subscriber: SubscriberRef,
    ) -> Result<Vec<SubscriptionEntity>>;

    /// Active subscriptions whose `ends_at` falls on `date`.
    async fn get_expiring_subscriptions(
        &self,
        date: NaiveDate,
        auto_renew: Option<bool>,
    ) -> Result<Vec<SubscriptionEntity>>;

    async fn total_count(&self) -> Result<i64>;

    /// Active plus on-trial.
    async fn active_count(&self) -> Result<i64>;

    async fn count_by_status(&self) -> Result<HashMap<SubscriptionStatus, i64>>;

    /// Cancelled subscriptions with `cancelled_at >= since`.
    async fn churned_count(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Subscriptions created by `now` that had not ended before `since`.
    async fn total_count_in_period(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    async fn cancelled_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>>;

    async fn lifetimes_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionLifetime>>;

    async fn package_rows(&self) -> Result<Vec<SubscriptionPackageRow>>;
}
