use std::sync::Arc;

use anyhow::Result;
use domain::{
    entities::{
        invoices::InvoiceEntity, packages::PackageEntity, subscriptions::SubscriptionEntity,
    },
    value_objects::{analytics::DailyUsage, subscribers::SubscriberRef},
};
use rust_decimal::Decimal;
use tracing::debug;

use super::{
    analytics::AnalyticsUseCase, billing::BillingUseCase, subscriptions::SubscriptionUseCase,
    usage::UsageUseCase,
};

/// Billing operations on behalf of one subscriber.
///
/// The subscriber's valid subscription is looked up once and reused by the
/// feature and usage calls that follow. Every lifecycle change made through
/// the context drops the cached value. The context is meant to live for one
/// unit of work, such as a request; it is not shared between tasks.
pub struct SubscriberContext {
    subscriber: SubscriberRef,
    subscriptions: Arc<SubscriptionUseCase>,
    usage: Arc<UsageUseCase>,
    billing: Arc<BillingUseCase>,
    analytics: Arc<AnalyticsUseCase>,
    resolved: Option<Option<SubscriptionEntity>>,
}

impl SubscriberContext {
    pub fn new(
        subscriber: SubscriberRef,
        subscriptions: Arc<SubscriptionUseCase>,
        usage: Arc<UsageUseCase>,
        billing: Arc<BillingUseCase>,
        analytics: Arc<AnalyticsUseCase>,
    ) -> Self {
        Self {
            subscriber,
            subscriptions,
            usage,
            billing,
            analytics,
            resolved: None,
        }
    }

    pub fn subscriber(&self) -> SubscriberRef {
        self.subscriber
    }

    /// Cached valid (active or on-trial) subscription.
    pub async fn subscription(&mut self) -> Result<Option<SubscriptionEntity>> {
        if let Some(resolved) = &self.resolved {
            return Ok(resolved.clone());
        }
        self.refresh().await
    }

    /// Looks the subscription up again and replaces the cached value.
    pub async fn refresh(&mut self) -> Result<Option<SubscriptionEntity>> {
        let current = self
            .subscriptions
            .current_subscription(self.subscriber)
            .await?;
        debug!(
            subscriber = %self.subscriber,
            subscription_id = ?current.as_ref().map(|subscription| subscription.id),
            "subscriber_context: subscription resolved"
        );
        self.resolved = Some(current.clone());
        Ok(current)
    }

    pub fn clear(&mut self) {
        self.resolved = None;
    }

    pub async fn subscribed(&self) -> Result<bool> {
        Ok(self.subscriptions.subscribed(self.subscriber).await?)
    }

    pub async fn subscribed_to(&self, package_slug: &str) -> Result<bool> {
        Ok(self
            .subscriptions
            .subscribed_to(self.subscriber, package_slug)
            .await?)
    }

    pub async fn on_trial(&mut self) -> Result<bool> {
        Ok(self
            .subscription()
            .await?
            .is_some_and(|subscription| subscription.is_on_trial()))
    }

    pub async fn subscribe(
        &mut self,
        package: &PackageEntity,
        with_trial: bool,
    ) -> Result<SubscriptionEntity> {
        self.clear();
        Ok(self
            .subscriptions
            .subscribe(self.subscriber, package, with_trial)
            .await?)
    }

    /// `None` when there is no valid subscription to cancel.
    pub async fn cancel(
        &mut self,
        immediate: bool,
        reason: Option<String>,
    ) -> Result<Option<SubscriptionEntity>> {
        let Some(subscription) = self.subscription().await? else {
            return Ok(None);
        };
        self.clear();
        Ok(Some(
            self.subscriptions
                .cancel(&subscription, immediate, reason)
                .await?,
        ))
    }

    /// `None` when no cancelled subscription is still within its period.
    pub async fn resume(&mut self) -> Result<Option<SubscriptionEntity>> {
        let Some(subscription) = self
            .subscriptions
            .resumable_subscription(self.subscriber)
            .await?
        else {
            return Ok(None);
        };
        self.clear();
        Ok(Some(self.subscriptions.resume(&subscription).await?))
    }

    pub async fn switch_plan(
        &mut self,
        new_package: &PackageEntity,
    ) -> Result<Option<SubscriptionEntity>> {
        let Some(subscription) = self.subscription().await? else {
            return Ok(None);
        };
        self.clear();
        Ok(Some(
            self.subscriptions
                .switch_plan(&subscription, new_package)
                .await?,
        ))
    }

    pub async fn has_feature(&mut self, feature_slug: &str) -> Result<bool> {
        match self.subscription().await? {
            Some(subscription) => {
                self.usage
                    .check(&subscription, feature_slug, Decimal::ONE)
                    .await
            }
            None => Ok(false),
        }
    }

    pub async fn feature_value(&mut self, feature_slug: &str) -> Result<Option<String>> {
        match self.subscription().await? {
            Some(subscription) => self.usage.feature_value(&subscription, feature_slug).await,
            None => Ok(None),
        }
    }

    pub async fn feature_usage(&mut self, feature_slug: &str) -> Result<Decimal> {
        match self.subscription().await? {
            Some(subscription) => self.usage.feature_usage(&subscription, feature_slug).await,
            None => Ok(Decimal::ZERO),
        }
    }

    /// `None` means unlimited, or that there is nothing to draw from.
    pub async fn feature_remaining(&mut self, feature_slug: &str) -> Result<Option<Decimal>> {
        match self.subscription().await? {
            Some(subscription) => {
                self.usage
                    .feature_remaining(&subscription, feature_slug)
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn daily_usage_for(
        &mut self,
        feature_slug: &str,
        days: i64,
    ) -> Result<Vec<DailyUsage>> {
        let Some(subscription) = self.subscription().await? else {
            return Ok(Vec::new());
        };
        let Some((item, _)) = self.usage.item(&subscription, feature_slug).await? else {
            return Ok(Vec::new());
        };
        self.analytics
            .daily_usage(subscription.id, item.feature_id, days)
            .await
    }

    /// Consumes `amount` of the feature. `false` without a valid subscription.
    pub async fn use_feature(&mut self, feature_slug: &str, amount: Decimal) -> Result<bool> {
        match self.subscription().await? {
            Some(subscription) => {
                self.usage
                    .increment(&subscription, feature_slug, amount)
                    .await
            }
            None => Ok(false),
        }
    }

    pub async fn invoices(&self) -> Result<Vec<InvoiceEntity>> {
        Ok(self.billing.invoices_for_subscriber(self.subscriber).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::invoice_numbers::PatternInvoiceNumberGenerator;
    use crate::usecases::subscriptions::tests::{active_subscription, feature, package};
    use chrono::{Duration, Utc};
    use domain::{
        entities::subscription_items::SubscriptionItemEntity,
        repositories::{
            events::MockEventDispatcher, invoices::MockInvoiceRepository,
            packages::MockPackageRepository, subscription_items::MockSubscriptionItemRepository,
            subscriptions::{MockSubscriptionRepository, SubscriptionRepository},
            transactions::MockTransactionRepository,
            usage_logs::MockUsageLogRepository,
        },
        value_objects::enums::billing_periods::BillingPeriod,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn context(
        subscriber: SubscriberRef,
        subscription_repo: MockSubscriptionRepository,
        item_repo: MockSubscriptionItemRepository,
    ) -> SubscriberContext {
        let subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync> =
            Arc::new(subscription_repo);
        let package_repo = Arc::new(MockPackageRepository::new());
        let invoice_repo = Arc::new(MockInvoiceRepository::new());
        let usage_log_repo = Arc::new(MockUsageLogRepository::new());
        let dispatcher = Arc::new(MockEventDispatcher::new());

        SubscriberContext::new(
            subscriber,
            Arc::new(SubscriptionUseCase::new(
                package_repo.clone(),
                Arc::clone(&subscription_repo),
                dispatcher.clone(),
            )),
            Arc::new(UsageUseCase::new(
                Arc::new(item_repo),
                usage_log_repo.clone(),
                dispatcher,
            )),
            Arc::new(BillingUseCase::new(
                package_repo,
                Arc::clone(&subscription_repo),
                invoice_repo.clone(),
                Arc::new(MockTransactionRepository::new()),
                Arc::new(PatternInvoiceNumberGenerator::default()),
                7,
            )),
            Arc::new(AnalyticsUseCase::new(
                subscription_repo,
                usage_log_repo,
                invoice_repo,
            )),
        )
    }

    fn item_for(
        subscription: &SubscriptionEntity,
        feature_id: Uuid,
        value: &str,
    ) -> SubscriptionItemEntity {
        let now = Utc::now();
        SubscriptionItemEntity {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            feature_id,
            value: Some(value.to_string()),
            usage: dec!(40),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn resolves_subscription_once_for_repeated_feature_calls() {
        let subscriber = SubscriberRef::user(Uuid::new_v4());
        let subscription = active_subscription(Some(Utc::now() + Duration::days(10)));
        let seats = feature("seats", "limit");
        let item = item_for(&subscription, seats.id, "50");

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_valid_for_subscriber()
            .times(1)
            .returning(move |_| Ok(Some(subscription.clone())));

        let mut item_repo = MockSubscriptionItemRepository::new();
        item_repo
            .expect_find_by_feature_slug()
            .returning(move |_, _| Ok(Some((item.clone(), seats.clone()))));

        let mut context = context(subscriber, subscription_repo, item_repo);
        assert!(context.has_feature("seats").await.unwrap());
        assert_eq!(
            context.feature_value("seats").await.unwrap().as_deref(),
            Some("50")
        );
        assert_eq!(context.feature_usage("seats").await.unwrap(), dec!(40));
        assert_eq!(
            context.feature_remaining("seats").await.unwrap(),
            Some(dec!(10))
        );
    }

    #[tokio::test]
    async fn without_subscription_everything_is_denied() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_valid_for_subscriber()
            .times(1)
            .returning(|_| Ok(None));
        let mut item_repo = MockSubscriptionItemRepository::new();
        item_repo.expect_find_by_feature_slug().times(0);

        let mut context = context(
            SubscriberRef::team(Uuid::new_v4()),
            subscription_repo,
            item_repo,
        );

        assert!(!context.has_feature("seats").await.unwrap());
        assert!(!context.use_feature("seats", Decimal::ONE).await.unwrap());
        assert_eq!(context.feature_usage("seats").await.unwrap(), Decimal::ZERO);
        assert_eq!(context.feature_remaining("seats").await.unwrap(), None);
        assert!(context.daily_usage_for("seats", 30).await.unwrap().is_empty());
        assert!(!context.on_trial().await.unwrap());
        assert!(context.cancel(true, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_drops_cached_subscription() {
        let subscriber = SubscriberRef::user(Uuid::new_v4());
        let subscription = active_subscription(Some(Utc::now() + Duration::days(10)));
        let stored = subscription.clone();

        let mut subscription_repo = MockSubscriptionRepository::new();
        let mut lookups = 0;
        subscription_repo
            .expect_find_valid_for_subscriber()
            .times(2)
            .returning(move |_| {
                lookups += 1;
                Ok((lookups == 1).then(|| subscription.clone()))
            });
        subscription_repo
            .expect_update()
            .times(1)
            .returning(move |_, changes| Ok(changes.apply(stored.clone())));

        let mut context = context(
            subscriber,
            subscription_repo,
            MockSubscriptionItemRepository::new(),
        );

        let cancelled = context.cancel(true, None).await.unwrap().unwrap();
        assert!(cancelled.is_cancelled());
        assert!(context.subscription().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn switch_plan_without_subscription_is_none() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_valid_for_subscriber()
            .returning(|_| Ok(None));
        subscription_repo.expect_switch_plan().times(0);

        let mut context = context(
            SubscriberRef::organization(Uuid::new_v4()),
            subscription_repo,
            MockSubscriptionItemRepository::new(),
        );
        let new_package = package(BillingPeriod::Year, 1, 0);
        assert!(context.switch_plan(&new_package).await.unwrap().is_none());
    }
}
