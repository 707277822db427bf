use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use domain::{
    entities::{
        packages::PackageEntity,
        subscription_items::SubscriptionItemSeed,
        subscriptions::{InsertSubscriptionEntity, SubscriptionChangeset, SubscriptionEntity},
    },
    repositories::{
        events::EventDispatcher, packages::PackageRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus},
        events::BillingEvent,
        subscribers::SubscriberRef,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const PLAN_SWITCH_REASON: &str = "Plan switch";

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(Uuid),
    #[error("unknown subscriber type on subscription {subscription_id}: {subscriber_type}")]
    UnknownSubscriber {
        subscription_id: Uuid,
        subscriber_type: String,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase {
    package_repo: Arc<dyn PackageRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    event_dispatcher: Arc<dyn EventDispatcher + Send + Sync>,
}

impl SubscriptionUseCase {
    pub fn new(
        package_repo: Arc<dyn PackageRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        event_dispatcher: Arc<dyn EventDispatcher + Send + Sync>,
    ) -> Self {
        Self {
            package_repo,
            subscription_repo,
            event_dispatcher,
        }
    }

    /// Subscribes `subscriber` to `package`. The row and its feature items are
    /// written in one transaction; `SubscriptionCreated` is raised once it commits.
    pub async fn subscribe(
        &self,
        subscriber: SubscriberRef,
        package: &PackageEntity,
        with_trial: bool,
    ) -> UseCaseResult<SubscriptionEntity> {
        info!(
            %subscriber,
            package_id = %package.id,
            package_slug = %package.slug,
            with_trial,
            "subscriptions: subscribe requested"
        );

        let subscription = new_subscription(subscriber, package, with_trial, Utc::now());
        let items = self.item_seeds(package).await?;

        let created = self
            .subscription_repo
            .create_with_items(subscription, items)
            .await
            .map_err(|err| {
                error!(
                    %subscriber,
                    package_id = %package.id,
                    db_error = ?err,
                    "subscriptions: failed to create subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(
            %subscriber,
            subscription_id = %created.id,
            status = %created.status,
            ends_at = ?created.ends_at,
            "subscriptions: subscription created"
        );

        self.event_dispatcher
            .dispatch(BillingEvent::SubscriptionCreated {
                subscription: created.clone(),
            });

        Ok(created)
    }

    /// Always moves the subscription to `cancelled`. An immediate cancel also
    /// ends it now; otherwise `ends_at` is kept and auto-renew is switched off.
    pub async fn cancel(
        &self,
        subscription: &SubscriptionEntity,
        immediate: bool,
        reason: Option<String>,
    ) -> UseCaseResult<SubscriptionEntity> {
        info!(
            subscription_id = %subscription.id,
            immediate,
            reason = ?reason,
            "subscriptions: cancel requested"
        );

        let changes = cancellation(Utc::now(), immediate, reason);
        let cancelled = self
            .subscription_repo
            .update(subscription.id, changes)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "subscriptions: failed to cancel subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(
            subscription_id = %cancelled.id,
            ends_at = ?cancelled.ends_at,
            auto_renew = cancelled.auto_renew,
            "subscriptions: subscription cancelled"
        );
        Ok(cancelled)
    }

    /// Reactivates a cancelled subscription that has not ended yet. Anything
    /// else is returned unchanged.
    pub async fn resume(
        &self,
        subscription: &SubscriptionEntity,
    ) -> UseCaseResult<SubscriptionEntity> {
        let now = Utc::now();
        if !subscription.is_resumable_at(now) {
            info!(
                subscription_id = %subscription.id,
                status = %subscription.status,
                ends_at = ?subscription.ends_at,
                "subscriptions: subscription not resumable; leaving unchanged"
            );
            return Ok(subscription.clone());
        }

        let mut changes = SubscriptionChangeset::new(now).status(SubscriptionStatus::Active);
        changes.cancelled_at = Some(None);
        changes.cancellation_reason = Some(None);
        changes.auto_renew = Some(true);

        let resumed = self
            .subscription_repo
            .update(subscription.id, changes)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "subscriptions: failed to resume subscription"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(subscription_id = %resumed.id, "subscriptions: subscription resumed");
        Ok(resumed)
    }

    /// Cancels `subscription` immediately and subscribes the same subscriber to
    /// `new_package` without a trial, atomically. The old items are left as they were.
    pub async fn switch_plan(
        &self,
        subscription: &SubscriptionEntity,
        new_package: &PackageEntity,
    ) -> UseCaseResult<SubscriptionEntity> {
        let subscriber =
            subscription
                .subscriber()
                .ok_or_else(|| SubscriptionError::UnknownSubscriber {
                    subscription_id: subscription.id,
                    subscriber_type: subscription.subscriber_type.clone(),
                })?;

        info!(
            subscription_id = %subscription.id,
            %subscriber,
            from_package_id = %subscription.package_id,
            to_package_id = %new_package.id,
            "subscriptions: plan switch requested"
        );

        let now = Utc::now();
        let cancellation = cancellation(now, true, Some(PLAN_SWITCH_REASON.to_string()));
        let replacement = new_subscription(subscriber, new_package, false, now);
        let items = self.item_seeds(new_package).await?;

        let (old, created) = self
            .subscription_repo
            .switch_plan(subscription.id, cancellation, replacement, items)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    to_package_id = %new_package.id,
                    db_error = ?err,
                    "subscriptions: failed to switch plan"
                );
                SubscriptionError::Internal(err)
            })?;

        info!(
            old_subscription_id = %old.id,
            new_subscription_id = %created.id,
            "subscriptions: plan switched"
        );

        self.event_dispatcher
            .dispatch(BillingEvent::SubscriptionCreated {
                subscription: created.clone(),
            });

        Ok(created)
    }

    pub async fn current_subscription(
        &self,
        subscriber: SubscriberRef,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        Ok(self
            .subscription_repo
            .find_valid_for_subscriber(subscriber)
            .await?)
    }

    pub async fn subscribed(&self, subscriber: SubscriberRef) -> UseCaseResult<bool> {
        Ok(self
            .subscription_repo
            .subscriber_has_valid_subscription(subscriber, None)
            .await?)
    }

    pub async fn subscribed_to(
        &self,
        subscriber: SubscriberRef,
        package_slug: &str,
    ) -> UseCaseResult<bool> {
        Ok(self
            .subscription_repo
            .subscriber_has_valid_subscription(subscriber, Some(package_slug.to_string()))
            .await?)
    }

    pub async fn resumable_subscription(
        &self,
        subscriber: SubscriberRef,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        Ok(self
            .subscription_repo
            .find_cancelled_resumable(subscriber, Utc::now())
            .await?)
    }

    pub async fn subscriptions_for(
        &self,
        subscriber: SubscriberRef,
    ) -> UseCaseResult<Vec<SubscriptionEntity>> {
        Ok(self.subscription_repo.list_for_subscriber(subscriber).await?)
    }

    pub async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> UseCaseResult<SubscriptionEntity> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await?
            .ok_or(SubscriptionError::SubscriptionNotFound(subscription_id))
    }

    pub async fn find_package(&self, slug: &str) -> UseCaseResult<PackageEntity> {
        match self.package_repo.find_by_slug(slug).await? {
            Some(package) => Ok(package),
            None => {
                warn!(package_slug = %slug, "subscriptions: package not found");
                Err(SubscriptionError::PackageNotFound(slug.to_string()))
            }
        }
    }

    /// Features the package makes available, as items to copy onto a subscription.
    async fn item_seeds(&self, package: &PackageEntity) -> UseCaseResult<Vec<SubscriptionItemSeed>> {
        let attached = self
            .package_repo
            .list_features(package.id)
            .await
            .map_err(|err| {
                error!(
                    package_id = %package.id,
                    db_error = ?err,
                    "subscriptions: failed to load package features"
                );
                SubscriptionError::Internal(err)
            })?;

        Ok(attached
            .into_iter()
            .filter(|attached| attached.is_available)
            .map(|attached| SubscriptionItemSeed {
                feature_id: attached.feature.id,
                value: attached.value,
            })
            .collect())
    }
}

/// End of the first billing cycle. `None` means the subscription never ends.
/// A missing or unrecognised period bills monthly; the interval is at least 1.
pub fn calculate_end_date(
    start: DateTime<Utc>,
    period: Option<BillingPeriod>,
    interval: i32,
) -> Option<DateTime<Utc>> {
    let interval = u32::try_from(interval.max(1)).unwrap_or(1);
    match period {
        Some(period) => period.advance(start, interval),
        None => BillingPeriod::Month.advance(start, 1),
    }
}

fn new_subscription(
    subscriber: SubscriberRef,
    package: &PackageEntity,
    with_trial: bool,
    starts_at: DateTime<Utc>,
) -> InsertSubscriptionEntity {
    let trial_ends_at = if with_trial && package.has_trial() {
        u64::try_from(package.trial_days)
            .ok()
            .and_then(|days| starts_at.checked_add_days(Days::new(days)))
    } else {
        None
    };

    let status = if trial_ends_at.is_some() {
        SubscriptionStatus::OnTrial
    } else {
        SubscriptionStatus::Active
    };

    let mut ends_at = calculate_end_date(starts_at, package.period(), package.billing_interval);
    if let Some(trial_ends) = trial_ends_at {
        if ends_at.is_none_or(|ends| trial_ends > ends) {
            ends_at = Some(trial_ends);
        }
    }

    InsertSubscriptionEntity {
        subscriber_type: subscriber.kind.as_str().to_string(),
        subscriber_id: subscriber.id,
        package_id: package.id,
        status: status.as_str().to_string(),
        starts_at,
        ends_at,
        trial_ends_at,
        cancelled_at: None,
        cancellation_reason: None,
        auto_renew: true,
        metadata: None,
    }
}

fn cancellation(
    now: DateTime<Utc>,
    immediate: bool,
    reason: Option<String>,
) -> SubscriptionChangeset {
    let mut changes = SubscriptionChangeset::new(now).status(SubscriptionStatus::Cancelled);
    changes.cancelled_at = Some(Some(now));
    changes.cancellation_reason = Some(reason);
    if immediate {
        changes.ends_at = Some(Some(now));
    } else {
        changes.auto_renew = Some(false);
    }
    changes
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, Months, TimeZone};
    use domain::{
        entities::{features::FeatureEntity, package_features::AttachedFeature},
        repositories::{
            events::MockEventDispatcher, packages::MockPackageRepository,
            subscriptions::MockSubscriptionRepository,
        },
    };
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    pub(crate) fn package(period: BillingPeriod, interval: i32, trial_days: i32) -> PackageEntity {
        let now = Utc::now();
        PackageEntity {
            id: Uuid::new_v4(),
            slug: "pro".to_string(),
            name: "Pro".to_string(),
            description: None,
            price: dec!(29.99),
            original_price: None,
            currency: "USD".to_string(),
            billing_period: period.as_str().to_string(),
            billing_interval: interval,
            trial_days,
            is_active: true,
            is_featured: false,
            sort_order: 0,
            metadata: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub(crate) fn feature(slug: &str, feature_type: &str) -> FeatureEntity {
        let now = Utc::now();
        FeatureEntity {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            description: None,
            feature_type: feature_type.to_string(),
            is_active: true,
            sort_order: 0,
            metadata: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Mirrors what the database hands back after an insert.
    pub(crate) fn persisted(insert: InsertSubscriptionEntity) -> SubscriptionEntity {
        SubscriptionEntity {
            id: Uuid::new_v4(),
            subscriber_type: insert.subscriber_type,
            subscriber_id: insert.subscriber_id,
            package_id: insert.package_id,
            status: insert.status,
            starts_at: insert.starts_at,
            ends_at: insert.ends_at,
            trial_ends_at: insert.trial_ends_at,
            cancelled_at: insert.cancelled_at,
            cancellation_reason: insert.cancellation_reason,
            auto_renew: insert.auto_renew,
            metadata: insert.metadata,
            created_at: insert.starts_at,
            updated_at: insert.starts_at,
            deleted_at: None,
        }
    }

    pub(crate) fn active_subscription(ends_at: Option<DateTime<Utc>>) -> SubscriptionEntity {
        let package = package(BillingPeriod::Month, 1, 0);
        let mut subscription = persisted(new_subscription(
            SubscriberRef::user(Uuid::new_v4()),
            &package,
            false,
            Utc::now() - Duration::days(1),
        ));
        subscription.ends_at = ends_at;
        subscription
    }

    fn usecase(
        package_repo: MockPackageRepository,
        subscription_repo: MockSubscriptionRepository,
        dispatcher: MockEventDispatcher,
    ) -> SubscriptionUseCase {
        SubscriptionUseCase::new(
            Arc::new(package_repo),
            Arc::new(subscription_repo),
            Arc::new(dispatcher),
        )
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn end_date_scales_with_period_and_interval() {
        let start = start();
        for interval in 1..=3 {
            let i = interval as u32;
            assert_eq!(
                calculate_end_date(start, Some(BillingPeriod::Day), interval),
                Some(start + Duration::days(i64::from(interval)))
            );
            assert_eq!(
                calculate_end_date(start, Some(BillingPeriod::Week), interval),
                Some(start + Duration::weeks(i64::from(interval)))
            );
            assert_eq!(
                calculate_end_date(start, Some(BillingPeriod::Month), interval),
                start.checked_add_months(Months::new(i))
            );
            assert_eq!(
                calculate_end_date(start, Some(BillingPeriod::Year), interval),
                start.checked_add_months(Months::new(12 * i))
            );
        }
    }

    #[test]
    fn end_date_is_none_for_lifetime_and_monthly_when_unknown() {
        let start = start();
        assert_eq!(
            calculate_end_date(start, Some(BillingPeriod::Lifetime), 1),
            None
        );
        assert_eq!(
            calculate_end_date(start, None, 6),
            start.checked_add_months(Months::new(1))
        );
        assert_eq!(
            calculate_end_date(start, Some(BillingPeriod::Day), 0),
            Some(start + Duration::days(1))
        );
    }

    #[test]
    fn trial_extends_end_date_past_short_cycles() {
        let package = package(BillingPeriod::Week, 1, 14);
        let subscription =
            new_subscription(SubscriberRef::user(Uuid::new_v4()), &package, true, start());

        assert_eq!(subscription.status, "on_trial");
        assert_eq!(subscription.trial_ends_at, Some(start() + Duration::days(14)));
        assert_eq!(subscription.ends_at, subscription.trial_ends_at);
    }

    #[test]
    fn trial_is_ignored_without_trial_days_or_when_not_requested() {
        let no_trial_days = package(BillingPeriod::Month, 1, 0);
        let subscription =
            new_subscription(SubscriberRef::user(Uuid::new_v4()), &no_trial_days, true, start());
        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.trial_ends_at, None);

        let with_trial_days = package(BillingPeriod::Month, 1, 14);
        let subscription = new_subscription(
            SubscriberRef::user(Uuid::new_v4()),
            &with_trial_days,
            false,
            start(),
        );
        assert_eq!(subscription.status, "active");
    }

    #[test]
    fn lifetime_trial_sets_end_to_trial_end() {
        let package = package(BillingPeriod::Lifetime, 1, 7);
        let subscription =
            new_subscription(SubscriberRef::user(Uuid::new_v4()), &package, true, start());
        assert_eq!(subscription.ends_at, Some(start() + Duration::days(7)));
    }

    #[tokio::test]
    async fn subscribe_materialises_available_features_and_raises_event() {
        let package = package(BillingPeriod::Month, 1, 14);
        let package_id = package.id;
        let api_calls = feature("api-calls", "limit");
        let export = feature("export", "boolean");
        let api_calls_id = api_calls.id;

        let mut package_repo = MockPackageRepository::new();
        package_repo
            .expect_list_features()
            .with(eq(package_id))
            .times(1)
            .returning(move |_| {
                Ok(vec![
                    AttachedFeature {
                        feature: api_calls.clone(),
                        value: Some("1000".to_string()),
                        is_available: true,
                        sort_order: 0,
                    },
                    AttachedFeature {
                        feature: export.clone(),
                        value: Some("true".to_string()),
                        is_available: false,
                        sort_order: 1,
                    },
                ])
            });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_create_with_items()
            .withf(move |_, items| {
                items.len() == 1
                    && items[0].feature_id == api_calls_id
                    && items[0].value.as_deref() == Some("1000")
            })
            .times(1)
            .returning(|insert, _| Ok(persisted(insert)));

        let mut dispatcher = MockEventDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|event| matches!(event, BillingEvent::SubscriptionCreated { .. }))
            .times(1)
            .return_const(());

        let subscriber = SubscriberRef::user(Uuid::new_v4());
        let subscription = usecase(package_repo, subscription_repo, dispatcher)
            .subscribe(subscriber, &package, true)
            .await
            .unwrap();

        assert_eq!(subscription.status(), SubscriptionStatus::OnTrial);
        assert_eq!(subscription.subscriber(), Some(subscriber));
        let trial_ends = subscription.trial_ends_at.unwrap();
        assert_eq!(trial_ends, subscription.starts_at + Duration::days(14));
        assert!(subscription.ends_at.unwrap() >= trial_ends);
        assert!(subscription.auto_renew);
    }

    #[tokio::test]
    async fn lifetime_subscription_never_ends() {
        let package = package(BillingPeriod::Lifetime, 1, 0);

        let mut package_repo = MockPackageRepository::new();
        package_repo
            .expect_list_features()
            .returning(|_| Ok(Vec::new()));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_create_with_items()
            .returning(|insert, _| Ok(persisted(insert)));
        let mut dispatcher = MockEventDispatcher::new();
        dispatcher.expect_dispatch().return_const(());

        let subscription = usecase(package_repo, subscription_repo, dispatcher)
            .subscribe(SubscriberRef::team(Uuid::new_v4()), &package, false)
            .await
            .unwrap();

        assert_eq!(subscription.ends_at, None);
        assert!(subscription.is_active_at(Utc::now() + Duration::days(365 * 500)));
    }

    #[tokio::test]
    async fn failed_insert_raises_no_event() {
        let package = package(BillingPeriod::Month, 1, 0);

        let mut package_repo = MockPackageRepository::new();
        package_repo
            .expect_list_features()
            .returning(|_| Ok(Vec::new()));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_create_with_items()
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));
        let mut dispatcher = MockEventDispatcher::new();
        dispatcher.expect_dispatch().times(0);

        let result = usecase(package_repo, subscription_repo, dispatcher)
            .subscribe(SubscriberRef::user(Uuid::new_v4()), &package, false)
            .await;

        assert!(matches!(result, Err(SubscriptionError::Internal(_))));
    }

    #[tokio::test]
    async fn immediate_cancel_ends_subscription_now() {
        let subscription = active_subscription(Some(Utc::now() + Duration::days(20)));
        let stored = subscription.clone();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_update()
            .with(eq(subscription.id), mockall::predicate::always())
            .times(1)
            .returning(move |_, changes| Ok(changes.apply(stored.clone())));

        let cancelled = usecase(
            MockPackageRepository::new(),
            subscription_repo,
            MockEventDispatcher::new(),
        )
        .cancel(&subscription, true, Some("no longer needed".to_string()))
        .await
        .unwrap();

        assert_eq!(cancelled.status(), SubscriptionStatus::Cancelled);
        assert!(cancelled.ends_at.unwrap() <= Utc::now());
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(
            cancelled.cancellation_reason.as_deref(),
            Some("no longer needed")
        );
        assert!(cancelled.auto_renew);
    }

    #[tokio::test]
    async fn grace_cancel_keeps_end_date_but_loses_validity() {
        let ends_at = Utc::now() + Duration::days(20);
        let subscription = active_subscription(Some(ends_at));
        let stored = subscription.clone();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_update()
            .returning(move |_, changes| Ok(changes.apply(stored.clone())));

        let cancelled = usecase(
            MockPackageRepository::new(),
            subscription_repo,
            MockEventDispatcher::new(),
        )
        .cancel(&subscription, false, None)
        .await
        .unwrap();

        assert_eq!(cancelled.status(), SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.ends_at, Some(ends_at));
        assert!(!cancelled.auto_renew);
        // Access is gated on validity, so the grace period grants nothing until resumed.
        assert!(!cancelled.is_valid());
    }

    #[tokio::test]
    async fn resume_reactivates_cancelled_subscription_before_end() {
        let mut subscription = active_subscription(Some(Utc::now() + Duration::days(5)));
        subscription.status = "cancelled".to_string();
        subscription.cancelled_at = Some(Utc::now());
        subscription.cancellation_reason = Some("budget".to_string());
        subscription.auto_renew = false;
        let stored = subscription.clone();

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_update()
            .times(1)
            .returning(move |_, changes| Ok(changes.apply(stored.clone())));

        let resumed = usecase(
            MockPackageRepository::new(),
            subscription_repo,
            MockEventDispatcher::new(),
        )
        .resume(&subscription)
        .await
        .unwrap();

        assert_eq!(resumed.status(), SubscriptionStatus::Active);
        assert_eq!(resumed.cancelled_at, None);
        assert_eq!(resumed.cancellation_reason, None);
        assert!(resumed.auto_renew);
        assert!(resumed.is_valid());
    }

    #[tokio::test]
    async fn resume_is_a_no_op_unless_cancelled_and_unexpired() {
        let active = active_subscription(Some(Utc::now() + Duration::days(5)));

        let mut lapsed = active_subscription(Some(Utc::now() - Duration::days(1)));
        lapsed.status = "cancelled".to_string();
        lapsed.cancelled_at = Some(Utc::now() - Duration::days(3));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_update().times(0);
        let usecase = usecase(
            MockPackageRepository::new(),
            subscription_repo,
            MockEventDispatcher::new(),
        );

        assert_eq!(usecase.resume(&active).await.unwrap(), active);
        assert_eq!(usecase.resume(&lapsed).await.unwrap(), lapsed);
    }

    #[tokio::test]
    async fn switch_plan_cancels_old_and_subscribes_without_trial() {
        let old = active_subscription(Some(Utc::now() + Duration::days(10)));
        let stored_old = old.clone();
        let new_package = package(BillingPeriod::Year, 1, 30);
        let new_package_id = new_package.id;
        let storage = feature("storage", "limit");
        let storage_id = storage.id;

        let mut package_repo = MockPackageRepository::new();
        package_repo
            .expect_list_features()
            .with(eq(new_package_id))
            .returning(move |_| {
                Ok(vec![AttachedFeature {
                    feature: storage.clone(),
                    value: Some("50".to_string()),
                    is_available: true,
                    sort_order: 0,
                }])
            });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_switch_plan()
            .withf(move |id, cancellation, replacement, items| {
                *id == stored_old.id
                    && cancellation.ends_at.is_some()
                    && replacement.package_id == new_package_id
                    && items.len() == 1
                    && items[0].feature_id == storage_id
            })
            .times(1)
            .returning({
                let old = old.clone();
                move |_, cancellation, replacement, _| {
                    Ok((cancellation.apply(old.clone()), persisted(replacement)))
                }
            });

        let mut dispatcher = MockEventDispatcher::new();
        dispatcher.expect_dispatch().times(1).return_const(());

        let created = usecase(package_repo, subscription_repo, dispatcher)
            .switch_plan(&old, &new_package)
            .await
            .unwrap();

        assert_eq!(created.status(), SubscriptionStatus::Active);
        assert_eq!(created.trial_ends_at, None);
        assert_eq!(created.package_id, new_package_id);
        assert_eq!(created.subscriber(), old.subscriber());
    }

    #[test]
    fn plan_switch_cancellation_is_immediate_with_reason() {
        let now = Utc::now();
        let old = active_subscription(Some(now + Duration::days(10)));
        let cancelled =
            cancellation(now, true, Some(PLAN_SWITCH_REASON.to_string())).apply(old);
        assert_eq!(cancelled.status(), SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Plan switch"));
        assert_eq!(cancelled.ends_at, Some(now));
    }

    #[tokio::test]
    async fn find_package_reports_missing_slug() {
        let mut package_repo = MockPackageRepository::new();
        package_repo
            .expect_find_by_slug()
            .withf(|slug| slug == "ghost")
            .returning(|_| Ok(None));

        let result = usecase(
            package_repo,
            MockSubscriptionRepository::new(),
            MockEventDispatcher::new(),
        )
        .find_package("ghost")
        .await;

        assert!(matches!(result, Err(SubscriptionError::PackageNotFound(slug)) if slug == "ghost"));
    }
}
