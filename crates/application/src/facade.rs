use std::sync::Arc;

use domain::{
    repositories::{
        events::EventDispatcher, features::FeatureRepository, invoices::InvoiceRepository,
        packages::PackageRepository, subscription_items::SubscriptionItemRepository,
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        usage_logs::UsageLogRepository,
    },
    value_objects::subscribers::SubscriberRef,
};

use crate::{
    builders::{features::FeatureBuilder, packages::PackageBuilder},
    generators::invoice_numbers::{InvoiceNumberGenerator, PatternInvoiceNumberGenerator},
    settings::BillingSettings,
    usecases::{
        analytics::AnalyticsUseCase, billing::BillingUseCase,
        process_subscriptions::ProcessSubscriptionsUseCase,
        subscriber_context::SubscriberContext, subscriptions::SubscriptionUseCase,
        usage::UsageUseCase,
    },
};

/// Storage and event ports the library runs against.
#[derive(Clone)]
pub struct BillingRepositories {
    pub features: Arc<dyn FeatureRepository + Send + Sync>,
    pub packages: Arc<dyn PackageRepository + Send + Sync>,
    pub subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
    pub subscription_items: Arc<dyn SubscriptionItemRepository + Send + Sync>,
    pub usage_logs: Arc<dyn UsageLogRepository + Send + Sync>,
    pub invoices: Arc<dyn InvoiceRepository + Send + Sync>,
    pub transactions: Arc<dyn TransactionRepository + Send + Sync>,
    pub events: Arc<dyn EventDispatcher + Send + Sync>,
}

/// Single entry point wiring every use case over one set of repositories.
pub struct SubscriptionBilling {
    repositories: BillingRepositories,
    settings: BillingSettings,
    subscriptions: Arc<SubscriptionUseCase>,
    usage: Arc<UsageUseCase>,
    billing: Arc<BillingUseCase>,
    analytics: Arc<AnalyticsUseCase>,
}

impl SubscriptionBilling {
    pub fn new(repositories: BillingRepositories, settings: BillingSettings) -> Self {
        let number_generator = Arc::new(PatternInvoiceNumberGenerator::from_settings(&settings));
        Self::with_number_generator(repositories, settings, number_generator)
    }

    pub fn with_number_generator(
        repositories: BillingRepositories,
        settings: BillingSettings,
        number_generator: Arc<dyn InvoiceNumberGenerator>,
    ) -> Self {
        let subscriptions = Arc::new(SubscriptionUseCase::new(
            Arc::clone(&repositories.packages),
            Arc::clone(&repositories.subscriptions),
            Arc::clone(&repositories.events),
        ));
        let usage = Arc::new(UsageUseCase::new(
            Arc::clone(&repositories.subscription_items),
            Arc::clone(&repositories.usage_logs),
            Arc::clone(&repositories.events),
        ));
        let billing = Arc::new(BillingUseCase::new(
            Arc::clone(&repositories.packages),
            Arc::clone(&repositories.subscriptions),
            Arc::clone(&repositories.invoices),
            Arc::clone(&repositories.transactions),
            number_generator,
            settings.invoice_due_days,
        ));
        let analytics = Arc::new(AnalyticsUseCase::new(
            Arc::clone(&repositories.subscriptions),
            Arc::clone(&repositories.usage_logs),
            Arc::clone(&repositories.invoices),
        ));

        Self {
            repositories,
            settings,
            subscriptions,
            usage,
            billing,
            analytics,
        }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    pub fn subscriptions(&self) -> Arc<SubscriptionUseCase> {
        Arc::clone(&self.subscriptions)
    }

    pub fn usage(&self) -> Arc<UsageUseCase> {
        Arc::clone(&self.usage)
    }

    pub fn billing(&self) -> Arc<BillingUseCase> {
        Arc::clone(&self.billing)
    }

    pub fn analytics(&self) -> Arc<AnalyticsUseCase> {
        Arc::clone(&self.analytics)
    }

    pub fn process_subscriptions(&self) -> ProcessSubscriptionsUseCase {
        ProcessSubscriptionsUseCase::new(
            Arc::clone(&self.repositories.subscriptions),
            self.subscriptions(),
            self.billing(),
        )
    }

    pub fn feature(&self, slug: impl Into<String>) -> FeatureBuilder {
        FeatureBuilder::new(Arc::clone(&self.repositories.features), slug)
    }

    /// Package builder priced in the configured currency unless overridden.
    pub fn package(&self, slug: impl Into<String>) -> PackageBuilder {
        PackageBuilder::new(
            Arc::clone(&self.repositories.packages),
            slug,
            self.settings.currency.clone(),
        )
    }

    pub fn for_subscriber(&self, subscriber: SubscriberRef) -> SubscriberContext {
        SubscriberContext::new(
            subscriber,
            self.subscriptions(),
            self.usage(),
            self.billing(),
            self.analytics(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::repositories::{
        events::MockEventDispatcher, features::MockFeatureRepository,
        invoices::MockInvoiceRepository, packages::MockPackageRepository,
        subscription_items::MockSubscriptionItemRepository,
        subscriptions::MockSubscriptionRepository, transactions::MockTransactionRepository,
        usage_logs::MockUsageLogRepository,
    };
    use uuid::Uuid;

    fn repositories(subscriptions: MockSubscriptionRepository) -> BillingRepositories {
        BillingRepositories {
            features: Arc::new(MockFeatureRepository::new()),
            packages: Arc::new(MockPackageRepository::new()),
            subscriptions: Arc::new(subscriptions),
            subscription_items: Arc::new(MockSubscriptionItemRepository::new()),
            usage_logs: Arc::new(MockUsageLogRepository::new()),
            invoices: Arc::new(MockInvoiceRepository::new()),
            transactions: Arc::new(MockTransactionRepository::new()),
            events: Arc::new(MockEventDispatcher::new()),
        }
    }

    #[test]
    fn package_builder_uses_configured_currency() {
        let settings = BillingSettings {
            currency: "GBP".to_string(),
            ..BillingSettings::default()
        };
        let billing =
            SubscriptionBilling::new(repositories(MockSubscriptionRepository::new()), settings);

        let insert = billing.package("starter").to_insert();
        assert_eq!(insert.currency, "GBP");
        assert_eq!(insert.slug, "starter");
        assert_eq!(billing.feature("api-calls").to_insert().slug, "api-calls");
    }

    #[tokio::test]
    async fn subscriber_context_resolves_through_shared_repositories() {
        let user = SubscriberRef::user(Uuid::new_v4());
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_valid_for_subscriber()
            .withf(move |subscriber| *subscriber == user)
            .times(1)
            .returning(|_| Ok(None));

        let billing =
            SubscriptionBilling::new(repositories(subscriptions), BillingSettings::default());
        let mut context = billing.for_subscriber(user);

        assert_eq!(context.subscriber(), user);
        assert!(context.subscription().await.unwrap().is_none());
        assert!(!context.has_feature("api-calls").await.unwrap());
    }
}
