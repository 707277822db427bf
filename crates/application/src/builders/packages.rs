use std::sync::Arc;

use anyhow::Result;
use domain::{
    entities::{
        package_features::InsertPackageFeatureEntity,
        packages::{InsertPackageEntity, PackageEntity},
    },
    repositories::packages::PackageRepository,
    value_objects::enums::billing_periods::BillingPeriod,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAttachment {
    pub feature_id: Uuid,
    pub value: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
}

impl FeatureAttachment {
    pub fn new(feature_id: Uuid) -> Self {
        Self {
            feature_id,
            value: None,
            is_available: true,
            sort_order: 0,
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Fluent definition of a package and the features it grants.
pub struct PackageBuilder {
    repo: Arc<dyn PackageRepository + Send + Sync>,
    slug: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    original_price: Option<Decimal>,
    currency: String,
    billing_period: BillingPeriod,
    billing_interval: i32,
    trial_days: i32,
    is_active: bool,
    is_featured: bool,
    sort_order: i32,
    metadata: Option<serde_json::Value>,
    attachments: Vec<FeatureAttachment>,
}

impl PackageBuilder {
    pub fn new(
        repo: Arc<dyn PackageRepository + Send + Sync>,
        slug: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let slug = slug.into();
        Self {
            repo,
            name: slug.clone(),
            slug,
            description: None,
            price: Decimal::ZERO,
            original_price: None,
            currency: currency.into(),
            billing_period: BillingPeriod::Month,
            billing_interval: 1,
            trial_days: 0,
            is_active: true,
            is_featured: false,
            sort_order: 0,
            metadata: None,
            attachments: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    pub fn original_price(mut self, original_price: Decimal) -> Self {
        self.original_price = Some(original_price);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn billing_period(mut self, period: BillingPeriod, interval: i32) -> Self {
        self.billing_period = period;
        self.billing_interval = interval.max(1);
        self
    }

    pub fn monthly(self) -> Self {
        self.billing_period(BillingPeriod::Month, 1)
    }

    pub fn quarterly(self) -> Self {
        self.billing_period(BillingPeriod::Month, 3)
    }

    pub fn yearly(self) -> Self {
        self.billing_period(BillingPeriod::Year, 1)
    }

    pub fn lifetime(self) -> Self {
        self.billing_period(BillingPeriod::Lifetime, 1)
    }

    pub fn trial_days(mut self, days: i32) -> Self {
        self.trial_days = days.max(0);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.is_featured = featured;
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Grants a feature with a package-specific value.
    pub fn feature(self, feature_id: Uuid, value: impl Into<String>) -> Self {
        self.attach(FeatureAttachment::new(feature_id).value(value))
    }

    pub fn attach(mut self, attachment: FeatureAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Grants each feature without a value.
    pub fn features(mut self, feature_ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.attachments
            .extend(feature_ids.into_iter().map(FeatureAttachment::new));
        self
    }

    pub fn to_insert(&self) -> InsertPackageEntity {
        InsertPackageEntity {
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            original_price: self.original_price,
            currency: self.currency.clone(),
            billing_period: self.billing_period.as_str().to_string(),
            billing_interval: self.billing_interval,
            trial_days: self.trial_days,
            is_active: self.is_active,
            is_featured: self.is_featured,
            sort_order: self.sort_order,
            metadata: self.metadata.clone(),
        }
    }

    pub async fn create(self) -> Result<PackageEntity> {
        let package = self.repo.create(self.to_insert()).await?;
        self.attach_features(&package).await?;
        info!(package_id = %package.id, slug = %package.slug, "packages: package created");
        Ok(package)
    }

    /// Inserts, or updates the package with this slug, then syncs features.
    /// Features attached earlier and not listed here stay attached.
    pub async fn create_or_update(self) -> Result<PackageEntity> {
        let package = self.repo.upsert_by_slug(self.to_insert()).await?;
        self.attach_features(&package).await?;
        info!(package_id = %package.id, slug = %package.slug, "packages: package saved");
        Ok(package)
    }

    async fn attach_features(&self, package: &PackageEntity) -> Result<()> {
        if self.attachments.is_empty() {
            return Ok(());
        }

        let rows = self
            .attachments
            .iter()
            .map(|attachment| InsertPackageFeatureEntity {
                package_id: package.id,
                feature_id: attachment.feature_id,
                value: attachment.value.clone(),
                is_available: attachment.is_available,
                sort_order: attachment.sort_order,
            })
            .collect();

        self.repo.sync_features(package.id, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::repositories::packages::MockPackageRepository;
    use rust_decimal_macros::dec;

    fn stored(insert: InsertPackageEntity) -> PackageEntity {
        let now = Utc::now();
        PackageEntity {
            id: Uuid::new_v4(),
            slug: insert.slug,
            name: insert.name,
            description: insert.description,
            price: insert.price,
            original_price: insert.original_price,
            currency: insert.currency,
            billing_period: insert.billing_period,
            billing_interval: insert.billing_interval,
            trial_days: insert.trial_days,
            is_active: insert.is_active,
            is_featured: insert.is_featured,
            sort_order: insert.sort_order,
            metadata: insert.metadata,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn defaults_to_monthly_in_configured_currency() {
        let insert =
            PackageBuilder::new(Arc::new(MockPackageRepository::new()), "free", "EUR").to_insert();
        assert_eq!(insert.name, "free");
        assert_eq!(insert.currency, "EUR");
        assert_eq!(insert.billing_period, "month");
        assert_eq!(insert.billing_interval, 1);
        assert_eq!(insert.price, Decimal::ZERO);
        assert!(insert.is_active);
        assert!(!insert.is_featured);
    }

    #[test]
    fn cycle_shorthands() {
        let repo: Arc<dyn PackageRepository + Send + Sync> =
            Arc::new(MockPackageRepository::new());
        let quarterly = PackageBuilder::new(Arc::clone(&repo), "q", "USD")
            .quarterly()
            .to_insert();
        assert_eq!((quarterly.billing_period.as_str(), quarterly.billing_interval), ("month", 3));

        let yearly = PackageBuilder::new(Arc::clone(&repo), "y", "USD")
            .yearly()
            .to_insert();
        assert_eq!((yearly.billing_period.as_str(), yearly.billing_interval), ("year", 1));

        let lifetime = PackageBuilder::new(repo, "l", "USD")
            .billing_period(BillingPeriod::Week, 0)
            .lifetime()
            .to_insert();
        assert_eq!((lifetime.billing_period.as_str(), lifetime.billing_interval), ("lifetime", 1));
    }

    #[tokio::test]
    async fn create_attaches_features_after_insert() {
        let api_calls = Uuid::new_v4();
        let export = Uuid::new_v4();
        let beta = Uuid::new_v4();

        let mut repo = MockPackageRepository::new();
        repo.expect_create()
            .withf(|insert| {
                insert.slug == "pro" && insert.price == dec!(29.99) && insert.trial_days == 14
            })
            .times(1)
            .returning(|insert| Ok(stored(insert)));
        repo.expect_sync_features()
            .withf(move |_, rows| {
                rows.len() == 3
                    && rows[0].feature_id == api_calls
                    && rows[0].value.as_deref() == Some("1000")
                    && rows[1].feature_id == export
                    && rows[1].value.is_none()
                    && rows[2].feature_id == beta
                    && !rows[2].is_available
                    && rows[2].sort_order == 9
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let package = PackageBuilder::new(Arc::new(repo), "pro", "USD")
            .name("Pro")
            .price(dec!(29.99))
            .original_price(dec!(39.99))
            .monthly()
            .trial_days(14)
            .featured(true)
            .feature(api_calls, "1000")
            .features([export])
            .attach(FeatureAttachment::new(beta).unavailable().sort_order(9))
            .create()
            .await
            .unwrap();

        assert_eq!(package.slug, "pro");
        assert!(package.has_trial());
    }

    #[tokio::test]
    async fn create_or_update_without_features_skips_sync() {
        let mut repo = MockPackageRepository::new();
        repo.expect_upsert_by_slug()
            .returning(|insert| Ok(stored(insert)));
        repo.expect_sync_features().times(0);

        let package = PackageBuilder::new(Arc::new(repo), "basic", "USD")
            .price(dec!(9))
            .create_or_update()
            .await
            .unwrap();
        assert_eq!(package.price, dec!(9));
    }

    #[tokio::test]
    async fn failed_sync_surfaces_error() {
        let mut repo = MockPackageRepository::new();
        repo.expect_create().returning(|insert| Ok(stored(insert)));
        repo.expect_sync_features()
            .returning(|_, _| Err(anyhow::anyhow!("foreign key violation")));

        let result = PackageBuilder::new(Arc::new(repo), "team", "USD")
            .feature(Uuid::new_v4(), "5")
            .create()
            .await;
        assert!(result.is_err());
    }
}
