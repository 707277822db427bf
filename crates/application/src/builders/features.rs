use std::sync::Arc;

use anyhow::Result;
use domain::{
    entities::features::{FeatureEntity, InsertFeatureEntity},
    repositories::features::FeatureRepository,
    value_objects::enums::feature_types::FeatureType,
};
use tracing::info;

/// Fluent definition of a feature. Nothing is written until `create` or
/// `create_or_update`.
pub struct FeatureBuilder {
    repo: Arc<dyn FeatureRepository + Send + Sync>,
    slug: String,
    name: String,
    description: Option<String>,
    feature_type: FeatureType,
    is_active: bool,
    sort_order: i32,
    metadata: Option<serde_json::Value>,
}

impl FeatureBuilder {
    pub fn new(repo: Arc<dyn FeatureRepository + Send + Sync>, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            repo,
            name: slug.clone(),
            slug,
            description: None,
            feature_type: FeatureType::Boolean,
            is_active: true,
            sort_order: 0,
            metadata: None,
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

    pub fn feature_type(mut self, feature_type: FeatureType) -> Self {
        self.feature_type = feature_type;
        self
    }

    pub fn boolean(self) -> Self {
        self.feature_type(FeatureType::Boolean)
    }

    pub fn limit(self) -> Self {
        self.feature_type(FeatureType::Limit)
    }

    pub fn consumable(self) -> Self {
        self.feature_type(FeatureType::Consumable)
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn inactive(self) -> Self {
        self.active(false)
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_insert(&self) -> InsertFeatureEntity {
        InsertFeatureEntity {
            slug: self.slug.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            feature_type: self.feature_type.as_str().to_string(),
            is_active: self.is_active,
            sort_order: self.sort_order,
            metadata: self.metadata.clone(),
        }
    }

    pub async fn create(self) -> Result<FeatureEntity> {
        let feature = self.repo.create(self.to_insert()).await?;
        info!(feature_id = %feature.id, slug = %feature.slug, "features: feature created");
        Ok(feature)
    }

    /// Inserts, or updates the feature that already has this slug.
    pub async fn create_or_update(self) -> Result<FeatureEntity> {
        let feature = self.repo.upsert_by_slug(self.to_insert()).await?;
        info!(feature_id = %feature.id, slug = %feature.slug, "features: feature saved");
        Ok(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::repositories::features::MockFeatureRepository;
    use uuid::Uuid;

    fn builder(repo: MockFeatureRepository, slug: &str) -> FeatureBuilder {
        FeatureBuilder::new(Arc::new(repo), slug)
    }

    #[test]
    fn defaults_to_active_boolean_named_after_slug() {
        let insert = builder(MockFeatureRepository::new(), "export").to_insert();
        assert_eq!(insert.slug, "export");
        assert_eq!(insert.name, "export");
        assert_eq!(insert.feature_type, "boolean");
        assert!(insert.is_active);
        assert_eq!(insert.sort_order, 0);
    }

    #[test]
    fn shorthands_set_type_and_flags() {
        let insert = builder(MockFeatureRepository::new(), "api-requests")
            .name("API Requests")
            .description("Requests per billing period")
            .limit()
            .inactive()
            .sort_order(3)
            .metadata(serde_json::json!({ "unit": "request" }))
            .to_insert();

        assert_eq!(insert.name, "API Requests");
        assert_eq!(insert.feature_type, "limit");
        assert!(!insert.is_active);
        assert_eq!(insert.sort_order, 3);
        assert_eq!(insert.metadata, Some(serde_json::json!({ "unit": "request" })));

        let consumable = builder(MockFeatureRepository::new(), "credits")
            .consumable()
            .to_insert();
        assert_eq!(consumable.feature_type, "consumable");
    }

    #[tokio::test]
    async fn create_or_update_upserts_by_slug() {
        let mut repo = MockFeatureRepository::new();
        repo.expect_create().times(0);
        repo.expect_upsert_by_slug()
            .withf(|insert| insert.slug == "seats" && insert.feature_type == "limit")
            .times(1)
            .returning(|insert| {
                let now = Utc::now();
                Ok(FeatureEntity {
                    id: Uuid::new_v4(),
                    slug: insert.slug,
                    name: insert.name,
                    description: insert.description,
                    feature_type: insert.feature_type,
                    is_active: insert.is_active,
                    sort_order: insert.sort_order,
                    metadata: insert.metadata,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                })
            });

        let feature = builder(repo, "seats").limit().create_or_update().await.unwrap();
        assert!(feature.is_limit());
    }
}
