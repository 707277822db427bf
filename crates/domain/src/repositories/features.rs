use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::features::{FeatureEntity, InsertFeatureEntity};

#[automock]
#[async_trait]
pub trait FeatureRepository {
    async fn create(&self, feature: InsertFeatureEntity) -> Result<FeatureEntity>;
    async fn upsert_by_slug(&self, feature: InsertFeatureEntity) -> Result<FeatureEntity>;
    async fn find_by_id(&self, feature_id: Uuid) -> Result<Option<FeatureEntity>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<FeatureEntity>>;
}
