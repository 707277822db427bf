use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::entities::package_features::{AttachedFeature, InsertPackageFeatureEntity};
use crate::entities::packages::{InsertPackageEntity, PackageEntity};

#[automock]
#[async_trait]
pub trait PackageRepository {
    async fn create(&self, package: InsertPackageEntity) -> Result<PackageEntity>;
    /// Inserts, or updates the live package with the same slug.
    async fn upsert_by_slug(&self, package: InsertPackageEntity) -> Result<PackageEntity>;
    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<PackageEntity>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PackageEntity>>;
    async fn list_active(&self) -> Result<Vec<PackageEntity>>;
    /// Upserts pivot rows. Features not listed stay attached.
    async fn sync_features(
        &self,
        package_id: Uuid,
        features: Vec<InsertPackageFeatureEntity>,
    ) -> Result<()>;
    async fn list_features(&self, package_id: Uuid) -> Result<Vec<AttachedFeature>>;
}
