use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::{
        features::FeatureEntity,
        package_features::{AttachedFeature, InsertPackageFeatureEntity, PackageFeatureEntity},
        packages::{InsertPackageEntity, PackageEntity},
    },
    repositories::packages::PackageRepository,
    schema::{features, package_features, packages},
};

pub struct PackagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PackagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PackageRepository for PackagePostgres {
    async fn create(&self, package: InsertPackageEntity) -> Result<PackageEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(packages::table)
            .values(&package)
            .returning(PackageEntity::as_returning())
            .get_result::<PackageEntity>(&mut conn)?;

        Ok(result)
    }

    async fn upsert_by_slug(&self, package: InsertPackageEntity) -> Result<PackageEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<PackageEntity, diesel::result::Error, _>(|tx| {
            let existing = packages::table
                .filter(packages::slug.eq(&package.slug))
                .filter(packages::deleted_at.is_null())
                .select(packages::id)
                .for_update()
                .first::<Uuid>(tx)
                .optional()?;

            match existing {
                Some(package_id) => update(packages::table.find(package_id))
                    .set((&package, packages::updated_at.eq(Utc::now())))
                    .returning(PackageEntity::as_returning())
                    .get_result::<PackageEntity>(tx),
                None => insert_into(packages::table)
                    .values(&package)
                    .returning(PackageEntity::as_returning())
                    .get_result::<PackageEntity>(tx),
            }
        })?;

        Ok(result)
    }

    async fn find_by_id(&self, package_id: Uuid) -> Result<Option<PackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = packages::table
            .find(package_id)
            .filter(packages::deleted_at.is_null())
            .select(PackageEntity::as_select())
            .first::<PackageEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = packages::table
            .filter(packages::slug.eq(slug))
            .filter(packages::deleted_at.is_null())
            .select(PackageEntity::as_select())
            .first::<PackageEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_active(&self) -> Result<Vec<PackageEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = packages::table
            .filter(packages::is_active.eq(true))
            .filter(packages::deleted_at.is_null())
            .order((packages::sort_order.asc(), packages::created_at.asc()))
            .select(PackageEntity::as_select())
            .load::<PackageEntity>(&mut conn)?;

        Ok(result)
    }

    async fn sync_features(
        &self,
        package_id: Uuid,
        features: Vec<InsertPackageFeatureEntity>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        conn.transaction::<(), diesel::result::Error, _>(|tx| {
            for row in features.iter().filter(|row| row.package_id == package_id) {
                insert_into(package_features::table)
                    .values(row)
                    .on_conflict((package_features::package_id, package_features::feature_id))
                    .do_update()
                    .set((row, package_features::updated_at.eq(now)))
                    .execute(tx)?;
            }
            Ok(())
        })?;

        Ok(())
    }

    async fn list_features(&self, package_id: Uuid) -> Result<Vec<AttachedFeature>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = package_features::table
            .inner_join(features::table)
            .filter(package_features::package_id.eq(package_id))
            .filter(features::deleted_at.is_null())
            .order((package_features::sort_order.asc(), features::sort_order.asc()))
            .select((PackageFeatureEntity::as_select(), FeatureEntity::as_select()))
            .load::<(PackageFeatureEntity, FeatureEntity)>(&mut conn)?;

        let result = rows
            .into_iter()
            .map(|(pivot, feature)| AttachedFeature {
                feature,
                value: pivot.value,
                is_available: pivot.is_available,
                sort_order: pivot.sort_order,
            })
            .collect();

        Ok(result)
    }
}
