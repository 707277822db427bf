use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::features::{FeatureEntity, InsertFeatureEntity},
    repositories::features::FeatureRepository,
    schema::features,
};

pub struct FeaturePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl FeaturePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl FeatureRepository for FeaturePostgres {
    async fn create(&self, feature: InsertFeatureEntity) -> Result<FeatureEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(features::table)
            .values(&feature)
            .returning(FeatureEntity::as_returning())
            .get_result::<FeatureEntity>(&mut conn)?;

        Ok(result)
    }

    async fn upsert_by_slug(&self, feature: InsertFeatureEntity) -> Result<FeatureEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<FeatureEntity, diesel::result::Error, _>(|tx| {
            let existing = features::table
                .filter(features::slug.eq(&feature.slug))
                .filter(features::deleted_at.is_null())
                .select(features::id)
                .for_update()
                .first::<Uuid>(tx)
                .optional()?;

            match existing {
                Some(feature_id) => update(features::table.find(feature_id))
                    .set((&feature, features::updated_at.eq(Utc::now())))
                    .returning(FeatureEntity::as_returning())
                    .get_result::<FeatureEntity>(tx),
                None => insert_into(features::table)
                    .values(&feature)
                    .returning(FeatureEntity::as_returning())
                    .get_result::<FeatureEntity>(tx),
            }
        })?;

        Ok(result)
    }

    async fn find_by_id(&self, feature_id: Uuid) -> Result<Option<FeatureEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = features::table
            .find(feature_id)
            .filter(features::deleted_at.is_null())
            .select(FeatureEntity::as_select())
            .first::<FeatureEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<FeatureEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = features::table
            .filter(features::slug.eq(slug))
            .filter(features::deleted_at.is_null())
            .select(FeatureEntity::as_select())
            .first::<FeatureEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }
}
