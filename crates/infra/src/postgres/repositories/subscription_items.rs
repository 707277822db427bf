use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*, update};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::{features::FeatureEntity, subscription_items::SubscriptionItemEntity},
    repositories::subscription_items::SubscriptionItemRepository,
    schema::{features, subscription_items},
};

pub struct SubscriptionItemPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionItemPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionItemRepository for SubscriptionItemPostgres {
    async fn find_by_feature_slug(
        &self,
        subscription_id: Uuid,
        feature_slug: &str,
    ) -> Result<Option<(SubscriptionItemEntity, FeatureEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscription_items::table
            .inner_join(features::table)
            .filter(subscription_items::subscription_id.eq(subscription_id))
            .filter(features::slug.eq(feature_slug))
            .filter(features::deleted_at.is_null())
            .select((SubscriptionItemEntity::as_select(), FeatureEntity::as_select()))
            .first::<(SubscriptionItemEntity, FeatureEntity)>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<(SubscriptionItemEntity, FeatureEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscription_items::table
            .inner_join(features::table)
            .filter(subscription_items::subscription_id.eq(subscription_id))
            .filter(features::deleted_at.is_null())
            .order((features::sort_order.asc(), features::slug.asc()))
            .select((SubscriptionItemEntity::as_select(), FeatureEntity::as_select()))
            .load::<(SubscriptionItemEntity, FeatureEntity)>(&mut conn)?;

        Ok(result)
    }

    async fn increment_usage(
        &self,
        item_id: Uuid,
        amount: Decimal,
        limit: Option<Decimal>,
    ) -> Result<Option<Decimal>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();
        let target = subscription_items::table.filter(subscription_items::id.eq(item_id));
        let changes = (
            subscription_items::usage.eq(subscription_items::usage + amount),
            subscription_items::updated_at.eq(now),
        );

        // The limit guard sits in the WHERE clause so concurrent increments
        // cannot both pass a stale read.
        let result = match limit {
            Some(limit) => update(target.filter((subscription_items::usage + amount).le(limit)))
                .set(changes)
                .returning(subscription_items::usage)
                .get_result::<Decimal>(&mut conn)
                .optional()?,
            None => update(target)
                .set(changes)
                .returning(subscription_items::usage)
                .get_result::<Decimal>(&mut conn)
                .optional()?,
        };

        Ok(result)
    }

    async fn reset_usage(&self, item_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscription_items::table.filter(subscription_items::id.eq(item_id)))
            .set((
                subscription_items::usage.eq(Decimal::ZERO),
                subscription_items::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn reset_all_usage(&self, subscription_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(
            subscription_items::table
                .filter(subscription_items::subscription_id.eq(subscription_id)),
        )
        .set((
            subscription_items::usage.eq(Decimal::ZERO),
            subscription_items::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(result)
    }
}
