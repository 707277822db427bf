use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use diesel::{
    Connection, OptionalExtension, PgConnection, RunQueryDsl, dsl::count_star, insert_into,
    prelude::*, update,
};
use rust_decimal::Decimal;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::{
        subscription_items::{InsertSubscriptionItemEntity, SubscriptionItemSeed},
        subscriptions::{InsertSubscriptionEntity, SubscriptionChangeset, SubscriptionEntity},
    },
    repositories::subscriptions::SubscriptionRepository,
    schema::{packages, subscription_items, subscriptions},
    value_objects::{
        analytics::{SubscriptionLifetime, SubscriptionPackageRow},
        enums::subscription_statuses::SubscriptionStatus,
        subscribers::SubscriberRef,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// `[start, end)` of a calendar day in UTC.
pub(crate) fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

fn valid_statuses() -> Vec<String> {
    SubscriptionStatus::valid_statuses()
        .iter()
        .map(|status| status.as_str().to_string())
        .collect()
}

fn insert_items(
    tx: &mut PgConnection,
    subscription_id: Uuid,
    items: Vec<SubscriptionItemSeed>,
) -> diesel::QueryResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let rows: Vec<InsertSubscriptionItemEntity> = items
        .into_iter()
        .map(|seed| seed.into_insert(subscription_id))
        .collect();

    insert_into(subscription_items::table)
        .values(&rows)
        .execute(tx)?;

    Ok(())
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create_with_items(
        &self,
        subscription: InsertSubscriptionEntity,
        items: Vec<SubscriptionItemSeed>,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<SubscriptionEntity, diesel::result::Error, _>(|tx| {
            let created = insert_into(subscriptions::table)
                .values(&subscription)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(tx)?;

            insert_items(tx, created.id, items)?;

            Ok(created)
        })?;

        Ok(result)
    }

    async fn switch_plan(
        &self,
        subscription_id: Uuid,
        cancellation: SubscriptionChangeset,
        replacement: InsertSubscriptionEntity,
        items: Vec<SubscriptionItemSeed>,
    ) -> Result<(SubscriptionEntity, SubscriptionEntity)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn
            .transaction::<(SubscriptionEntity, SubscriptionEntity), diesel::result::Error, _>(
                |tx| {
                    let old = update(subscriptions::table.find(subscription_id))
                        .set(&cancellation)
                        .returning(SubscriptionEntity::as_returning())
                        .get_result::<SubscriptionEntity>(tx)?;

                    let new = insert_into(subscriptions::table)
                        .values(&replacement)
                        .returning(SubscriptionEntity::as_returning())
                        .get_result::<SubscriptionEntity>(tx)?;

                    insert_items(tx, new.id, items)?;

                    Ok((old, new))
                },
            )?;

        Ok(result)
    }

    async fn update(
        &self,
        subscription_id: Uuid,
        changes: SubscriptionChangeset,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(subscriptions::table.find(subscription_id))
            .set(&changes)
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .find(subscription_id)
            .filter(subscriptions::deleted_at.is_null())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_valid_for_subscriber(
        &self,
        subscriber: SubscriberRef,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::subscriber_type.eq(subscriber.kind.as_str()))
            .filter(subscriptions::subscriber_id.eq(subscriber.id))
            .filter(subscriptions::status.eq_any(valid_statuses()))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::starts_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn subscriber_has_valid_subscription(
        &self,
        subscriber: SubscriberRef,
        package_slug: Option<String>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = subscriptions::table
            .inner_join(packages::table)
            .filter(subscriptions::subscriber_type.eq(subscriber.kind.as_str()))
            .filter(subscriptions::subscriber_id.eq(subscriber.id))
            .filter(subscriptions::status.eq_any(valid_statuses()))
            .filter(subscriptions::deleted_at.is_null())
            .select(subscriptions::id)
            .into_boxed();

        if let Some(slug) = package_slug {
            query = query.filter(packages::slug.eq(slug));
        }

        let result = query.first::<Uuid>(&mut conn).optional()?;

        Ok(result.is_some())
    }

    async fn find_cancelled_resumable(
        &self,
        subscriber: SubscriberRef,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::subscriber_type.eq(subscriber.kind.as_str()))
            .filter(subscriptions::subscriber_id.eq(subscriber.id))
            .filter(subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()))
            .filter(subscriptions::ends_at.gt(now))
            .filter(subscriptions::deleted_at.is_null())
            .order((subscriptions::cancelled_at.desc(), subscriptions::updated_at.desc()))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_for_subscriber(
        &self,
        subscriber: SubscriberRef,
    ) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::subscriber_type.eq(subscriber.kind.as_str()))
            .filter(subscriptions::subscriber_id.eq(subscriber.id))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn get_expiring_subscriptions(
        &self,
        date: NaiveDate,
        auto_renew: Option<bool>,
    ) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let (day_start, day_end) = day_bounds(date);

        let mut query = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscriptions::ends_at.ge(day_start))
            .filter(subscriptions::ends_at.lt(day_end))
            .filter(subscriptions::deleted_at.is_null())
            .select(SubscriptionEntity::as_select())
            .into_boxed();

        if let Some(auto_renew) = auto_renew {
            query = query.filter(subscriptions::auto_renew.eq(auto_renew));
        }

        let result = query
            .order(subscriptions::ends_at.asc())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn total_count(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn active_count(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::status.eq_any(valid_statuses()))
            .filter(subscriptions::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn count_by_status(&self) -> Result<HashMap<SubscriptionStatus, i64>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .filter(subscriptions::deleted_at.is_null())
            .group_by(subscriptions::status)
            .select((subscriptions::status, count_star()))
            .load::<(String, i64)>(&mut conn)?;

        let mut result = HashMap::new();
        for (status, count) in rows {
            *result.entry(SubscriptionStatus::from_str(&status)).or_insert(0) += count;
        }

        Ok(result)
    }

    async fn churned_count(&self, since: DateTime<Utc>) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()))
            .filter(subscriptions::cancelled_at.ge(since))
            .filter(subscriptions::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn total_count_in_period(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::created_at.le(now))
            .filter(
                subscriptions::ends_at
                    .is_null()
                    .or(subscriptions::ends_at.ge(since)),
            )
            .filter(subscriptions::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn created_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::created_at.ge(since))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::created_at.asc())
            .select(subscriptions::created_at)
            .load::<DateTime<Utc>>(&mut conn)?;

        Ok(result)
    }

    async fn cancelled_since(&self, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()))
            .filter(subscriptions::cancelled_at.ge(since))
            .filter(subscriptions::deleted_at.is_null())
            .order(subscriptions::cancelled_at.asc())
            .select(subscriptions::cancelled_at.assume_not_null())
            .load::<DateTime<Utc>>(&mut conn)?;

        Ok(result)
    }

    async fn lifetimes_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionLifetime>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .filter(subscriptions::created_at.le(now))
            .filter(
                subscriptions::ends_at
                    .is_null()
                    .or(subscriptions::ends_at.ge(since)),
            )
            .filter(subscriptions::deleted_at.is_null())
            .select((subscriptions::created_at, subscriptions::ends_at))
            .load::<(DateTime<Utc>, Option<DateTime<Utc>>)>(&mut conn)?;

        let result = rows
            .into_iter()
            .map(|(created_at, ends_at)| SubscriptionLifetime {
                created_at,
                ends_at,
            })
            .collect();

        Ok(result)
    }

    async fn package_rows(&self) -> Result<Vec<SubscriptionPackageRow>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .inner_join(packages::table)
            .filter(subscriptions::deleted_at.is_null())
            .select((
                subscriptions::id,
                packages::id,
                packages::name,
                subscriptions::status,
                subscriptions::trial_ends_at,
                subscriptions::created_at,
                packages::price,
                packages::billing_period,
                packages::billing_interval,
            ))
            .load::<(
                Uuid,
                Uuid,
                String,
                String,
                Option<DateTime<Utc>>,
                DateTime<Utc>,
                Decimal,
                String,
                i32,
            )>(&mut conn)?;

        let result = rows
            .into_iter()
            .map(
                |(
                    subscription_id,
                    package_id,
                    package_name,
                    status,
                    trial_ends_at,
                    created_at,
                    price,
                    billing_period,
                    billing_interval,
                )| SubscriptionPackageRow {
                    subscription_id,
                    package_id,
                    package_name,
                    status,
                    trial_ends_at,
                    created_at,
                    price,
                    billing_period,
                    billing_interval,
                },
            )
            .collect();

        Ok(result)
    }
}
