use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::usage_logs::{InsertUsageLogEntity, UsageLogEntity},
    repositories::usage_logs::UsageLogRepository,
    schema::usage_logs,
};

pub struct UsageLogPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsageLogPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsageLogRepository for UsageLogPostgres {
    async fn create(&self, usage_log: InsertUsageLogEntity) -> Result<UsageLogEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(usage_logs::table)
            .values(&usage_log)
            .returning(UsageLogEntity::as_returning())
            .get_result::<UsageLogEntity>(&mut conn)?;

        Ok(result)
    }

    async fn list_since(
        &self,
        subscription_id: Uuid,
        feature_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageLogEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = usage_logs::table
            .filter(usage_logs::subscription_id.eq(subscription_id))
            .filter(usage_logs::feature_id.eq(feature_id))
            .filter(usage_logs::created_at.ge(since))
            .order(usage_logs::created_at.asc())
            .select(UsageLogEntity::as_select())
            .load::<UsageLogEntity>(&mut conn)?;

        Ok(result)
    }
}
