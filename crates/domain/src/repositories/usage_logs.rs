use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::entities::usage_logs::{InsertUsageLogEntity, UsageLogEntity};

#[automock]
#[async_trait]
pub trait UsageLogRepository {
    async fn create(&self, usage_log: InsertUsageLogEntity) -> Result<UsageLogEntity>;
    async fn list_since(
        &self,
        subscription_id: Uuid,
        feature_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageLogEntity>>;
}
