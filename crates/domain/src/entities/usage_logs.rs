use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::usage_logs;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_logs)]
pub struct UsageLogEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub feature_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = usage_logs)]
pub struct InsertUsageLogEntity {
    pub subscription_id: Uuid,
    pub feature_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
