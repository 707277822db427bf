use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::transactions;
use crate::value_objects::enums::transaction_statuses::TransactionStatus;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = transactions)]
pub struct TransactionEntity {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub gateway: String,
    /// Identifier assigned by the payment gateway.
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub refunded_amount: Option<Decimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionEntity {
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }

    pub fn is_successful(&self) -> bool {
        self.transaction_status() == Some(TransactionStatus::Success)
    }

    pub fn is_refunded(&self) -> bool {
        self.transaction_status() == Some(TransactionStatus::Refunded)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = transactions)]
pub struct InsertTransactionEntity {
    pub invoice_id: Uuid,
    pub gateway: String,
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}
