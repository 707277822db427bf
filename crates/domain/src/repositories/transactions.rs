use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::transactions::{InsertTransactionEntity, TransactionEntity};
use crate::value_objects::enums::transaction_statuses::TransactionStatus;

#[automock]
#[async_trait]
pub trait TransactionRepository {
    async fn create(&self, transaction: InsertTransactionEntity) -> Result<TransactionEntity>;
    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>>;
    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<TransactionEntity>>;
    async fn update_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<TransactionEntity>;
    /// Sets the refund columns and moves the transaction to `refunded`.
    async fn record_refund(
        &self,
        transaction_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
        refunded_at: DateTime<Utc>,
    ) -> Result<TransactionEntity>;
}
