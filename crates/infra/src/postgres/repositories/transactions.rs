use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::transactions::{InsertTransactionEntity, TransactionEntity},
    repositories::transactions::TransactionRepository,
    schema::transactions,
    value_objects::enums::transaction_statuses::TransactionStatus,
};

/// A `None` gateway response keeps the stored one.
#[derive(AsChangeset)]
#[diesel(table_name = transactions)]
struct TransactionStatusChangeset {
    status: String,
    gateway_response: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn create(&self, transaction: InsertTransactionEntity) -> Result<TransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(transactions::table)
            .values(&transaction)
            .returning(TransactionEntity::as_returning())
            .get_result::<TransactionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .find(transaction_id)
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::invoice_id.eq(invoice_id))
            .order(transactions::created_at.desc())
            .select(TransactionEntity::as_select())
            .load::<TransactionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn update_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<TransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let changes = TransactionStatusChangeset {
            status: status.as_str().to_string(),
            gateway_response,
            updated_at: Utc::now(),
        };

        let result = update(transactions::table.filter(transactions::id.eq(transaction_id)))
            .set(&changes)
            .returning(TransactionEntity::as_returning())
            .get_result::<TransactionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn record_refund(
        &self,
        transaction_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
        refunded_at: DateTime<Utc>,
    ) -> Result<TransactionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(transactions::table.filter(transactions::id.eq(transaction_id)))
            .set((
                transactions::status.eq(TransactionStatus::Refunded.as_str()),
                transactions::refunded_amount.eq(Some(amount)),
                transactions::refunded_at.eq(Some(refunded_at)),
                transactions::refund_reason.eq(reason),
                transactions::updated_at.eq(Utc::now()),
            ))
            .returning(TransactionEntity::as_returning())
            .get_result::<TransactionEntity>(&mut conn)?;

        Ok(result)
    }
}
