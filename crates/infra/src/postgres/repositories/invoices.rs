use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, dsl::sum, insert_into, prelude::*, update};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::postgres::postgres_connection::PgPoolSquad;
use domain::{
    entities::invoices::{InsertInvoiceEntity, InvoiceEntity},
    repositories::invoices::InvoiceRepository,
    schema::{invoices, packages, subscriptions},
    value_objects::{
        analytics::{InvoicePackageRow, PaidInvoice},
        enums::invoice_statuses::InvoiceStatus,
    },
};

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn create(&self, invoice: InsertInvoiceEntity) -> Result<InvoiceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(invoices::table)
            .values(&invoice)
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .find(invoice_id)
            .filter(invoices::deleted_at.is_null())
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_subscription_ids(
        &self,
        subscription_ids: Vec<Uuid>,
    ) -> Result<Vec<InvoiceEntity>> {
        if subscription_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .filter(invoices::subscription_id.eq_any(subscription_ids))
            .filter(invoices::deleted_at.is_null())
            .order(invoices::created_at.desc())
            .select(InvoiceEntity::as_select())
            .load::<InvoiceEntity>(&mut conn)?;

        Ok(result)
    }

    async fn has_pending_for_subscription(&self, subscription_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .filter(invoices::subscription_id.eq(subscription_id))
            .filter(invoices::status.eq(InvoiceStatus::Pending.as_str()))
            .filter(invoices::deleted_at.is_null())
            .select(invoices::id)
            .first::<Uuid>(&mut conn)
            .optional()?;

        Ok(result.is_some())
    }

    async fn update_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<InvoiceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(invoices::table.filter(invoices::id.eq(invoice_id)))
            .set((
                invoices::status.eq(status.as_str()),
                invoices::updated_at.eq(Utc::now()),
            ))
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn)?;

        Ok(result)
    }

    async fn mark_paid(
        &self,
        invoice_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<InvoiceEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(invoices::table.filter(invoices::id.eq(invoice_id)))
            .set((
                invoices::status.eq(InvoiceStatus::Paid.as_str()),
                invoices::paid_at.eq(Some(paid_at)),
                invoices::updated_at.eq(Utc::now()),
            ))
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn)?;

        Ok(result)
    }

    async fn pending_count(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .filter(invoices::status.eq(InvoiceStatus::Pending.as_str()))
            .filter(invoices::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn overdue_count(&self, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .filter(invoices::status.eq(InvoiceStatus::Pending.as_str()))
            .filter(invoices::due_date.lt(now))
            .filter(invoices::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(result)
    }

    async fn total_revenue(&self) -> Result<Decimal> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = invoices::table
            .filter(invoices::status.eq(InvoiceStatus::Paid.as_str()))
            .filter(invoices::deleted_at.is_null())
            .select(sum(invoices::amount))
            .first::<Option<Decimal>>(&mut conn)?;

        Ok(result.unwrap_or(Decimal::ZERO))
    }

    async fn paid_since(&self, since: DateTime<Utc>) -> Result<Vec<PaidInvoice>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = invoices::table
            .filter(invoices::status.eq(InvoiceStatus::Paid.as_str()))
            .filter(invoices::paid_at.ge(since))
            .filter(invoices::deleted_at.is_null())
            .order(invoices::paid_at.asc())
            .select((invoices::paid_at.assume_not_null(), invoices::amount))
            .load::<(DateTime<Utc>, Decimal)>(&mut conn)?;

        let result = rows
            .into_iter()
            .map(|(paid_at, amount)| PaidInvoice { paid_at, amount })
            .collect();

        Ok(result)
    }

    async fn package_rows(&self) -> Result<Vec<InvoicePackageRow>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = invoices::table
            .inner_join(subscriptions::table.inner_join(packages::table))
            .filter(invoices::deleted_at.is_null())
            .select((
                invoices::id,
                packages::id,
                packages::name,
                invoices::amount,
                invoices::status,
                invoices::due_date,
            ))
            .load::<(Uuid, Uuid, String, Decimal, String, Option<DateTime<Utc>>)>(&mut conn)?;

        let result = rows
            .into_iter()
            .map(
                |(invoice_id, package_id, package_name, amount, status, due_date)| InvoicePackageRow {
                    invoice_id,
                    package_id,
                    package_name,
                    amount,
                    status,
                    due_date,
                },
            )
            .collect();

        Ok(result)
    }
}
