use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::invoices::{InsertInvoiceEntity, InvoiceEntity};
use crate::value_objects::{
    analytics::{InvoicePackageRow, PaidInvoice},
    enums::invoice_statuses::InvoiceStatus,
};

#[automock]
#[async_trait]
pub trait InvoiceRepository {
    async fn create(&self, invoice: InsertInvoiceEntity) -> Result<InvoiceEntity>;
    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>>;
    /// Newest first.
    async fn find_by_subscription_ids(
        &self,
        subscription_ids: Vec<Uuid>,
    ) -> Result<Vec<InvoiceEntity>>;
    async fn has_pending_for_subscription(&self, subscription_id: Uuid) -> Result<bool>;
    async fn update_status(&self, invoice_id: Uuid, status: InvoiceStatus) -> Result<InvoiceEntity>;
    async fn mark_paid(&self, invoice_id: Uuid, paid_at: DateTime<Utc>) -> Result<InvoiceEntity>;
    async fn pending_count(&self) -> Result<i64>;
    async fn overdue_count(&self, now: DateTime<Utc>) -> Result<i64>;
    /// Sum of paid invoice amounts.
    async fn total_revenue(&self) -> Result<Decimal>;
    async fn paid_since(&self, since: DateTime<Utc>) -> Result<Vec<PaidInvoice>>;
    async fn package_rows(&self) -> Result<Vec<InvoicePackageRow>>;
}
