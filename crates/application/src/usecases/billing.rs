use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use domain::{
    entities::{
        invoices::{InsertInvoiceEntity, InvoiceEntity},
        subscriptions::SubscriptionEntity,
        transactions::{InsertTransactionEntity, TransactionEntity},
    },
    repositories::{
        invoices::InvoiceRepository, packages::PackageRepository,
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
    },
    value_objects::{
        enums::{invoice_statuses::InvoiceStatus, transaction_statuses::TransactionStatus},
        subscribers::SubscriberRef,
    },
};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::generators::invoice_numbers::InvoiceNumberGenerator;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("package {package_id} of subscription {subscription_id} not found")]
    PackageNotFound {
        subscription_id: Uuid,
        package_id: Uuid,
    },
    #[error("invoice not found: {0}")]
    InvoiceNotFound(Uuid),
    #[error("transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("refund of {requested} exceeds transaction amount {available}")]
    RefundExceedsAmount {
        requested: Decimal,
        available: Decimal,
    },
    #[error("refund amount must be positive")]
    NonPositiveRefund,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;

/// Invoice to persist. A missing number is filled in by the configured generator.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub subscription_id: Uuid,
    pub invoice_number: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub gateway: String,
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

pub struct BillingUseCase {
    package_repo: Arc<dyn PackageRepository + Send + Sync>,
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    transaction_repo: Arc<dyn TransactionRepository + Send + Sync>,
    number_generator: Arc<dyn InvoiceNumberGenerator>,
    due_days: u32,
}

impl BillingUseCase {
    pub fn new(
        package_repo: Arc<dyn PackageRepository + Send + Sync>,
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
        transaction_repo: Arc<dyn TransactionRepository + Send + Sync>,
        number_generator: Arc<dyn InvoiceNumberGenerator>,
        due_days: u32,
    ) -> Self {
        Self {
            package_repo,
            subscription_repo,
            invoice_repo,
            transaction_repo,
            number_generator,
            due_days,
        }
    }

    /// Issues a pending invoice for the subscription's package. `amount`
    /// overrides the package price; the currency always follows the package.
    pub async fn generate_invoice(
        &self,
        subscription: &SubscriptionEntity,
        amount: Option<Decimal>,
    ) -> UseCaseResult<InvoiceEntity> {
        let package = self
            .package_repo
            .find_by_id(subscription.package_id)
            .await?
            .ok_or(BillingError::PackageNotFound {
                subscription_id: subscription.id,
                package_id: subscription.package_id,
            })?;

        let issued_at = Utc::now();
        let draft = InvoiceDraft {
            subscription_id: subscription.id,
            invoice_number: None,
            amount: amount.unwrap_or(package.price),
            currency: package.currency,
            status: InvoiceStatus::Pending,
            issued_at,
            due_date: issued_at.checked_add_days(Days::new(u64::from(self.due_days))),
            notes: None,
        };

        self.create_invoice(draft).await
    }

    pub async fn create_invoice(&self, draft: InvoiceDraft) -> UseCaseResult<InvoiceEntity> {
        let invoice_number = draft
            .invoice_number
            .filter(|number| !number.trim().is_empty())
            .unwrap_or_else(|| self.number_generator.generate());

        let insert = InsertInvoiceEntity {
            subscription_id: draft.subscription_id,
            invoice_number,
            amount: draft.amount,
            currency: draft.currency,
            status: draft.status.as_str().to_string(),
            issued_at: draft.issued_at,
            due_date: draft.due_date,
            paid_at: None,
            notes: draft.notes,
        };

        let invoice = self.invoice_repo.create(insert).await.map_err(|err| {
            error!(
                subscription_id = %draft.subscription_id,
                db_error = ?err,
                "billing: failed to create invoice"
            );
            BillingError::Internal(err)
        })?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            subscription_id = %invoice.subscription_id,
            amount = %invoice.amount,
            currency = %invoice.currency,
            "billing: invoice issued"
        );
        Ok(invoice)
    }

    pub async fn find_invoice(&self, invoice_id: Uuid) -> UseCaseResult<InvoiceEntity> {
        self.invoice_repo
            .find_by_id(invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(invoice_id))
    }

    pub async fn mark_invoice_paid(&self, invoice: &InvoiceEntity) -> UseCaseResult<InvoiceEntity> {
        if invoice.is_paid() {
            return Ok(invoice.clone());
        }

        let paid = self
            .invoice_repo
            .mark_paid(invoice.id, Utc::now())
            .await
            .map_err(|err| {
                error!(invoice_id = %invoice.id, db_error = ?err, "billing: failed to mark invoice paid");
                BillingError::Internal(err)
            })?;

        info!(invoice_id = %paid.id, paid_at = ?paid.paid_at, "billing: invoice paid");
        Ok(paid)
    }

    pub async fn mark_invoice_void(&self, invoice: &InvoiceEntity) -> UseCaseResult<InvoiceEntity> {
        let voided = self
            .invoice_repo
            .update_status(invoice.id, InvoiceStatus::Void)
            .await
            .map_err(|err| {
                error!(invoice_id = %invoice.id, db_error = ?err, "billing: failed to void invoice");
                BillingError::Internal(err)
            })?;

        info!(invoice_id = %voided.id, "billing: invoice voided");
        Ok(voided)
    }

    /// Invoices across every subscription the subscriber ever held, newest first.
    pub async fn invoices_for_subscriber(
        &self,
        subscriber: SubscriberRef,
    ) -> UseCaseResult<Vec<InvoiceEntity>> {
        let subscription_ids: Vec<Uuid> = self
            .subscription_repo
            .list_for_subscriber(subscriber)
            .await?
            .into_iter()
            .map(|subscription| subscription.id)
            .collect();

        if subscription_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .invoice_repo
            .find_by_subscription_ids(subscription_ids)
            .await?)
    }

    pub async fn has_pending_invoice(&self, subscription: &SubscriptionEntity) -> UseCaseResult<bool> {
        Ok(self
            .invoice_repo
            .has_pending_for_subscription(subscription.id)
            .await?)
    }

    /// Records a payment attempt against `invoice` in the invoice's currency.
    pub async fn record_transaction(
        &self,
        invoice: &InvoiceEntity,
        draft: TransactionDraft,
    ) -> UseCaseResult<TransactionEntity> {
        let insert = InsertTransactionEntity {
            invoice_id: invoice.id,
            gateway: draft.gateway,
            transaction_id: draft.transaction_id,
            amount: draft.amount,
            currency: invoice.currency.clone(),
            status: draft.status.as_str().to_string(),
            gateway_response: draft.gateway_response,
            metadata: draft.metadata,
        };

        let transaction = self.transaction_repo.create(insert).await.map_err(|err| {
            error!(invoice_id = %invoice.id, db_error = ?err, "billing: failed to record transaction");
            BillingError::Internal(err)
        })?;

        info!(
            invoice_id = %invoice.id,
            transaction_id = %transaction.id,
            gateway = %transaction.gateway,
            status = %transaction.status,
            "billing: transaction recorded"
        );
        Ok(transaction)
    }

    pub async fn update_transaction_status(
        &self,
        transaction: &TransactionEntity,
        status: TransactionStatus,
        gateway_response: Option<serde_json::Value>,
    ) -> UseCaseResult<TransactionEntity> {
        let updated = self
            .transaction_repo
            .update_status(transaction.id, status, gateway_response)
            .await?;
        info!(
            transaction_id = %updated.id,
            status = %updated.status,
            "billing: transaction status updated"
        );
        Ok(updated)
    }

    pub async fn find_transaction(&self, transaction_id: Uuid) -> UseCaseResult<TransactionEntity> {
        self.transaction_repo
            .find_by_id(transaction_id)
            .await?
            .ok_or(BillingError::TransactionNotFound(transaction_id))
    }

    pub async fn transactions_for_invoice(
        &self,
        invoice: &InvoiceEntity,
    ) -> UseCaseResult<Vec<TransactionEntity>> {
        Ok(self.transaction_repo.list_for_invoice(invoice.id).await?)
    }

    /// Refunds up to the transaction amount and moves it to `refunded`.
    pub async fn refund_transaction(
        &self,
        transaction: &TransactionEntity,
        amount: Decimal,
        reason: Option<String>,
    ) -> UseCaseResult<TransactionEntity> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::NonPositiveRefund);
        }
        if amount > transaction.amount {
            warn!(
                transaction_id = %transaction.id,
                requested = %amount,
                available = %transaction.amount,
                "billing: refund rejected"
            );
            return Err(BillingError::RefundExceedsAmount {
                requested: amount,
                available: transaction.amount,
            });
        }

        let refunded = self
            .transaction_repo
            .record_refund(transaction.id, amount, reason, Utc::now())
            .await
            .map_err(|err| {
                error!(transaction_id = %transaction.id, db_error = ?err, "billing: failed to record refund");
                BillingError::Internal(err)
            })?;

        info!(
            transaction_id = %refunded.id,
            refunded_amount = ?refunded.refunded_amount,
            "billing: transaction refunded"
        );
        Ok(refunded)
    }
}
