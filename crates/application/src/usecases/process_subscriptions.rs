use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use domain::{
    entities::subscriptions::{SubscriptionChangeset, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};
use tracing::{error, info};
use uuid::Uuid;

use super::{billing::BillingUseCase, subscriptions::SubscriptionUseCase};

pub const PENDING_INVOICE_REASON: &str = "Auto-renewal failed: Pending invoice exists";

const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct ProcessSubscriptionsResult {
    pub renewals_scanned: usize,
    pub invoices_generated: usize,
    pub cancelled_pending_invoice: usize,
    pub renewal_failures: usize,
    pub expirations_scanned: usize,
    pub expired: usize,
    pub expiration_failures: usize,
    pub invoiced_ids: Vec<Uuid>,
    pub cancelled_ids: Vec<Uuid>,
    pub expired_ids: Vec<Uuid>,
    pub failed_ids: Vec<Uuid>,
    /// Set when the expiring list could not be loaded after renewals ran.
    /// Only the expiration pass may be repeated for that date.
    pub expirations_incomplete: bool,
}

impl ProcessSubscriptionsResult {
    pub fn failures(&self) -> usize {
        self.renewal_failures + self.expiration_failures + usize::from(self.expirations_incomplete)
    }
}

fn remember(ids: &mut Vec<Uuid>, id: Uuid) {
    if ids.len() < MAX_REPORTED_IDS {
        ids.push(id);
    }
}

enum RenewalOutcome {
    Invoiced,
    Cancelled,
}

/// Daily renewal and expiration pass over subscriptions ending on one date.
/// Each subscription is handled on its own; a failure is logged, counted and
/// left for the next run.
pub struct ProcessSubscriptionsUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    subscriptions: Arc<SubscriptionUseCase>,
    billing: Arc<BillingUseCase>,
}

impl ProcessSubscriptionsUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        subscriptions: Arc<SubscriptionUseCase>,
        billing: Arc<BillingUseCase>,
    ) -> Self {
        Self {
            subscription_repo,
            subscriptions,
            billing,
        }
    }

    /// Fails only when nothing was changed yet. Once renewals have run, an
    /// expirations listing error is reported through
    /// `expirations_incomplete` so the renewals are never repeated.
    pub async fn run(&self, date: NaiveDate) -> Result<ProcessSubscriptionsResult> {
        info!(%date, "process_subscriptions: starting");
        let mut result = ProcessSubscriptionsResult::default();

        self.process_renewals(date, &mut result).await?;
        if let Err(err) = self.process_expirations(date, &mut result).await {
            error!(
                %date,
                error = ?err,
                "process_subscriptions: failed to load expiring subscriptions"
            );
            result.expirations_incomplete = true;
        }

        info!(
            %date,
            renewals_scanned = result.renewals_scanned,
            invoices_generated = result.invoices_generated,
            cancelled_pending_invoice = result.cancelled_pending_invoice,
            expirations_scanned = result.expirations_scanned,
            expired = result.expired,
            failures = result.failures(),
            "process_subscriptions: completed"
        );

        Ok(result)
    }

    /// Expiration pass alone. Already expired subscriptions are skipped, so
    /// repeating it for a date is safe.
    pub async fn run_expirations(&self, date: NaiveDate) -> Result<ProcessSubscriptionsResult> {
        let mut result = ProcessSubscriptionsResult::default();
        self.process_expirations(date, &mut result).await?;

        info!(
            %date,
            expirations_scanned = result.expirations_scanned,
            expired = result.expired,
            failures = result.failures(),
            "process_subscriptions: expirations completed"
        );

        Ok(result)
    }

    async fn process_renewals(
        &self,
        date: NaiveDate,
        result: &mut ProcessSubscriptionsResult,
    ) -> Result<()> {
        let expiring = self
            .subscription_repo
            .get_expiring_subscriptions(date, Some(true))
            .await?;
        result.renewals_scanned = expiring.len();

        for subscription in expiring {
            match self.renew(&subscription).await {
                Ok(RenewalOutcome::Invoiced) => {
                    result.invoices_generated += 1;
                    remember(&mut result.invoiced_ids, subscription.id);
                }
                Ok(RenewalOutcome::Cancelled) => {
                    result.cancelled_pending_invoice += 1;
                    remember(&mut result.cancelled_ids, subscription.id);
                }
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "process_subscriptions: failed to process renewal"
                    );
                    result.renewal_failures += 1;
                    remember(&mut result.failed_ids, subscription.id);
                }
            }
        }

        Ok(())
    }

    async fn renew(&self, subscription: &SubscriptionEntity) -> Result<RenewalOutcome> {
        if self.billing.has_pending_invoice(subscription).await? {
            self.subscriptions
                .cancel(subscription, false, Some(PENDING_INVOICE_REASON.to_string()))
                .await?;
            info!(
                subscription_id = %subscription.id,
                "process_subscriptions: cancelled; pending invoice exists"
            );
            return Ok(RenewalOutcome::Cancelled);
        }

        let invoice = self.billing.generate_invoice(subscription, None).await?;
        info!(
            subscription_id = %subscription.id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "process_subscriptions: renewal invoice generated"
        );
        Ok(RenewalOutcome::Invoiced)
    }

    async fn process_expirations(
        &self,
        date: NaiveDate,
        result: &mut ProcessSubscriptionsResult,
    ) -> Result<()> {
        let expiring = self
            .subscription_repo
            .get_expiring_subscriptions(date, Some(false))
            .await?;
        result.expirations_scanned = expiring.len();

        for subscription in expiring {
            if subscription.status() == SubscriptionStatus::Expired {
                continue;
            }

            let changes = SubscriptionChangeset::new(Utc::now()).status(SubscriptionStatus::Expired);
            match self.subscription_repo.update(subscription.id, changes).await {
                Ok(_) => {
                    info!(
                        subscription_id = %subscription.id,
                        "process_subscriptions: marked expired"
                    );
                    result.expired += 1;
                    remember(&mut result.expired_ids, subscription.id);
                }
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "process_subscriptions: failed to process expiration"
                    );
                    result.expiration_failures += 1;
                    remember(&mut result.failed_ids, subscription.id);
                }
            }
        }

        Ok(())
    }
}
