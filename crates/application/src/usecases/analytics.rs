use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use domain::{
    repositories::{
        invoices::InvoiceRepository, subscriptions::SubscriptionRepository,
        usage_logs::UsageLogRepository,
    },
    value_objects::{
        analytics::{
            ChurnPoint, DailyUsage, DashboardSummary, InvoicePackageRow, MonthlyCount,
            MonthlyRevenue, PackageAnalytics, PackageRevenue, PackageSubscriberCount,
            PaidInvoice, StatusBreakdown, SubscriptionLifetime, SubscriptionPackageRow,
        },
        enums::{
            billing_periods::BillingPeriod, invoice_statuses::InvoiceStatus,
            subscription_statuses::SubscriptionStatus,
        },
    },
};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;
use uuid::Uuid;

const MONTH_FORMAT: &str = "%Y-%m";

/// Read-side reporting. Repositories hand back plain rows and the figures are
/// folded here, so every metric has one definition regardless of backend.
pub struct AnalyticsUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
    usage_log_repo: Arc<dyn UsageLogRepository + Send + Sync>,
    invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
}

impl AnalyticsUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync>,
        usage_log_repo: Arc<dyn UsageLogRepository + Send + Sync>,
        invoice_repo: Arc<dyn InvoiceRepository + Send + Sync>,
    ) -> Self {
        Self {
            subscription_repo,
            usage_log_repo,
            invoice_repo,
        }
    }

    /// Usage totals per calendar day over the last `days` days, oldest first.
    pub async fn daily_usage(
        &self,
        subscription_id: Uuid,
        feature_id: Uuid,
        days: i64,
    ) -> Result<Vec<DailyUsage>> {
        let since = days_before(Utc::now(), days);
        let logs = self
            .usage_log_repo
            .list_since(subscription_id, feature_id, since)
            .await?;

        let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for log in logs {
            *totals.entry(log.created_at.date_naive()).or_default() += log.amount;
        }

        Ok(totals
            .into_iter()
            .map(|(date, total)| DailyUsage { date, total })
            .collect())
    }

    pub async fn total_subscription_count(&self) -> Result<i64> {
        self.subscription_repo.total_count().await
    }

    /// Active plus on-trial subscriptions.
    pub async fn active_subscription_count(&self) -> Result<i64> {
        self.subscription_repo.active_count().await
    }

    pub async fn subscription_count_by_status(&self) -> Result<HashMap<SubscriptionStatus, i64>> {
        self.subscription_repo.count_by_status().await
    }

    pub async fn subscribers_by_package(&self) -> Result<Vec<PackageSubscriberCount>> {
        let rows = self.subscription_repo.package_rows().await?;
        Ok(subscribers_by_package(&rows))
    }

    /// Percentage of subscriptions that had a trial and are now active.
    pub async fn trial_conversion_rate(&self) -> Result<Decimal> {
        let rows = self.subscription_repo.package_rows().await?;
        Ok(trial_conversion_rate(rows.iter()))
    }

    /// New subscriptions per month, starting `months` months back.
    pub async fn subscription_growth(&self, months: u32) -> Result<Vec<MonthlyCount>> {
        let since = months_back_start(Utc::now(), months);
        let created = self.subscription_repo.created_since(since).await?;

        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for created_at in created {
            *counts
                .entry(created_at.format(MONTH_FORMAT).to_string())
                .or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|(month, count)| MonthlyCount { month, count })
            .collect())
    }

    pub async fn calculate_mrr(&self) -> Result<Decimal> {
        let rows = self.subscription_repo.package_rows().await?;
        Ok(mrr(rows.iter()))
    }

    /// MRR divided by the active subscription count.
    pub async fn average_revenue_per_user(&self) -> Result<Decimal> {
        let active = self.subscription_repo.active_count().await?;
        if active == 0 {
            return Ok(Decimal::ZERO);
        }
        let mrr = self.calculate_mrr().await?;
        Ok(ratio(mrr, active))
    }

    /// Sum of all paid invoices.
    pub async fn total_revenue(&self) -> Result<Decimal> {
        Ok(round2(self.invoice_repo.total_revenue().await?))
    }

    pub async fn revenue_by_period(&self, months: u32) -> Result<Vec<MonthlyRevenue>> {
        let since = months_back_start(Utc::now(), months);
        let paid = self.invoice_repo.paid_since(since).await?;
        Ok(revenue_by_month(&paid))
    }

    pub async fn revenue_by_package(&self) -> Result<Vec<PackageRevenue>> {
        let rows = self.invoice_repo.package_rows().await?;
        Ok(revenue_by_package(&rows))
    }

    pub async fn pending_invoice_count(&self) -> Result<i64> {
        self.invoice_repo.pending_count().await
    }

    /// Pending invoices whose due date has passed.
    pub async fn overdue_invoice_count(&self) -> Result<i64> {
        self.invoice_repo.overdue_count(Utc::now()).await
    }

    /// Percentage of subscriptions alive during the last `days` days that were
    /// cancelled within them.
    pub async fn churn_rate(&self, days: i64) -> Result<Decimal> {
        let now = Utc::now();
        let since = days_before(now, days);

        let total = self
            .subscription_repo
            .total_count_in_period(since, now)
            .await?;
        if total == 0 {
            return Ok(Decimal::ZERO);
        }

        let churned = self.subscription_repo.churned_count(since).await?;
        Ok(percentage(churned, total))
    }

    /// Churn per month for the last `months` months, each measured over the
    /// `window_days` days ending with that month.
    pub async fn churn_trend(&self, months: u32, window_days: i64) -> Result<Vec<ChurnPoint>> {
        let now = Utc::now();
        let earliest = days_before(months_back_start(now, months.saturating_sub(1)), window_days);

        let cancelled = self.subscription_repo.cancelled_since(earliest).await?;
        let lifetimes = self.subscription_repo.lifetimes_since(earliest, now).await?;

        debug!(
            months,
            window_days,
            cancelled = cancelled.len(),
            lifetimes = lifetimes.len(),
            "analytics: folding churn trend"
        );

        Ok(churn_points(now, months, window_days, &cancelled, &lifetimes))
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let total = self.subscription_repo.total_count().await?;
        let by_status = self.subscription_repo.count_by_status().await?;
        let rows = self.subscription_repo.package_rows().await?;
        let total_revenue = self.invoice_repo.total_revenue().await?;
        let pending_invoices = self.invoice_repo.pending_count().await?;
        let overdue_invoices = self.invoice_repo.overdue_count(Utc::now()).await?;

        Ok(dashboard(
            total,
            &by_status,
            &rows,
            total_revenue,
            pending_invoices,
            overdue_invoices,
        ))
    }

    /// Per-package subscription and invoice metrics. Only packages with at
    /// least one subscription are listed.
    pub async fn package_analytics(&self) -> Result<Vec<PackageAnalytics>> {
        let subscriptions = self.subscription_repo.package_rows().await?;
        let invoices = self.invoice_repo.package_rows().await?;
        Ok(package_analytics(&subscriptions, &invoices, Utc::now()))
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn ratio(value: Decimal, count: i64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    round2(value / Decimal::from(count))
}

fn percentage(part: i64, whole: i64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    round2(Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole))
}

fn is_live(status: &str) -> bool {
    matches!(
        SubscriptionStatus::from_str(status),
        SubscriptionStatus::Active | SubscriptionStatus::OnTrial
    )
}

fn row_monthly_amount(row: &SubscriptionPackageRow) -> Decimal {
    BillingPeriod::from_str(&row.billing_period)
        .map(|period| period.monthly_amount(row.price, row.billing_interval))
        .unwrap_or(Decimal::ZERO)
}

fn mrr<'a>(rows: impl Iterator<Item = &'a SubscriptionPackageRow>) -> Decimal {
    round2(
        rows.filter(|row| is_live(&row.status))
            .map(row_monthly_amount)
            .sum(),
    )
}

fn trial_conversion_rate<'a>(rows: impl Iterator<Item = &'a SubscriptionPackageRow>) -> Decimal {
    let (trials, converted) = rows
        .filter(|row| row.trial_ends_at.is_some())
        .fold((0_i64, 0_i64), |(trials, converted), row| {
            let active = SubscriptionStatus::from_str(&row.status) == SubscriptionStatus::Active;
            (trials + 1, converted + i64::from(active))
        });
    percentage(converted, trials)
}

fn subscribers_by_package(rows: &[SubscriptionPackageRow]) -> Vec<PackageSubscriberCount> {
    let mut counts: BTreeMap<(String, Uuid), i64> = BTreeMap::new();
    for row in rows.iter().filter(|row| is_live(&row.status)) {
        *counts
            .entry((row.package_name.clone(), row.package_id))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((package_name, package_id), count)| PackageSubscriberCount {
            package_id,
            package_name,
            count,
        })
        .collect()
}

fn revenue_by_month(paid: &[PaidInvoice]) -> Vec<MonthlyRevenue> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for invoice in paid {
        *totals
            .entry(invoice.paid_at.format(MONTH_FORMAT).to_string())
            .or_default() += invoice.amount;
    }
    totals
        .into_iter()
        .map(|(month, revenue)| MonthlyRevenue {
            month,
            revenue: round2(revenue),
        })
        .collect()
}

fn is_paid(row: &InvoicePackageRow) -> bool {
    InvoiceStatus::from_str(&row.status) == Some(InvoiceStatus::Paid)
}

fn is_pending(row: &InvoicePackageRow) -> bool {
    InvoiceStatus::from_str(&row.status) == Some(InvoiceStatus::Pending)
}

fn revenue_by_package(rows: &[InvoicePackageRow]) -> Vec<PackageRevenue> {
    let mut totals: BTreeMap<(String, Uuid), Decimal> = BTreeMap::new();
    for row in rows.iter().filter(|row| is_paid(row)) {
        *totals
            .entry((row.package_name.clone(), row.package_id))
            .or_default() += row.amount;
    }
    totals
        .into_iter()
        .map(|((package_name, package_id), revenue)| PackageRevenue {
            package_id,
            package_name,
            revenue: round2(revenue),
        })
        .collect()
}

fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// `days` days before `at`, saturating at the representable range.
fn days_before(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|span| at.checked_sub_signed(span))
        .unwrap_or(if days < 0 {
            DateTime::<Utc>::MAX_UTC
        } else {
            DateTime::<Utc>::MIN_UTC
        })
}

/// First instant of the month `months` months before `now`.
fn months_back_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let shifted = now.checked_sub_months(Months::new(months)).unwrap_or(now);
    start_of_month(shifted)
}

/// Last instant of the month containing `at`.
fn end_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    start_of_month(at)
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::microseconds(1))
        .unwrap_or(at)
}

/// A subscription counts towards a window when it was created by the window's
/// end and had not ended before the window started. Cancellations count when
/// they fall inside the window.
fn churn_points(
    now: DateTime<Utc>,
    months: u32,
    window_days: i64,
    cancelled: &[DateTime<Utc>],
    lifetimes: &[SubscriptionLifetime],
) -> Vec<ChurnPoint> {
    (0..months)
        .rev()
        .map(|offset| {
            let month_end = end_of_month(months_back_start(now, offset));
            let window_start = days_before(month_end, window_days);

            let total = lifetimes
                .iter()
                .filter(|lifetime| {
                    lifetime.created_at <= month_end.min(now)
                        && lifetime.ends_at.is_none_or(|ends| ends >= window_start)
                })
                .count();

            let churned = cancelled
                .iter()
                .filter(|at| **at >= window_start && **at <= month_end)
                .count();

            let churn_rate = percentage(
                i64::try_from(churned).unwrap_or(i64::MAX),
                i64::try_from(total).unwrap_or(i64::MAX),
            );

            ChurnPoint {
                month: month_end.format(MONTH_FORMAT).to_string(),
                churn_rate,
            }
        })
        .collect()
}

fn dashboard(
    total: i64,
    by_status: &HashMap<SubscriptionStatus, i64>,
    rows: &[SubscriptionPackageRow],
    total_revenue: Decimal,
    pending_invoices: i64,
    overdue_invoices: i64,
) -> DashboardSummary {
    let count = |status: SubscriptionStatus| by_status.get(&status).copied().unwrap_or(0);

    let breakdown = StatusBreakdown {
        active: count(SubscriptionStatus::Active),
        on_trial: count(SubscriptionStatus::OnTrial),
        cancelled: count(SubscriptionStatus::Cancelled),
        expired: count(SubscriptionStatus::Expired),
    };
    let active_subscriptions = breakdown.active + breakdown.on_trial;
    let mrr = mrr(rows.iter());

    DashboardSummary {
        total_subscriptions: total,
        active_subscriptions,
        mrr,
        arpu: ratio(mrr, active_subscriptions),
        total_revenue: round2(total_revenue),
        churn_rate: percentage(breakdown.cancelled, total - breakdown.expired),
        trial_conversion_rate: trial_conversion_rate(rows.iter()),
        pending_invoices,
        overdue_invoices,
        subscriptions_by_status: breakdown,
    }
}

fn package_analytics(
    subscriptions: &[SubscriptionPackageRow],
    invoices: &[InvoicePackageRow],
    now: DateTime<Utc>,
) -> Vec<PackageAnalytics> {
    let mut by_package: BTreeMap<(String, Uuid), Vec<&SubscriptionPackageRow>> = BTreeMap::new();
    for row in subscriptions {
        by_package
            .entry((row.package_name.clone(), row.package_id))
            .or_default()
            .push(row);
    }

    by_package
        .into_iter()
        .map(|((package_name, package_id), rows)| {
            let active_subscribers = rows.iter().filter(|row| is_live(&row.status)).count() as i64;
            let cancelled_count = rows
                .iter()
                .filter(|row| {
                    SubscriptionStatus::from_str(&row.status) == SubscriptionStatus::Cancelled
                })
                .count() as i64;
            let mrr = mrr(rows.iter().copied());

            let package_invoices = invoices.iter().filter(|row| row.package_id == package_id);
            let (total_revenue, pending_invoices, overdue_invoices) = package_invoices.fold(
                (Decimal::ZERO, 0_i64, 0_i64),
                |(revenue, pending, overdue), row| {
                    let paid = if is_paid(row) { row.amount } else { Decimal::ZERO };
                    let is_overdue =
                        is_pending(row) && row.due_date.is_some_and(|due| due < now);
                    (
                        revenue + paid,
                        pending + i64::from(is_pending(row)),
                        overdue + i64::from(is_overdue),
                    )
                },
            );

            PackageAnalytics {
                package_id,
                package_name,
                total_subscribers: rows.len() as i64,
                active_subscribers,
                cancelled_count,
                mrr,
                average_mrr: ratio(mrr, active_subscribers),
                trial_conversion_rate: trial_conversion_rate(rows.iter().copied()),
                total_revenue: round2(total_revenue),
                pending_invoices,
                overdue_invoices,
            }
        })
        .collect()
}
