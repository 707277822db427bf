use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One subscription joined with the pricing columns of its package.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPackageRow {
    pub subscription_id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub status: String,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub price: Decimal,
    pub billing_period: String,
    pub billing_interval: i32,
}

/// One invoice joined through its subscription to the package it bills.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePackageRow {
    pub invoice_id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub amount: Decimal,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscriptionLifetime {
    pub created_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaidInvoice {
    pub paid_at: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSubscriberCount {
    pub package_id: Uuid,
    pub package_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRevenue {
    pub package_id: Uuid,
    pub package_name: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnPoint {
    pub month: String,
    pub churn_rate: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub active: i64,
    pub on_trial: i64,
    pub cancelled: i64,
    pub expired: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_subscriptions: i64,
    /// Active plus on-trial subscriptions.
    pub active_subscriptions: i64,
    pub subscriptions_by_status: StatusBreakdown,
    pub mrr: Decimal,
    pub arpu: Decimal,
    pub total_revenue: Decimal,
    pub churn_rate: Decimal,
    pub trial_conversion_rate: Decimal,
    pub pending_invoices: i64,
    pub overdue_invoices: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageAnalytics {
    pub package_id: Uuid,
    pub package_name: String,
    pub total_subscribers: i64,
    pub active_subscribers: i64,
    pub cancelled_count: i64,
    pub mrr: Decimal,
    pub average_mrr: Decimal,
    pub trial_conversion_rate: Decimal,
    pub total_revenue: Decimal,
    pub pending_invoices: i64,
    pub overdue_invoices: i64,
}
