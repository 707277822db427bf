use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::schema::packages;
use crate::value_objects::enums::billing_periods::BillingPeriod;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = packages)]
pub struct PackageEntity {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub currency: String,
    pub billing_period: String,
    pub billing_interval: i32,
    pub trial_days: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PackageEntity {
    /// `None` when the stored period is not a known value.
    pub fn period(&self) -> Option<BillingPeriod> {
        BillingPeriod::from_str(&self.billing_period)
    }

    pub fn is_lifetime(&self) -> bool {
        self.period() == Some(BillingPeriod::Lifetime)
    }

    pub fn has_trial(&self) -> bool {
        self.trial_days > 0
    }

    /// Package price normalised to one month. Unknown periods contribute nothing.
    pub fn monthly_price(&self) -> Decimal {
        self.period()
            .map(|period| period.monthly_amount(self.price, self.billing_interval))
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = packages)]
pub struct InsertPackageEntity {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub currency: String,
    pub billing_period: String,
    pub billing_interval: i32,
    pub trial_days: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub metadata: Option<serde_json::Value>,
}
