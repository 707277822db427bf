use application::settings::BillingSettings;
use chrono::NaiveDate;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub stage: Stage,
    pub database: Database,
    pub billing: BillingSettings,
    pub processing: Processing,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processing {
    /// Seconds between checks for a new processing day.
    pub interval_secs: u64,
    /// Process this date once and exit instead of looping.
    pub date: Option<NaiveDate>,
}
