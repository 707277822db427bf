use anyhow::{Context, Result};
use application::settings::BillingSettings;
use chrono::NaiveDate;

use super::{
    config_model::{Database, DotEnvyConfig, Processing},
    stage::Stage,
};

const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 86_400;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    from_lookup(|key| std::env::var(key).ok())
}

pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let database = Database {
        url: var("DATABASE_URL").context("DATABASE_URL is invalid")?,
    };

    let defaults = BillingSettings::default();
    let billing = BillingSettings {
        currency: var("BILLING_CURRENCY")
            .map(|currency| currency.to_ascii_uppercase())
            .unwrap_or(defaults.currency),
        invoice_prefix: var("INVOICE_PREFIX").unwrap_or(defaults.invoice_prefix),
        invoice_format: var("INVOICE_FORMAT").unwrap_or(defaults.invoice_format),
        invoice_due_days: var("INVOICE_DUE_DAYS")
            .map(|days| days.parse::<u32>())
            .transpose()
            .context("INVOICE_DUE_DAYS is invalid")?
            .unwrap_or(defaults.invoice_due_days),
    };

    let processing = Processing {
        interval_secs: var("PROCESS_INTERVAL_SECS")
            .map(|secs| secs.parse::<u64>())
            .transpose()
            .context("PROCESS_INTERVAL_SECS is invalid")?
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PROCESS_INTERVAL_SECS),
        date: var("PROCESS_DATE")
            .map(|date| NaiveDate::parse_from_str(&date, "%Y-%m-%d"))
            .transpose()
            .context("PROCESS_DATE is invalid, expected YYYY-MM-DD")?,
    };

    let stage = var("STAGE")
        .and_then(|stage| Stage::try_from(stage.as_str()).ok())
        .unwrap_or_default();

    Ok(DotEnvyConfig {
        stage,
        database,
        billing,
        processing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<DotEnvyConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let config = load_with(&[("DATABASE_URL", "postgres://localhost/billing")]).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/billing");
        assert_eq!(config.billing, BillingSettings::default());
        assert_eq!(config.processing.interval_secs, 86_400);
        assert_eq!(config.processing.date, None);
        assert_eq!(config.stage, Stage::Local);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = load_with(&[("DATABASE_URL", "  ")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn reads_billing_and_processing_overrides() {
        let config = load_with(&[
            ("DATABASE_URL", "postgres://db"),
            ("BILLING_CURRENCY", "eur"),
            ("INVOICE_PREFIX", "ACME"),
            ("INVOICE_FORMAT", "#-YYMM-SSNN"),
            ("INVOICE_DUE_DAYS", "30"),
            ("PROCESS_INTERVAL_SECS", "3600"),
            ("PROCESS_DATE", "2024-03-31"),
            ("STAGE", "production"),
        ])
        .unwrap();

        assert_eq!(config.billing.currency, "EUR");
        assert_eq!(config.billing.invoice_prefix, "ACME");
        assert_eq!(config.billing.invoice_format, "#-YYMM-SSNN");
        assert_eq!(config.billing.invoice_due_days, 30);
        assert_eq!(config.processing.interval_secs, 3600);
        assert_eq!(
            config.processing.date,
            NaiveDate::from_ymd_opt(2024, 3, 31)
        );
        assert_eq!(config.stage, Stage::Production);
    }

    #[test]
    fn malformed_numbers_and_dates_are_rejected() {
        for (key, value) in [
            ("INVOICE_DUE_DAYS", "-1"),
            ("PROCESS_INTERVAL_SECS", "hourly"),
            ("PROCESS_DATE", "31/03/2024"),
        ] {
            let err = load_with(&[("DATABASE_URL", "postgres://db"), (key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}");
        }
    }

    #[test]
    fn zero_interval_falls_back_to_daily() {
        let config =
            load_with(&[("DATABASE_URL", "postgres://db"), ("PROCESS_INTERVAL_SECS", "0")])
                .unwrap();
        assert_eq!(config.processing.interval_secs, 86_400);
    }
}
