use chrono::{NaiveDate, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::settings::BillingSettings;

/// Produces invoice numbers for newly issued invoices.
#[cfg_attr(test, mockall::automock)]
pub trait InvoiceNumberGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Template based numbers.
///
/// Tokens: `#` prefix, `YY`/`MM`/`DD` date parts, `N` random digit,
/// `S` random letter A-Z, `A` random character A-Z0-9. Random tokens are
/// expanded before the prefix and date are substituted, so a prefix such as
/// `SAN` is never randomised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternInvoiceNumberGenerator {
    prefix: String,
    format: String,
}

impl PatternInvoiceNumberGenerator {
    pub fn new(prefix: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            format: format.into(),
        }
    }

    pub fn from_settings(settings: &BillingSettings) -> Self {
        Self::new(
            settings.invoice_prefix.clone(),
            settings.invoice_format.clone(),
        )
    }

    pub fn generate_for(&self, date: NaiveDate) -> String {
        let randomised = replace_random_tokens(&self.format);

        randomised
            .replace('#', &self.prefix)
            .replace("YY", &date.format("%y").to_string())
            .replace("MM", &date.format("%m").to_string())
            .replace("DD", &date.format("%d").to_string())
    }
}

impl Default for PatternInvoiceNumberGenerator {
    fn default() -> Self {
        Self::from_settings(&BillingSettings::default())
    }
}

impl InvoiceNumberGenerator for PatternInvoiceNumberGenerator {
    fn generate(&self) -> String {
        self.generate_for(Utc::now().date_naive())
    }
}

fn replace_random_tokens(format: &str) -> String {
    let mut rng = rand::thread_rng();

    format
        .chars()
        .map(|token| match token {
            'N' => char::from(b'0' + rng.gen_range(0..10u8)),
            'S' => char::from(b'A' + rng.gen_range(0..26u8)),
            // Uppercasing a mixed-case draw weights letters 2:1 over digits.
            // Issued numbers already follow that distribution; keep it.
            'A' => char::from(rng.sample(Alphanumeric)).to_ascii_uppercase(),
            other => other,
        })
        .collect()
}
