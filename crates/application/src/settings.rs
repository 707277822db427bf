/// Defaults applied by builders and invoice generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingSettings {
    /// ISO 4217 code for new packages.
    pub currency: String,
    pub invoice_prefix: String,
    pub invoice_format: String,
    pub invoice_due_days: u32,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            invoice_prefix: "INV".to_string(),
            invoice_format: "#-YYMMDD-NNNNNN".to_string(),
            invoice_due_days: 7,
        }
    }
}
