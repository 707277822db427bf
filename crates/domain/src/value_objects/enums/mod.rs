pub mod billing_periods;
pub mod feature_types;
pub mod invoice_statuses;
pub mod subscriber_kinds;
pub mod subscription_statuses;
pub mod transaction_statuses;
