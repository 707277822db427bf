pub mod features;
pub mod invoices;
pub mod package_features;
pub mod packages;
pub mod subscription_items;
pub mod subscriptions;
pub mod transactions;
pub mod usage_logs;
