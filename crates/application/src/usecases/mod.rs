pub mod analytics;
pub mod billing;
pub mod process_subscriptions;
pub mod subscriber_context;
pub mod subscriptions;
pub mod usage;
