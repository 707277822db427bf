pub mod analytics;
pub mod enums;
pub mod events;
pub mod subscribers;
