pub mod features;
pub mod packages;
