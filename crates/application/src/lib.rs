pub mod builders;
pub mod facade;
pub mod generators;
pub mod settings;
pub mod usecases;
