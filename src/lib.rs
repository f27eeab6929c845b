pub mod config;
pub mod event;
pub mod hub;
pub mod humanize;
pub mod observability;
pub mod query;
pub mod store;

pub use hub::LogHub;
