pub mod analytics;
pub mod config;
pub mod date;
pub mod error;
pub mod filter;
pub mod format;
pub mod store;
