pub mod cli;
pub mod config;
pub mod metrics;

pub use config::AppConfig;
