pub mod cancellation;
pub mod config;
pub mod error;
pub mod telemetry;
