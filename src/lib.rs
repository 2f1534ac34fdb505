pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limiter;
pub mod resolver;
pub mod server;
pub mod storage;
pub mod types;

// Use cases and the ports they depend on
pub mod app;
// Adapters behind the ports
pub mod infra;
