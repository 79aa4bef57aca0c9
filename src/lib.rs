pub mod analytics;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod freshness;
pub mod geocoding;
pub mod graphql;
pub mod logging;
pub mod metrics;
pub mod progress;
pub mod providers;
pub mod reconcile;
pub mod search;
pub mod server;
pub mod storage;
pub mod types;
