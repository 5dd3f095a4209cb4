pub mod aggregate;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod incident;
pub mod ingest;
pub mod reconcile;
pub mod threshold;
