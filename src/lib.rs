//! Library crate for portsweep: a rate-limited TCP connect scanner.
pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod ports;
pub mod report;
pub mod scanner;
pub mod types;
