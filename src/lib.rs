//! STRATARB — multi-pool AMM arbitrage engine for STRATO networks.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod math;
pub mod chain;
pub mod market;
pub mod strategy;
pub mod ledger;
pub mod engine;
