//! travel-core — library crate for integration testing.
//!
//! Re-exports the modules integration tests under `tests/` need direct
//! access to.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod extract;
pub mod issuance;
pub mod models;
pub mod mrz;
pub mod pricing;
pub mod store;
pub mod tariff;

use std::sync::Arc;
use store::CaseStore;
use tariff::{Rules, Tariff};

/// Shared application state passed to handlers.
pub struct AppState {
    pub db: CaseStore,
    pub config: config::Config,
    pub tariff: Arc<Tariff>,
    pub rules: Arc<Rules>,
}
