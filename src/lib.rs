//! Coffee Shop: drink recipe catalog API.
//!
//! Library crate shared by the `coffee-shop` binary and the integration
//! tests in `tests/`.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;

use middleware::oidc::TokenVerifier;
use store::DrinkStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn DrinkStore>,
    pub verifier: Arc<TokenVerifier>,
    pub config: config::Config,
}

impl AppState {
    pub fn new(
        config: config::Config,
        store: Arc<dyn DrinkStore>,
        verifier: TokenVerifier,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            verifier: Arc::new(verifier),
            config,
        })
    }
}
