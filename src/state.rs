//! Application state shared across all request handlers

use std::sync::Arc;

use crate::database::Store;
use crate::token::TokenService;

/// Everything a handler needs, constructed once in `main`
///
/// Cloning is cheap: the store and the token keys are behind `Arc`s and
/// nothing in here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: TokenService,
    /// Prefix for rendered short URLs, without trailing slash
    pub base_url: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenService, base_url: &str) -> Self {
        Self {
            store,
            tokens,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    pub fn short_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }
}
