//! Route definitions for the URL shortener API
//!
//! This module maps every HTTP route to its handler, guards the protected
//! ones with [`require_auth`] and wraps the result in the default
//! middleware chain.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::handler::{
    create_url, get_url, health_check, home, list_urls, login, method_not_allowed, not_found,
    register,
};
use crate::middleware::{default_chain, require_auth};
use crate::state::AppState;

/// Creates the application router
///
/// # Route Definitions
///
/// - `GET /` - Welcome message
/// - `GET /health` - Liveness check
/// - `POST /register` - Create an account
/// - `POST /login` - Exchange credentials for the `token` cookie
/// - `GET /{id}` - Resolve a short URL (public)
/// - `GET /all` - List the caller's URLs (requires token)
/// - `POST /new` - Create a short URL (requires token)
///
/// Unknown paths answer `404` and unsupported methods `405`, both with the
/// usual JSON error body.
///
/// # Example Usage
///
/// ```no_run
/// # use short_url::database::Store;
/// # use short_url::route::create_app;
/// # use short_url::state::AppState;
/// # use short_url::token::TokenService;
/// let store = Store::open("data.db").unwrap();
/// let state = AppState::new(store, TokenService::new("secret"), "http://localhost:5000");
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    default_chain().apply(routes(state))
}

/// The bare router, without the cross-cutting middleware chain
pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/all", get(list_urls))
        .route("/new", post(create_url))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/{id}", get(get_url))
        .merge(protected)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}
