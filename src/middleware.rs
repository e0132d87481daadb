//! Request middleware: token authentication and the cross-cutting chain
//!
//! [`require_auth`] guards the protected routes. [`Chain`] nests the
//! cross-cutting wrappers ([`logging`], [`recover`], [`set_headers`]) around
//! the whole router.

use std::{any::Any, sync::Arc, time::Instant};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer};

use crate::cookie::{read_cookie, token_cookie, TOKEN_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Identity of the caller, placed in the request extensions by [`require_auth`]
///
/// Also usable as an extractor; it rejects with `401` when the request did
/// not pass through the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Middleware guarding routes that need a logged-in user
///
/// 1. Reads the `token` cookie, `401` if absent
/// 2. Refreshes the token (reissued only when close to expiry)
/// 3. Sends the current token back as `Set-Cookie`
/// 4. Validates the refreshed token
/// 5. Stores the caller as [`AuthUser`] in the request extensions
/// 6. Runs the wrapped handler
///
/// Failures in steps 1, 2 and 4 short-circuit; the handler never runs. Once
/// step 3 is reached the cookie is attached to whatever response follows.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = read_cookie(request.headers(), TOKEN_COOKIE) else {
        return ApiError::unauthorized().into_response();
    };

    let refreshed = match state.tokens.refresh(token) {
        Ok(refreshed) => refreshed,
        Err(err) => return err.into_response(),
    };
    let cookie = match token_cookie(&refreshed) {
        Ok(cookie) => cookie,
        Err(err) => return err.into_response(),
    };

    let mut response = match state.tokens.validate(&refreshed.value) {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthUser { user_id });
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response.headers_mut().append(header::SET_COOKIE, cookie);
    response
}

type Wrap = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Ordered composition of router-wide middleware
///
/// The first middleware added is the outermost: for `[A, B, C]` around
/// handler `H` the result is `A(B(C(H)))`, so `A` sees the request first and
/// the response last.
///
/// ```no_run
/// # use short_url::middleware::{logging, recover, set_headers, Chain};
/// # let router = axum::Router::new();
/// let app = Chain::new()
///     .with(logging)
///     .with(recover)
///     .with(set_headers)
///     .apply(router);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<Wrap>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` inside the ones already added
    pub fn with<F>(mut self, middleware: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn apply(&self, router: Router) -> Router {
        // Router::layer wraps everything so far, so the innermost goes first
        self.middlewares
            .iter()
            .rev()
            .fold(router, |router, wrap| wrap(router))
    }
}

/// The chain every server runs with: logging, then panic recovery, then headers
pub fn default_chain() -> Chain {
    Chain::new().with(logging).with(recover).with(set_headers)
}

/// Logs method, path, status and elapsed time of every request
pub fn logging(router: Router) -> Router {
    router.layer(middleware::from_fn(log_request))
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        status = response.status().as_u16(),
        %method,
        %path,
        elapsed = ?start.elapsed(),
        "request completed"
    );
    response
}

/// Turns a panic anywhere inside into a `500` response
pub fn recover(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = %detail, "request handler panicked");

    // The unwind skipped any header layer nested inside recover
    let mut response = ApiError::internal("Internal Server Error").into_response();
    for (name, value) in RESPONSE_HEADERS {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Headers every response carries, panics included
pub const RESPONSE_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PUT, DELETE"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, Authorization",
    ),
    (header::CONTENT_TYPE, "application/json"),
];

/// Sets the CORS and content-type headers on every response
pub fn set_headers(router: Router) -> Router {
    RESPONSE_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}
