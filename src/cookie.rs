//! The `token` cookie: reading it from requests and rendering `Set-Cookie`

use axum::http::{header, HeaderMap, HeaderValue};

use crate::error::{ApiError, GENERIC_MESSAGE};
use crate::token::IssuedToken;

/// Name of the cookie carrying the bearer token
pub const TOKEN_COOKIE: &str = "token";

/// Returns the value of cookie `name`, looking through every `Cookie` header
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value carrying `token` until its expiry
pub fn token_cookie(token: &IssuedToken) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE,
        token.value,
        token.expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    HeaderValue::from_str(&cookie).map_err(|err| {
        tracing::error!(error = %err, "token is not a valid cookie value");
        ApiError::internal(GENERIC_MESSAGE)
    })
}
