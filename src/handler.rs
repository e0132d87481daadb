//! HTTP request handlers for the URL shortener API
//!
//! Handlers are thin: they validate the payload, call the [`Store`] or the
//! token service, and return either a JSON body or an [`ApiError`]. Error
//! responses are never built here directly.
//!
//! [`Store`]: crate::database::Store

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::cookie::token_cookie;
use crate::database::is_valid_url_id;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::model::{CreateUrlResponse, Credentials, ListParams, NewUrlRequest};
use crate::password::{hash_password_async, verify_password_async};
use crate::state::AppState;

fn invalid_body() -> ApiError {
    ApiError::bad_request("Invalid request body")
}

fn parse_credentials(
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Credentials, ApiError> {
    let Json(credentials) = payload.map_err(|rejection| {
        tracing::debug!(%rejection, "rejected credentials payload");
        invalid_body()
    })?;

    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(invalid_body());
    }
    Ok(credentials)
}

/// `GET /`
pub async fn home() -> Json<Value> {
    Json(json!({ "message": "Welcome to short-url" }))
}

/// `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Fallback for paths no route matches
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

/// Fallback for a known path hit with an unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Registers a new user
///
/// # Response
///
/// - **200 OK** - `{"message":"Register Successful"}`
/// - **400 Bad Request** - missing username or password
/// - **409 Conflict** - username already taken
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let credentials = parse_credentials(payload)?;

    // Cheap check first so a taken name never pays for hashing; the insert
    // re-checks inside its transaction.
    if state.store.user_exists(&credentials.username)? {
        return Err(ApiError::conflict("Username taken"));
    }

    let password_hash = hash_password_async(credentials.password).await?;
    let user = state
        .store
        .insert_user(&credentials.username, &password_hash)?;
    tracing::info!(user_id = %user.id, "registered user");

    Ok(Json(json!({ "message": "Register Successful" })))
}

/// Checks credentials and hands out the `token` cookie
///
/// # Response
///
/// - **200 OK** - `{"message":"Login Successful"}` plus `Set-Cookie: token=...`
/// - **400 Bad Request** - missing username or password
/// - **404 Not Found** - unknown username
/// - **401 Unauthorized** - wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError> {
    let credentials = parse_credentials(payload)?;

    let user = state
        .store
        .find_user_by_name(&credentials.username)?
        .ok_or_else(|| ApiError::not_found("No user found with the given name"))?;

    if !verify_password_async(user.password_hash, credentials.password).await? {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let token = state.tokens.issue(&user.id)?;
    let cookie = token_cookie(&token)?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Login Successful" })),
    )
        .into_response())
}

/// Resolves a short URL id to its target
///
/// # Response
///
/// - **200 OK** - `{"url": "<target>"}`
/// - **400 Bad Request** - id is not a well-formed short URL id
/// - **404 Not Found** - no such short URL
pub async fn get_url(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    if !is_valid_url_id(&id) {
        return Err(ApiError::bad_request("Invalid ID"));
    }

    let record = state
        .store
        .find_url_by_id(&id)?
        .ok_or_else(|| ApiError::not_found("URL not found"))?;

    Ok(Json(json!({ "url": record.url })))
}

/// Creates a short URL owned by the caller
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com/very/long/url" }
/// ```
///
/// # Response
///
/// - **201 Created** - see [`CreateUrlResponse`]
/// - **400 Bad Request** - missing or empty `url`
pub async fn create_url(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<NewUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUrlResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| invalid_body())?;
    if request.url.is_empty() {
        return Err(invalid_body());
    }

    let record = state.store.insert_url(&request.url, &user.user_id)?;
    tracing::debug!(id = %record.id, owner = %user.user_id, "created short url");

    let response = CreateUrlResponse {
        message: "URL created",
        short_url: state.short_url(&record.id),
        id: record.id,
        url: record.url,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Lists the caller's URLs, oldest first
///
/// # Query Parameters
///
/// - `page` (optional) - Page number, starts from 1 (default: 1)
/// - `limit` (optional) - Items per page, max 100 (default: 10)
///
/// # Response
///
/// ```json
/// { "page": 1, "limit": 10, "total_fetched": 2, "data": [...] }
/// ```
pub async fn list_urls(
    State(state): State<AppState>,
    user: AuthUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params.map_err(|_| ApiError::bad_request("Invalid query parameters"))?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1).saturating_mul(limit);

    let urls = state
        .store
        .list_urls_by_owner_page(&user.user_id, offset, limit)?;

    Ok(Json(json!({
        "page": page,
        "limit": limit,
        "total_fetched": urls.len(),
        "data": urls,
    })))
}
