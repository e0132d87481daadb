use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Router,
};
use chrono::{DateTime, TimeDelta};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use short_url::database::Store;
use short_url::middleware::{require_auth, AuthUser};
use short_url::route::create_app;
use short_url::state::AppState;
use short_url::token::TokenService;

const SECRET: &str = "auth-secret";

fn setup_state() -> (AppState, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let store = Store::open(temp_db.path().to_str().unwrap())
        .expect("Failed to initialize test database");
    let state = AppState::new(store, TokenService::new(SECRET), "http://localhost:5000");
    (state, temp_db)
}

/// A protected route that counts how often its handler actually ran
fn probe_app(state: AppState, hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/probe",
            get(move |user: AuthUser| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    user.user_id
                }
            }),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

fn probe_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/probe");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Failed to parse JSON")
}

/// The `token` Set-Cookie header of a response, if any
fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("token="))
        .map(str::to_string)
}

fn cookie_token(set_cookie: &str) -> &str {
    set_cookie
        .strip_prefix("token=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
}

fn cookie_expiry(set_cookie: &str) -> DateTime<chrono::FixedOffset> {
    let expires = set_cookie
        .split("; ")
        .find_map(|part| part.strip_prefix("Expires="))
        .unwrap();
    DateTime::parse_from_rfc2822(expires).unwrap()
}

#[tokio::test]
async fn test_missing_cookie_is_rejected_before_handler() {
    let (state, _temp_db) = setup_state();
    let hits = Arc::new(AtomicUsize::new(0));
    let app = probe_app(state, hits.clone());

    let response = app.oneshot(probe_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
    assert_eq!(body_json(response).await, json!({ "message": "Unauthorized" }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_tokens_are_rejected_before_handler() {
    let (state, _temp_db) = setup_state();
    let hits = Arc::new(AtomicUsize::new(0));
    let app = probe_app(state, hits.clone());

    let foreign = TokenService::new("some-other-secret").issue("user-1").unwrap();
    let expired = TokenService::with_windows(SECRET, TimeDelta::minutes(-5), TimeDelta::zero())
        .issue("user-1")
        .unwrap();

    for token in ["garbage", "a.b.c", foreign.value.as_str(), expired.value.as_str()] {
        let response = app
            .clone()
            .oneshot(probe_request(Some(&format!("token={}", token))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "message": "Unauthorized" }));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fresh_token_passes_identity_and_is_echoed_unchanged() {
    let (state, _temp_db) = setup_state();
    let hits = Arc::new(AtomicUsize::new(0));
    let issued = state.tokens.issue("user-42").unwrap();
    let app = probe_app(state, hits.clone());

    let response = app
        .oneshot(probe_request(Some(&format!(
            "theme=dark; token={}; lang=en",
            issued.value
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).expect("token cookie must be sent back");
    assert_eq!(cookie_token(&cookie), issued.value);
    assert_eq!(cookie_expiry(&cookie).timestamp(), issued.expires_at.timestamp());
    assert_eq!(body_bytes(response).await, b"user-42");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_near_expiry_token_is_reissued() {
    let (state, _temp_db) = setup_state();
    let hits = Arc::new(AtomicUsize::new(0));
    let short = TokenService::with_windows(SECRET, TimeDelta::minutes(2), TimeDelta::minutes(5))
        .issue("user-42")
        .unwrap();
    let app = probe_app(state.clone(), hits.clone());

    let response = app
        .oneshot(probe_request(Some(&format!("token={}", short.value))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).expect("token cookie must be sent back");
    let renewed = cookie_token(&cookie);
    assert_ne!(renewed, short.value);
    assert!(cookie_expiry(&cookie).timestamp() > short.expires_at.timestamp());
    assert_eq!(state.tokens.validate(renewed).unwrap(), "user-42");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_near_expiry_token_on_real_route() {
    let (state, _temp_db) = setup_state();
    let app = create_app(state.clone());
    let user = state.store.insert_user("alice", "unused-hash").unwrap();
    let short = TokenService::with_windows(SECRET, TimeDelta::minutes(2), TimeDelta::minutes(5))
        .issue(&user.id)
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/all")
                .header(header::COOKIE, format!("token={}", short.value))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).expect("token cookie must be sent back");
    assert_ne!(cookie_token(&cookie), short.value);
    assert!(cookie_expiry(&cookie).timestamp() > short.expires_at.timestamp());

    let body = body_json(response).await;
    assert_eq!(body["total_fetched"], 0);
}

#[tokio::test]
async fn test_identity_extractor_without_auth_layer() {
    let app: Router = Router::new().route("/open", get(|user: AuthUser| async move { user.user_id }));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/open")
                .header("userId", "spoofed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "message": "Unauthorized" }));
}
