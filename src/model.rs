//! Data models for the URL shortener
//!
//! Stored records ([`User`], [`ShortUrl`]) and the request/response shapes
//! used by the HTTP handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account
///
/// Created on registration and never mutated afterwards. The password hash
/// stays inside the store; handlers never serialize a `User` to a client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Server-generated identifier (UUID v4), also the token subject
    pub id: String,

    /// Unique login name
    pub username: String,

    /// Salted argon2 PHC string
    pub password_hash: String,
}

/// A shortened URL owned by a user
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShortUrl {
    /// Server-generated 6-character alphanumeric slug
    pub id: String,

    /// The original long URL
    pub url: String,

    /// Id of the [`User`] that submitted it
    pub owner_id: String,

    /// Timestamp when this record was created
    pub created_at: DateTime<Utc>,
}

/// Request payload for `/register` and `/login`
///
/// Missing fields deserialize as empty strings and are rejected by the
/// handlers with `400 Invalid request body`.
///
/// # Example
/// ```json
/// { "username": "alice", "password": "hunter22" }
/// ```
#[derive(Deserialize, Debug, Default)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

/// Request payload for `POST /new`
#[derive(Deserialize, Debug, Default)]
pub struct NewUrlRequest {
    #[serde(default)]
    pub url: String,
}

/// Response returned after a short URL was created
///
/// # Example
/// ```json
/// {
///   "message": "URL created",
///   "id": "aB3xY9",
///   "url": "https://example.com/very/long/url",
///   "short_url": "http://localhost:5000/aB3xY9"
/// }
/// ```
#[derive(Serialize, Debug)]
pub struct CreateUrlResponse {
    pub message: &'static str,
    pub id: String,
    pub url: String,
    pub short_url: String,
}

/// Query parameters for listing the caller's URLs
///
/// # Example
/// Query string: `?page=2&limit=20`
#[derive(Deserialize, Debug, Default)]
pub struct ListParams {
    /// Page number for pagination (starts from 1)
    pub page: Option<usize>,

    /// Number of items per page, defaults to 10, maximum is 100
    pub limit: Option<usize>,
}
