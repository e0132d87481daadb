//! Bearer token issuance, validation and sliding refresh
//!
//! Tokens are HS256 JWTs carrying the user id as `sub` and an `exp`
//! timestamp. Nothing is stored server side: a token is valid exactly when
//! its signature checks out against the process secret and `exp` is still in
//! the future.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, GENERIC_MESSAGE};

/// Default validity window of a freshly issued token (24 hours)
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Default remaining validity at or below which a token gets reissued (5 minutes)
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 5 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// A signed token together with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Issues and verifies tokens with a single server-held secret
///
/// Cheap to clone; the keys are built once and shared read-only.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    validity: TimeDelta,
    refresh_threshold: TimeDelta,
}

impl TokenService {
    /// Service with the default 24h validity and 5 minute refresh threshold
    pub fn new(secret: &str) -> Self {
        Self::with_windows(
            secret,
            TimeDelta::seconds(DEFAULT_TOKEN_TTL_SECS),
            TimeDelta::seconds(DEFAULT_REFRESH_THRESHOLD_SECS),
        )
    }

    pub fn with_windows(secret: &str, validity: TimeDelta, refresh_threshold: TimeDelta) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
            validity,
            refresh_threshold,
        }
    }

    /// Signs a new token for `user_id`, valid for the configured window
    pub fn issue(&self, user_id: &str) -> Result<IssuedToken, ApiError> {
        let now = Utc::now();
        // exp is whole seconds; expires_at must match it exactly
        let exp = (now + self.validity).timestamp();
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| ApiError::internal(GENERIC_MESSAGE))?;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp,
        };
        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|err| {
                tracing::error!(error = %err, "token signing failed");
                ApiError::internal(GENERIC_MESSAGE)
            })?;

        Ok(IssuedToken { value, expires_at })
    }

    /// Returns the user id carried by a valid token
    pub fn validate(&self, token: &str) -> Result<String, ApiError> {
        Ok(self.verify(token)?.sub)
    }

    /// Reissues `token` if it is close to expiry, otherwise hands it back as is
    ///
    /// A token with more than the refresh threshold left is returned
    /// unchanged together with its original expiry; no new signature is made.
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, ApiError> {
        let claims = self.verify(token)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or_else(ApiError::unauthorized)?;

        if expires_at - Utc::now() <= self.refresh_threshold {
            tracing::debug!(user_id = %claims.sub, %expires_at, "token near expiry, reissuing");
            return self.issue(&claims.sub);
        }

        Ok(IssuedToken {
            value: token.to_string(),
            expires_at,
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation).map_err(
            |err| {
                tracing::debug!(error = %err, "rejected token");
                ApiError::unauthorized()
            },
        )?;

        // jsonwebtoken accepts exp == now; expiry must be strictly in the future
        if data.claims.exp <= Utc::now().timestamp() || data.claims.sub.is_empty() {
            return Err(ApiError::unauthorized());
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const SECRET: &str = "test-secret";

    fn near_expiry_service() -> TokenService {
        TokenService::with_windows(
            SECRET,
            TimeDelta::minutes(2),
            TimeDelta::seconds(DEFAULT_REFRESH_THRESHOLD_SECS),
        )
    }

    #[test]
    fn issued_token_validates_to_same_user() {
        let tokens = TokenService::new(SECRET);
        let issued = tokens.issue("user-42").unwrap();

        assert_eq!(tokens.validate(&issued.value).unwrap(), "user-42");

        let expected = Utc::now() + TimeDelta::hours(24);
        assert!((issued.expires_at - expected).num_seconds().abs() <= 2);
        assert_eq!(issued.expires_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn refresh_keeps_token_with_time_left() {
        let tokens = TokenService::new(SECRET);
        let issued = tokens.issue("user-42").unwrap();

        let refreshed = tokens.refresh(&issued.value).unwrap();
        assert_eq!(refreshed, issued);
    }

    #[test]
    fn refresh_reissues_token_near_expiry() {
        let tokens = TokenService::new(SECRET);
        let short = near_expiry_service().issue("user-42").unwrap();

        let refreshed = tokens.refresh(&short.value).unwrap();
        assert_ne!(refreshed.value, short.value);
        assert!(refreshed.expires_at > short.expires_at);

        let expected = Utc::now() + TimeDelta::hours(24);
        assert!((refreshed.expires_at - expected).num_seconds().abs() <= 2);
        assert_eq!(tokens.validate(&refreshed.value).unwrap(), "user-42");
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let expired = TokenService::with_windows(SECRET, TimeDelta::minutes(-1), TimeDelta::zero())
            .issue("user-42")
            .unwrap();
        let tokens = TokenService::new(SECRET);

        assert_eq!(
            tokens.validate(&expired.value).unwrap_err().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            tokens.refresh(&expired.value).unwrap_err(),
            ApiError::unauthorized()
        );
    }

    #[test]
    fn malformed_or_foreign_tokens_are_unauthorized() {
        let tokens = TokenService::new(SECRET);
        let foreign = TokenService::new("other-secret").issue("user-42").unwrap();

        let mut tampered = tokens.issue("user-42").unwrap().value;
        tampered.push('x');

        for bad in ["", "garbage", "a.b.c", foreign.value.as_str(), tampered.as_str()] {
            assert_eq!(tokens.validate(bad).unwrap_err(), ApiError::unauthorized());
            assert_eq!(tokens.refresh(bad).unwrap_err(), ApiError::unauthorized());
        }
    }
}
