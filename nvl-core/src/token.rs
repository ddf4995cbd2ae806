//! Tokens obtained from an issuer.
//!
//! [`Tokens`] mirrors the token endpoint response and is stored verbatim in
//! the session file, plus a computed `expires_at` so expiry can be checked
//! after the process that logged in has exited.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Secret;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// The token set returned by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokens {
    /// The access token presented to the admin API.
    pub access_token: Secret,

    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The refresh token, if the issuer granted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret>,

    /// The raw ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Secret>,

    /// Claims of the ID token, when the issuer returns them decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_claims: Option<Value>,

    /// Lifetime in seconds as reported by the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// When the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scopes, space separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Any other fields in the token response.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tokens {
    /// Create a token set holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            token_type: default_token_type(),
            refresh_token: None,
            id_token: None,
            id_claims: None,
            expires_in: None,
            expires_at: None,
            scope: None,
            extra: Map::new(),
        }
    }

    /// Set the lifetime, computing `expires_at` from the current time.
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self.expires_at = Some(Utc::now() + Duration::seconds(seconds));
        self
    }

    /// Set the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    /// Fill in `expires_at` from `expires_in` if the issuer did not send it.
    pub fn stamp_expiry(mut self) -> Self {
        if self.expires_at.is_none() {
            if let Some(seconds) = self.expires_in {
                self.expires_at = Some(Utc::now() + Duration::seconds(seconds));
            }
        }
        self
    }

    /// Check if the access token has expired.
    ///
    /// Returns `false` if no expiration is known.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp < Utc::now()).unwrap_or(false)
    }

    /// Check if the access token will expire within the given duration.
    pub fn expires_within(&self, duration: Duration) -> bool {
        self.expires_at
            .map(|exp| exp < Utc::now() + duration)
            .unwrap_or(false)
    }
}
