//! Domain model types for nvl.
//!
//! This module defines the records the registry manages:
//! - [`IssuerId`] - Filesystem-safe key of an issuer profile
//! - [`IssuerProfile`] - Configuration of one identity-provider connection
//! - [`Session`] - Authentication state attached to a profile

use heck::ToKebabCase;
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::store::Secret;
use crate::token::Tokens;

/// Identifier of an issuer profile.
///
/// The id names the profile's configuration and session files, so it must
/// be a single path component.
///
/// # Examples
///
/// ```
/// use nvl_core::IssuerId;
///
/// let id = IssuerId::from_name("Anvil Connect (staging)").unwrap();
/// assert_eq!(id.as_str(), "anvil-connect-staging");
/// assert_eq!(id.humanize(), "Anvil connect staging");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerId(String);

impl IssuerId {
    /// Create an issuer id verbatim.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id by slugifying a display name.
    ///
    /// Returns `None` if the name has no usable characters.
    pub fn from_name(name: &str) -> Option<Self> {
        let slug = name.to_kebab_case();
        if slug.is_empty() {
            None
        } else {
            Some(Self(slug))
        }
    }

    /// Get the issuer id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is usable as a single file name.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\', '\0'])
    }

    /// Human-readable form of the id, used when a profile has no name.
    pub fn humanize(&self) -> String {
        let words = self.0.to_snake_case().replace('_', " ");
        let mut chars = words.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for IssuerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IssuerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for IssuerId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Authentication state for one issuer.
///
/// Stored in `sessions/<id>.json`, never in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Tokens from the last successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Tokens>,

    /// Any other fields found in the session file.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// Create a session holding the given tokens.
    pub fn with_tokens(tokens: Tokens) -> Self {
        Self {
            tokens: Some(tokens),
            extra: Map::new(),
        }
    }

    /// Whether a login has stored tokens.
    pub fn is_logged_in(&self) -> bool {
        self.tokens.is_some()
    }

    /// The access token, if logged in.
    pub fn access_token(&self) -> Option<&Secret> {
        self.tokens.as_ref().map(|t| &t.access_token)
    }
}

/// Configuration key of the CA certificate path.
pub const CA_CERT_KEY: &str = "ca_cert_path";

/// Configuration keys written by older releases, with their current names.
pub const LEGACY_KEYS: &[(&str, &str)] = &[("caCertPath", CA_CERT_KEY)];

/// One configured identity-provider connection.
///
/// Every configuration field is optional so that a partial profile can be
/// merged onto an existing configuration file. `id` and `session` are never
/// part of the configuration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuerProfile {
    /// Storage key; filled in by the registry.
    #[serde(skip)]
    pub id: Option<IssuerId>,

    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Base URI of the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// OAuth client id registered with the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret registered with the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<Secret>,

    /// OAuth redirect target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// CA certificate for issuers with self-signed TLS certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<PathBuf>,

    /// Sign-in provider used for password logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Keys found on disk that nvl does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Authentication state, persisted separately.
    #[serde(skip)]
    pub session: Session,
}

impl IssuerProfile {
    /// Create an empty profile with a display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the storage id.
    pub fn with_id(mut self, id: impl Into<IssuerId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the issuer URI.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the OAuth client credentials.
    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(Secret::new(client_secret));
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set the CA certificate path.
    pub fn with_ca_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// The id this profile would be stored under if none is given.
    pub fn derived_id(&self) -> Option<IssuerId> {
        self.id
            .clone()
            .or_else(|| self.name.as_deref().and_then(IssuerId::from_name))
    }

    /// Name to show to the operator.
    pub fn display_name(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.humanize(),
            (None, None) => String::new(),
        }
    }
}
