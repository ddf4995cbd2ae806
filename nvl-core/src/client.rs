//! HTTP client for an issuer's discovery, login and admin endpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use nvl_core::client::{IssuerClient, Resource};
//!
//! let client = IssuerClient::new(&profile)?;
//! let tokens = client.login("admin@example.com", "secret").await?;
//! let users = client.list(Resource::Users).await?;
//! ```

use reqwest::{Certificate, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::model::IssuerProfile;
use crate::store::Secret;
use crate::token::Tokens;

/// Scope requested by password logins.
const LOGIN_SCOPE: &str = "openid profile realm";

/// Sign-in provider used when a profile does not name one.
const DEFAULT_PROVIDER: &str = "password";

/// Scope requested by authorization URLs unless another is given.
pub const DEFAULT_SCOPE: &str = "openid profile";

/// Response type of authorization URLs unless another is given.
pub const DEFAULT_RESPONSE_TYPE: &str = "code";

/// Error type for HTTP operations against an issuer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The profile has no issuer URI.
    #[error("issuer profile has no issuer URI")]
    MissingIssuer,

    /// The issuer URI cannot be used as a base URL.
    #[error("invalid issuer URI '{issuer}': {message}")]
    InvalidIssuer { issuer: String, message: String },

    /// The configured CA certificate cannot be loaded.
    #[error("failed to load CA certificate {}: {message}", path.display())]
    CaCertificate { path: PathBuf, message: String },

    /// The issuer does not serve OpenID provider metadata.
    #[error("{issuer} does not point to an OpenID provider: {message}")]
    Discovery { issuer: String, message: String },

    /// The issuer does not offer dynamic client registration.
    #[error("issuer does not support dynamic client registration")]
    RegistrationUnsupported,

    /// The issuer rejected the username or password.
    #[error("invalid username or password")]
    BadCredentials,

    /// No access token is stored for the issuer.
    #[error("not logged in; run `nvl login` first")]
    NotLoggedIn,

    /// The access token was rejected.
    #[error("request was not authorized (HTTP {status}); log in to the issuer again")]
    Unauthorized { status: u16 },

    /// Any other unsuccessful response.
    #[error("issuer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body is not what was expected.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// OpenID provider metadata from the discovery document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier.
    pub issuer: String,

    pub authorization_endpoint: Option<String>,

    pub token_endpoint: Option<String>,

    pub userinfo_endpoint: Option<String>,

    pub jwks_uri: Option<String>,

    /// Dynamic client registration endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Remaining metadata, kept as published.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Optional parameters of an authorization request.
///
/// Unset or empty values are left out of the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizationParams {
    pub response_type: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub response_mode: Option<String>,
    pub display: Option<String>,
    pub prompt: Option<String>,
    pub max_age: Option<u64>,
}

/// A collection exposed by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Clients,
    Roles,
    Scopes,
    Users,
}

impl Resource {
    /// Path segment of the collection under `/v1`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Clients => "clients",
            Resource::Roles => "roles",
            Resource::Scopes => "scopes",
            Resource::Users => "users",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client bound to one issuer profile.
#[derive(Debug, Clone)]
pub struct IssuerClient {
    http: reqwest::Client,
    issuer: Url,
    client_id: Option<String>,
    client_secret: Option<Secret>,
    redirect_uri: Option<String>,
    provider: String,
    access_token: Option<Secret>,
}

impl IssuerClient {
    /// Build a client from a profile's configuration and session.
    pub fn new(profile: &IssuerProfile) -> Result<Self, ClientError> {
        let issuer = profile.issuer.as_deref().ok_or(ClientError::MissingIssuer)?;
        let issuer = parse_issuer(issuer)?;

        if issuer.scheme() == "http" {
            warn!(issuer = %issuer, "issuer uses plain HTTP; credentials are sent unencrypted");
        }

        let mut builder = reqwest::Client::builder();
        if let Some(path) = &profile.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| ClientError::CaCertificate {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let certificate =
                Certificate::from_pem(&pem).map_err(|e| ClientError::CaCertificate {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            builder = builder.add_root_certificate(certificate);
            debug!(path = %path.display(), "trusting additional CA certificate");
        }

        Ok(Self {
            http: builder.build()?,
            issuer,
            client_id: profile.client_id.clone(),
            client_secret: profile.client_secret.clone(),
            redirect_uri: profile.redirect_uri.clone(),
            provider: profile
                .provider
                .clone()
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            access_token: profile.session.access_token().cloned(),
        })
    }

    /// The issuer base URL.
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// Fetch the OpenID provider metadata.
    pub async fn discover(&self) -> Result<ProviderMetadata, ClientError> {
        let url = self.endpoint(&[".well-known", "openid-configuration"]);
        debug!(url = %url, "fetching provider metadata");

        let discovery_error = |message: String| ClientError::Discovery {
            issuer: self.issuer.to_string(),
            message,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| discovery_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(discovery_error(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<ProviderMetadata>()
            .await
            .map_err(|e| discovery_error(e.to_string()))
    }

    /// Log in with the resource-owner password grant.
    pub async fn login(&self, username: &str, password: &str) -> Result<Tokens, ClientError> {
        let metadata = self.discover().await?;
        let token_endpoint = metadata.token_endpoint.ok_or_else(|| ClientError::Discovery {
            issuer: self.issuer.to_string(),
            message: "metadata has no token_endpoint".to_string(),
        })?;

        let mut request = self.http.post(&token_endpoint).form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", LOGIN_SCOPE),
            ("provider", self.provider.as_str()),
        ]);
        if let Some(client_id) = &self.client_id {
            request = request.basic_auth(
                client_id,
                self.client_secret.as_ref().map(Secret::expose),
            );
        }

        debug!(endpoint = %token_endpoint, "requesting tokens");
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "login rejected");
            return Err(ClientError::BadCredentials);
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let body = response.text().await?;
        let tokens: Tokens = serde_json::from_str(&body)?;
        Ok(tokens.stamp_expiry())
    }

    /// Build an authorization request URL from discovered metadata.
    ///
    /// `endpoint` replaces the path of the published authorization endpoint.
    /// The profile's client id is always sent and its redirect URI is used
    /// unless `params` names another.
    pub fn authorization_uri(
        &self,
        metadata: &ProviderMetadata,
        endpoint: Option<&str>,
        params: &AuthorizationParams,
    ) -> Result<Url, ClientError> {
        let discovery_error = |message: String| ClientError::Discovery {
            issuer: self.issuer.to_string(),
            message,
        };

        let published = metadata
            .authorization_endpoint
            .as_deref()
            .ok_or_else(|| discovery_error("metadata has no authorization_endpoint".to_string()))?;
        let mut url = Url::parse(published).map_err(|e| discovery_error(e.to_string()))?;
        if let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) {
            url.set_path(endpoint);
        }

        let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        let pairs = [
            (
                "response_type",
                present(&params.response_type).or_else(|| Some(DEFAULT_RESPONSE_TYPE.to_string())),
            ),
            ("client_id", present(&self.client_id)),
            (
                "redirect_uri",
                present(&params.redirect_uri).or_else(|| present(&self.redirect_uri)),
            ),
            (
                "scope",
                present(&params.scope).or_else(|| Some(DEFAULT_SCOPE.to_string())),
            ),
            ("state", present(&params.state)),
            ("nonce", present(&params.nonce)),
            ("response_mode", present(&params.response_mode)),
            ("display", present(&params.display)),
            ("prompt", present(&params.prompt)),
            ("max_age", params.max_age.map(|age| age.to_string())),
        ];

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                if let Some(value) = value {
                    query.append_pair(key, value);
                }
            }
        }

        debug!(url = %url, "built authorization URL");
        Ok(url)
    }

    /// List a collection.
    pub async fn list(&self, resource: Resource) -> Result<Value, ClientError> {
        self.admin(Method::GET, &[resource.as_str()], None).await
    }

    /// Fetch one member of a collection.
    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value, ClientError> {
        self.admin(Method::GET, &[resource.as_str(), id], None).await
    }

    /// Create a member of a collection.
    pub async fn create(&self, resource: Resource, body: &Value) -> Result<Value, ClientError> {
        self.admin(Method::POST, &[resource.as_str()], Some(body))
            .await
    }

    /// Update fields of a member of a collection.
    pub async fn update(
        &self,
        resource: Resource,
        id: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        self.admin(Method::PATCH, &[resource.as_str(), id], Some(body))
            .await
    }

    /// Delete a member of a collection.
    pub async fn delete(&self, resource: Resource, id: &str) -> Result<(), ClientError> {
        self.admin(Method::DELETE, &[resource.as_str(), id], None)
            .await
            .map(|_| ())
    }

    /// List the members of `related` associated with `parent/id`.
    pub async fn list_related(
        &self,
        parent: Resource,
        id: &str,
        related: Resource,
    ) -> Result<Value, ClientError> {
        self.admin(
            Method::GET,
            &[parent.as_str(), id, related.as_str()],
            None,
        )
        .await
    }

    /// Associate `related/related_id` with `parent/id`.
    pub async fn add_related(
        &self,
        parent: Resource,
        id: &str,
        related: Resource,
        related_id: &str,
    ) -> Result<Value, ClientError> {
        self.admin(
            Method::PUT,
            &[parent.as_str(), id, related.as_str(), related_id],
            None,
        )
        .await
    }

    /// Remove the association of `related/related_id` with `parent/id`.
    pub async fn remove_related(
        &self,
        parent: Resource,
        id: &str,
        related: Resource,
        related_id: &str,
    ) -> Result<(), ClientError> {
        self.admin(
            Method::DELETE,
            &[parent.as_str(), id, related.as_str(), related_id],
            None,
        )
        .await
        .map(|_| ())
    }

    /// Register a client through the issuer's registration endpoint.
    ///
    /// The access token is sent when logged in, since some issuers only
    /// allow registration by authenticated operators.
    pub async fn register_client(&self, metadata: &Value) -> Result<Value, ClientError> {
        let discovered = self.discover().await?;
        let endpoint = discovered
            .registration_endpoint
            .ok_or(ClientError::RegistrationUnsupported)?;

        let mut request = self.http.post(&endpoint).json(metadata);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token.expose());
        }

        debug!(endpoint = %endpoint, "registering client");
        read_json(request).await
    }

    async fn admin(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let token = self.access_token.as_ref().ok_or(ClientError::NotLoggedIn)?;

        let mut path = vec!["v1"];
        path.extend_from_slice(segments);
        let url = self.endpoint(&path);
        debug!(method = %method, url = %url, "admin request");

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }
        read_json(request).await
    }

    /// Append path segments to the issuer URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.issuer.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Generate a random hex string for `state` and `nonce` values.
pub fn random_token(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

fn parse_issuer(issuer: &str) -> Result<Url, ClientError> {
    let invalid = |message: String| ClientError::InvalidIssuer {
        issuer: issuer.to_string(),
        message,
    };

    let url = Url::parse(issuer).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http or https URL".to_string()));
    }
    Ok(url)
}

async fn read_json(request: RequestBuilder) -> Result<Value, ClientError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClientError::Unauthorized {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(status_error(response).await);
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

async fn status_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status { status, body }
}
