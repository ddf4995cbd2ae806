//! Command handlers.

pub mod admin;
pub mod issuer;
pub mod oidc;
pub mod session;
pub mod uri;

use anyhow::{Context as _, Result};
use nvl_core::{IssuerClient, IssuerId, IssuerProfile, IssuerRegistry, SelectOptions};
use url::Url;

use crate::prompt::Terminal;

/// State shared by every command.
pub struct Context {
    pub registry: IssuerRegistry,
    pub terminal: Terminal,
}

impl Context {
    pub fn new(registry: IssuerRegistry, terminal: Terminal) -> Self {
        Self { registry, terminal }
    }

    /// Resolve the issuer a command operates against, asking if necessary.
    pub async fn select(&self, options: SelectOptions) -> Result<IssuerProfile> {
        Ok(self.registry.prompt(&options, &self.terminal).await?)
    }

    /// Resolve an issuer and build an HTTP client for it.
    pub async fn connect(&self, issuer: Option<String>) -> Result<(IssuerProfile, IssuerClient)> {
        let profile = self.select(SelectOptions::new(issuer.map(IssuerId::new))).await?;
        let client = IssuerClient::new(&profile)
            .with_context(|| format!("cannot connect to issuer '{}'", profile.display_name()))?;
        Ok((profile, client))
    }
}

/// The id a profile returned by the registry is stored under.
pub(crate) fn stored_id(profile: &IssuerProfile) -> Result<IssuerId> {
    profile
        .id
        .clone()
        .context("issuer profile has no id")
}

/// Check that `value` is an absolute http(s) URL.
pub(crate) fn validate_url(value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("'{}' is not a valid URL", value))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("'{}' is not an http or https URL", value);
    }
    Ok(())
}

pub(crate) fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://auth.example.com").is_ok());
        assert!(validate_url("http://localhost:3000/").is_ok());
        assert!(validate_url("auth.example.com").is_err());
        assert!(validate_url("ftp://example.com").is_err());
    }
}
