//! `nvl oidc`: inspect the issuer's OpenID provider metadata.

use anyhow::Result;
use clap::Subcommand;

use super::{Context, print_json};

#[derive(Subcommand)]
pub enum OidcCommand {
    /// Print the issuer's discovery document
    Config {
        /// Issuer to query
        issuer: Option<String>,
    },
}

pub async fn run(ctx: &Context, command: OidcCommand) -> Result<()> {
    match command {
        OidcCommand::Config { issuer } => {
            let (_, client) = ctx.connect(issuer).await?;
            let metadata = client.discover().await?;
            print_json(&serde_json::to_value(metadata)?)
        }
    }
}
