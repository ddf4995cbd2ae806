//! `nvl issuer`: manage issuer profiles.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use nvl_core::model::CA_CERT_KEY;
use nvl_core::{IssuerClient, IssuerId, IssuerProfile, Secret, SelectOptions};
use std::path::PathBuf;
use tracing::debug;

use super::{Context, stored_id, validate_url};

#[derive(Subcommand)]
pub enum IssuerCommand {
    /// List configured issuers
    List,

    /// Add an issuer
    Add {
        /// Issuer URI
        issuer: Option<String>,

        #[command(flatten)]
        fields: ProfileFields,
    },

    /// Edit an issuer's configuration
    Edit {
        /// Issuer to edit
        #[arg(value_name = "ISSUER")]
        target: Option<String>,

        /// New issuer URI
        #[arg(short = 'u', long)]
        issuer_uri: Option<String>,

        #[command(flatten)]
        fields: ProfileFields,
    },

    /// Show an issuer's configuration
    Info {
        /// Issuer to show
        #[arg(value_name = "ISSUER")]
        target: Option<String>,

        /// Print the client secret in clear
        #[arg(long)]
        show_secret: bool,
    },

    /// Delete an issuer and its session
    Del {
        /// Issuer to delete
        #[arg(value_name = "ISSUER")]
        target: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show, set or clear the default issuer
    Default {
        /// Make an issuer the default; asks which one if no id is given
        #[arg(short, long, value_name = "ISSUER", num_args = 0..=1, conflicts_with = "clear")]
        set: Option<Option<String>>,

        /// Remove the default issuer
        #[arg(short, long)]
        clear: bool,
    },
}

/// Profile fields accepted by `add` and `edit`. Missing ones are asked for.
#[derive(Args, Debug, Default)]
pub struct ProfileFields {
    /// OAuth client id
    #[arg(short = 'c', long)]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(short = 's', long)]
    client_secret: Option<String>,

    /// OAuth redirect URI
    #[arg(short = 'r', long)]
    redirect_uri: Option<String>,

    /// Display name
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Id to store the profile under
    #[arg(short = 'i', long)]
    id: Option<String>,

    /// CA certificate for a self-signed issuer
    #[arg(short = 't', long, value_name = "PATH")]
    ca_cert: Option<PathBuf>,

    /// Sign-in provider for password logins
    #[arg(long)]
    provider: Option<String>,

    /// Skip checking that the URI points to an OpenID provider
    #[arg(short, long)]
    force: bool,
}

pub async fn run(ctx: &mut Context, command: IssuerCommand) -> Result<()> {
    match command {
        IssuerCommand::List => list(ctx),
        IssuerCommand::Add { issuer, fields } => add(ctx, issuer, fields).await,
        IssuerCommand::Edit {
            target,
            issuer_uri,
            fields,
        } => edit(ctx, target, issuer_uri, fields).await,
        IssuerCommand::Info {
            target,
            show_secret,
        } => info(ctx, target, show_secret).await,
        IssuerCommand::Del { target, force } => del(ctx, target, force).await,
        IssuerCommand::Default { set, clear } => default(ctx, set, clear).await,
    }
}

fn list(ctx: &Context) -> Result<()> {
    let profiles = ctx.registry.list();
    if profiles.is_empty() {
        println!("No issuers configured. Add one with `nvl issuer add`.");
        return Ok(());
    }

    let default = ctx.registry.default_issuer();
    for profile in profiles {
        let marker = if profile.id.as_ref() == default { "*" } else { " " };
        println!(
            "{} {}\t{}\t{}",
            marker,
            profile.id.as_ref().map(IssuerId::as_str).unwrap_or_default(),
            profile.display_name(),
            profile.issuer.as_deref().unwrap_or_default(),
        );
    }
    Ok(())
}

async fn add(ctx: &mut Context, issuer: Option<String>, fields: ProfileFields) -> Result<()> {
    let issuer = match issuer {
        Some(issuer) => issuer,
        None => ctx.terminal.ask("Enter the issuer URI", None).await?,
    };
    validate_url(&issuer)?;

    let ca_cert = ask_ca_cert(ctx, &issuer, fields.ca_cert.clone(), false).await?;
    let mut profile = IssuerProfile::default().with_issuer(&issuer);
    profile.ca_cert_path = ca_cert;
    profile.provider = fields.provider.clone();

    verify_issuer(&profile, fields.force).await?;

    let client_id = answer(ctx, fields.client_id, "Enter the client ID", None).await?;
    let client_secret = answer(ctx, fields.client_secret, "Enter the client secret", None).await?;
    let redirect_uri = answer(ctx, fields.redirect_uri, "Enter the redirect URI", None).await?;
    validate_url(&redirect_uri)?;
    let name = answer(ctx, fields.name, "Choose a name for this configuration", None).await?;

    let suggested = IssuerId::from_name(&name).map(|id| id.to_string());
    let id = answer(
        ctx,
        fields.id,
        "Choose an ID for this configuration",
        suggested.as_deref(),
    )
    .await?;
    let id = chosen_id(&id, None)?;

    if ctx.registry.get(&id).is_some() {
        bail!(
            "issuer '{}' already exists; use `nvl issuer edit {}` to change it",
            id,
            id
        );
    }

    let profile = profile
        .with_client(client_id, client_secret)
        .with_redirect_uri(redirect_uri);
    let profile = IssuerProfile {
        name: Some(name),
        ..profile
    };

    ctx.registry
        .save(&profile, Some(&id))
        .context("couldn't write configuration file")?;

    println!("Added issuer. You may now log in with `nvl login`.");
    Ok(())
}

async fn edit(
    ctx: &mut Context,
    target: Option<String>,
    issuer_uri: Option<String>,
    fields: ProfileFields,
) -> Result<()> {
    let current = ctx
        .select(SelectOptions::new(target.map(IssuerId::new)).without_default())
        .await?;
    let old_id = stored_id(&current)?;

    let issuer = answer(
        ctx,
        issuer_uri,
        "Enter the issuer URI",
        current.issuer.as_deref(),
    )
    .await?;
    validate_url(&issuer)?;

    let ca_cert = match fields.ca_cert.clone() {
        Some(path) => Some(path),
        None => {
            let has_cert = current.ca_cert_path.is_some();
            ask_ca_cert(ctx, &issuer, current.ca_cert_path.clone(), has_cert).await?
        }
    };

    let mut updated = current.clone();
    updated.issuer = Some(issuer);
    updated.ca_cert_path = ca_cert;
    if fields.provider.is_some() {
        updated.provider = fields.provider.clone();
    }

    verify_issuer(&updated, fields.force).await?;

    let client_id = answer(
        ctx,
        fields.client_id,
        "Enter the client ID",
        current.client_id.as_deref(),
    )
    .await?;
    let client_secret = match (fields.client_secret, &current.client_secret) {
        (Some(secret), _) => Secret::new(secret),
        (None, Some(existing)) => ctx
            .terminal
            .ask_optional("Enter the client secret (leave empty to keep it)")
            .await?
            .map(Secret::new)
            .unwrap_or_else(|| existing.clone()),
        (None, None) => Secret::new(ctx.terminal.ask("Enter the client secret", None).await?),
    };
    let redirect_uri = answer(
        ctx,
        fields.redirect_uri,
        "Enter the redirect URI",
        current.redirect_uri.as_deref(),
    )
    .await?;
    validate_url(&redirect_uri)?;
    let name = answer(
        ctx,
        fields.name,
        "Choose a name for this configuration",
        current.name.as_deref(),
    )
    .await?;
    let id = answer(
        ctx,
        fields.id,
        "Choose an ID for this configuration",
        Some(old_id.as_str()),
    )
    .await?;
    let new_id = chosen_id(&id, Some(&old_id))?;

    updated.client_id = Some(client_id);
    updated.client_secret = Some(client_secret);
    updated.redirect_uri = Some(redirect_uri);
    updated.name = Some(name);

    if new_id != old_id && ctx.registry.get(&new_id).is_some() {
        bail!("issuer '{}' already exists", new_id);
    }

    let was_default = ctx.registry.default_issuer() == Some(&old_id);
    let saved = ctx
        .registry
        .save(&updated, Some(&new_id))
        .context("couldn't write configuration file")?;

    // Saving merges onto the old file, so a dropped certificate is removed explicitly.
    if updated.ca_cert_path.is_none() && saved.ca_cert_path.is_some() {
        debug!(issuer = %new_id, "removing CA certificate path");
        ctx.registry
            .unset(&new_id, &[CA_CERT_KEY])
            .context("couldn't write configuration file")?;
    }

    if new_id != old_id {
        debug!(from = %old_id, to = %new_id, "renaming issuer");
        ctx.registry.delete_by_id(&old_id)?;
        if was_default {
            ctx.registry.set_default(&new_id)?;
        }
    }

    println!("Updated issuer configuration.");
    Ok(())
}

async fn info(ctx: &Context, target: Option<String>, show_secret: bool) -> Result<()> {
    let options = SelectOptions::new(target.map(IssuerId::new))
        .without_default()
        .always_prompt();
    let profile = ctx.select(options).await?;
    let id = stored_id(&profile)?;

    println!("Issuer name:\t{}", profile.display_name());
    println!("ID:\t\t{}", id);
    println!("URI:\t\t{}", profile.issuer.as_deref().unwrap_or_default());
    println!(
        "Client ID:\t{}",
        profile.client_id.as_deref().unwrap_or_default()
    );
    if let Some(secret) = &profile.client_secret {
        if show_secret {
            println!("Client secret:\t{}", secret.expose());
        } else {
            println!("Client secret:\t********");
        }
    }
    if let Some(redirect_uri) = &profile.redirect_uri {
        println!("Redirect URI:\t{}", redirect_uri);
    }
    if let Some(path) = &profile.ca_cert_path {
        println!("CA SSL Cert:\t{}", path.display());
    }
    if let Some(provider) = &profile.provider {
        println!("Provider:\t{}", provider);
    }
    println!(
        "Logged in:\t{}",
        if profile.session.is_logged_in() { "yes" } else { "no" }
    );
    if ctx.registry.default_issuer() == Some(&id) {
        println!("Default:\tyes");
    }
    Ok(())
}

async fn del(ctx: &mut Context, target: Option<String>, force: bool) -> Result<()> {
    let profile = ctx
        .select(SelectOptions::new(target.map(IssuerId::new)).without_default())
        .await?;

    if !force {
        let question = format!("Delete issuer '{}'?", profile.display_name());
        if !ctx.terminal.confirm(&question, false).await? {
            println!("Aborted.");
            return Ok(());
        }
    }

    ctx.registry.delete_by_profile(&profile)?;
    println!("Deleted issuer.");
    Ok(())
}

async fn default(ctx: &mut Context, set: Option<Option<String>>, clear: bool) -> Result<()> {
    if clear {
        ctx.registry.clear_default()?;
        println!("Cleared default issuer.");
        return Ok(());
    }

    if let Some(choice) = set {
        let options = SelectOptions::new(choice.map(IssuerId::new))
            .without_default()
            .always_prompt();
        let profile = ctx.select(options).await?;
        ctx.registry.set_default(&stored_id(&profile)?)?;
        println!("Saved default issuer.");
        return Ok(());
    }

    match ctx
        .registry
        .default_issuer()
        .and_then(|id| ctx.registry.get(id))
    {
        Some(profile) => {
            println!("Default issuer:");
            println!("Name:\t{}", profile.display_name());
            println!("ID:\t{}", stored_id(profile)?);
            println!("URI:\t{}", profile.issuer.as_deref().unwrap_or_default());
        }
        None => println!("No default issuer set."),
    }
    Ok(())
}

/// Slugify an answered id, keeping `current` when the answer is unchanged.
fn chosen_id(answer: &str, current: Option<&IssuerId>) -> Result<IssuerId> {
    if let Some(current) = current.filter(|id| id.as_str() == answer) {
        return Ok(current.clone());
    }
    IssuerId::from_name(answer)
        .with_context(|| format!("'{}' cannot be used as an issuer id", answer))
}

/// Use the flag value if given, else ask.
async fn answer(
    ctx: &Context,
    value: Option<String>,
    message: &str,
    default: Option<&str>,
) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Ok(ctx.terminal.ask(message, default).await?),
    }
}

/// Ask whether an https issuer needs a CA certificate, unless one was given.
async fn ask_ca_cert(
    ctx: &Context,
    issuer: &str,
    given: Option<PathBuf>,
    self_signed: bool,
) -> Result<Option<PathBuf>> {
    if !issuer.starts_with("https") {
        return Ok(None);
    }
    if given.is_some() && !self_signed {
        return Ok(given);
    }

    if !ctx
        .terminal
        .confirm("Is the SSL certificate self-signed?", self_signed)
        .await?
    {
        return Ok(None);
    }

    let default = given.as_ref().map(|p| p.display().to_string());
    let path = ctx
        .terminal
        .ask("Enter the path to the CA SSL certificate", default.as_deref())
        .await?;
    Ok(Some(PathBuf::from(path)))
}

/// Check that the issuer serves OpenID provider metadata.
async fn verify_issuer(profile: &IssuerProfile, force: bool) -> Result<()> {
    let client = IssuerClient::new(profile)?;
    if force {
        debug!(issuer = %client.issuer(), "skipping discovery check");
        return Ok(());
    }
    client.discover().await?;
    Ok(())
}
