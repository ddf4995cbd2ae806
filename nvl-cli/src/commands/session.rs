//! `nvl login` and `nvl logout`.

use anyhow::{Context as _, Result};
use nvl_core::{IssuerId, SelectOptions, Session};
use tracing::info;

use super::{Context, stored_id};

/// Answers are read as plain lines, so the password is echoed.
pub(crate) const PASSWORD_PROMPT: &str = "Enter your password (input is shown)";

/// Log in to an issuer with email and password and store the tokens.
pub async fn login(
    ctx: &mut Context,
    issuer: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let (profile, client) = ctx.connect(issuer).await?;
    let id = stored_id(&profile)?;

    client
        .discover()
        .await
        .with_context(|| format!("cannot log in to '{}'", profile.display_name()))?;

    let email = match email {
        Some(email) => email,
        None => ctx.terminal.ask("Enter your email", None).await?,
    };
    let password = match password {
        Some(password) => password,
        None => ctx.terminal.ask(PASSWORD_PROMPT, None).await?,
    };

    let tokens = client.login(&email, &password).await?;
    info!(issuer = %id, expires_at = ?tokens.expires_at, "logged in");

    ctx.registry
        .save_session(&id, &Session::with_tokens(tokens))
        .context("couldn't write session file")?;

    println!(
        "You have been successfully logged in to {}",
        profile.display_name()
    );
    Ok(())
}

/// Forget the tokens stored for an issuer.
pub async fn logout(ctx: &mut Context, issuer: Option<String>) -> Result<()> {
    let profile = ctx
        .select(SelectOptions::new(issuer.map(IssuerId::new)))
        .await?;
    let id = stored_id(&profile)?;

    if !profile.session.is_logged_in() {
        println!("Not logged in to {}.", profile.display_name());
        return Ok(());
    }

    ctx.registry.clear_session(&id)?;
    println!("Logged out of {}.", profile.display_name());
    Ok(())
}
