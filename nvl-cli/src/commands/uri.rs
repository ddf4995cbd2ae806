//! `nvl uri`: print an authorization request URL for an issuer.
//!
//! The short form only asks for the endpoint. `--long` also asks for every
//! optional authorization parameter, offering random `state` and `nonce`
//! values.

use anyhow::{Context as _, Result};
use nvl_core::client::{DEFAULT_SCOPE, random_token};
use nvl_core::{AuthorizationParams, Choice, Chooser};

use super::Context;

/// Endpoint offered when none is given.
const DEFAULT_ENDPOINT: &str = "authorize";

/// Length of generated `state` and `nonce` values.
const RANDOM_LENGTH: usize = 20;

/// Default answer for `max_age`, in seconds.
const DEFAULT_MAX_AGE: &str = "3600";

const RESPONSE_TYPES: &[&str] = &[
    "code",
    "code token",
    "code id_token",
    "id_token",
    "id_token token",
    "code id_token token",
    "none",
];

const RESPONSE_MODES: &[&str] = &["fragment", "query"];

const DISPLAYS: &[&str] = &["page", "popup", "touch", "wap"];

const PROMPTS: &[&str] = &["", "none", "login", "consent", "select_account"];

pub async fn run(
    ctx: &Context,
    issuer: Option<String>,
    endpoint: Option<String>,
    long: bool,
) -> Result<()> {
    let (profile, client) = ctx.connect(issuer).await?;
    let metadata = client
        .discover()
        .await
        .with_context(|| format!("cannot build a URL for '{}'", profile.display_name()))?;

    let endpoint = match endpoint {
        Some(endpoint) => endpoint,
        None => {
            ctx.terminal
                .ask("Enter your endpoint", Some(DEFAULT_ENDPOINT))
                .await?
        }
    };

    let params = if long {
        ask_params(ctx, profile.redirect_uri.as_deref()).await?
    } else {
        AuthorizationParams::default()
    };

    let url = client.authorization_uri(&metadata, Some(&endpoint), &params)?;
    println!("{}", url);
    Ok(())
}

async fn ask_params(ctx: &Context, redirect_uri: Option<&str>) -> Result<AuthorizationParams> {
    let terminal = &ctx.terminal;

    let response_type = pick(ctx, "Choose your response type", RESPONSE_TYPES).await?;
    let redirect_uri = terminal.ask("Enter redirect uri", redirect_uri).await?;
    let scope = terminal.ask("Enter scope", Some(DEFAULT_SCOPE)).await?;
    let state = random_token(RANDOM_LENGTH);
    let state = terminal.ask("Enter state", Some(state.as_str())).await?;
    let nonce = random_token(RANDOM_LENGTH);
    let nonce = terminal.ask("Enter nonce", Some(nonce.as_str())).await?;
    let response_mode = pick(ctx, "Choose your response mode", RESPONSE_MODES).await?;
    let display = pick(ctx, "Choose your display", DISPLAYS).await?;
    let prompt = pick(ctx, "Choose prompt", PROMPTS).await?;
    let max_age = terminal
        .ask("Enter max age in seconds", Some(DEFAULT_MAX_AGE))
        .await?;
    let max_age = max_age
        .parse::<u64>()
        .with_context(|| format!("'{}' is not a number of seconds", max_age))?;

    Ok(AuthorizationParams {
        response_type: Some(response_type),
        redirect_uri: Some(redirect_uri),
        scope: Some(scope),
        state: Some(state),
        nonce: Some(nonce),
        response_mode: Some(response_mode),
        display: Some(display),
        prompt: Some(prompt),
        max_age: Some(max_age),
    })
}

async fn pick(ctx: &Context, message: &str, values: &[&str]) -> Result<String> {
    let choices: Vec<Choice> = values
        .iter()
        .map(|value| {
            let label = if value.is_empty() { "(none)" } else { *value };
            Choice::new(label, *value)
        })
        .collect();
    Ok(ctx.terminal.choose(message, &choices).await?)
}
