//! nvl CLI
//!
//! Command-line administration client for OpenID Connect identity providers.
//!
//! # Usage
//!
//! ```bash
//! # Register an issuer and make it the default
//! nvl issuer add https://auth.example.com
//! nvl issuer default --set
//!
//! # Log in and manage users
//! nvl login
//! nvl user list
//! nvl user assign <user-id> admin
//!
//! # Print an authorization URL
//! nvl uri --long
//! ```

mod commands;
mod prompt;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use nvl_core::{FileStore, GlobalConfig, IssuerRegistry, NvlHome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use crate::commands::Context;
use crate::commands::admin::{ClientCommand, IssuerArg, ResourceCommand, RoleCommand, UserCommand};
use crate::commands::issuer::IssuerCommand;
use crate::commands::oidc::OidcCommand;
use crate::prompt::Terminal;

/// Log filter used when neither `RUST_LOG` nor the config file sets one.
const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "nvl")]
#[command(about = "Administration client for OpenID Connect identity providers")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding issuer configuration and sessions
    #[arg(long, global = true, env = "NVL_HOME", value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage issuer profiles
    #[command(subcommand)]
    Issuer(IssuerCommand),

    /// Log in to an issuer
    Login {
        /// Issuer to log in to
        issuer: Option<String>,

        /// Account email
        #[arg(short, long)]
        email: Option<String>,

        /// Account password; when prompted instead, the typed password is shown
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the tokens stored for an issuer
    Logout {
        /// Issuer to log out of
        issuer: Option<String>,
    },

    /// Inspect the issuer's OpenID configuration
    #[command(subcommand)]
    Oidc(OidcCommand),

    /// Print an authorization request URL
    Uri {
        /// Issuer to build the URL for
        issuer: Option<String>,

        /// Path of the authorization endpoint
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Ask for every authorization parameter
        #[arg(short, long)]
        long: bool,
    },

    /// Manage registered clients
    Client {
        #[command(flatten)]
        target: IssuerArg,

        #[command(subcommand)]
        command: ClientCommand,
    },

    /// Manage roles
    Role {
        #[command(flatten)]
        target: IssuerArg,

        #[command(subcommand)]
        command: RoleCommand,
    },

    /// Manage scopes
    Scope {
        #[command(flatten)]
        target: IssuerArg,

        #[command(subcommand)]
        command: ResourceCommand,
    },

    /// Manage users
    User {
        #[command(flatten)]
        target: IssuerArg,

        #[command(subcommand)]
        command: UserCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let home = NvlHome::resolve(cli.home)?;

    let files = FileStore::with_default_formats();
    let log_level = GlobalConfig::load(&files, &home)
        .ok()
        .and_then(|config| config.log_level);
    init_logging(cli.verbose, log_level.as_deref());
    debug!(home = %home.root().display(), "using home directory");

    let registry = IssuerRegistry::with_store(home, files)
        .context("failed to load issuer configuration")?;
    let mut ctx = Context::new(registry, Terminal::stdin());

    match cli.command {
        Commands::Issuer(command) => commands::issuer::run(&mut ctx, command).await,
        Commands::Login {
            issuer,
            email,
            password,
        } => commands::session::login(&mut ctx, issuer, email, password).await,
        Commands::Logout { issuer } => commands::session::logout(&mut ctx, issuer).await,
        Commands::Oidc(command) => commands::oidc::run(&ctx, command).await,
        Commands::Uri {
            issuer,
            endpoint,
            long,
        } => commands::uri::run(&ctx, issuer, endpoint, long).await,
        Commands::Client { target, command } => commands::admin::client(&ctx, target, command).await,
        Commands::Role { target, command } => commands::admin::role(&ctx, target, command).await,
        Commands::Scope { target, command } => commands::admin::scope(&ctx, target, command).await,
        Commands::User { target, command } => commands::admin::user(&ctx, target, command).await,
    }
}

/// Install the stderr log subscriber.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` wins over the
/// configured `logLevel`.
fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or(DEFAULT_LOG_LEVEL)))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
