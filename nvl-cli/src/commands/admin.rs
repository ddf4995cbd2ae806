//! Admin API commands: `client`, `role`, `scope` and `user`.
//!
//! Create and update take `key=value` fields. A value that parses as JSON is
//! sent as JSON, anything else as a string, so `redirect_uris=["https://a"]`
//! sends a list and `name=Alice` sends a string.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use nvl_core::Resource;
use serde_json::{Map, Value};

use super::{Context, print_json};

/// Issuer selection shared by every admin command.
#[derive(Args, Debug)]
pub struct IssuerArg {
    /// Issuer to operate against
    #[arg(short, long, global = true)]
    pub issuer: Option<String>,
}

/// Operations every admin collection supports.
#[derive(Subcommand)]
pub enum ResourceCommand {
    /// List all entries
    List,

    /// Show one entry
    Info {
        /// Entry id
        id: String,
    },

    /// Create an entry from key=value fields
    Create {
        /// Fields as key=value
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Update fields of an entry
    Update {
        /// Entry id
        id: String,

        /// Fields as key=value
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ClientCommand {
    /// List registered clients
    List,

    /// Show one client
    Info {
        /// Client id
        id: String,
    },

    /// Delete a client
    Delete {
        /// Client id
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Register a client through dynamic client registration
    Register {
        /// Client metadata as key=value
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RoleCommand {
    #[command(flatten)]
    Common(ResourceCommand),

    /// List the scopes a role grants
    Scopes {
        /// Role name
        role: String,
    },

    /// Grant a scope to a role
    Permit {
        /// Role name
        role: String,

        /// Scope name
        scope: String,
    },

    /// Revoke a scope from a role
    Forbid {
        /// Role name
        role: String,

        /// Scope name
        scope: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    #[command(flatten)]
    Common(ResourceCommand),

    /// List a user's roles
    Roles {
        /// User id
        user: String,
    },

    /// Assign a role to a user
    Assign {
        /// User id
        user: String,

        /// Role name
        role: String,
    },

    /// Revoke a role from a user
    Revoke {
        /// User id
        user: String,

        /// Role name
        role: String,
    },
}

pub async fn client(ctx: &Context, issuer: IssuerArg, command: ClientCommand) -> Result<()> {
    let (_, api) = ctx.connect(issuer.issuer).await?;

    match command {
        ClientCommand::List => print_json(&api.list(Resource::Clients).await?),
        ClientCommand::Info { id } => print_json(&api.get(Resource::Clients, &id).await?),
        ClientCommand::Delete { id, force } => {
            delete(ctx, &api, Resource::Clients, &id, force).await
        }
        ClientCommand::Register { fields } => {
            let registered = api.register_client(&parse_fields(&fields)?).await?;
            print_json(&registered)
        }
    }
}

pub async fn role(ctx: &Context, issuer: IssuerArg, command: RoleCommand) -> Result<()> {
    let (_, api) = ctx.connect(issuer.issuer).await?;

    match command {
        RoleCommand::Common(command) => common(ctx, &api, Resource::Roles, command).await,
        RoleCommand::Scopes { role } => print_json(
            &api.list_related(Resource::Roles, &role, Resource::Scopes)
                .await?,
        ),
        RoleCommand::Permit { role, scope } => {
            api.add_related(Resource::Roles, &role, Resource::Scopes, &scope)
                .await?;
            println!("Granted scope '{}' to role '{}'.", scope, role);
            Ok(())
        }
        RoleCommand::Forbid { role, scope } => {
            api.remove_related(Resource::Roles, &role, Resource::Scopes, &scope)
                .await?;
            println!("Revoked scope '{}' from role '{}'.", scope, role);
            Ok(())
        }
    }
}

pub async fn scope(ctx: &Context, issuer: IssuerArg, command: ResourceCommand) -> Result<()> {
    let (_, api) = ctx.connect(issuer.issuer).await?;
    common(ctx, &api, Resource::Scopes, command).await
}

pub async fn user(ctx: &Context, issuer: IssuerArg, command: UserCommand) -> Result<()> {
    let (_, api) = ctx.connect(issuer.issuer).await?;

    match command {
        UserCommand::Common(command) => common(ctx, &api, Resource::Users, command).await,
        UserCommand::Roles { user } => print_json(
            &api.list_related(Resource::Users, &user, Resource::Roles)
                .await?,
        ),
        UserCommand::Assign { user, role } => {
            api.add_related(Resource::Users, &user, Resource::Roles, &role)
                .await?;
            println!("Assigned role '{}' to user '{}'.", role, user);
            Ok(())
        }
        UserCommand::Revoke { user, role } => {
            api.remove_related(Resource::Users, &user, Resource::Roles, &role)
                .await?;
            println!("Revoked role '{}' from user '{}'.", role, user);
            Ok(())
        }
    }
}

async fn common(
    ctx: &Context,
    api: &nvl_core::IssuerClient,
    resource: Resource,
    command: ResourceCommand,
) -> Result<()> {
    match command {
        ResourceCommand::List => print_json(&api.list(resource).await?),
        ResourceCommand::Info { id } => print_json(&api.get(resource, &id).await?),
        ResourceCommand::Create { fields } => {
            print_json(&api.create(resource, &parse_fields(&fields)?).await?)
        }
        ResourceCommand::Update { id, fields } => {
            print_json(&api.update(resource, &id, &parse_fields(&fields)?).await?)
        }
        ResourceCommand::Delete { id, force } => delete(ctx, api, resource, &id, force).await,
    }
}

async fn delete(
    ctx: &Context,
    api: &nvl_core::IssuerClient,
    resource: Resource,
    id: &str,
    force: bool,
) -> Result<()> {
    if !force {
        let question = format!("Delete {} '{}'?", singular(resource), id);
        if !ctx.terminal.confirm(&question, false).await? {
            println!("Aborted.");
            return Ok(());
        }
    }

    api.delete(resource, id).await?;
    println!("Deleted {} '{}'.", singular(resource), id);
    Ok(())
}

fn singular(resource: Resource) -> &'static str {
    match resource {
        Resource::Clients => "client",
        Resource::Roles => "role",
        Resource::Scopes => "scope",
        Resource::Users => "user",
    }
}

/// Build a JSON object from `key=value` arguments.
pub fn parse_fields(fields: &[String]) -> Result<Value> {
    let mut object = Map::new();

    for field in fields {
        let (key, raw) = field
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", field))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("missing field name in '{}'", field);
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        object.insert(key.to_string(), value);
    }

    Ok(Value::Object(object))
}
