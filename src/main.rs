use std::sync::Arc;

use clap::Parser;
use keycloak_directory::{
    ActiveDirectoryFederation, DirectoryConfig, DirectoryResult, DirectorySession, GroupManager,
    KeycloakDirectory, OidcWebClient, RequestContext, UserManager, observability::init_tracing,
};
use serde::Serialize;

/// CLI arguments for the Keycloak directory tool
#[derive(Parser, Debug)]
#[command(version, about = "Keycloak user and group directory", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to KEYCLOAK_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Abort the command after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// User operations
    #[command(subcommand)]
    Users(UsersCommand),
    /// Group operations
    #[command(subcommand)]
    Groups(GroupsCommand),
    /// User profile operations
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Realm setup
    #[command(subcommand)]
    Realm(RealmCommand),
}

#[derive(clap::Subcommand, Debug)]
enum UsersCommand {
    /// List every user in the realm
    List,
    /// Show a user by id
    Get { id: String },
    /// Find a user by email address
    ByEmail { email: String },
    /// Check whether a username is taken
    Exists { username: String },
}

#[derive(clap::Subcommand, Debug)]
enum GroupsCommand {
    /// List every group in the realm
    List,
    /// List the members of a group
    Members {
        /// Group id
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,
        /// Exact group name
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ProfileCommand {
    /// Add missing attribute definitions to the realm's user profile
    Sync,
}

#[derive(clap::Subcommand, Debug)]
enum RealmCommand {
    /// Register a public OIDC client for a web application
    CreateClient {
        #[arg(long)]
        name: String,
        /// Application root URL
        #[arg(long)]
        url: String,
        #[arg(long)]
        redirect_url: String,
        /// Allowed post-logout redirect (repeatable)
        #[arg(long = "logout-url")]
        logout_urls: Vec<String>,
    },
    /// Add a read-only Active Directory user federation.
    /// The bind password is read from KEYCLOAK_LDAP_BIND_PWD.
    AddAdLdap {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        base_dn: String,
        #[arg(long, default_value = "Administrator")]
        bind_user: String,
    },
    /// Sync an LDAP user federation now
    SyncLdap {
        component_id: String,
        /// Full sync instead of changed users only
        #[arg(long)]
        full: bool,
    },
}

fn load_config(path: Option<&str>) -> DirectoryConfig {
    let result = match path {
        Some(path) => DirectoryConfig::from_file(path),
        None => DirectoryConfig::from_env(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_users(
    directory: &KeycloakDirectory,
    ctx: &RequestContext,
    command: UsersCommand,
) -> DirectoryResult<()> {
    let users = directory.users();
    match command {
        UsersCommand::List => print_json(&users.list_users(ctx, None, &[]).await?),
        UsersCommand::Get { id } => print_json(&users.get_user(ctx, &id).await?),
        UsersCommand::ByEmail { email } => print_json(&users.get_user_by_email(ctx, &email).await?),
        UsersCommand::Exists { username } => {
            let (username, exists) = users.force_user_name(ctx, &username).await?;
            print_json(&serde_json::json!({ "username": username, "exists": exists }));
        }
    }
    Ok(())
}

async fn run_groups(
    directory: &KeycloakDirectory,
    ctx: &RequestContext,
    command: GroupsCommand,
) -> DirectoryResult<()> {
    let groups = directory.groups();
    match command {
        GroupsCommand::List => print_json(&groups.list_groups(ctx, None, &[]).await?),
        GroupsCommand::Members { id, name } => {
            let group_id = match (id, name) {
                (Some(id), _) => Some(id),
                (None, Some(name)) => groups.get_group_id(ctx, &name).await?,
                (None, None) => None,
            };
            match group_id {
                Some(group_id) => print_json(&groups.get_group_members(ctx, &group_id).await?),
                None => {
                    eprintln!("Group not found");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

async fn run_profile(
    session: &Arc<DirectorySession>,
    ctx: &RequestContext,
    command: ProfileCommand,
) -> DirectoryResult<()> {
    match command {
        ProfileCommand::Sync => {
            // Establishing the session runs the profile merge
            let conn = session.ensure_connected(ctx).await?;
            let attributes: Vec<&str> = conn.registry().names().collect();
            print_json(&serde_json::json!({
                "realm": session.realm(),
                "attributes": attributes,
            }));
        }
    }
    Ok(())
}

async fn run_realm(
    directory: &KeycloakDirectory,
    ctx: &RequestContext,
    command: RealmCommand,
) -> DirectoryResult<()> {
    match command {
        RealmCommand::CreateClient {
            name,
            url,
            redirect_url,
            logout_urls,
        } => {
            let client = OidcWebClient {
                name,
                url,
                redirect_url,
                post_logout_redirect_urls: logout_urls,
            };
            let id = directory.realm().create_oidc_web_client(ctx, &client).await?;
            print_json(&serde_json::json!({ "id": id, "clientId": client.name }));
        }
        RealmCommand::AddAdLdap {
            host,
            port,
            base_dn,
            bind_user,
        } => {
            let Ok(bind_password) = std::env::var("KEYCLOAK_LDAP_BIND_PWD") else {
                eprintln!("KEYCLOAK_LDAP_BIND_PWD is not set");
                std::process::exit(1);
            };
            let federation = ActiveDirectoryFederation {
                host,
                port,
                base_dn,
                bind_user,
                bind_password,
            };
            let id = directory.realm().add_ad_ldap_federation(ctx, &federation).await?;
            print_json(&serde_json::json!({ "componentId": id }));
        }
        RealmCommand::SyncLdap { component_id, full } => {
            directory
                .users()
                .trigger_user_storage_sync(ctx, &component_id, full)
                .await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref());

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    // `profile sync` merges even when the config turns it off
    if matches!(args.command, Command::Profile(_)) {
        config.keycloak.sync_profile = true;
    }

    let directory = match KeycloakDirectory::new(&config.keycloak) {
        Ok(directory) => directory,
        Err(e) => {
            eprintln!("Failed to create directory client: {e}");
            std::process::exit(1);
        }
    };

    let mut ctx = RequestContext::new();
    if let Some(secs) = args.timeout_secs {
        ctx = ctx.with_timeout(std::time::Duration::from_secs(secs));
    }

    let result = match args.command {
        Command::Users(command) => run_users(&directory, &ctx, command).await,
        Command::Groups(command) => run_groups(&directory, &ctx, command).await,
        Command::Profile(command) => run_profile(directory.session(), &ctx, command).await,
        Command::Realm(command) => run_realm(&directory, &ctx, command).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
