//! `voluntariado`: sign in, inspect the session and poke the REST API from a
//! terminal. The session lives in a JSON file so consecutive commands share
//! it the way browser tabs share `localStorage`.

mod file_storage;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use voluntariado::api::endpoints::{self, RESOURCES, Resource};
use voluntariado::api::models::{self, LoginCredentials, RegisterData};
use voluntariado::api::ReqwestTransport;
use voluntariado::config::BASE_URL_KEY;
use voluntariado::landing::LandingConfigCache;
use voluntariado::{
    ApiClient, ApiConfig, ApiError, AuthError, AuthService, ConfigError, Role, SessionStore, SessionView, resolve,
};

use crate::file_storage::FileStorage;

type Auth = AuthService<ReqwestTransport, FileStorage>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("not signed in; run `voluntariado login` first")]
    NotSignedIn,
    #[error("unknown resource `{0}`; run `voluntariado api resources` for the list")]
    UnknownResource(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "voluntariado", about = "Voluntariado UNCuyo session and API CLI")]
struct Cli {
    #[arg(long, env = "VOLUNTARIADO_SESSION_FILE", default_value = ".voluntariado-session.json")]
    session_file: PathBuf,

    #[arg(long, env = BASE_URL_KEY)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a session.
    Login(Credentials),
    /// Drop the stored session.
    Logout,
    /// Show the signed-in profile.
    Whoami {
        /// Re-fetch the profile instead of using the cached copy.
        #[arg(long)]
        refresh: bool,
    },
    /// Mint a new access token from the refresh token.
    Refresh,
    /// Create an account (a volunteer unless `--role` says otherwise).
    Register {
        #[command(flatten)]
        credentials: Credentials,
        /// Backend role code: VOL, DELEG or ADMIN.
        #[arg(long, default_value = "VOL", value_parser = parse_role)]
        role: Role,
    },
    ResetPassword(ResetPasswordCommand),
    /// Show where the route guard would send the current session.
    Check { path: String },
    /// Print the public landing-page configuration.
    Landing,
    Api(ApiCommand),
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "VOLUNTARIADO_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct ResetPasswordCommand {
    #[command(subcommand)]
    command: ResetPasswordSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResetPasswordSubcommand {
    /// Email a reset link.
    Request { email: String },
    /// Set a new password with the emailed token.
    Confirm {
        token: String,
        #[arg(long, env = "VOLUNTARIADO_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        confirm: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    /// List known resource names.
    Resources,
    List {
        resource: String,
    },
    Get {
        resource: String,
        id: i64,
    },
    Create {
        resource: String,
        #[arg(long)]
        data: String,
    },
    Update {
        resource: String,
        id: i64,
        #[arg(long)]
        data: String,
    },
    Delete {
        resource: String,
        id: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let auth = connect(&cli)?;
    tracing::debug!(session_file = %auth.session().storage().path().display(), "session loaded");

    match cli.command {
        Command::Login(creds) => run_login(&auth, creds).await,
        Command::Logout => {
            auth.logout();
            println!("signed out");
            Ok(())
        }
        Command::Whoami { refresh } => run_whoami(&auth, refresh).await,
        Command::Refresh => {
            auth.refresh_token().await?;
            println!("access token refreshed");
            Ok(())
        }
        Command::Register { credentials, role } => {
            let data = RegisterData::with_role(credentials.email, credentials.password, role);
            let user = auth.register(&data).await?;
            println!("account created for {}; sign in to continue", user.email);
            Ok(())
        }
        Command::ResetPassword(reset) => run_reset_password(&auth, reset).await,
        Command::Check { path } => {
            let landed = resolve(&path, &auth.session().snapshot());
            println!("{}", describe_check(&path, &landed));
            Ok(())
        }
        Command::Landing => {
            let config = LandingConfigCache::new().fetch(auth.api()).await;
            print_json(&serde_json::to_value(&config)?)
        }
        Command::Api(api) => run_api(&auth, api).await,
    }
}

fn connect(cli: &Cli) -> Result<Auth, CliError> {
    let base_url = cli.base_url.clone();
    let config = ApiConfig::from_lookup(|key| {
        if key == BASE_URL_KEY { base_url.clone() } else { std::env::var(key).ok() }
    })?;
    let session = Arc::new(SessionStore::new(FileStorage::new(&cli.session_file)));
    let api = ApiClient::new(ReqwestTransport::new(config)?, session)
        .with_forced_logout_hook(Arc::new(|| tracing::warn!("session expired; sign in again")));
    Ok(AuthService::new(Arc::new(api)))
}

async fn run_login(auth: &Auth, creds: Credentials) -> Result<(), CliError> {
    let credentials = LoginCredentials { email: creds.email, password: creds.password };
    let (user, _) = auth.login(&credentials).await?;
    println!("signed in as {} ({})", user.email, user.role);
    if !user.settled_up {
        println!("profile setup pending; the web app will route to /setup");
    }
    Ok(())
}

async fn run_whoami(auth: &Auth, refresh: bool) -> Result<(), CliError> {
    if !auth.session().is_authenticated() {
        return Err(CliError::NotSignedIn);
    }
    let user = if refresh { auth.refresh_current_user().await? } else { auth.current_user().await? };
    print_json(&serde_json::to_value(&user)?)
}

async fn run_reset_password(auth: &Auth, reset: ResetPasswordCommand) -> Result<(), CliError> {
    match reset.command {
        ResetPasswordSubcommand::Request { email } => {
            auth.request_password_reset(&email).await?;
            println!("if {email} has an account, a reset link is on its way");
        }
        ResetPasswordSubcommand::Confirm { token, password, confirm } => {
            let confirm = confirm.unwrap_or_else(|| password.clone());
            auth.confirm_password_reset(&token, &password, &confirm).await?;
            println!("password updated");
        }
    }
    Ok(())
}

async fn run_api(auth: &Auth, api: ApiCommand) -> Result<(), CliError> {
    let client = auth.api();
    match api.command {
        ApiSubcommand::Resources => {
            for resource in RESOURCES {
                println!("{:<16} {}", resource.name, resource.base);
            }
            Ok(())
        }
        ApiSubcommand::List { resource } => {
            let json: Value = client.list(lookup(&resource)?).await?;
            print_json(&json)
        }
        ApiSubcommand::Get { resource, id } => {
            let json: Value = client.retrieve(lookup(&resource)?, id).await?;
            print_json(&json)
        }
        ApiSubcommand::Create { resource, data } => {
            let resource = lookup(&resource)?;
            let body = models::create_body(resource, serde_json::from_str(&data)?)?;
            let json: Value = client.create(resource, &body).await?;
            print_json(&json)
        }
        ApiSubcommand::Update { resource, id, data } => {
            let resource = lookup(&resource)?;
            let body = models::update_body(resource, serde_json::from_str(&data)?)?;
            let json: Value = client.update(resource, id, &body).await?;
            print_json(&json)
        }
        ApiSubcommand::Delete { resource, id } => {
            client.remove(lookup(&resource)?, id).await?;
            println!("deleted {resource} {id}");
            Ok(())
        }
    }
}

fn parse_role(code: &str) -> Result<Role, String> {
    Role::from_code(code).ok_or_else(|| format!("unknown role `{code}`; expected VOL, DELEG or ADMIN"))
}

fn lookup(name: &str) -> Result<Resource, CliError> {
    endpoints::resource_named(name).ok_or_else(|| CliError::UnknownResource(name.to_owned()))
}

fn describe_check(requested: &str, landed: &str) -> String {
    if requested == landed { format!("allow {requested}") } else { format!("redirect {requested} -> {landed}") }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
