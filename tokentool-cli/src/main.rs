//! token-tool
//!
//! Command-line tool for retrieving OpenStack Keystone tokens.
//!
//! # Usage
//!
//! ```bash
//! # Print a project-scoped token
//! token-tool token -u alice -d acme -p proj1 -q acme --region eu-de-1
//!
//! # Write a curl config file with the token headers
//! token-tool token -f curlrc > ~/.keystone.curlrc
//!
//! # Call an API, with catalog URLs substituted into the arguments
//! token-tool curl -- -s '$COMPUTE/servers'
//!
//! # Store the password in the OS keyring
//! token-tool password set -u alice
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokentool_core::{
    Authentication, CatalogMode, KeystoneClient, KeyringStore, SecretStore, TokenToolError,
    ValidatedAuth, ValidationError, authenticate, create_store, render, substitute, validate,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod credentials;
mod exec;

use config::{AuthArgs, FileConfig, Settings, load_config};
use credentials::{LineSource, fill_password, prompt_password, read_password_line};
use exec::TerminalAction;

#[derive(Parser)]
#[command(name = "token-tool")]
#[command(about = "Tool for authentication tokens from Keystone")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: token-tool/config.toml in the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve a token from Keystone
    Token {
        #[command(flatten)]
        auth: AuthArgs,

        /// Output format (text, json, curlrc)
        #[arg(short, long)]
        format: Option<String>,

        /// Include the service catalog in the response
        #[arg(long)]
        catalog: bool,
    },

    /// Run curl with a token, substituting catalog URLs such as $COMPUTE into its arguments
    Curl {
        #[command(flatten)]
        auth: AuthArgs,

        /// Arguments passed to curl
        #[arg(last = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List the catalog variables available to the curl command
    Variables {
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Manage passwords stored in the OS keyring
    Password {
        #[command(subcommand)]
        action: PasswordCommand,
    },

    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum PasswordCommand {
    /// Store a user's password
    Set {
        /// Username the password belongs to
        #[arg(short, long, env = "OS_USERNAME")]
        username: String,

        /// Read the password from stdin instead of prompting
        #[arg(long)]
        password_stdin: bool,
    },

    /// Remove a user's stored password
    Forget {
        /// Username the password belongs to
        #[arg(short, long, env = "OS_USERNAME")]
        username: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();

    let action = match cli.command {
        Commands::Token {
            auth,
            format,
            catalog,
        } => {
            let mut settings = resolve_settings(config_path, &auth, format.as_deref())?;
            let mode = if catalog {
                CatalogMode::Include
            } else {
                CatalogMode::Suppress
            };
            let (_, result) = login(&mut settings, mode).await?;
            let output = render(&result.token, result.body(), settings.format)
                .map_err(TokenToolError::from)?;
            TerminalAction::Print(output)
        }
        Commands::Curl { auth, args } => {
            let mut settings = resolve_settings(config_path, &auth, None)?;
            let (validated, result) = login(&mut settings, CatalogMode::Include).await?;
            if result.catalog.is_empty() {
                tracing::warn!("service catalog is empty, catalog variables expand to nothing");
            }
            let variables = result.catalog.variables(validated.region.as_deref());
            TerminalAction::curl(
                &settings.curl,
                &result.token.subject_token,
                substitute(&args, &variables),
            )
        }
        Commands::Variables { auth } => {
            let mut settings = resolve_settings(config_path, &auth, None)?;
            let (validated, result) = login(&mut settings, CatalogMode::Include).await?;
            let variables = result.catalog.variables(validated.region.as_deref());
            let output: String = variables
                .iter()
                .map(|(name, url)| format!("{}={}\n", name, url))
                .collect();
            TerminalAction::Print(output)
        }
        Commands::Password { action } => {
            let file = load_config(config_path)?;
            manage_password(action, &file).await?
        }
        Commands::Version => TerminalAction::Print(format!("{}\n", env!("CARGO_PKG_VERSION"))),
    };

    action.run()
}

fn resolve_settings(
    config_path: Option<&Path>,
    auth: &AuthArgs,
    format: Option<&str>,
) -> Result<Settings> {
    let file = load_config(config_path)?;
    Settings::resolve(auth, &file, format)
}

/// Validate, fetch a missing password if that is all that is lacking, then
/// authenticate.
async fn login(
    settings: &mut Settings,
    catalog: CatalogMode,
) -> Result<(ValidatedAuth, Authentication)> {
    let validated = match validate(&settings.credentials, &settings.scope) {
        Err(ValidationError::MissingPassword) => {
            let store = create_store(settings.keyring, &settings.keyring_service);
            let source = if settings.password_stdin {
                LineSource::Stdin
            } else {
                LineSource::Prompt
            };
            fill_password(
                &mut settings.credentials,
                store.as_deref(),
                source,
                &mut std::io::stdin().lock(),
                &mut std::io::stderr(),
            )
            .await?;
            validate(&settings.credentials, &settings.scope).map_err(TokenToolError::from)?
        }
        other => other.map_err(TokenToolError::from)?,
    };

    info!(endpoint = %validated.endpoint, "requesting token");
    let client = KeystoneClient::new(validated.endpoint.clone(), &settings.transport)
        .map_err(TokenToolError::from)?;
    let result = authenticate(&client, &validated, catalog).await?;

    Ok((validated, result))
}

async fn manage_password(action: PasswordCommand, file: &FileConfig) -> Result<TerminalAction> {
    let service = file.keyring_service();
    let store = KeyringStore::try_new(&service)
        .map_err(TokenToolError::from)
        .context("The OS keyring is required to manage stored passwords")?;

    match action {
        PasswordCommand::Set {
            username,
            password_stdin,
        } => {
            let mut input = std::io::stdin().lock();
            let password = if password_stdin {
                read_password_line(&mut input)?
            } else {
                prompt_password(
                    &format!("Enter password for user {}: ", username),
                    &mut input,
                    &mut std::io::stderr(),
                )?
            };
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                bail!("no password given for user {}", username);
            };

            store
                .set(&username, &password)
                .await
                .map_err(TokenToolError::from)?;
            Ok(TerminalAction::Print(format!(
                "Stored password for {} in keyring service '{}'\n",
                username, service
            )))
        }
        PasswordCommand::Forget { username } => {
            store
                .delete(&username)
                .await
                .map_err(TokenToolError::from)?;
            Ok(TerminalAction::Print(format!(
                "Removed password for {} from keyring service '{}'\n",
                username, service
            )))
        }
    }
}
