//! Settings for one invocation.
//!
//! Every value is taken from the first source that has it: command-line
//! flag, `OS_*` environment variable (filled in by clap), the TOML config
//! file, then the built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use directories::ProjectDirs;
use serde::Deserialize;
use tokentool_core::store::DEFAULT_KEYRING_SERVICE;
use tokentool_core::transport::DEFAULT_TIMEOUT;
use tokentool_core::{
    ClientCertificate, CredentialInput, OutputFormat, ScopeInput, Secret, TransportOptions,
};

/// File name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Program started by the `curl` command unless configured otherwise.
pub const DEFAULT_CURL: &str = "curl";

/// Authentication flags shared by every command that talks to Keystone.
#[derive(Debug, Clone, Default, Args)]
pub struct AuthArgs {
    /// Identity endpoint, e.g. https://keystone.example.com/v3
    #[arg(short = 'e', long, env = "OS_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Region; selects the endpoint when no --auth-url is given
    #[arg(long, env = "OS_REGION_NAME")]
    pub region: Option<String>,

    /// User ID
    #[arg(long, env = "OS_USER_ID")]
    pub user_id: Option<String>,

    /// Username
    #[arg(short = 'u', long, env = "OS_USERNAME")]
    pub username: Option<String>,

    /// Domain ID of the user
    #[arg(long, env = "OS_USER_DOMAIN_ID")]
    pub user_domain_id: Option<String>,

    /// Domain name of the user
    #[arg(short = 'd', long, env = "OS_USER_DOMAIN_NAME")]
    pub user_domain_name: Option<String>,

    /// Password (looked up in the keyring or prompted for when absent)
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub password: Option<Secret>,

    /// Read the password from the first line of stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,

    /// Project ID to scope to
    #[arg(long, env = "OS_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Project name to scope to
    #[arg(short = 'p', long, env = "OS_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// Domain ID of the project
    #[arg(long, env = "OS_PROJECT_DOMAIN_ID")]
    pub project_domain_id: Option<String>,

    /// Domain name of the project
    #[arg(short = 'q', long, env = "OS_PROJECT_DOMAIN_NAME")]
    pub project_domain_name: Option<String>,

    /// Domain ID to scope to
    #[arg(long, env = "OS_DOMAIN_ID")]
    pub domain_id: Option<String>,

    /// Domain name to scope to
    #[arg(long, env = "OS_DOMAIN_NAME")]
    pub domain_name: Option<String>,

    /// Request a system-scoped token
    #[arg(long)]
    pub system_scope: bool,

    /// Application credential ID
    #[arg(long, env = "OS_APPLICATION_CREDENTIAL_ID")]
    pub application_credential_id: Option<String>,

    /// Application credential name
    #[arg(long, env = "OS_APPLICATION_CREDENTIAL_NAME")]
    pub application_credential_name: Option<String>,

    /// Application credential secret
    #[arg(long, env = "OS_APPLICATION_CREDENTIAL_SECRET", hide_env_values = true)]
    pub application_credential_secret: Option<Secret>,

    /// PEM client certificate for mutual TLS
    #[arg(long, env = "OS_CERT")]
    pub cert: Option<PathBuf>,

    /// PEM private key for --cert (defaults to the certificate file)
    #[arg(long, env = "OS_KEY")]
    pub key: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Do not look up the password in the OS keyring
    #[arg(long)]
    pub no_keyring: bool,
}

impl AuthArgs {
    fn has_scope(&self) -> bool {
        [
            &self.project_id,
            &self.project_name,
            &self.domain_id,
            &self.domain_name,
        ]
        .into_iter()
        .any(|value| non_empty(value).is_some())
            || self.system_scope
    }
}

/// Contents of the optional config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub auth_url: Option<String>,
    pub region: Option<String>,
    pub endpoint_template: Option<String>,
    pub username: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub format: Option<String>,
    pub timeout_secs: Option<u64>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub keyring: Option<bool>,
    pub keyring_service: Option<String>,
    pub curl: Option<String>,
}

impl FileConfig {
    /// Keyring service passwords are stored under.
    pub fn keyring_service(&self) -> String {
        non_empty(&self.keyring_service).unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string())
    }
}

/// Default location of the config file, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "token-tool").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load the config file.
///
/// An explicitly given file must exist. The default file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    match explicit {
        Some(path) => read_config(path),
        None => match default_config_path() {
            Some(path) if path.exists() => read_config(&path),
            _ => Ok(FileConfig::default()),
        },
    }
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", path))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Everything one authentication needs, after merging all sources.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: CredentialInput,
    pub scope: ScopeInput,
    pub format: OutputFormat,
    pub transport: TransportOptions,
    /// Look up missing passwords in the OS keyring.
    pub keyring: bool,
    pub keyring_service: String,
    pub password_stdin: bool,
    pub curl: String,
}

impl Settings {
    /// Merge flags over the config file.
    ///
    /// `format` is the `--format` flag of the `token` command. Scope flags
    /// replace the configured project as a whole, so `--domain-name` is not
    /// overridden by a `project_name` from the file.
    pub fn resolve(args: &AuthArgs, file: &FileConfig, format: Option<&str>) -> Result<Self> {
        let credentials = CredentialInput {
            auth_url: pick(&args.auth_url, &file.auth_url),
            region: pick(&args.region, &file.region),
            endpoint_template: non_empty(&file.endpoint_template),
            user_id: non_empty(&args.user_id),
            username: pick(&args.username, &file.username),
            user_domain_id: pick(&args.user_domain_id, &file.user_domain_id),
            user_domain_name: pick(&args.user_domain_name, &file.user_domain_name),
            password: args.password.clone().filter(|secret| !secret.is_empty()),
            application_credential_id: non_empty(&args.application_credential_id),
            application_credential_name: non_empty(&args.application_credential_name),
            application_credential_secret: args
                .application_credential_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
        };

        let scope = if args.has_scope() {
            ScopeInput {
                project_id: non_empty(&args.project_id),
                project_name: non_empty(&args.project_name),
                project_domain_id: non_empty(&args.project_domain_id),
                project_domain_name: non_empty(&args.project_domain_name),
                domain_id: non_empty(&args.domain_id),
                domain_name: non_empty(&args.domain_name),
                system_all: args.system_scope,
            }
        } else {
            ScopeInput {
                project_name: non_empty(&file.project_name),
                project_domain_id: pick(&args.project_domain_id, &file.project_domain_id),
                project_domain_name: pick(&args.project_domain_name, &file.project_domain_name),
                ..Default::default()
            }
        };

        let format = match format.or(file.format.as_deref()) {
            Some(name) => name.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };

        let timeout = match args.timeout.or(file.timeout_secs) {
            Some(0) => bail!("timeout must be at least one second"),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TIMEOUT,
        };

        let cert = args.cert.clone().or_else(|| file.cert.clone());
        let key = args.key.clone().or_else(|| file.key.clone());
        let client_certificate = match (cert, key) {
            (Some(cert), Some(key)) => Some(ClientCertificate::new(cert, key)),
            (Some(cert), None) => Some(ClientCertificate::new(cert.clone(), cert)),
            (None, Some(key)) => bail!(
                "client key {:?} given without a client certificate",
                key
            ),
            (None, None) => None,
        };

        Ok(Self {
            credentials,
            scope,
            format,
            transport: TransportOptions {
                timeout,
                client_certificate,
            },
            keyring: !args.no_keyring && file.keyring.unwrap_or(true),
            keyring_service: file.keyring_service(),
            password_stdin: args.password_stdin,
            curl: non_empty(&file.curl).unwrap_or_else(|| DEFAULT_CURL.to_string()),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn pick(flag: &Option<String>, file: &Option<String>) -> Option<String> {
    non_empty(flag).or_else(|| non_empty(file))
}
