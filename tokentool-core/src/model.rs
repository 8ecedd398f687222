//! Credential and scope model.
//!
//! This module defines the inputs of an authentication and their validity
//! rules:
//! - [`CredentialInput`] - endpoint, user identity and secret material
//! - [`ScopeInput`] - optional project, domain or system scope
//! - [`validate`] - turns both into a [`ValidatedAuth`] or the first
//!   [`ValidationError`] encountered
//!
//! Nothing in here touches the network.

use thiserror::Error;
use url::Url;

use crate::store::Secret;

/// Identity endpoint used when only a region is known.
///
/// `{region}` is replaced with the region name.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://identity-3.{region}.cloud.sap/v3";

/// Client-side validation failures, reported before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither an identity endpoint nor a region was given.
    #[error("an identity endpoint (auth URL) or a region is required")]
    MissingEndpoint,

    /// The identity endpoint is not a valid absolute URL.
    #[error("invalid identity endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },

    /// No user id and no username were given.
    #[error("a username is required when no user id is given")]
    MissingUsername,

    /// A username was given without any way to resolve its domain.
    #[error("a user domain name or id is required for user '{username}'")]
    MissingUserDomain { username: String },

    /// The password path was chosen with an empty password.
    #[error("an empty password is not supported")]
    MissingPassword,

    /// An application credential was named without its secret.
    #[error("an application credential secret is required")]
    MissingApplicationCredentialSecret,
}

/// Identity inputs and endpoint selection for one authentication.
///
/// Empty strings are treated the same as absent values, so fields can be fed
/// straight from flags or environment variables.
#[derive(Debug, Clone, Default)]
pub struct CredentialInput {
    /// Explicit identity endpoint, e.g. `https://keystone.example.com/v3`.
    pub auth_url: Option<String>,
    /// Region used to derive the endpoint when `auth_url` is absent.
    pub region: Option<String>,
    /// Template for region-derived endpoints; see [`DEFAULT_ENDPOINT_TEMPLATE`].
    pub endpoint_template: Option<String>,

    pub user_id: Option<String>,
    pub username: Option<String>,
    pub user_domain_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub password: Option<Secret>,

    pub application_credential_id: Option<String>,
    pub application_credential_name: Option<String>,
    pub application_credential_secret: Option<Secret>,
}

impl CredentialInput {
    /// Whether the application-credential method will be used.
    pub fn uses_application_credential(&self) -> bool {
        present(&self.application_credential_id).is_some()
            || present(&self.application_credential_name).is_some()
    }
}

/// Scope inputs. All fields optional; see [`ScopeInput::selection`].
#[derive(Debug, Clone, Default)]
pub struct ScopeInput {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub project_domain_id: Option<String>,
    pub project_domain_name: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    /// Request a system-scoped token for the whole deployment.
    pub system_all: bool,
}

impl ScopeInput {
    /// Pick the single scope variant these inputs describe.
    ///
    /// Precedence is project, then domain, then system. Returns `None` for an
    /// unscoped request.
    pub fn selection(&self) -> Option<ScopeSelection> {
        if present(&self.project_id).is_some() || present(&self.project_name).is_some() {
            return Some(ScopeSelection::Project {
                id: owned(&self.project_id),
                name: owned(&self.project_name),
                domain: DomainRef::new(
                    owned(&self.project_domain_id),
                    owned(&self.project_domain_name),
                ),
            });
        }

        let domain = DomainRef::new(owned(&self.domain_id), owned(&self.domain_name));
        if !domain.is_empty() {
            return Some(ScopeSelection::Domain(domain));
        }

        if self.system_all {
            return Some(ScopeSelection::System);
        }

        None
    }
}

/// A domain identified by id, name, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl DomainRef {
    pub fn new(id: Option<String>, name: Option<String>) -> Self {
        Self {
            id: id.filter(|s| !s.is_empty()),
            name: name.filter(|s| !s.is_empty()),
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(Some(id.into()), None)
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(None, Some(name.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// The resolved scope of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelection {
    /// Project scope. `domain` may be empty when the project is given by id,
    /// or when nothing could be inherited; the server decides in that case.
    Project {
        id: Option<String>,
        name: Option<String>,
        domain: DomainRef,
    },
    /// Domain-scoped token.
    Domain(DomainRef),
    /// System scope (`{"system": {"all": true}}`).
    System,
}

/// How the user is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentity {
    Id(String),
    Name { name: String, domain: DomainRef },
}

/// How the application credential is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationCredentialRef {
    Id(String),
    /// Names are only unique per user, so the owning user is required.
    Name { name: String, user: UserIdentity },
}

/// The authentication method together with its secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password {
        user: UserIdentity,
        password: Secret,
    },
    ApplicationCredential {
        credential: ApplicationCredentialRef,
        secret: Secret,
    },
}

/// Inputs that passed [`validate`]; ready for the request builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAuth {
    /// Identity API v3 base URL; always ends in `/v3`.
    pub endpoint: Url,
    /// Region the endpoint was derived from, if any. Also used to filter the
    /// service catalog.
    pub region: Option<String>,
    pub method: AuthMethod,
    pub scope: Option<ScopeSelection>,
}

/// Validate credential and scope inputs.
///
/// Rules are checked in order and the first violation is returned:
/// endpoint, user identification, then secret material. A partially given
/// scope is passed through untouched.
pub fn validate(
    credentials: &CredentialInput,
    scope: &ScopeInput,
) -> Result<ValidatedAuth, ValidationError> {
    let endpoint = resolve_endpoint(credentials)?;
    let mut selection = scope.selection();

    let method = if credentials.uses_application_credential() {
        let credential = match owned(&credentials.application_credential_id) {
            Some(id) => ApplicationCredentialRef::Id(id),
            None => ApplicationCredentialRef::Name {
                name: owned(&credentials.application_credential_name).unwrap_or_default(),
                user: resolve_user(credentials, selection.as_ref())?,
            },
        };
        let secret = credentials
            .application_credential_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingApplicationCredentialSecret)?;
        AuthMethod::ApplicationCredential { credential, secret }
    } else {
        let user = resolve_user(credentials, selection.as_ref())?;
        let password = credentials
            .password
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingPassword)?;
        AuthMethod::Password { user, password }
    };

    // A project named without its domain lives in the user's domain unless
    // told otherwise.
    if let (
        Some(ScopeSelection::Project {
            id: None,
            domain: project_domain,
            ..
        }),
        AuthMethod::Password {
            user: UserIdentity::Name { domain, .. },
            ..
        },
    ) = (selection.as_mut(), &method)
    {
        if project_domain.is_empty() {
            tracing::debug!("project domain not given, inheriting the user domain");
            *project_domain = domain.clone();
        }
    }

    Ok(ValidatedAuth {
        endpoint,
        region: owned(&credentials.region),
        method,
        scope: selection,
    })
}

/// Resolve the identity endpoint from the explicit URL or the region template.
pub fn resolve_endpoint(credentials: &CredentialInput) -> Result<Url, ValidationError> {
    let raw = match (present(&credentials.auth_url), present(&credentials.region)) {
        (Some(url), _) => url.to_string(),
        (None, Some(region)) => present(&credentials.endpoint_template)
            .unwrap_or(DEFAULT_ENDPOINT_TEMPLATE)
            .replace("{region}", region),
        (None, None) => return Err(ValidationError::MissingEndpoint),
    };

    let mut url = Url::parse(&raw).map_err(|e| ValidationError::InvalidEndpoint {
        url: raw.clone(),
        message: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ValidationError::InvalidEndpoint {
            url: raw,
            message: "not a hierarchical URL".to_string(),
        });
    }

    let last_segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(str::to_string);
    if last_segment.as_deref() != Some("v3") {
        let path = format!("{}/v3", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    Ok(url)
}

fn resolve_user(
    credentials: &CredentialInput,
    scope: Option<&ScopeSelection>,
) -> Result<UserIdentity, ValidationError> {
    if let Some(id) = owned(&credentials.user_id) {
        return Ok(UserIdentity::Id(id));
    }

    let name = owned(&credentials.username).ok_or(ValidationError::MissingUsername)?;

    let mut domain = DomainRef::new(
        owned(&credentials.user_domain_id),
        owned(&credentials.user_domain_name),
    );
    if domain.is_empty() {
        domain = match scope {
            Some(ScopeSelection::Project { domain, .. }) => domain.clone(),
            Some(ScopeSelection::Domain(domain)) => domain.clone(),
            _ => DomainRef::default(),
        };
        if !domain.is_empty() {
            tracing::debug!(username = %name, "user domain not given, inheriting the scope domain");
        }
    }
    if domain.is_empty() {
        return Err(ValidationError::MissingUserDomain { username: name });
    }

    Ok(UserIdentity::Name { name, domain })
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn owned(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}
