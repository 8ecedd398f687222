//! Keystone v3 authentication request body.
//!
//! [`build`] converts a [`ValidatedAuth`] into an [`AuthRequest`], the typed
//! form of the `POST /v3/auth/tokens` body:
//!
//! ```json
//! {"auth": {"identity": {"methods": ["password"],
//!                        "password": {"user": {"name": "alice",
//!                                              "domain": {"name": "acme"},
//!                                              "password": "..."}}},
//!           "scope": {"project": {"name": "proj1", "domain": {"name": "acme"}}}}}
//! ```
//!
//! Optional members are omitted rather than sent as `null`. In particular an
//! unscoped request has no `scope` key at all, which Keystone treats
//! differently from an empty scope object.

use serde::Serialize;

use crate::model::{
    ApplicationCredentialRef, AuthMethod, DomainRef, ScopeSelection, UserIdentity, ValidatedAuth,
};
use crate::store::Secret;

/// Top-level request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    pub auth: Auth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Auth {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

/// Authentication methods understood by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Password,
    ApplicationCredential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub methods: Vec<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_credential: Option<ApplicationCredentialAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordAuth {
    pub user: User,
}

/// A user, by id or by name within a domain.
///
/// `password` is only set inside the password method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationCredentialAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub secret: Secret,
}

/// Domain reference on the wire: exactly one of `id` or `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Domain {
    /// Prefer the id when both are known. `None` when neither is.
    fn from_ref(domain: &DomainRef) -> Option<Self> {
        match (&domain.id, &domain.name) {
            (Some(id), _) => Some(Self {
                id: Some(id.clone()),
                name: None,
            }),
            (None, Some(name)) => Some(Self {
                id: None,
                name: Some(name.clone()),
            }),
            (None, None) => None,
        }
    }
}

/// Authorization scope. Serialized externally tagged, e.g. `{"project": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Project(ProjectScope),
    Domain(Domain),
    System(SystemScope),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemScope {
    pub all: bool,
}

impl AuthRequest {
    /// Serialize the body.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The method this request authenticates with.
    pub fn method(&self) -> Method {
        self.auth
            .identity
            .methods
            .first()
            .copied()
            .unwrap_or(Method::Password)
    }
}

/// Build the request body for validated inputs.
pub fn build(auth: &ValidatedAuth) -> AuthRequest {
    let identity = match &auth.method {
        AuthMethod::Password { user, password } => {
            let mut user = user_from_identity(user);
            user.password = Some(password.clone());
            Identity {
                methods: vec![Method::Password],
                password: Some(PasswordAuth { user }),
                application_credential: None,
            }
        }
        AuthMethod::ApplicationCredential { credential, secret } => {
            let application_credential = match credential {
                ApplicationCredentialRef::Id(id) => ApplicationCredentialAuth {
                    id: Some(id.clone()),
                    name: None,
                    user: None,
                    secret: secret.clone(),
                },
                ApplicationCredentialRef::Name { name, user } => ApplicationCredentialAuth {
                    id: None,
                    name: Some(name.clone()),
                    user: Some(user_from_identity(user)),
                    secret: secret.clone(),
                },
            };
            Identity {
                methods: vec![Method::ApplicationCredential],
                password: None,
                application_credential: Some(application_credential),
            }
        }
    };

    let scope = match (&auth.method, &auth.scope) {
        (_, None) => None,
        (AuthMethod::ApplicationCredential { .. }, Some(_)) => {
            tracing::warn!("application credentials carry their own scope, ignoring the requested one");
            None
        }
        (AuthMethod::Password { .. }, Some(selection)) => Some(scope_from_selection(selection)),
    };

    AuthRequest {
        auth: Auth { identity, scope },
    }
}

fn user_from_identity(user: &UserIdentity) -> User {
    match user {
        UserIdentity::Id(id) => User {
            id: Some(id.clone()),
            name: None,
            domain: None,
            password: None,
        },
        UserIdentity::Name { name, domain } => User {
            id: None,
            name: Some(name.clone()),
            domain: Domain::from_ref(domain),
            password: None,
        },
    }
}

fn scope_from_selection(selection: &ScopeSelection) -> Scope {
    match selection {
        ScopeSelection::Project { id, name, domain } => Scope::Project(ProjectScope {
            id: id.clone(),
            // A project id is unique on its own.
            name: if id.is_some() { None } else { name.clone() },
            domain: if id.is_some() {
                None
            } else {
                Domain::from_ref(domain)
            },
        }),
        ScopeSelection::Domain(domain) => Scope::Domain(Domain::from_ref(domain).unwrap_or(Domain {
            id: None,
            name: None,
        })),
        ScopeSelection::System => Scope::System(SystemScope { all: true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CredentialInput, ScopeInput, validate};
    use serde_json::{Value, json};

    fn body(credentials: CredentialInput, scope: ScopeInput) -> Value {
        let auth = validate(&credentials, &scope).unwrap();
        serde_json::from_slice(&build(&auth).to_json().unwrap()).unwrap()
    }

    fn alice() -> CredentialInput {
        CredentialInput {
            auth_url: Some("https://keystone.example.com/v3".to_string()),
            username: Some("alice".to_string()),
            user_domain_name: Some("acme".to_string()),
            password: Some(Secret::new("pw")),
            ..Default::default()
        }
    }

    #[test]
    fn test_password_project_scoped_body() {
        let scope = ScopeInput {
            project_name: Some("proj1".to_string()),
            project_domain_name: Some("acme".to_string()),
            ..Default::default()
        };

        assert_eq!(
            body(alice(), scope),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": "alice",
                                "domain": {"name": "acme"},
                                "password": "pw"
                            }
                        }
                    },
                    "scope": {
                        "project": {"name": "proj1", "domain": {"name": "acme"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_user_id_omits_name_and_domain() {
        let credentials = CredentialInput {
            user_id: Some("u1".to_string()),
            ..alice()
        };
        let value = body(credentials, ScopeInput::default());
        let user = &value["auth"]["identity"]["password"]["user"];

        assert_eq!(user, &json!({"id": "u1", "password": "pw"}));
    }

    #[test]
    fn test_unscoped_request_has_no_scope_key() {
        let value = body(alice(), ScopeInput::default());
        let auth = value["auth"].as_object().unwrap();
        assert!(!auth.contains_key("scope"));
    }

    #[test]
    fn test_domain_id_preferred_over_name() {
        let credentials = CredentialInput {
            user_domain_id: Some("d1".to_string()),
            ..alice()
        };
        let value = body(credentials, ScopeInput::default());
        assert_eq!(
            value["auth"]["identity"]["password"]["user"]["domain"],
            json!({"id": "d1"})
        );
    }

    #[test]
    fn test_project_id_scope() {
        let scope = ScopeInput {
            project_id: Some("p1".to_string()),
            project_name: Some("ignored".to_string()),
            ..Default::default()
        };
        let value = body(alice(), scope);
        assert_eq!(value["auth"]["scope"], json!({"project": {"id": "p1"}}));
    }

    #[test]
    fn test_domain_and_system_scope() {
        let scope = ScopeInput {
            domain_name: Some("acme".to_string()),
            ..Default::default()
        };
        assert_eq!(
            body(alice(), scope)["auth"]["scope"],
            json!({"domain": {"name": "acme"}})
        );

        let scope = ScopeInput {
            system_all: true,
            ..Default::default()
        };
        assert_eq!(
            body(alice(), scope)["auth"]["scope"],
            json!({"system": {"all": true}})
        );
    }

    #[test]
    fn test_application_credential_by_id() {
        let credentials = CredentialInput {
            auth_url: Some("https://keystone.example.com".to_string()),
            application_credential_id: Some("ac1".to_string()),
            application_credential_secret: Some(Secret::new("s3cr3t")),
            ..Default::default()
        };
        let scope = ScopeInput {
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        let auth = validate(&credentials, &scope).unwrap();
        let request = build(&auth);
        assert_eq!(request.method(), Method::ApplicationCredential);

        let value: Value = serde_json::from_slice(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {"id": "ac1", "secret": "s3cr3t"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_application_credential_by_name_carries_user() {
        let credentials = CredentialInput {
            password: None,
            application_credential_name: Some("ci".to_string()),
            application_credential_secret: Some(Secret::new("s3cr3t")),
            ..alice()
        };
        let value = body(credentials, ScopeInput::default());
        assert_eq!(
            value["auth"]["identity"]["application_credential"],
            json!({
                "name": "ci",
                "user": {"name": "alice", "domain": {"name": "acme"}},
                "secret": "s3cr3t"
            })
        );
        assert!(value["auth"]["identity"].get("password").is_none());
    }
}
