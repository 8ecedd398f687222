//! Token record extraction.
//!
//! Keystone answers a token creation with the token itself in the
//! `X-Subject-Token` header and its metadata in a `{"token": {...}}` body.
//! [`TokenRecord::from_response`] reads both. Only a body that is not JSON, or
//! JSON without a `token` object, is an error: individual fields that are
//! missing or have an unexpected shape fall back to empty values.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::Secret;
use crate::transport::RawResponse;

/// Error type for response extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The body is not JSON at all.
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// The body is JSON but not a token creation result.
    #[error("unexpected response shape: {message}")]
    UnexpectedResponseShape { message: String },
}

/// A role granted on the token's scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
}

/// Id and name of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainInfo {
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
}

/// A user or project, together with its owning domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopedEntity {
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    pub domain: DomainInfo,
}

/// The result of one successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub subject_token: Secret,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub is_domain: bool,
    pub is_admin_project: bool,
    pub methods: Vec<String>,
    pub roles: Vec<Role>,
    pub audit_ids: Vec<String>,
    pub user: ScopedEntity,
    pub project: ScopedEntity,
    /// Set for domain-scoped tokens.
    pub domain: DomainInfo,
}

impl TokenRecord {
    /// Extract the record from a token creation response.
    pub fn from_response(response: &RawResponse) -> Result<Self, ExtractError> {
        let body: Value = serde_json::from_slice(&response.body)?;
        Self::from_body(response.subject_token.clone(), &body)
    }

    /// Extract the record from an already parsed body.
    pub fn from_body(subject_token: Secret, body: &Value) -> Result<Self, ExtractError> {
        let token = token_object(body)?;

        Ok(Self {
            subject_token,
            expires_at: timestamp(token, "expires_at"),
            issued_at: timestamp(token, "issued_at"),
            is_domain: field(token, "is_domain"),
            is_admin_project: field(token, "is_admin_project"),
            methods: field(token, "methods"),
            roles: field(token, "roles"),
            audit_ids: field(token, "audit_ids"),
            user: field(token, "user"),
            project: field(token, "project"),
            domain: field(token, "domain"),
        })
    }

    /// Names of the granted roles, in the order Keystone listed them.
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|role| role.name.as_str())
    }
}

/// The `token` object of a response body.
pub(crate) fn token_object(body: &Value) -> Result<&Map<String, Value>, ExtractError> {
    body.get("token")
        .and_then(Value::as_object)
        .ok_or_else(|| ExtractError::UnexpectedResponseShape {
            message: "body has no \"token\" object".to_string(),
        })
}

/// Read a string member, treating `null` like an absent value.
pub(crate) fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize one member, or its default when absent or malformed.
fn field<T: DeserializeOwned + Default>(token: &Map<String, Value>, key: &str) -> T {
    match token.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => T::deserialize(value).unwrap_or_else(|e| {
            tracing::warn!(field = key, "ignoring malformed token field: {}", e);
            T::default()
        }),
    }
}

fn timestamp(token: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = token.get(key)?.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(field = key, value = raw, "ignoring unparseable timestamp: {}", e);
            None
        }
    }
}
