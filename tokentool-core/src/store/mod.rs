//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for password storage backends
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Opens the keyring when it is wanted and reachable
//!
//! # Storage Key Convention
//!
//! Passwords are keyed by the OpenStack username. The keyring backend stores
//! them under a service name (`openstack` by default), so an entry created with
//! `security add-generic-password -s openstack -a <user>` on macOS is found.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokentool_core::store::{Secret, SecretStore, create_store};
//!
//! if let Some(store) = create_store(true, "openstack") {
//!     store.set("alice", &Secret::new("pw")).await?;
//!     let password = store.get("alice").await?;
//!     assert_eq!(password.unwrap().expose(), "pw");
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "keyring-store")]
mod keyring;

#[cfg(feature = "keyring-store")]
pub use self::keyring::KeyringStore;

/// Keyring service name used by the OpenStack tooling for stored passwords.
pub const DEFAULT_KEYRING_SERVICE: &str = "openstack";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the memory is wiped when the secret is dropped. Serialization writes
/// the plain value, which is what the Keystone request body needs.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the secret was denied.
    #[error("access denied to secret: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over password storage backends.
///
/// [`KeyringStore`] (with the `keyring-store` feature) is the production
/// backend.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Open the password store, if one should be consulted.
///
/// Returns `None` when `prefer_keyring` is `false`, when the crate was built
/// without the `keyring-store` feature, or when the platform keyring cannot
/// be opened. Callers then fall through to reading the password.
pub fn create_store(prefer_keyring: bool, service_name: &str) -> Option<Box<dyn SecretStore>> {
    if !prefer_keyring {
        tracing::debug!("keyring lookup disabled");
        return None;
    }

    open_keyring(service_name)
}

#[cfg(feature = "keyring-store")]
fn open_keyring(service_name: &str) -> Option<Box<dyn SecretStore>> {
    match KeyringStore::try_new(service_name) {
        Ok(store) => {
            tracing::debug!(service = service_name, "using OS keyring for password lookup");
            Some(Box::new(store))
        }
        Err(e) => {
            tracing::warn!("Keyring unavailable ({}), passwords will not be looked up", e);
            None
        }
    }
}

#[cfg(not(feature = "keyring-store"))]
fn open_keyring(service_name: &str) -> Option<Box<dyn SecretStore>> {
    tracing::warn!(
        service = service_name,
        "Keyring lookup requested but keyring-store feature not enabled"
    );
    None
}
