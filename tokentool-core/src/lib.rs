//! # token-tool core
//!
//! Core library for retrieving OpenStack Keystone (identity v3) tokens.
//!
//! This crate provides:
//! - A credential and scope model with client-side validation
//! - A typed builder for the `POST /v3/auth/tokens` request body
//! - A `reqwest` transport with optional mutual TLS
//! - Extraction of the token record and service catalog from the response
//! - Text, JSON and curlrc rendering, and catalog variable substitution
//! - Password lookup in the OS keyring (optional `keyring-store` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokentool_core::{
//!     CatalogMode, CredentialInput, KeystoneClient, OutputFormat, ScopeInput,
//!     TransportOptions, authenticate, render, validate,
//! };
//!
//! async fn print_token(credentials: CredentialInput, scope: ScopeInput)
//!     -> Result<(), tokentool_core::TokenToolError>
//! {
//!     let auth = validate(&credentials, &scope)?;
//!     let client = KeystoneClient::new(auth.endpoint.clone(), &TransportOptions::default())?;
//!     let result = authenticate(&client, &auth, CatalogMode::Suppress).await?;
//!     print!("{}", render(&result.token, result.body(), OutputFormat::Text)?);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod format;
pub mod model;
pub mod request;
pub mod session;
pub mod store;
pub mod substitute;
pub mod token;
pub mod transport;

// Re-export commonly used types at crate root
pub use model::{
    CredentialInput,
    ScopeInput,
    ValidatedAuth,
    ValidationError,
    validate,
};

pub use request::{AuthRequest, build};

pub use transport::{
    CatalogMode,
    ClientCertificate,
    KeystoneClient,
    RawResponse,
    TokenIssuer,
    TransportError,
    TransportOptions,
};

pub use token::{ExtractError, Role, TokenRecord};

pub use catalog::ServiceCatalog;

pub use format::{FormatError, OutputFormat, render};

pub use substitute::substitute;

pub use session::{Authentication, authenticate};

pub use store::{
    Secret,
    SecretStore,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use error::TokenToolError;
