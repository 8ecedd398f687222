//! Top-level error types for token-tool.

use thiserror::Error;

use crate::format::FormatError;
use crate::model::ValidationError;
use crate::store::StoreError;
use crate::token::ExtractError;
use crate::transport::TransportError;

/// Top-level error type encompassing all token-tool errors.
///
/// Every variant is terminal for one invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum TokenToolError {
    /// Inputs rejected before any network call.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Client setup, network or Keystone failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response could not be interpreted.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Output rendering failed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Password store failure.
    #[error("password store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
