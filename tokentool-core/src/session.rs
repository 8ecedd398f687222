//! The authentication pipeline: build, send, extract.

use crate::catalog::ServiceCatalog;
use crate::error::TokenToolError;
use crate::model::ValidatedAuth;
use crate::request;
use crate::token::TokenRecord;
use crate::transport::{CatalogMode, RawResponse, TokenIssuer};

/// Everything one successful authentication produced.
#[derive(Debug, Clone)]
pub struct Authentication {
    pub token: TokenRecord,
    /// Empty when the catalog was suppressed.
    pub catalog: ServiceCatalog,
    pub response: RawResponse,
}

impl Authentication {
    /// Raw response body, as received.
    pub fn body(&self) -> &[u8] {
        &self.response.body
    }
}

/// Authenticate with validated inputs.
///
/// Either every step succeeds or the first failure is returned; no partial
/// token is handed out.
pub async fn authenticate<I>(
    issuer: &I,
    auth: &ValidatedAuth,
    catalog: CatalogMode,
) -> Result<Authentication, TokenToolError>
where
    I: TokenIssuer + ?Sized,
{
    let request = request::build(auth);
    tracing::debug!(endpoint = %auth.endpoint, method = ?request.method(), "authenticating");

    let response = issuer.issue(&request, catalog).await?;

    let body: serde_json::Value = serde_json::from_slice(&response.body)
        .map_err(crate::token::ExtractError::from)?;
    let token = TokenRecord::from_body(response.subject_token.clone(), &body)?;
    let catalog = match catalog {
        CatalogMode::Include => ServiceCatalog::from_body(&body)?,
        CatalogMode::Suppress => ServiceCatalog::default(),
    };

    tracing::debug!(
        user = %token.user.id,
        project = %token.project.id,
        roles = token.roles.len(),
        services = catalog.entries.len(),
        "token extracted"
    );

    Ok(Authentication {
        token,
        catalog,
        response,
    })
}
