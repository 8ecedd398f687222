//! Service catalog extraction.
//!
//! Keystone sends the catalog as `token.catalog`, a list of services with
//! their endpoints. Some clients wrap that list as `{"entries": [...]}`; both
//! shapes are accepted. A response requested with `?nocatalog`, or one whose
//! catalog cannot be read, yields an empty catalog.
//!
//! [`ServiceCatalog::variables`] flattens the catalog into the names used by
//! [`substitute`](crate::substitute):
//!
//! | variable              | value                                 |
//! |-----------------------|---------------------------------------|
//! | `COMPUTE_PUBLIC`      | `compute` endpoint, `public` interface   |
//! | `COMPUTE_INTERNAL`    | `compute` endpoint, `internal` interface |
//! | `COMPUTE`             | same as `COMPUTE_PUBLIC`              |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::token::{ExtractError, null_as_empty, token_object};
use crate::transport::RawResponse;

/// Interface name the bare service-type alias points at.
pub const DEFAULT_INTERFACE: &str = "public";

/// One endpoint of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub interface: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub region: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub region_id: String,
}

impl Endpoint {
    /// Region name, falling back to the older `region_id`.
    pub fn region(&self) -> &str {
        if self.region.is_empty() {
            &self.region_id
        } else {
            &self.region
        }
    }
}

/// A service and its endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_empty")]
    pub service_type: String,
    pub endpoints: Vec<Endpoint>,
}

/// The service catalog of a token, in the order Keystone listed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    pub entries: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogShape {
    List(Vec<CatalogEntry>),
    Wrapped { entries: Vec<CatalogEntry> },
}

impl ServiceCatalog {
    /// Extract the catalog from a token creation response.
    ///
    /// Fails only when the body is not a token creation result at all.
    pub fn from_response(response: &RawResponse) -> Result<Self, ExtractError> {
        let body: Value = serde_json::from_slice(&response.body)?;
        Self::from_body(&body)
    }

    /// Extract the catalog from an already parsed body.
    pub fn from_body(body: &Value) -> Result<Self, ExtractError> {
        let token = token_object(body)?;

        let entries = match token.get("catalog") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => match CatalogShape::deserialize(raw) {
                Ok(CatalogShape::List(entries)) | Ok(CatalogShape::Wrapped { entries }) => entries,
                Err(e) => {
                    tracing::warn!("ignoring malformed service catalog: {}", e);
                    Vec::new()
                }
            },
        };

        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the URL of a service endpoint.
    pub fn endpoint_url(&self, service_type: &str, interface: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| endpoint.interface == interface)
            .map(|endpoint| endpoint.url.as_str())
    }

    /// Build the substitution variables.
    ///
    /// For every endpoint `TYPE_INTERFACE` (upper-cased) maps to its URL, and
    /// `TYPE` maps to the `public` endpoint. Entries are visited in received
    /// order and a later endpoint overwrites an earlier one with the same
    /// name. With a `region`, endpoints tagged with another region are
    /// skipped; untagged endpoints always count. Endpoints without an
    /// interface are ignored.
    pub fn variables(&self, region: Option<&str>) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::new();

        for entry in &self.entries {
            if entry.service_type.is_empty() {
                continue;
            }
            let service = entry.service_type.to_uppercase();

            for endpoint in &entry.endpoints {
                if let Some(region) = region {
                    if !endpoint.region().is_empty() && endpoint.region() != region {
                        continue;
                    }
                }

                if endpoint.interface.is_empty() {
                    continue;
                }

                let name = format!("{}_{}", service, endpoint.interface.to_uppercase());
                insert(&mut variables, name, &endpoint.url);

                if endpoint.interface == DEFAULT_INTERFACE {
                    insert(&mut variables, service.clone(), &endpoint.url);
                }
            }
        }

        variables
    }
}

fn insert(variables: &mut BTreeMap<String, String>, name: String, url: &str) {
    if let Some(previous) = variables.insert(name.clone(), url.to_string()) {
        if previous != url {
            tracing::debug!(variable = %name, %previous, current = url, "catalog variable overwritten");
        }
    }
}
