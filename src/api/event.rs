//! Function-runtime invocation format.
//!
//! One JSON event in (`httpMethod`, `headers`, `body`), one JSON result out
//! (`statusCode`, `headers`, `body`, `isBase64Encoded`).

use crate::api::handlers::auth::{AuthHandler, AuthRequest, AuthResponse};
use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
pub struct InvocationEvent {
    #[serde(rename = "httpMethod")]
    pub http_method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(rename = "isBase64Encoded")]
    pub is_base64_encoded: bool,
}

impl TryFrom<InvocationEvent> for AuthRequest {
    type Error = anyhow::Error;

    fn try_from(event: InvocationEvent) -> Result<Self> {
        // The runtime omits httpMethod for direct invocations; treat those as GET.
        let method = event.http_method.as_deref().unwrap_or("GET");
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid httpMethod: {method}"))?;

        let mut headers = HeaderMap::new();
        for (name, value) in event.headers.unwrap_or_default() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => debug!("Skipping invalid header: {name}"),
            }
        }

        Ok(Self {
            method,
            headers,
            body: event.body,
        })
    }
}

impl From<AuthResponse> for InvocationResult {
    fn from(response: AuthResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (canonical_header_name(name.as_str()), value.to_string()))
            })
            .collect();

        Self {
            status_code: response.status.as_u16(),
            headers,
            body: response.body,
            is_base64_encoded: false,
        }
    }
}

/// `access-control-allow-origin` -> `Access-Control-Allow-Origin`
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Handle one invocation event.
///
/// # Errors
/// Returns an error only when the event itself is malformed.
pub async fn invoke(handler: &AuthHandler, event: InvocationEvent) -> Result<InvocationResult> {
    let request = AuthRequest::try_from(event)?;
    Ok(handler.handle(request).await.into())
}
