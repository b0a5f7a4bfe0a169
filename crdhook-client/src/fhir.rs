use crdhook_core::{OperationOutcome, ResourceType};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ClientError, Result};

pub const FHIR_JSON: &str = "application/fhir+json";

/// Connection settings for one FHIR server.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP transport to a FHIR server (and, through [`FhirClient::post_to_crd`],
/// to a CRD service). Knows nothing about what the resources mean.
#[derive(Debug, Clone)]
pub struct FhirClient {
    pub(crate) http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl FhirClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Send `method path` to the FHIR server and return the parsed body.
    pub async fn request(&self, path: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "FHIR request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON);

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        handle_response(response, &method, &url).await
    }

    pub async fn read(&self, resource_type: ResourceType, id: &str) -> Result<Value> {
        self.request(&format!("/{}/{}", resource_type, urlencoding::encode(id)), Method::GET, None)
            .await
    }

    pub async fn create(&self, resource_type: ResourceType, body: &Value) -> Result<Value> {
        self.request(&format!("/{}", resource_type), Method::POST, Some(body))
            .await
    }

    /// Search and return the whole Bundle.
    pub async fn search(&self, resource_type: ResourceType, params: &[(&str, &str)]) -> Result<Value> {
        let path = format!("/{}?{}", resource_type, encode_query(params));
        self.request(&path, Method::GET, None).await
    }

    /// Search and return the first matching resource.
    ///
    /// An empty Bundle is a [`ClientError::NotFound`], never a silent `None`.
    pub async fn search_one(&self, resource_type: ResourceType, params: &[(&str, &str)]) -> Result<Value> {
        let bundle = self.search(resource_type, params).await?;

        first_entry_resource(&bundle).ok_or_else(|| ClientError::NotFound {
            resource_type: resource_type.to_string(),
            query: encode_query(params),
        })
    }
}

pub(crate) fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// First entry that is a search match. Entries tagged `outcome` or
/// `include` are skipped; entries without `search.mode` count as matches.
fn first_entry_resource(bundle: &Value) -> Option<Value> {
    bundle
        .get("entry")
        .and_then(|v| v.as_array())
        .and_then(|entries| {
            entries
                .iter()
                .filter(|e| {
                    e.pointer("/search/mode")
                        .and_then(|m| m.as_str())
                        .is_none_or(|mode| mode == "match")
                })
                .find_map(|e| e.get("resource"))
        })
        .cloned()
}

/// Turn a response into its JSON body, or a transport error for any
/// non-success status.
pub(crate) async fn handle_response(
    response: reqwest::Response,
    method: &Method,
    url: &str,
) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let diagnostics = match serde_json::from_str::<Value>(&body) {
            Ok(json) => OperationOutcome::from_value(&json).and_then(|o| o.summary()),
            Err(_) if !body.trim().is_empty() => Some(body.trim().chars().take(500).collect()),
            Err(_) => None,
        };

        tracing::warn!(
            method = %method,
            url = %url,
            status = %status,
            "Request failed with non-success status"
        );

        return Err(ClientError::Transport {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            diagnostics,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}
