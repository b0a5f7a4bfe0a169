use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::fhir::{handle_response, FhirClient};

impl FhirClient {
    /// POST a CDS Hooks request to the CRD service.
    ///
    /// The CRD service has its own URL and bearer token; the FHIR server's
    /// token is never sent here.
    pub async fn post_to_crd<T: Serialize>(
        &self,
        payload: &T,
        crd_url: &str,
        crd_token: Option<&str>,
    ) -> Result<Value> {
        let mut request = self
            .http
            .post(crd_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(serde_json::to_vec(payload)?);

        if let Some(token) = crd_token.filter(|t| !t.trim().is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = handle_response(response, &Method::POST, crd_url).await?;

        tracing::info!(url = %crd_url, status = %status, "CRD hook invoked");
        Ok(body)
    }
}
