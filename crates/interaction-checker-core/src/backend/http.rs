//! HTTP backend for the hosted catalog API.
//!
//! Handles:
//! - Serverless functions (autocomplete, stats, request-add, log-lookup)
//! - The PostgREST RPC for pairwise interaction lookup
//! - Error categorization (network, timeout, 404, non-2xx, HTML/bad JSON)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{AdditionRequest, BackendError, BackendResult, CatalogStats, InteractionBackend, LookupLog};
use crate::config::{CheckerConfig, ConfigError};
use crate::models::{Interaction, Substance, SubstanceType};
use crate::resolver::LookupToken;

const SUBSTANCE_SELECT: &str = "substance_id,display_name,canonical_name,type";

/// Backend talking to the hosted functions and database REST API.
pub struct HttpBackend {
    client: Client,
    functions_base: String,
    supabase_url: String,
    anon_key: String,
    timeout_ms: u64,
}

impl HttpBackend {
    /// Build from configuration. Fails when the remote endpoints are not
    /// configured.
    pub fn from_config(config: &CheckerConfig) -> Result<Self, ConfigError> {
        let remote = config.remote()?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("interaction-checker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            client,
            functions_base: remote.functions_base.trim_end_matches('/').to_string(),
            supabase_url: remote.supabase_url.trim_end_matches('/').to_string(),
            anon_key: remote.anon_key,
            timeout_ms: config.request_timeout_ms,
        })
    }

    fn function_url(&self, name: &str) -> String {
        format!("{}/{}", self.functions_base, name)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.supabase_url, path)
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> BackendResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(&e, self.timeout_ms))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, self.timeout_ms))?;

        if !(200..300).contains(&status) {
            let err = classify_status(status, &body, endpoint);
            warn!(endpoint, status, error = %err, "request failed");
            return Err(err);
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, endpoint: &str) -> BackendResult<T> {
        let body = self.send(request, endpoint).await?;
        parse_body(&body)
    }
}

/// Envelope used by the serverless functions.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

impl<T> Envelope<T> {
    fn into_result(self) -> BackendResult<T> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(BackendError::Server {
                status: 200,
                message: self.error.unwrap_or_else(|| "request was not ok".to_string()),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct AutocompleteData {
    #[serde(default)]
    results: Vec<Substance>,
}

#[derive(Debug, Deserialize)]
struct StatsData {
    #[serde(default)]
    counts: CatalogStats,
}

#[derive(Debug, Deserialize)]
struct RequestAddData {
    #[serde(default)]
    request_id: Value,
}

#[async_trait]
impl InteractionBackend for HttpBackend {
    async fn autocomplete(
        &self,
        query: &str,
        kind: Option<SubstanceType>,
        limit: usize,
    ) -> BackendResult<Vec<Substance>> {
        let endpoint = "checker-autocomplete";
        let limit = limit.to_string();
        let mut params = vec![("q", query), ("limit", limit.as_str())];
        if let Some(kind) = kind {
            params.push(("type", kind.as_str()));
        }

        let request = self.client.get(self.function_url(endpoint)).query(&params);
        let envelope: Envelope<AutocompleteData> = self.send_json(request, endpoint).await?;
        let results = envelope.into_result()?.results;
        debug!(query, count = results.len(), "autocomplete");
        Ok(results)
    }

    async fn interactions_by_tokens(
        &self,
        token_a: &LookupToken,
        token_b: &LookupToken,
    ) -> BackendResult<Vec<Interaction>> {
        let endpoint = "rpc_get_interaction_by_tokens";
        let request = self.with_api_key(
            self.client
                .post(self.rest_url(&format!("rpc/{endpoint}")))
                .json(&json!({ "token_a": token_a, "token_b": token_b })),
        );
        let body: Value = self.send_json(request, endpoint).await?;
        parse_interactions(body)
    }

    async fn list_substances(&self, kind: Option<SubstanceType>) -> BackendResult<Vec<Substance>> {
        let endpoint = "checker_substances";
        let mut params = vec![
            ("select", SUBSTANCE_SELECT.to_string()),
            ("is_active", "eq.true".to_string()),
            ("order", "display_name.asc".to_string()),
        ];
        if let Some(kind) = kind {
            params.push(("type", format!("eq.{}", kind.as_str())));
        }

        let request = self.with_api_key(self.client.get(self.rest_url(endpoint)).query(&params));
        self.send_json(request, endpoint).await
    }

    async fn stats(&self) -> BackendResult<CatalogStats> {
        let endpoint = "checker-stats";
        let request = self.client.get(self.function_url(endpoint));
        let envelope: Envelope<StatsData> = self.send_json(request, endpoint).await?;
        Ok(envelope.into_result()?.counts)
    }

    async fn request_addition(&self, request: &AdditionRequest) -> BackendResult<String> {
        let endpoint = "checker-request-add";
        let builder = self.client.post(self.function_url(endpoint)).json(request);
        let envelope: Envelope<RequestAddData> = self.send_json(builder, endpoint).await?;
        Ok(match envelope.into_result()?.request_id {
            Value::String(id) => id,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    async fn log_lookup(&self, log: &LookupLog) -> BackendResult<()> {
        let endpoint = "checker-log-lookup";
        let body = json!({
            "inputs": log.inputs,
            "normalized_inputs": log.normalized_inputs,
            "resolved_substance_ids": log.resolved_substance_ids,
            "unresolved_inputs": log.unresolved_inputs,
            "results_summary": log.results_summary,
            "has_results": log.has_results,
            "client_meta": { "mode": log.mode, "logged_at": log.logged_at },
        });
        self.send(self.client.post(self.function_url(endpoint)).json(&body), endpoint)
            .await
            .map(|_| ())
    }
}

/// Map a transport-level failure.
fn classify_transport(err: &reqwest::Error, timeout_ms: u64) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout_ms)
    } else if err.is_decode() {
        BackendError::Malformed(err.to_string())
    } else {
        BackendError::Network(err.to_string())
    }
}

/// Map a non-2xx response.
fn classify_status(status: u16, body: &str, endpoint: &str) -> BackendError {
    if status == 404 {
        return BackendError::EndpointNotFound(endpoint.to_string());
    }
    BackendError::Server {
        status,
        message: error_message(body),
    }
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let text = ["error", "message", "detail", "details"]
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .collect::<Vec<_>>();
        if !text.is_empty() {
            return text.join(": ");
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        "Unexpected response".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Parse a 2xx body as JSON, rejecting HTML error pages.
fn parse_body<T: DeserializeOwned>(body: &str) -> BackendResult<T> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return Err(BackendError::Malformed(
            "Received HTML instead of JSON. Check deployment.".to_string(),
        ));
    }
    serde_json::from_str(trimmed).map_err(|e| BackendError::Malformed(e.to_string()))
}

/// The RPC may return a list, a single row, or null.
fn parse_interactions(body: Value) -> BackendResult<Vec<Interaction>> {
    let rows = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        row @ Value::Object(_) => vec![row],
        other => {
            return Err(BackendError::Malformed(format!(
                "expected interaction rows, got {other}"
            )))
        }
    };

    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| BackendError::Malformed(e.to_string())))
        .collect()
}
