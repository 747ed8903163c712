//! Remote catalog and interaction lookup boundary.
//!
//! [`InteractionBackend`] is the contract the resolver and the pairwise
//! engine consume. [`HttpBackend`] talks to the hosted API;
//! [`LocalBackend`] serves the same contract from SQLite.

mod http;
mod local;

pub use http::*;
pub use local::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CheckSummary, Interaction, Substance, SubstanceType};
use crate::resolver::LookupToken;

/// Backend errors, categorized the way the UI reports them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Network unreachable: {0}")]
    Network(String),

    #[error("{status}: {message}")]
    Server { status: u16, message: String },

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

impl BackendError {
    /// Message suitable for showing next to the input that triggered it.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => {
                "Unable to load suggestions. Please check your connection.".to_string()
            }
            BackendError::Server { status, message } => format!("Server error: {status}: {message}"),
            BackendError::EndpointNotFound(_) => {
                "Autocomplete endpoint not found. Check deployment.".to_string()
            }
            BackendError::Malformed(msg) => format!("Server error: {msg}"),
            BackendError::Storage(msg) => format!("Error: {msg}"),
        }
    }

    /// Worth retrying: transport failures and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout(_) => true,
            BackendError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<crate::db::DbError> for BackendError {
    fn from(e: crate::db::DbError) -> Self {
        BackendError::Storage(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Aggregate catalog coverage, for display only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogStats {
    pub supplements: Option<u64>,
    pub drugs: Option<u64>,
    #[serde(default)]
    pub interactions: u64,
    #[serde(default)]
    pub tokens: u64,
}

/// Category attached to an "add substance" request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Supplement,
    Medication,
    Unknown,
}

impl From<Option<SubstanceType>> for RequestKind {
    fn from(kind: Option<SubstanceType>) -> Self {
        match kind {
            Some(SubstanceType::Supplement) => RequestKind::Supplement,
            Some(SubstanceType::Drug) => RequestKind::Medication,
            None => RequestKind::Unknown,
        }
    }
}

/// A user request to add a substance the catalog does not know.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdditionRequest {
    pub raw_name: String,
    pub kind: RequestKind,
}

impl AdditionRequest {
    pub fn new(raw_name: impl Into<String>, kind: Option<SubstanceType>) -> Self {
        Self {
            raw_name: raw_name.into().trim().to_string(),
            kind: kind.into(),
        }
    }
}

/// Best-effort analytics record for one check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupLog {
    pub inputs: Vec<String>,
    pub normalized_inputs: Vec<String>,
    pub resolved_substance_ids: Vec<String>,
    pub unresolved_inputs: Vec<String>,
    pub results_summary: CheckSummary,
    pub has_results: bool,
    pub mode: String,
    pub logged_at: String,
}

/// Operations the checker needs from the catalog service.
#[async_trait]
pub trait InteractionBackend: Send + Sync {
    /// Prefix search over substance names and aliases.
    async fn autocomplete(
        &self,
        query: &str,
        kind: Option<SubstanceType>,
        limit: usize,
    ) -> BackendResult<Vec<Substance>>;

    /// Interactions between two tokens, in either order.
    async fn interactions_by_tokens(
        &self,
        token_a: &LookupToken,
        token_b: &LookupToken,
    ) -> BackendResult<Vec<Interaction>>;

    /// Full active substance list, for local fuzzy fallback.
    async fn list_substances(&self, kind: Option<SubstanceType>) -> BackendResult<Vec<Substance>>;

    /// Coverage counts.
    async fn stats(&self) -> BackendResult<CatalogStats>;

    /// Submit an "add substance" request. Returns the request id.
    async fn request_addition(&self, request: &AdditionRequest) -> BackendResult<String>;

    /// Record a completed check. Callers ignore failures.
    async fn log_lookup(&self, log: &LookupLog) -> BackendResult<()>;
}
