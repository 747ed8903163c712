//! SQLite-backed implementation of the backend contract.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::{AdditionRequest, BackendError, BackendResult, CatalogStats, InteractionBackend, LookupLog};
use crate::db::{Database, DbResult};
use crate::models::{Interaction, Substance, SubstanceType};
use crate::resolver::LookupToken;

/// Serves the backend contract from a local [`Database`].
///
/// Queries are short and run inline on the calling task.
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Mutex<Database>>,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Share an existing handle.
    pub fn from_shared(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> DbResult<T>) -> BackendResult<T> {
        let db = self
            .db
            .lock()
            .map_err(|e| BackendError::Storage(format!("Lock poisoned: {e}")))?;
        Ok(f(&db)?)
    }
}

#[async_trait]
impl InteractionBackend for LocalBackend {
    async fn autocomplete(
        &self,
        query: &str,
        kind: Option<SubstanceType>,
        limit: usize,
    ) -> BackendResult<Vec<Substance>> {
        let results = self.with_db(|db| db.search_substances(query, kind, limit))?;
        debug!(query, count = results.len(), "local autocomplete");
        Ok(results)
    }

    async fn interactions_by_tokens(
        &self,
        token_a: &LookupToken,
        token_b: &LookupToken,
    ) -> BackendResult<Vec<Interaction>> {
        self.with_db(|db| db.interactions_by_tokens(token_a, token_b))
    }

    async fn list_substances(&self, kind: Option<SubstanceType>) -> BackendResult<Vec<Substance>> {
        self.with_db(|db| db.list_substances(kind))
    }

    async fn stats(&self) -> BackendResult<CatalogStats> {
        self.with_db(|db| {
            Ok(CatalogStats {
                supplements: Some(db.count_substances(Some(SubstanceType::Supplement))?),
                drugs: Some(db.count_substances(Some(SubstanceType::Drug))?),
                interactions: db.count_interactions()?,
                tokens: db.count_tokens()?,
            })
        })
    }

    async fn request_addition(&self, request: &AdditionRequest) -> BackendResult<String> {
        let stored = self.with_db(|db| db.record_addition_request(&request.raw_name, request.kind))?;
        debug!(
            name = %stored.normalized_name,
            count = stored.request_count,
            "addition request recorded"
        );
        Ok(stored.request_id)
    }

    async fn log_lookup(&self, log: &LookupLog) -> BackendResult<()> {
        self.with_db(|db| db.insert_lookup_log(log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RequestKind;
    use crate::models::Severity;
    use crate::resolver::normalize_token;

    fn backend() -> LocalBackend {
        let db = Database::open_in_memory().unwrap();
        let warfarin = Substance::new("S_WARF", "Warfarin", "warfarin", SubstanceType::Drug);
        let vit_k = Substance::new("S_VITK", "Vitamin K", "vitamin k", SubstanceType::Supplement);
        db.upsert_substance(&warfarin).unwrap();
        db.upsert_substance(&vit_k).unwrap();
        db.upsert_interaction(&Interaction::new("I_1", vit_k.to_ref(), warfarin.to_ref(), Severity::Major))
            .unwrap();
        LocalBackend::new(db)
    }

    #[tokio::test]
    async fn test_autocomplete_and_lookup() {
        let backend = backend();

        let hits = backend.autocomplete("warf", Some(SubstanceType::Drug), 12).await.unwrap();
        assert_eq!(hits[0].substance_id, "S_WARF");

        let found = backend
            .interactions_by_tokens(&normalize_token("warfarin"), &normalize_token("vitamin k"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let stats = backend().stats().await.unwrap();
        assert_eq!(stats.supplements, Some(1));
        assert_eq!(stats.drugs, Some(1));
        assert_eq!(stats.interactions, 1);
        assert_eq!(stats.tokens, 2);
    }

    #[tokio::test]
    async fn test_request_addition_is_deduplicated() {
        let backend = backend();
        let first = backend
            .request_addition(&AdditionRequest::new("Xyzzyx123", None))
            .await
            .unwrap();
        let second = backend
            .request_addition(&AdditionRequest::new("xyzzyx123", Some(SubstanceType::Drug)))
            .await
            .unwrap();
        assert_eq!(first, second);

        let requests = backend.database().lock().unwrap().list_addition_requests().unwrap();
        assert_eq!(requests[0].request_count, 2);
        assert_eq!(requests[0].kind, RequestKind::Medication);
    }

    #[tokio::test]
    async fn test_empty_request_is_storage_error() {
        let result = backend().request_addition(&AdditionRequest::new("   ", None)).await;
        assert!(matches!(result, Err(BackendError::Storage(_))));
    }
}
