//! Debounced, cancellable search for one input field.
//!
//! Each keystroke aborts the previous task and starts a new one that waits
//! out the debounce window before asking the resolver. A generation counter
//! makes sure only the latest keystroke can publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ResolverError, SubstanceResolver, Suggestions};
use crate::models::SubstanceType;

/// Default quiet period after the last keystroke.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// What the suggestion dropdown should show.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SuggestionState {
    #[default]
    Idle,
    Loading { query: String },
    Ready(Suggestions),
    Failed { query: String, error: ResolverError },
}

impl SuggestionState {
    /// Inline error text for the failed state.
    pub fn error_message(&self) -> Option<String> {
        match self {
            SuggestionState::Failed { error, .. } => Some(error.user_message()),
            _ => None,
        }
    }
}

/// Search state for one input field. Must be used inside a tokio runtime.
pub struct SearchSession {
    resolver: Arc<SubstanceResolver>,
    kind: Option<SubstanceType>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    state: Arc<watch::Sender<SuggestionState>>,
}

impl SearchSession {
    pub fn new(resolver: Arc<SubstanceResolver>, kind: Option<SubstanceType>) -> Self {
        Self::with_debounce(resolver, kind, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(resolver: Arc<SubstanceResolver>, kind: Option<SubstanceType>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SuggestionState::Idle);
        Self {
            resolver,
            kind,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            state: Arc::new(state),
        }
    }

    /// Watch suggestion state changes.
    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SuggestionState {
        self.state.borrow().clone()
    }

    /// Handle a change to the input text.
    pub fn input(&mut self, text: &str) {
        self.cancel_pending();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if text.trim().is_empty() {
            self.state.send_replace(SuggestionState::Idle);
            return;
        }
        if let Some(ready) = self.resolver.suggest_cached(text, self.kind) {
            self.state.send_replace(SuggestionState::Ready(ready));
            return;
        }

        let query = text.trim().to_string();
        self.state.send_replace(SuggestionState::Loading { query: query.clone() });

        let resolver = Arc::clone(&self.resolver);
        let latest = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let kind = self.kind;
        let debounce = self.debounce;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let next = match resolver.suggest(&query, kind).await {
                Ok(suggestions) => SuggestionState::Ready(suggestions),
                Err(error) => {
                    warn!(query = %query, error = %error, "suggestion request failed");
                    SuggestionState::Failed { query, error }
                }
            };

            // Last request wins
            if latest.load(Ordering::SeqCst) == generation {
                state.send_replace(next);
            } else {
                debug!("dropping stale suggestions");
            }
        }));
    }

    /// Clear the input: cancel work and go idle.
    pub fn clear(&mut self) {
        self.cancel_pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SuggestionState::Idle);
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        AdditionRequest, BackendError, BackendResult, CatalogStats, InteractionBackend, LookupLog,
    };
    use crate::cache::isolated_search_cache;
    use crate::models::{Interaction, Substance};
    use crate::resolver::{LookupToken, SuggestionSource};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that records autocomplete queries and answers after a delay.
    struct RecordingBackend {
        queries: Mutex<Vec<String>>,
        delay: Duration,
        fail: bool,
    }

    impl RecordingBackend {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self { queries: Mutex::new(Vec::new()), delay, fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { queries: Mutex::new(Vec::new()), delay: Duration::ZERO, fail: true })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InteractionBackend for RecordingBackend {
        async fn autocomplete(&self, query: &str, _: Option<SubstanceType>, _: usize) -> BackendResult<Vec<Substance>> {
            self.queries.lock().unwrap().push(query.to_string());
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(BackendError::Network("connection refused".into()));
            }
            Ok(vec![Substance::new("S_WARF", "Warfarin", "warfarin", SubstanceType::Drug)])
        }

        async fn interactions_by_tokens(&self, _: &LookupToken, _: &LookupToken) -> BackendResult<Vec<Interaction>> {
            Ok(Vec::new())
        }

        async fn list_substances(&self, _: Option<SubstanceType>) -> BackendResult<Vec<Substance>> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> BackendResult<CatalogStats> {
            Ok(CatalogStats::default())
        }

        async fn request_addition(&self, _: &AdditionRequest) -> BackendResult<String> {
            Ok(String::new())
        }

        async fn log_lookup(&self, _: &LookupLog) -> BackendResult<()> {
            Ok(())
        }
    }

    fn session(backend: Arc<RecordingBackend>) -> SearchSession {
        let resolver = SubstanceResolver::with_cache(backend, isolated_search_cache(10, Duration::from_secs(60)));
        SearchSession::new(Arc::new(resolver), None)
    }

    async fn wait_ready(rx: &mut watch::Receiver<SuggestionState>) -> SuggestionState {
        rx.wait_for(|s| matches!(s, SuggestionState::Ready(_) | SuggestionState::Failed { .. }))
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_keystrokes_send_one_request() {
        let backend = RecordingBackend::new(Duration::ZERO);
        let mut session = session(backend.clone());
        let mut rx = session.subscribe();

        session.input("w");
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.input("wa");
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.input("war");

        match wait_ready(&mut rx).await {
            SuggestionState::Ready(s) => assert_eq!(s.query, "war"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.queries(), vec!["war".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_network() {
        let backend = RecordingBackend::new(Duration::ZERO);
        let mut session = session(backend.clone());
        let mut rx = session.subscribe();

        session.input("warf");
        wait_ready(&mut rx).await;

        session.input(" WARF ");
        match session.state() {
            SuggestionState::Ready(s) => assert_eq!(s.source, SuggestionSource::Cache),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_request_is_superseded() {
        let backend = RecordingBackend::new(Duration::from_millis(500));
        let mut session = session(backend.clone());
        let mut rx = session.subscribe();

        session.input("war");
        // Past the debounce, request in flight
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.input("warf");

        match wait_ready(&mut rx).await {
            SuggestionState::Ready(s) => assert_eq!(s.query, "warf"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.queries(), vec!["war".to_string(), "warf".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported() {
        let mut session = session(RecordingBackend::failing());
        let mut rx = session.subscribe();

        session.input("warf");
        let state = wait_ready(&mut rx).await;
        assert_eq!(
            state.error_message().as_deref(),
            Some("Unable to load suggestions. Please check your connection.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_goes_idle() {
        let backend = RecordingBackend::new(Duration::ZERO);
        let mut session = session(backend.clone());

        session.input("warf");
        session.clear();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(session.state(), SuggestionState::Idle);
        assert!(backend.queries().is_empty());
    }
}
