//! Query → nearest chunk → grounded completion.

use super::{DegradationStats, IndexLoader, LoadedAgent, StatsSnapshot};
use crate::completion::{ChatMessage, Completer};
use crate::config::{build_system_message, render, Settings, GROUNDED_USER_TEMPLATE};
use crate::embedding::Embedder;
use crate::error::{CoachError, Result};
use crate::vector_store::{fit_dimension, MetadataRecord, SearchHit};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Returned when the selector has no usable index.
pub const UNAVAILABLE_RESPONSE: &str = "Missing necessary files. Unable to generate a response.";

/// Returned when the completion capability fails or times out.
pub const APOLOGY_RESPONSE: &str = "I'm experiencing difficulties. Please try again later.";

/// Returned for a blank query.
pub const EMPTY_QUERY_RESPONSE: &str = "Please provide a question so I can help.";

/// How a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Generated text returned verbatim.
    Answered,
    /// Selector missing, unknown or corrupt.
    Unavailable,
    /// Generation failed; the apology string was returned.
    CompletionFailed,
    /// Query was blank.
    InvalidQuery,
}

/// Why the raw query was used as context instead of a retrieved chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The query could not be embedded.
    EmbeddingFailed,
    /// The index returned no neighbours.
    NoMatch,
    /// The nearest position had no metadata record.
    PositionOutOfRange,
}

/// The context handed to the completion capability.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundingContext {
    Retrieved {
        position: usize,
        distance: f32,
        record: MetadataRecord,
    },
    QueryFallback(FallbackReason),
}

/// Full outcome of [`Responder::respond_detailed`].
#[derive(Debug, Clone)]
pub struct Response {
    pub text: String,
    pub status: ResponseStatus,
    /// `None` when no retrieval was attempted.
    pub context: Option<GroundingContext>,
    /// Neighbours returned by the search, closest first.
    pub hits: Vec<SearchHit>,
    /// The query embedding was truncated or zero-padded to fit the index.
    pub resized: bool,
}

impl Response {
    fn without_context(text: &str, status: ResponseStatus) -> Self {
        Self {
            text: text.to_string(),
            status,
            context: None,
            hits: Vec::new(),
            resized: false,
        }
    }

    /// The metadata record used as grounding, if one was retrieved.
    pub fn grounding_record(&self) -> Option<&MetadataRecord> {
        match &self.context {
            Some(GroundingContext::Retrieved { record, .. }) => Some(record),
            _ => None,
        }
    }
}

/// A search result mapped back to its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub position: usize,
    pub distance: f32,
    pub record: MetadataRecord,
}

/// Answers queries for any configured selector.
///
/// Stateless across calls apart from the loader's cache and the counters.
pub struct Responder {
    loader: IndexLoader,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    top_k: usize,
    timeout: Duration,
    stats: DegradationStats,
}

impl Responder {
    /// Create a responder from settings and capabilities.
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            loader: IndexLoader::new(settings),
            embedder,
            completer,
            top_k: settings.rag.top_k.max(1),
            timeout: Duration::from_secs(settings.rag.request_timeout_secs),
            stats: DegradationStats::default(),
        }
    }

    /// Override the number of neighbours fetched.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Override the per-call timeout for external capabilities.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Answer `query` for `selector`. Never fails; degraded paths return fixed strings.
    pub async fn respond(&self, selector: &str, query: &str) -> String {
        self.respond_detailed(selector, query).await.text
    }

    /// Like [`respond`](Self::respond) but reports which context was used.
    #[instrument(skip(self, selector, query), fields(selector = %selector))]
    pub async fn respond_detailed(&self, selector: &str, query: &str) -> Response {
        self.stats.record_request();

        let query = query.trim();
        if query.is_empty() {
            return Response::without_context(EMPTY_QUERY_RESPONSE, ResponseStatus::InvalidQuery);
        }

        let agent = match self.loader.load(selector).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!("Selector {} unavailable: {}", selector, e);
                self.stats.record_unavailable();
                return Response::without_context(UNAVAILABLE_RESPONSE, ResponseStatus::Unavailable);
            }
        };

        let (context, hits, resized) = self.ground(&agent, query).await;

        let system = build_system_message(agent.tone.as_ref());
        let user = match &context {
            GroundingContext::Retrieved { record, .. } => {
                let mut vars = HashMap::new();
                vars.insert("context", record.text.as_str());
                vars.insert("question", query);
                render(GROUNDED_USER_TEMPLATE, &vars)
            }
            GroundingContext::QueryFallback(_) => query.to_string(),
        };
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];

        let (text, status) = match self.bounded(self.completer.complete(&messages)).await {
            Ok(text) => (text, ResponseStatus::Answered),
            Err(e) => {
                warn!("Completion failed for {}: {}", selector, e);
                self.stats.record_completion_failure();
                (APOLOGY_RESPONSE.to_string(), ResponseStatus::CompletionFailed)
            }
        };

        Response {
            text,
            status,
            context: Some(context),
            hits,
            resized,
        }
    }

    /// Return the `k` nearest chunks for `query` without generating text.
    pub async fn search(
        &self,
        selector: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let agent = self.loader.load(selector).await?;
        let (embedding, _) = self.embed_query(&agent, query).await?;
        let hits = agent.pair.index.search(&embedding, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                agent.pair.metadata.get(hit.position).map(|record| RetrievedChunk {
                    position: hit.position,
                    distance: hit.distance,
                    record: record.clone(),
                })
            })
            .collect())
    }

    /// Pick the grounding context for `query`.
    async fn ground(
        &self,
        agent: &LoadedAgent,
        query: &str,
    ) -> (GroundingContext, Vec<SearchHit>, bool) {
        let (embedding, resized) = match self.embed_query(agent, query).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Query embedding failed for {}: {}", agent.selector, e);
                self.stats.record_embedding_failure();
                return (self.fallback(agent, FallbackReason::EmbeddingFailed), Vec::new(), false);
            }
        };

        let hits = match agent.pair.index.search(&embedding, self.top_k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search failed for {}: {}", agent.selector, e);
                Vec::new()
            }
        };

        let context = match hits.first() {
            None => self.fallback(agent, FallbackReason::NoMatch),
            Some(hit) => match agent.pair.metadata.get(hit.position) {
                Some(record) => {
                    debug!(
                        "Grounding on position {} ({}) at distance {}",
                        hit.position, record.filename, hit.distance
                    );
                    GroundingContext::Retrieved {
                        position: hit.position,
                        distance: hit.distance,
                        record: record.clone(),
                    }
                }
                None => self.fallback(agent, FallbackReason::PositionOutOfRange),
            },
        };

        (context, hits, resized)
    }

    fn fallback(&self, agent: &LoadedAgent, reason: FallbackReason) -> GroundingContext {
        info!("Using the raw query as context for {} ({:?})", agent.selector, reason);
        self.stats.record_context_fallback();
        GroundingContext::QueryFallback(reason)
    }

    /// Embed the query and fit it to the index dimension.
    async fn embed_query(&self, agent: &LoadedAgent, query: &str) -> Result<(Vec<f32>, bool)> {
        let mut embedding = self.bounded(self.embedder.embed(query)).await?;
        if embedding.is_empty() {
            return Err(CoachError::Embedding("empty query embedding".to_string()));
        }

        let expected = agent.pair.index.dimension();
        let actual = embedding.len();
        let resized = fit_dimension(&mut embedding, expected);
        if resized {
            warn!(
                "{}; resizing query embedding for {}",
                CoachError::DimensionMismatch { expected, actual },
                agent.selector
            );
            self.stats.record_resize();
        }
        Ok((embedding, resized))
    }

    /// Apply the request timeout to an external call.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CoachError::Timeout(self.timeout.as_secs())),
        }
    }
}
