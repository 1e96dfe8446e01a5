//! Retrieval-augmented responses grounded in a selector's index.
//!
//! [`IndexLoader`] resolves a selector to its persisted index, metadata and
//! tone data. [`Responder`] embeds a query, picks the nearest chunk and sends
//! it to the completion capability. Every degraded path is logged and counted
//! in [`DegradationStats`].

mod loader;
mod responder;

pub use loader::{IndexLoader, LoadedAgent};
pub use responder::{
    FallbackReason, GroundingContext, Response, ResponseStatus, Responder, RetrievedChunk,
    APOLOGY_RESPONSE, EMPTY_QUERY_RESPONSE, UNAVAILABLE_RESPONSE,
};

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for every path where an answer was degraded.
#[derive(Debug, Default)]
pub struct DegradationStats {
    requests: AtomicU64,
    unavailable: AtomicU64,
    embedding_failures: AtomicU64,
    dimension_resizes: AtomicU64,
    context_fallbacks: AtomicU64,
    completion_failures: AtomicU64,
    dropped_chunks: AtomicU64,
}

/// Point-in-time copy of [`DegradationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub unavailable: u64,
    pub embedding_failures: u64,
    pub dimension_resizes: u64,
    pub context_fallbacks: u64,
    pub completion_failures: u64,
    /// Chunks left out of an index because their embedding failed.
    pub dropped_chunks: u64,
}

impl DegradationStats {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_embedding_failure(&self) {
        self.embedding_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resize(&self) {
        self.dimension_resizes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_context_fallback(&self) {
        self.context_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion_failure(&self) {
        self.completion_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_chunk(&self) {
        self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            embedding_failures: self.embedding_failures.load(Ordering::Relaxed),
            dimension_resizes: self.dimension_resizes.load(Ordering::Relaxed),
            context_fallbacks: self.context_fallbacks.load(Ordering::Relaxed),
            completion_failures: self.completion_failures.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
        }
    }
}
