//! Corpus indexer: a folder of `.txt` documents in, a persisted index/metadata pair out.
//!
//! Chunks are embedded concurrently, but the persisted order is always the
//! order in which the chunker produced them. Chunks whose embedding fails are
//! dropped from both the index and the metadata.

use crate::chunking::{ChunkingConfig, DocumentChunk, WordChunker};
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{CoachError, Result};
use crate::rag::{DegradationStats, StatsSnapshot};
use crate::vector_store::{save_pair, FlatIndex, MetadataRecord};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A chunk left out of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkFailure {
    pub filename: String,
    pub ordinal: usize,
    pub reason: String,
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub selector: String,
    /// Documents read from the folder.
    pub documents: usize,
    /// Chunks produced by the chunker.
    pub chunks: usize,
    /// Chunks written to the index.
    pub indexed: usize,
    /// Vector dimension of the written index.
    pub dimension: usize,
    /// Chunks dropped because their embedding failed.
    pub failures: Vec<ChunkFailure>,
    /// Files that could not be read.
    pub skipped_files: Vec<String>,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Builds persisted indexes for configured selectors.
pub struct CorpusIndexer {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    chunker: WordChunker,
    show_progress: bool,
    stats: DegradationStats,
}

impl CorpusIndexer {
    /// Create an indexer using the chunking policy from `settings`.
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>) -> Self {
        let chunker = WordChunker::new(ChunkingConfig::from(&settings.chunking));
        Self {
            settings,
            embedder,
            chunker,
            show_progress: false,
            stats: DegradationStats::default(),
        }
    }

    /// Draw a progress bar on stderr while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Counters accumulated over every build run by this indexer.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Build and persist the index for `selector` from the documents in `document_folder`.
    #[instrument(skip(self), fields(folder = %document_folder.display()))]
    pub async fn build_index(&self, document_folder: &Path, selector: &str) -> Result<BuildReport> {
        let paths = self
            .settings
            .agent_paths(selector)
            .ok_or_else(|| CoachError::NotFound(selector.to_string()))?;

        if !document_folder.is_dir() {
            return Err(CoachError::InvalidInput(format!(
                "Document folder not found: {}",
                document_folder.display()
            )));
        }

        let folder = document_folder.to_path_buf();
        let (documents, skipped_files) =
            tokio::task::spawn_blocking(move || read_documents(&folder))
                .await
                .map_err(|e| CoachError::Io(std::io::Error::other(e)))??;
        let chunks: Vec<DocumentChunk> = documents
            .iter()
            .flat_map(|(filename, text)| self.chunker.chunk_document(filename, text))
            .collect();

        info!(
            "Found {} chunks in {} documents for {}",
            chunks.len(),
            documents.len(),
            selector
        );

        if chunks.is_empty() {
            return Err(CoachError::EmptyCorpus(selector.to_string()));
        }

        let embeddings = self.embed_all(&chunks).await;

        let mut index = FlatIndex::new(self.embedder.dimensions());
        let mut metadata = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let added = embedding.and_then(|vector| index.add(vector));

            match added {
                Ok(_) => metadata.push(MetadataRecord {
                    filename: chunk.filename.clone(),
                    text: chunk.text.clone(),
                }),
                Err(e) => {
                    warn!(
                        "Dropping chunk {} of {}: {}",
                        chunk.ordinal, chunk.filename, e
                    );
                    self.stats.record_dropped_chunk();
                    failures.push(ChunkFailure {
                        filename: chunk.filename.clone(),
                        ordinal: chunk.ordinal,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if index.is_empty() {
            return Err(CoachError::EmptyCorpus(selector.to_string()));
        }

        let indexed = index.len();
        let dimension = index.dimension();
        let model = self.embedder.model().to_string();
        let (index_path, metadata_path) = (paths.index.clone(), paths.metadata.clone());
        tokio::task::spawn_blocking(move || {
            save_pair(&index_path, &metadata_path, &index, &metadata, &model)
        })
        .await
        .map_err(|e| CoachError::Io(std::io::Error::other(e)))??;

        if !failures.is_empty() {
            info!(
                "{} of {} chunks for {} were dropped",
                failures.len(),
                chunks.len(),
                selector
            );
        }

        Ok(BuildReport {
            selector: selector.to_string(),
            documents: documents.len(),
            chunks: chunks.len(),
            indexed,
            dimension,
            failures,
            skipped_files,
            index_path: paths.index,
            metadata_path: paths.metadata,
        })
    }

    /// Build every configured selector that names a `source_dir`.
    ///
    /// A failing selector does not stop the others.
    pub async fn build_all(&self) -> Vec<(String, Result<BuildReport>)> {
        let mut results = Vec::new();
        for selector in self.settings.selectors() {
            let Some(source_dir) = self
                .settings
                .agent_paths(&selector)
                .and_then(|p| p.source_dir)
            else {
                info!("Skipping {}: no source_dir configured", selector);
                continue;
            };
            let result = self.build_index(&source_dir, &selector).await;
            if let Err(e) = &result {
                warn!("Build for {} failed: {}", selector, e);
            }
            results.push((selector, result));
        }
        results
    }

    /// Embed every chunk, returning results in chunk order.
    async fn embed_all(&self, chunks: &[DocumentChunk]) -> Vec<Result<Vec<f32>>> {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(chunks.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  {spinner:.green} Embedding [{bar:30.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("█▓░"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let timeout = Duration::from_secs(self.settings.embedding.timeout_secs);
        let timeout_secs = self.settings.embedding.timeout_secs;

        let mut stream = stream::iter(chunks.iter().enumerate())
            .map(|(idx, chunk)| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    let result = tokio::time::timeout(timeout, embedder.embed(&chunk.text))
                        .await
                        .unwrap_or(Err(CoachError::Timeout(timeout_secs)));
                    (idx, result)
                }
            })
            .buffer_unordered(self.settings.embedding.max_concurrent.max(1));

        let mut results = Vec::with_capacity(chunks.len());
        while let Some(item) = stream.next().await {
            pb.inc(1);
            results.push(item);
        }
        pb.finish_and_clear();

        // Completion order is arbitrary; restore chunk order.
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Read every `.txt` file directly under `folder`, sorted by filename.
fn read_documents(folder: &Path) -> Result<(Vec<(String, String)>, Vec<String>)> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::read_to_string(&path) {
            Ok(text) => documents.push((filename, text)),
            Err(e) => {
                warn!("Skipping unreadable document {}: {}", path.display(), e);
                skipped.push(filename);
            }
        }
    }

    Ok((documents, skipped))
}
