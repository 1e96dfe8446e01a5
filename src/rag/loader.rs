//! Selector → loaded index, metadata and tone, with an optional read-through cache.
//!
//! Cached entries remember the modification time and size of the index file
//! they were read from. A rebuild replaces that file, so the next load after
//! it reads the new pair without a restart.

use crate::config::{AgentPaths, Settings, ToneData};
use crate::error::{CoachError, Result};
use crate::vector_store::{load_pair, LoadedPair};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Everything needed to answer for one selector. Read-only once loaded.
#[derive(Debug)]
pub struct LoadedAgent {
    pub selector: String,
    pub pair: LoadedPair,
    pub tone: Option<ToneData>,
}

/// Identity of an index file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    async fn of(path: &Path) -> Option<Self> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CachedAgent {
    agent: Arc<LoadedAgent>,
    stamp: Option<FileStamp>,
}

/// Loads index/metadata pairs. Purely local; never touches the network.
pub struct IndexLoader {
    agents: HashMap<String, AgentPaths>,
    cache: Option<RwLock<HashMap<String, CachedAgent>>>,
}

impl IndexLoader {
    /// Create a loader over the selectors configured in `settings`.
    pub fn new(settings: &Settings) -> Self {
        let agents = settings
            .selectors()
            .into_iter()
            .filter_map(|s| settings.agent_paths(&s).map(|p| (s, p)))
            .collect();

        Self {
            agents,
            cache: settings
                .rag
                .cache_indexes
                .then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Load the pair for `selector`.
    ///
    /// All-or-nothing: `NotFound` if the selector is unknown or either file is
    /// missing, `CorruptIndex` if the files disagree.
    pub async fn load(&self, selector: &str) -> Result<Arc<LoadedAgent>> {
        let paths = self
            .agents
            .get(selector)
            .cloned()
            .ok_or_else(|| CoachError::NotFound(selector.to_string()))?;

        let stamp = FileStamp::of(&paths.index).await;

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.read().await.get(selector) {
                if stamp.is_some() && cached.stamp == stamp {
                    debug!("Index cache hit for {}", selector);
                    return Ok(Arc::clone(&cached.agent));
                }
                debug!("Index for {} changed on disk; reloading", selector);
            }
        }

        let owned_selector = selector.to_string();
        let agent = tokio::task::spawn_blocking(move || load_agent(&owned_selector, &paths))
            .await
            .map_err(|e| CoachError::Io(std::io::Error::other(e)))??;
        let agent = Arc::new(agent);

        info!(
            "Loaded index for {}: {} vectors, dimension {}",
            selector,
            agent.pair.index.len(),
            agent.pair.index.dimension()
        );

        if let Some(cache) = &self.cache {
            cache.write().await.insert(
                selector.to_string(),
                CachedAgent {
                    agent: Arc::clone(&agent),
                    stamp,
                },
            );
        }

        Ok(agent)
    }
}

fn load_agent(selector: &str, paths: &AgentPaths) -> Result<LoadedAgent> {
    let pair = load_pair(selector, &paths.index, &paths.metadata)?;
    let tone = paths.tone.as_deref().and_then(ToneData::load);
    Ok(LoadedAgent {
        selector: selector.to_string(),
        pair,
        tone,
    })
}
