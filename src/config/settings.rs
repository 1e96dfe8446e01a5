//! Configuration settings for Coachloop.

use crate::error::{CoachError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Selectors shipped in the default configuration.
pub const DEFAULT_SELECTORS: [&str; 3] = ["negotiation", "presentation", "behavior"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub rag: RagSettings,
    pub coach: CoachSettings,
    pub server: ServerSettings,
    /// Selector → index/metadata/tone paths. Static; never derived at request time.
    ///
    /// When empty, the [`DEFAULT_SELECTORS`] are placed under `general.data_dir`.
    pub agents: BTreeMap<String, AgentSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            embedding: EmbeddingSettings::default(),
            chunking: ChunkingSettings::default(),
            rag: RagSettings::default(),
            coach: CoachSettings::default(),
            server: ServerSettings::default(),
            agents: BTreeMap::new(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing indexes and tone files.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.coachloop".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Maximum concurrent embedding requests while indexing.
    pub max_concurrent: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: crate::embedding::DEFAULT_MODEL.to_string(),
            dimensions: crate::embedding::DEFAULT_DIMENSIONS as u32,
            max_concurrent: 4,
            timeout_secs: 30,
        }
    }
}

/// Word-window chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum words per chunk.
    pub max_words: usize,
    /// Words shared by consecutive chunks.
    pub overlap_words: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_words: 750,
            overlap_words: 150,
        }
    }
}

/// Retrieval-augmented response settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// LLM model for response generation.
    pub model: String,
    /// Number of nearest neighbours to fetch.
    pub top_k: usize,
    /// Upper bound for each external call made while answering.
    pub request_timeout_secs: u64,
    /// Keep loaded index/metadata pairs in memory between requests.
    pub cache_indexes: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            top_k: 3,
            request_timeout_secs: 60,
            cache_indexes: true,
        }
    }
}

/// Scripted coaching dialogue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachSettings {
    /// LLM model for step replies and summaries.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Reply length cap.
    pub max_tokens: u32,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.8,
            max_tokens: 150,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// CORS origins. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Files backing one selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSettings {
    /// Persisted vector index.
    pub index_path: String,
    /// Persisted metadata records, parallel to the index.
    pub metadata_path: String,
    /// Optional tone JSON (purpose, role, session structure).
    #[serde(default)]
    pub tone_path: Option<String>,
    /// Folder of cleaned `.txt` documents used by `index --all`.
    #[serde(default)]
    pub source_dir: Option<String>,
}

impl AgentSettings {
    /// Paths derived from the selector name under `data_dir`.
    pub fn derived(data_dir: &str, selector: &str) -> Self {
        let base = format!("{}/indexes/{}", data_dir.trim_end_matches('/'), selector);
        Self {
            index_path: format!("{}/index_{}.json", base, selector),
            metadata_path: format!("{}/metadata_{}.json", base, selector),
            tone_path: Some(format!("{}/tone_{}.json", base, selector)),
            source_dir: None,
        }
    }
}

/// Resolved, tilde-expanded paths for one selector.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
    pub tone: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoachError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject combinations that would make chunking or search meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_words == 0 {
            return Err(CoachError::Config("chunking.max_words must be at least 1".to_string()));
        }
        if self.chunking.overlap_words >= self.chunking.max_words {
            return Err(CoachError::Config(format!(
                "chunking.overlap_words ({}) must be smaller than chunking.max_words ({})",
                self.chunking.overlap_words, self.chunking.max_words
            )));
        }
        if self.rag.top_k == 0 {
            return Err(CoachError::Config("rag.top_k must be at least 1".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(CoachError::Config("embedding.dimensions must be at least 1".to_string()));
        }
        if self.embedding.max_concurrent == 0 {
            return Err(CoachError::Config(
                "embedding.max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coachloop")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// The agent table in effect: the configured one, or the default
    /// selectors under the configured `data_dir`.
    pub fn agent_table(&self) -> Cow<'_, BTreeMap<String, AgentSettings>> {
        if !self.agents.is_empty() {
            return Cow::Borrowed(&self.agents);
        }
        Cow::Owned(
            DEFAULT_SELECTORS
                .iter()
                .map(|s| (s.to_string(), AgentSettings::derived(&self.general.data_dir, s)))
                .collect(),
        )
    }

    /// Configured selectors in sorted order.
    pub fn selectors(&self) -> Vec<String> {
        self.agent_table().keys().cloned().collect()
    }

    /// Resolve a selector to its files. `None` when the selector is not configured.
    pub fn agent_paths(&self, selector: &str) -> Option<AgentPaths> {
        self.agent_table().get(selector).map(|agent| AgentPaths {
            index: Self::expand_path(&agent.index_path),
            metadata: Self::expand_path(&agent.metadata_path),
            tone: agent.tone_path.as_deref().map(Self::expand_path),
            source_dir: agent.source_dir.as_deref().map(Self::expand_path),
        })
    }

    /// Point every selector at files under `data_dir`, replacing the agent table.
    pub fn with_derived_agents(mut self, data_dir: &str, selectors: &[&str]) -> Self {
        self.general.data_dir = data_dir.to_string();
        self.agents = selectors
            .iter()
            .map(|s| (s.to_string(), AgentSettings::derived(data_dir, s)))
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_agents() {
        let settings = Settings::default();
        assert_eq!(settings.selectors(), vec!["behavior", "negotiation", "presentation"]);

        let paths = settings.agent_paths("negotiation").unwrap();
        assert!(paths.index.ends_with("indexes/negotiation/index_negotiation.json"));
        assert!(paths.metadata.ends_with("indexes/negotiation/metadata_negotiation.json"));
        assert!(!paths.index.to_string_lossy().starts_with('~'));

        assert!(settings.agent_paths("nonexistent").is_none());
    }

    #[test]
    fn test_default_agents_follow_configured_data_dir() {
        let settings: Settings = toml::from_str(
            r#"
            [general]
            data_dir = "/srv/coach"
        "#,
        )
        .unwrap();
        assert_eq!(settings.selectors(), vec!["behavior", "negotiation", "presentation"]);

        for selector in DEFAULT_SELECTORS {
            let paths = settings.agent_paths(selector).unwrap();
            assert!(paths.index.starts_with("/srv/coach/indexes"));
            assert!(paths.metadata.starts_with("/srv/coach/indexes"));
            assert!(paths.tone.unwrap().starts_with("/srv/coach/indexes"));
        }
    }

    #[test]
    fn test_config_file_with_only_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general]\ndata_dir = \"/srv/coach\"\n").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(
            settings.agent_paths("behavior").unwrap().index,
            PathBuf::from("/srv/coach/indexes/behavior/index_behavior.json")
        );
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut settings = Settings::default();
        settings.validate().unwrap();

        settings.chunking.overlap_words = settings.chunking.max_words;
        assert!(matches!(settings.validate(), Err(CoachError::Config(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [rag]
            top_k = 1

            [agents.sales]
            index_path = "/srv/idx/sales.json"
            metadata_path = "/srv/idx/sales_meta.json"
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.rag.top_k, 1);
        assert_eq!(settings.rag.model, "gpt-4");
        assert_eq!(settings.chunking.max_words, 750);

        let paths = settings.agent_paths("sales").unwrap();
        assert_eq!(paths.index, PathBuf::from("/srv/idx/sales.json"));
        assert!(paths.tone.is_none());
    }

    #[test]
    fn test_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let settings = Settings::default().with_derived_agents("/data", &["sales"]);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.selectors(), vec!["sales"]);
        assert_eq!(
            loaded.agent_paths("sales").unwrap().index,
            PathBuf::from("/data/indexes/sales/index_sales.json")
        );
    }
}
