//! src/llm/catalog.rs
//
// Model and agent catalogs. Fetched once, then trusted until the cache file is removed.

use crate::errors::Result;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_AGENT_SLUG: &str = "copilot";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelLimits {
    pub max_context_window_tokens: u64,
    pub max_output_tokens: u64,
    pub max_prompt_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSupports {
    pub streaming: bool,
    pub tool_calls: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCapabilities {
    pub family: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tokenizer: String,
    pub limits: ModelLimits,
    pub supports: ModelSupports,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub preview: bool,
    pub model_picker_enabled: bool,
    pub capabilities: ModelCapabilities,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDescriptor {
    pub name: String,
    pub slug: String,
    pub default: bool,
    pub description: String,
}

impl AgentDescriptor {
    /// The no-op agent every catalog carries.
    pub fn noop_default() -> Self {
        Self {
            name: DEFAULT_AGENT_SLUG.to_string(),
            slug: DEFAULT_AGENT_SLUG.to_string(),
            default: true,
            description: "Default noop agent".to_string(),
        }
    }
}

pub type ModelCatalog = BTreeMap<String, ModelDescriptor>;
pub type AgentCatalog = BTreeMap<String, AgentDescriptor>;

/// `GET /models`
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<ModelDescriptor>,
}

/// `GET /agents`
#[derive(Debug, Deserialize)]
pub struct AgentsResponse {
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

/// In-memory catalogs backed by `models.json` and `agents.json`.
#[derive(Debug, Default)]
pub struct CatalogCache {
    models_path: Option<PathBuf>,
    agents_path: Option<PathBuf>,
    models: ModelCatalog,
    agents: AgentCatalog,
}

impl CatalogCache {
    pub fn new(models_path: Option<PathBuf>, agents_path: Option<PathBuf>) -> Self {
        Self {
            models_path,
            agents_path,
            ..Self::default()
        }
    }

    /// Creates the cache and fills it from disk when the files are readable.
    pub async fn load(models_path: Option<PathBuf>, agents_path: Option<PathBuf>) -> Self {
        let mut cache = Self::new(models_path, agents_path);
        if let Some(path) = &cache.models_path {
            cache.models = storage::load_json(path).await.unwrap_or_default();
        }
        if let Some(path) = &cache.agents_path {
            cache.agents = storage::load_json(path).await.unwrap_or_default();
        }
        log::debug!(
            "Catalog cache loaded: {} models, {} agents",
            cache.models.len(),
            cache.agents.len()
        );
        cache
    }

    pub fn has_models(&self) -> bool {
        !self.models.is_empty()
    }

    pub fn has_agents(&self) -> bool {
        !self.agents.is_empty()
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub fn agents(&self) -> &AgentCatalog {
        &self.agents
    }

    /// Keeps only picker-enabled models, persists them and returns the catalog.
    pub async fn populate_models(&mut self, fetched: Vec<ModelDescriptor>) -> Result<&ModelCatalog> {
        self.models = fetched
            .into_iter()
            .filter(|model| model.model_picker_enabled)
            .map(|model| (model.id.clone(), model))
            .collect();

        if let Some(path) = &self.models_path {
            storage::save_json("save models", path, &self.models).await?;
        }
        Ok(&self.models)
    }

    /// Stores the fetched agents plus the default agent, persists and returns them.
    pub async fn populate_agents(&mut self, fetched: Vec<AgentDescriptor>) -> Result<&AgentCatalog> {
        self.agents = fetched
            .into_iter()
            .map(|agent| (agent.slug.clone(), agent))
            .collect();
        let default = AgentDescriptor::noop_default();
        self.agents.insert(default.slug.clone(), default);

        if let Some(path) = &self.agents_path {
            storage::save_json("save agents", path, &self.agents).await?;
        }
        Ok(&self.agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, picker: bool) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: id.to_uppercase(),
            vendor: "Azure OpenAI".to_string(),
            model_picker_enabled: picker,
            capabilities: ModelCapabilities {
                family: id.to_string(),
                limits: ModelLimits {
                    max_output_tokens: 4096,
                    ..ModelLimits::default()
                },
                ..ModelCapabilities::default()
            },
            ..ModelDescriptor::default()
        }
    }

    #[tokio::test]
    async fn populate_keeps_picker_models_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let models_path = dir.path().join("models.json");
        let mut cache = CatalogCache::new(Some(models_path.clone()), None);
        assert!(!cache.has_models());

        let models = cache
            .populate_models(vec![model("gpt-4o", true), model("text-embedding-3", false)])
            .await
            .unwrap();
        assert_eq!(models.keys().collect::<Vec<_>>(), vec!["gpt-4o"]);

        let reloaded = CatalogCache::load(Some(models_path), None).await;
        assert!(reloaded.has_models());
        assert_eq!(reloaded.models()["gpt-4o"].capabilities.limits.max_output_tokens, 4096);
    }

    #[tokio::test]
    async fn agents_always_include_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let agents_path = dir.path().join("agents.json");
        let mut cache = CatalogCache::new(None, Some(agents_path.clone()));

        let agents = cache.populate_agents(Vec::new()).await.unwrap();
        assert_eq!(agents.len(), 1);
        assert!(agents[DEFAULT_AGENT_SLUG].default);

        let fetched = vec![AgentDescriptor {
            name: "GitHub".to_string(),
            slug: "github".to_string(),
            default: false,
            description: "Ask about repositories".to_string(),
        }];
        let agents = cache.populate_agents(fetched).await.unwrap();
        assert_eq!(agents.len(), 2);
        assert!(agents.contains_key("github"));
        assert!(agents_path.exists());
    }

    #[tokio::test]
    async fn malformed_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let models_path = dir.path().join("models.json");
        std::fs::write(&models_path, "[1, 2").unwrap();

        let cache = CatalogCache::load(Some(models_path), None).await;
        assert!(!cache.has_models());
    }
}
