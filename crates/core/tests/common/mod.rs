#![allow(dead_code)]

use categorizer_core::catalog::{content_hash, CategoryManager, Snapshot, SnapshotMeta, SnapshotStore};
use categorizer_core::config::CategorizationConfig;
use categorizer_core::engine::{AutoCategorizer, Collaborators};
use categorizer_core::models::{
    Category, CategoryKeyword, EntityPattern, Rule, StrategyWeights, TrainingSample,
};
use categorizer_core::vectorstore::{cosine_similarity, Neighbor, NeighborIndex};
use providers::{
    CompletionRequest, EmbedResponse, EmbeddingProvider, LlmProvider, ProviderError,
    ProviderRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryCatalog {
    pub categories: Mutex<Vec<Category>>,
    pub rules: Mutex<Vec<Rule>>,
    pub keywords: Mutex<Vec<CategoryKeyword>>,
    pub patterns: Mutex<Vec<EntityPattern>>,
    pub weights: Mutex<Option<StrategyWeights>>,
    pub training: Mutex<Vec<TrainingSample>>,
    pub snapshots: Mutex<Vec<Snapshot>>,
    pub vectors: Mutex<Vec<(String, Vec<f32>, Vec<(String, f32)>)>>,
}

impl MemoryCatalog {
    pub fn category(&self, id: &str, path: &str) -> &Self {
        self.categories.lock().unwrap().push(Category {
            id: id.into(),
            path: path.into(),
            name: id.into(),
            description: String::new(),
            is_active: true,
        });
        self
    }

    pub fn rule(&self, category_id: &str, rule_type: &str, pattern: &str, confidence: f32) -> &Self {
        let mut rules = self.rules.lock().unwrap();
        let id = rules.len() as i64 + 1;
        rules.push(Rule {
            id,
            category_id: category_id.into(),
            rule_type: rule_type.into(),
            pattern: pattern.into(),
            confidence,
        });
        self
    }

    pub fn keyword(&self, category_id: &str, term: &str, weight: f32) -> &Self {
        self.keywords.lock().unwrap().push(CategoryKeyword {
            category_id: category_id.into(),
            term: term.into(),
            weight,
        });
        self
    }

    pub fn pattern(&self, category_id: &str, weight: f32, json: &str) -> &Self {
        self.patterns.lock().unwrap().push(EntityPattern {
            id: 0,
            category_id: category_id.into(),
            weight,
            pattern: json.into(),
        });
        self
    }

    pub fn neighbor(&self, document_id: &str, vector: Vec<f32>, categories: &[(&str, f32)]) -> &Self {
        self.vectors.lock().unwrap().push((
            document_id.into(),
            vector,
            categories.iter().map(|(c, w)| (c.to_string(), *w)).collect(),
        ));
        self
    }
}

#[async_trait::async_trait]
impl CategoryManager for MemoryCatalog {
    async fn categories(&self, active_only: bool) -> anyhow::Result<Vec<Category>> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect())
    }

    async fn category(&self, id: &str) -> anyhow::Result<Option<Category>> {
        Ok(self.categories.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn category_rules(&self, category_id: &str) -> anyhow::Result<Vec<Rule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn category_keywords(&self, category_id: &str) -> anyhow::Result<Vec<CategoryKeyword>> {
        Ok(self
            .keywords
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn entity_patterns(&self, category_id: &str) -> anyhow::Result<Vec<EntityPattern>> {
        Ok(self
            .patterns
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn strategy_weights(&self) -> anyhow::Result<Option<StrategyWeights>> {
        Ok(self.weights.lock().unwrap().clone())
    }

    async fn save_strategy_weights(&self, weights: &StrategyWeights) -> anyhow::Result<()> {
        *self.weights.lock().unwrap() = Some(weights.clone());
        Ok(())
    }

    async fn confirmed_categorizations(
        &self,
        _min_confidence: f32,
    ) -> anyhow::Result<Vec<TrainingSample>> {
        Ok(self.training.lock().unwrap().clone())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryCatalog {
    async fn put(&self, name: &str, bytes: &[u8]) -> anyhow::Result<SnapshotMeta> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let meta = SnapshotMeta {
            name: name.into(),
            version: snapshots.iter().filter(|s| s.meta.name == name).count() as i64 + 1,
            hash: content_hash(bytes),
        };
        snapshots.push(Snapshot {
            meta: meta.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(meta)
    }

    async fn latest(&self, name: &str) -> anyhow::Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.meta.name == name)
            .cloned())
    }
}

#[async_trait::async_trait]
impl NeighborIndex for MemoryCatalog {
    async fn nearest(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
        let mut hits: Vec<Neighbor> = self
            .vectors
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(id, v, cats)| {
                cosine_similarity(vector, v).map(|similarity| Neighbor {
                    document_id: id.clone(),
                    similarity,
                    categories: cats.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }

    async fn index(
        &self,
        document_id: &str,
        vector: &[f32],
        categories: &[(String, f32)],
    ) -> anyhow::Result<()> {
        self.vectors.lock().unwrap().push((
            document_id.into(),
            vector.to_vec(),
            categories.to_vec(),
        ));
        Ok(())
    }
}

/// Returns the same vector for every text.
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait::async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: vec![self.0.clone(); texts.len()],
        })
    }
}

pub struct FailingEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Err(ProviderError::RequestFailed("embedding service down".into()))
    }
}

/// Replies with a canned completion and counts calls.
pub struct ScriptedLlm {
    pub reply: Result<String, String>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn ok(reply: &str) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err("provider timeout".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map_err(ProviderError::RequestFailed)
    }
}

pub fn registry(embedder: Arc<dyn EmbeddingProvider>, llm: Arc<dyn LlmProvider>) -> ProviderRegistry {
    ProviderRegistry::new()
        .with_embedding("test", embedder)
        .with_llm("test", llm)
        .set_preferred_embedding("test")
        .set_preferred_llm("test")
}

pub fn engine_with(
    catalog: Arc<MemoryCatalog>,
    registry: ProviderRegistry,
    weights: StrategyWeights,
) -> AutoCategorizer {
    let settings = CategorizationConfig {
        threshold: 0.0,
        ..CategorizationConfig::default()
    };
    AutoCategorizer::new(
        settings,
        weights,
        Collaborators {
            catalog: catalog.clone(),
            snapshots: catalog.clone(),
            neighbors: catalog,
            registry,
            llm_provider: None,
        },
    )
}
