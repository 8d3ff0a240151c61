//! The categorization engine: concurrent fan-out over the four strategies,
//! weighted fan-in, explanation, and notification.

use crate::catalog::{CategoryManager, SnapshotMeta, SnapshotStore};
use crate::classifier::{NaiveBayes, CLASSIFIER_SNAPSHOT};
use crate::config::CategorizationConfig;
use crate::ensemble::{self, StrategyOutcome};
use crate::entities::{EntityExtractor, EntityMatcher, LazyEntities};
use crate::error::{CategorizeError, Result};
use crate::events::{CategorizationEvent, EventBus};
use crate::explain;
use crate::keywords::{KeywordIndex, KeywordScorer};
use crate::ml::{self, MlScorer};
use crate::models::{
    CategorizationResult, CategorizeOptions, Document, Feedback, Strategy, StrategyWeights,
    TrainingSample,
};
use crate::rules::{RuleEvaluator, RuleRegistry};
use crate::vectorstore::NeighborIndex;
use crate::weights;
use providers::ProviderRegistry;
use std::sync::Arc;
use tokio::sync::{broadcast, OnceCell, RwLock};
use tracing::{debug, info, warn};

/// External services the engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CategoryManager>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub neighbors: Arc<dyn NeighborIndex>,
    pub registry: ProviderRegistry,
    /// `None` uses the registry's preferred LLM.
    pub llm_provider: Option<String>,
}

pub struct AutoCategorizer {
    settings: CategorizationConfig,
    catalog: Arc<dyn CategoryManager>,
    snapshots: Arc<dyn SnapshotStore>,
    neighbors: Arc<dyn NeighborIndex>,
    registry: ProviderRegistry,
    rules: RuleRegistry,
    extractor: EntityExtractor,
    weights: RwLock<StrategyWeights>,
    classifier: RwLock<Option<Arc<NaiveBayes>>>,
    keyword_index: RwLock<Arc<KeywordIndex>>,
    initialized: OnceCell<()>,
    events: EventBus,
}

impl AutoCategorizer {
    /// `weights` are used until persisted weights are loaded by [`initialize`](Self::initialize).
    pub fn new(
        settings: CategorizationConfig,
        weights: StrategyWeights,
        collaborators: Collaborators,
    ) -> Self {
        let extractor = EntityExtractor {
            registry: collaborators.registry.clone(),
            provider: collaborators.llm_provider.clone(),
            excerpt_chars: settings.entity_excerpt_chars,
            max_tokens: settings.entity_max_tokens,
            temperature: settings.entity_temperature,
        };
        Self {
            settings,
            catalog: collaborators.catalog,
            snapshots: collaborators.snapshots,
            neighbors: collaborators.neighbors,
            registry: collaborators.registry,
            rules: RuleRegistry::default(),
            extractor,
            weights: RwLock::new(weights),
            classifier: RwLock::new(None),
            keyword_index: RwLock::new(Arc::new(KeywordIndex::default())),
            initialized: OnceCell::new(),
            events: EventBus::default(),
        }
    }

    /// Replaces the rule dispatch table, e.g. to add custom rule types.
    pub fn with_rule_registry(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    /// Loads persisted weights, the keyword index and the classifier snapshot.
    /// Trains from confirmed categorizations when no snapshot exists and
    /// `train_on_startup` is set. Runs once; later calls return immediately.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                if let Some(persisted) = self
                    .catalog
                    .strategy_weights()
                    .await
                    .map_err(CategorizeError::Catalog)?
                {
                    *self.weights.write().await = persisted;
                }
                self.refresh_keyword_index().await?;

                let loaded = match self.snapshots.latest(CLASSIFIER_SNAPSHOT).await {
                    Ok(Some(snapshot)) => match NaiveBayes::from_bytes(&snapshot.bytes) {
                        Ok(model) => {
                            info!(version = snapshot.meta.version, hash = %snapshot.meta.hash, "loaded classifier snapshot");
                            *self.classifier.write().await = Some(Arc::new(model));
                            true
                        }
                        Err(err) => {
                            warn!(error = %err, "ignoring unreadable classifier snapshot");
                            false
                        }
                    },
                    Ok(None) => false,
                    Err(err) => {
                        warn!(error = %err, "classifier snapshot unavailable");
                        false
                    }
                };

                if !loaded && self.settings.train_on_startup {
                    let samples = self
                        .catalog
                        .confirmed_categorizations(self.settings.training_min_confidence)
                        .await
                        .map_err(CategorizeError::Catalog)?;
                    if !samples.is_empty() {
                        self.train_inner(&samples, true).await?;
                    }
                }
                info!("categorizer initialized");
                Ok::<(), CategorizeError>(())
            })
            .await?;
        Ok(())
    }

    /// Reloads cached keyword dictionaries for the active categories.
    pub async fn refresh_keyword_index(&self) -> Result<()> {
        let categories = self
            .catalog
            .categories(true)
            .await
            .map_err(CategorizeError::Catalog)?;
        let index = KeywordIndex::load(self.catalog.as_ref(), &categories).await?;
        debug!(categories = index.len(), "keyword index loaded");
        *self.keyword_index.write().await = Arc::new(index);
        Ok(())
    }

    pub async fn strategy_weights(&self) -> StrategyWeights {
        self.weights.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CategorizationEvent> {
        self.events.subscribe()
    }

    /// Categorizes with the configured default options.
    pub async fn categorize(&self, document: &Document) -> Result<Vec<CategorizationResult>> {
        self.categorize_document(document, &self.settings.options())
            .await
    }

    /// Runs the requested strategies concurrently and combines them.
    ///
    /// Malformed rule or pattern configuration and catalog read failures abort
    /// the call. Embedding, vector search and LLM failures only empty their
    /// own strategy.
    pub async fn categorize_document(
        &self,
        document: &Document,
        options: &CategorizeOptions,
    ) -> Result<Vec<CategorizationResult>> {
        self.initialize().await?;

        let categories = self
            .catalog
            .categories(true)
            .await
            .map_err(CategorizeError::Catalog)?;
        if categories.is_empty() {
            debug!(document = %document.id, "no active categories");
            self.events
                .publish(CategorizationEvent::new(&document.id, Vec::new()));
            return Ok(Vec::new());
        }

        let weights = self.weights.read().await.clone();
        let classifier = self.classifier.read().await.clone();
        let keyword_index = self.keyword_index.read().await.clone();
        let entities = LazyEntities::new(&self.extractor, document);
        let wants = |s: Strategy| options.strategies.contains(&s);

        let rules = async {
            if !wants(Strategy::Rules) {
                return Ok(None);
            }
            RuleEvaluator {
                registry: &self.rules,
                catalog: self.catalog.as_ref(),
            }
            .score(&categories, document, &entities)
            .await
            .map(Some)
        };
        let keywords = async {
            if !wants(Strategy::Keywords) {
                return Ok(None);
            }
            KeywordScorer {
                catalog: self.catalog.as_ref(),
                index: &keyword_index,
                normalization: self.settings.keyword_normalization,
            }
            .score(&categories, document)
            .await
            .map(Some)
        };
        let ml = async {
            if !wants(Strategy::Ml) {
                return None;
            }
            let scorer = MlScorer {
                registry: &self.registry,
                embedding_provider: None,
                index: self.neighbors.as_ref(),
                classifier: classifier.as_deref(),
                neighbors: self.settings.neighbors,
                char_budget: self.settings.embedding_char_budget,
                classifier_bonus: self.settings.classifier_bonus,
            };
            Some(scorer.score(&categories, document).await)
        };
        let entity_scores = async {
            if !wants(Strategy::Entities) {
                return Ok(None);
            }
            EntityMatcher {
                catalog: self.catalog.as_ref(),
            }
            .score(&categories, &entities)
            .await
            .map(Some)
        };

        let (rules, keywords, ml, entity_scores) =
            tokio::join!(rules, keywords, ml, entity_scores);

        let mut outcomes = Vec::with_capacity(4);
        for (strategy, scores) in [
            (Strategy::Rules, rules?),
            (Strategy::Keywords, keywords?),
            (Strategy::Ml, ml),
            (Strategy::Entities, entity_scores?),
        ] {
            if let Some(scores) = scores {
                outcomes.push(StrategyOutcome { strategy, scores });
            }
        }

        let combined = ensemble::combine(&outcomes, &options.strategies, &weights);
        let mut results = ensemble::select(combined, options.threshold, options.max_categories);
        explain::attach_explanations(&mut results);

        info!(document = %document.id, categories = results.len(), "document categorized");
        self.events
            .publish(CategorizationEvent::new(&document.id, results.clone()));
        Ok(results)
    }

    /// Adds `samples` to the current classifier, persists a new snapshot and
    /// swaps the model in. Callers must not run this concurrently with itself.
    pub async fn train_classifier(
        &self,
        samples: &[TrainingSample],
    ) -> Result<Option<SnapshotMeta>> {
        self.initialize().await?;
        self.train_inner(samples, false).await
    }

    /// Like [`train_classifier`](Self::train_classifier) but discards the current model first.
    pub async fn rebuild_classifier(
        &self,
        samples: &[TrainingSample],
    ) -> Result<Option<SnapshotMeta>> {
        self.initialize().await?;
        self.train_inner(samples, true).await
    }

    async fn train_inner(
        &self,
        samples: &[TrainingSample],
        fresh: bool,
    ) -> Result<Option<SnapshotMeta>> {
        if samples.is_empty() {
            return Ok(None);
        }
        let mut model = match (fresh, self.classifier.read().await.as_deref()) {
            (false, Some(current)) => current.clone(),
            _ => NaiveBayes::new(),
        };
        model.train(samples);
        let bytes = model.to_bytes()?;
        let meta = self
            .snapshots
            .put(CLASSIFIER_SNAPSHOT, &bytes)
            .await
            .map_err(CategorizeError::Catalog)?;
        *self.classifier.write().await = Some(Arc::new(model));
        info!(samples = samples.len(), version = meta.version, hash = %meta.hash, "classifier trained");
        Ok(Some(meta))
    }

    /// Recomputes strategy weights from feedback and returns them so the
    /// caller can persist them.
    pub async fn update_strategy_weights(&self, feedback: &[Feedback]) -> Result<StrategyWeights> {
        self.initialize().await?;
        let mut current = self.weights.write().await;
        let updated = weights::adapt(&current, feedback);
        if updated != *current {
            info!(feedback = feedback.len(), weights = ?updated, "strategy weights updated");
        }
        *current = updated.clone();
        Ok(updated)
    }

    /// Stores the document's embedding and assigned categories so later
    /// calls can find it as a neighbor.
    pub async fn index_categorized(
        &self,
        document: &Document,
        results: &[CategorizationResult],
    ) -> anyhow::Result<()> {
        let vector = match &document.embedding {
            Some(v) => v.clone(),
            None => {
                let text = ml::embedding_text(document, self.settings.embedding_char_budget);
                ml::embed_text(&self.registry, None, &text).await?
            }
        };
        if vector.is_empty() {
            debug!(document = %document.id, "empty embedding, not indexed");
            return Ok(());
        }
        let categories: Vec<(String, f32)> = results
            .iter()
            .map(|r| (r.category_id.clone(), r.confidence))
            .collect();
        self.neighbors
            .index(&document.id, &vector, &categories)
            .await
    }
}
