use crate::models::{CategorizeOptions, Strategy, StrategyWeights};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vectors: VectorConfig,
    #[serde(default)]
    pub categorization: CategorizationConfig,
    #[serde(default = "default_weights")]
    pub weights: HashMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/categorizer.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "noop".to_string(),
            model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// `sqlite` (brute-force over stored embeddings) or `qdrant`.
    pub provider: String,
    pub url: Option<String>,
    pub collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            url: None,
            collection: "categorized_documents".to_string(),
        }
    }
}

/// Tunables for a categorization call and the strategies behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizationConfig {
    pub threshold: f32,
    pub max_categories: usize,
    pub strategies: Vec<Strategy>,
    /// Nearest previously-categorized documents consulted by the ML strategy.
    pub neighbors: usize,
    pub embedding_char_budget: usize,
    pub classifier_bonus: f32,
    pub keyword_normalization: f32,
    pub entity_excerpt_chars: usize,
    pub entity_max_tokens: u32,
    pub entity_temperature: f32,
    pub train_on_startup: bool,
    pub training_min_confidence: f32,
}

impl Default for CategorizationConfig {
    fn default() -> Self {
        let options = CategorizeOptions::default();
        Self {
            threshold: options.threshold,
            max_categories: options.max_categories,
            strategies: options.strategies,
            neighbors: 10,
            embedding_char_budget: 8000,
            classifier_bonus: 0.3,
            keyword_normalization: 0.1,
            entity_excerpt_chars: 3000,
            entity_max_tokens: 500,
            entity_temperature: 0.3,
            train_on_startup: true,
            training_min_confidence: 0.8,
        }
    }
}

impl CategorizationConfig {
    pub fn options(&self) -> CategorizeOptions {
        CategorizeOptions {
            strategies: self.strategies.clone(),
            threshold: self.threshold,
            max_categories: self.max_categories,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            embeddings: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            vectors: VectorConfig::default(),
            categorization: CategorizationConfig::default(),
            weights: default_weights(),
        }
    }
}

fn default_weights() -> HashMap<String, f32> {
    [("rules", 0.3), ("keywords", 0.2), ("ml", 0.3), ("entities", 0.2)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl AppConfig {
    /// Initial strategy weights; unknown names are skipped with a warning.
    pub fn initial_weights(&self) -> StrategyWeights {
        self.weights
            .iter()
            .filter_map(|(name, weight)| match name.parse::<Strategy>() {
                Ok(strategy) => Some((strategy, *weight)),
                Err(err) => {
                    tracing::warn!(%err, "ignoring configured weight");
                    None
                }
            })
            .collect()
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("CATEGORIZER").separator("__"));
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_toml_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
path = "sqlite::memory:"

[categorization]
threshold = 0.4
strategies = ["rules", "keywords"]

[weights]
rules = 0.7
ml = 0.1
"#
        )
        .unwrap();
        let cfg = load(file.path().to_str()).unwrap();
        assert_eq!(cfg.database.path, "sqlite::memory:");
        assert_eq!(cfg.categorization.threshold, 0.4);
        assert_eq!(cfg.categorization.max_categories, 5);
        assert_eq!(
            cfg.categorization.strategies,
            vec![Strategy::Rules, Strategy::Keywords]
        );
        let weights = cfg.initial_weights();
        assert_eq!(weights.get(Strategy::Rules), 0.7);
        assert!(!weights.contains(Strategy::Entities));
    }

    #[test]
    fn default_weights_cover_every_strategy() {
        let cfg = AppConfig::default();
        let weights = cfg.initial_weights();
        for strategy in Strategy::ALL {
            assert!(weights.contains(strategy));
        }
    }
}
