//! Category definitions authored as TOML and loaded into the catalog.
//!
//! ```toml
//! [[categories]]
//! id = "ai"
//! path = "Technology/AI"
//! name = "Artificial Intelligence"
//!
//! [[categories.rules]]
//! rule_type = "contains"
//! pattern = "neural,model,training"
//! confidence = 0.8
//!
//! [categories.keywords]
//! "machine learning" = 1.0
//!
//! [[categories.entity_patterns]]
//! weight = 0.9
//! organizations = ["OpenAI", "DeepMind"]
//! ```

use crate::catalog::SqliteCatalog;
use crate::models::{Category, CategoryKeyword, EntityPattern, EntitySet, Rule};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionFile {
    #[serde(default)]
    pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub keywords: BTreeMap<String, f32>,
    #[serde(default)]
    pub entity_patterns: Vec<PatternDefinition>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleDefinition {
    pub rule_type: String,
    pub pattern: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternDefinition {
    #[serde(default = "default_pattern_weight")]
    pub weight: f32,
    #[serde(flatten)]
    pub entities: EntitySet,
}

fn default_pattern_weight() -> f32 {
    1.0
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories: usize,
    pub rules: usize,
    pub keywords: usize,
    pub entity_patterns: usize,
}

pub fn load_definitions(path: &Path) -> anyhow::Result<DefinitionFile> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Upserts categories and keywords; each imported category's rules and entity
/// patterns replace the stored ones, so importing the same file twice is a no-op.
pub async fn import_definitions(
    catalog: &SqliteCatalog,
    file: &DefinitionFile,
) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for def in &file.categories {
        catalog
            .insert_category(&Category {
                id: def.id.clone(),
                path: def.path.clone(),
                name: def.name.clone(),
                description: def.description.clone(),
                is_active: def.active,
            })
            .await?;
        summary.categories += 1;

        let replaced = catalog.clear_rules_and_patterns(&def.id).await?;
        if replaced > 0 {
            tracing::debug!(category = %def.id, replaced, "replacing existing rules and patterns");
        }

        for rule in &def.rules {
            catalog
                .insert_rule(&Rule {
                    id: 0,
                    category_id: def.id.clone(),
                    rule_type: rule.rule_type.clone(),
                    pattern: rule.pattern.clone(),
                    confidence: rule.confidence,
                })
                .await?;
            summary.rules += 1;
        }
        for (term, weight) in &def.keywords {
            catalog
                .upsert_keyword(&CategoryKeyword {
                    category_id: def.id.clone(),
                    term: term.clone(),
                    weight: *weight,
                })
                .await?;
            summary.keywords += 1;
        }
        for pattern in &def.entity_patterns {
            catalog
                .insert_entity_pattern(&EntityPattern {
                    id: 0,
                    category_id: def.id.clone(),
                    weight: pattern.weight,
                    pattern: serde_json::to_string(&pattern.entities)?,
                })
                .await?;
            summary.entity_patterns += 1;
        }
    }
    tracing::info!(?summary, "category definitions imported");
    Ok(summary)
}
