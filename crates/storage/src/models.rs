use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub path: String,
    pub name: String,
    pub description: String,
    pub is_active: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RuleRow {
    pub id: i64,
    pub category_id: String,
    pub rule_type: String,
    pub pattern: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KeywordRow {
    pub category_id: String,
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EntityPatternRow {
    pub id: i64,
    pub category_id: String,
    pub pattern_json: String,
    pub weight: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub name: String,
    pub version: i64,
    pub hash: String,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TrainingRow {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub category_id: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmbeddingRow {
    pub document_id: String,
    pub vector_json: String,
}
