use thiserror::Error;

/// Failures that abort a categorization call.
///
/// Collaborator failures (embedding, LLM, vector search) never show up here;
/// the owning strategy logs them and degrades to an empty result.
#[derive(Debug, Error)]
pub enum CategorizeError {
    #[error("malformed rule {rule_id}: {reason}")]
    MalformedRule { rule_id: i64, reason: String },
    #[error("malformed entity pattern for category {category_id}: {reason}")]
    MalformedPattern { category_id: String, reason: String },
    #[error("catalog read failed: {0}")]
    Catalog(#[source] anyhow::Error),
    #[error("classifier snapshot: {0}")]
    Snapshot(String),
}

impl CategorizeError {
    pub fn is_malformed_configuration(&self) -> bool {
        matches!(
            self,
            CategorizeError::MalformedRule { .. } | CategorizeError::MalformedPattern { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CategorizeError>;
