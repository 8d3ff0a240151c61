//! Multinomial naive Bayes text classifier trained on confirmed categorizations.

use crate::error::{CategorizeError, Result};
use crate::keywords::tokenize;
use crate::models::TrainingSample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Snapshot name under which the serialized model is stored.
pub const CLASSIFIER_SNAPSHOT: &str = "classifier";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierVote {
    pub category_id: String,
    /// Posterior probability among known categories.
    pub probability: f32,
}

/// Ordered maps keep the serialized form, and therefore its content hash, stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayes {
    format: u32,
    total_docs: u64,
    class_docs: BTreeMap<String, u64>,
    class_tokens: BTreeMap<String, u64>,
    token_counts: BTreeMap<String, BTreeMap<String, u64>>,
    vocabulary: BTreeSet<String>,
}

impl NaiveBayes {
    pub fn new() -> Self {
        Self {
            format: FORMAT_VERSION,
            ..Self::default()
        }
    }

    pub fn is_trained(&self) -> bool {
        self.total_docs > 0
    }

    /// Adds samples to the model. Counts are additive, so training twice on
    /// the same sample weights it twice.
    pub fn train(&mut self, samples: &[TrainingSample]) {
        for sample in samples {
            let tokens = tokenize(&sample.text);
            if tokens.is_empty() {
                continue;
            }
            self.total_docs += 1;
            *self.class_docs.entry(sample.category_id.clone()).or_insert(0) += 1;
            *self
                .class_tokens
                .entry(sample.category_id.clone())
                .or_insert(0) += tokens.len() as u64;
            let counts = self
                .token_counts
                .entry(sample.category_id.clone())
                .or_default();
            for token in tokens {
                *counts.entry(token.clone()).or_insert(0) += 1;
                self.vocabulary.insert(token);
            }
        }
    }

    pub fn classify(&self, text: &str) -> Option<ClassifierVote> {
        if !self.is_trained() {
            return None;
        }
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        let vocab = self.vocabulary.len() as f64;
        let mut log_scores: Vec<(&str, f64)> = Vec::with_capacity(self.class_docs.len());
        for (class, docs) in &self.class_docs {
            let prior = (*docs as f64 / self.total_docs as f64).ln();
            let class_total = self.class_tokens.get(class).copied().unwrap_or(0) as f64;
            let counts = self.token_counts.get(class);
            let likelihood: f64 = tokens
                .iter()
                .map(|t| {
                    let c = counts.and_then(|m| m.get(t)).copied().unwrap_or(0) as f64;
                    ((c + 1.0) / (class_total + vocab)).ln()
                })
                .sum();
            log_scores.push((class.as_str(), prior + likelihood));
        }
        let (best_class, best_score) = log_scores
            .iter()
            .copied()
            .fold(None, |acc: Option<(&str, f64)>, (c, s)| match acc {
                Some((_, b)) if b >= s => acc,
                _ => Some((c, s)),
            })?;
        let normalizer: f64 = log_scores.iter().map(|(_, s)| (s - best_score).exp()).sum();
        Some(ClassifierVote {
            category_id: best_class.to_string(),
            probability: (1.0 / normalizer) as f32,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CategorizeError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: NaiveBayes =
            serde_json::from_slice(bytes).map_err(|e| CategorizeError::Snapshot(e.to_string()))?;
        if model.format != FORMAT_VERSION {
            return Err(CategorizeError::Snapshot(format!(
                "unsupported classifier format {}",
                model.format
            )));
        }
        Ok(model)
    }
}
