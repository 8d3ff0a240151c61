//! Nearest-neighbor similarity plus a trained classifier vote.
//!
//! Everything here is best effort: any collaborator failure is logged and the
//! strategy returns no scores.

use crate::classifier::NaiveBayes;
use crate::models::{Category, Document, MlDetail, StrategyDetail, StrategyScore};
use crate::vectorstore::NeighborIndex;
use providers::ProviderRegistry;
use std::collections::HashMap;

/// `title content`, cut to `budget` characters.
pub fn embedding_text(document: &Document, budget: usize) -> String {
    format!("{} {}", document.title, document.content)
        .chars()
        .take(budget)
        .collect()
}

pub async fn embed_text(
    registry: &ProviderRegistry,
    provider: Option<&str>,
    text: &str,
) -> anyhow::Result<Vec<f32>> {
    let embedder = registry.embedding(provider)?;
    Ok(embedder.embed_one(text).await?)
}

#[derive(Default)]
struct Accumulator {
    score: f32,
    similarity: f32,
    neighbors: usize,
    classifier_vote: bool,
}

pub struct MlScorer<'a> {
    pub registry: &'a ProviderRegistry,
    pub embedding_provider: Option<&'a str>,
    pub index: &'a dyn NeighborIndex,
    pub classifier: Option<&'a NaiveBayes>,
    pub neighbors: usize,
    pub char_budget: usize,
    pub classifier_bonus: f32,
}

impl MlScorer<'_> {
    pub async fn score(&self, categories: &[Category], document: &Document) -> Vec<StrategyScore> {
        match self.try_score(categories, document).await {
            Ok(scores) => {
                tracing::debug!(matched = scores.len(), "ml strategy finished");
                scores
            }
            Err(err) => {
                tracing::warn!(document = %document.id, error = %err, "ml strategy degraded to empty result");
                Vec::new()
            }
        }
    }

    async fn try_score(
        &self,
        categories: &[Category],
        document: &Document,
    ) -> anyhow::Result<Vec<StrategyScore>> {
        let known: HashMap<&str, &Category> =
            categories.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut order: Vec<&str> = Vec::new();
        let mut acc: HashMap<&str, Accumulator> = HashMap::new();

        let embedding = match &document.embedding {
            Some(vector) => vector.clone(),
            None => {
                let text = embedding_text(document, self.char_budget);
                embed_text(self.registry, self.embedding_provider, &text).await?
            }
        };

        let neighbors = self.index.nearest(&embedding, self.neighbors).await?;
        for neighbor in &neighbors {
            if neighbor.document_id == document.id || neighbor.similarity <= 0.0 {
                continue;
            }
            let similarity = neighbor.similarity.min(1.0);
            for (category_id, confidence) in &neighbor.categories {
                let Some(category) = known.get(category_id.as_str()) else {
                    continue;
                };
                let entry = acc.entry(category.id.as_str()).or_insert_with(|| {
                    order.push(category.id.as_str());
                    Accumulator::default()
                });
                entry.score += similarity * confidence.clamp(0.0, 1.0);
                entry.similarity += similarity;
                entry.neighbors += 1;
            }
        }

        if let Some(vote) = self.classifier.and_then(|c| c.classify(&document.content)) {
            if let Some(category) = known.get(vote.category_id.as_str()) {
                let entry = acc.entry(category.id.as_str()).or_insert_with(|| {
                    order.push(category.id.as_str());
                    Accumulator::default()
                });
                entry.score += self.classifier_bonus;
                entry.classifier_vote = true;
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| {
                let entry = acc.remove(id)?;
                if entry.score <= 0.0 {
                    return None;
                }
                let category = known.get(id)?;
                Some(StrategyScore {
                    category_id: category.id.clone(),
                    category_path: category.path.clone(),
                    confidence: entry.score.min(1.0),
                    detail: StrategyDetail::Ml(MlDetail {
                        similar_documents: entry.neighbors,
                        similarity_score: entry.similarity,
                        classifier_vote: entry.classifier_vote,
                    }),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_respects_char_budget() {
        let doc = Document {
            id: "d".into(),
            title: "Título".into(),
            content: "ñandú".repeat(10),
            ..Document::default()
        };
        let text = embedding_text(&doc, 9);
        assert_eq!(text.chars().count(), 9);
        assert!(text.starts_with("Título ñ"));
    }
}
