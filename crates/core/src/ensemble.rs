use crate::models::{
    clamp_unit, CategorizationResult, ResultDetails, Strategy, StrategyScore, StrategyWeights,
};
use std::collections::HashMap;

/// One strategy's result list for a single call.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub strategy: Strategy,
    pub scores: Vec<StrategyScore>,
}

/// Weighted fan-in of strategy results.
///
/// A category missing from a strategy's list is untouched by that strategy.
/// Output is sorted by confidence, descending, ties in first-seen order, and
/// each confidence is clamped to [0, 1] after ranking.
pub fn combine(
    outcomes: &[StrategyOutcome],
    requested: &[Strategy],
    weights: &StrategyWeights,
) -> Vec<CategorizationResult> {
    let mut results: Vec<CategorizationResult> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for outcome in outcomes.iter().filter(|o| requested.contains(&o.strategy)) {
        let weight = weights.get(outcome.strategy);
        for score in &outcome.scores {
            let idx = *positions.entry(score.category_id.clone()).or_insert_with(|| {
                results.push(CategorizationResult {
                    category_id: score.category_id.clone(),
                    category_path: score.category_path.clone(),
                    confidence: 0.0,
                    methods: Vec::new(),
                    details: ResultDetails::default(),
                    explanation: String::new(),
                });
                results.len() - 1
            });
            let result = &mut results[idx];
            result.confidence += clamp_unit(score.confidence) * weight;
            if !result.methods.contains(&outcome.strategy) {
                result.methods.push(outcome.strategy);
            }
            result.details.insert(score.detail.clone());
        }
    }

    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    for result in &mut results {
        result.confidence = clamp_unit(result.confidence);
    }
    results
}

/// Drops results under `threshold` and keeps at most `max_categories`.
pub fn select(
    results: Vec<CategorizationResult>,
    threshold: f32,
    max_categories: usize,
) -> Vec<CategorizationResult> {
    results
        .into_iter()
        .filter(|r| r.confidence >= threshold)
        .take(max_categories)
        .collect()
}
