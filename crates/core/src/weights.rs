use crate::models::{Feedback, Strategy, StrategyWeights};
use std::collections::BTreeMap;

/// Recomputes strategy weights from labelled feedback.
///
/// Each method present in `feedback` gets `accuracy / sum(accuracies)`;
/// methods absent from the batch keep their previous weight. Empty feedback,
/// or feedback where every method is always wrong, leaves `current` unchanged.
pub fn adapt(current: &StrategyWeights, feedback: &[Feedback]) -> StrategyWeights {
    if feedback.is_empty() {
        return current.clone();
    }
    let mut tally: BTreeMap<Strategy, (u32, u32)> = BTreeMap::new();
    for record in feedback {
        let entry = tally.entry(record.method).or_insert((0, 0));
        if record.is_correct {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
    let accuracies: Vec<(Strategy, f32)> = tally
        .into_iter()
        .map(|(method, (correct, total))| (method, correct as f32 / total as f32))
        .collect();
    let sum: f32 = accuracies.iter().map(|(_, a)| a).sum();
    if sum <= 0.0 {
        return current.clone();
    }
    let mut updated = current.clone();
    for (method, accuracy) in accuracies {
        updated.set(method, accuracy / sum);
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(method: Strategy, correct: usize, total: usize) -> Vec<Feedback> {
        (0..total)
            .map(|i| Feedback {
                method,
                is_correct: i < correct,
            })
            .collect()
    }

    #[test]
    fn more_accurate_methods_gain_weight() {
        let current: StrategyWeights = Strategy::ALL.iter().map(|s| (*s, 0.25)).collect();
        let mut feedback = batch(Strategy::Ml, 10, 10);
        feedback.extend(batch(Strategy::Rules, 5, 10));
        let updated = adapt(&current, &feedback);
        assert!(updated.get(Strategy::Ml) > updated.get(Strategy::Rules));
        assert!((updated.get(Strategy::Ml) - 2.0 / 3.0).abs() < 1e-6);
        assert!((updated.get(Strategy::Rules) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(updated.get(Strategy::Keywords), 0.25);
        assert_eq!(updated.get(Strategy::Entities), 0.25);
    }

    #[test]
    fn empty_feedback_is_a_no_op() {
        let current: StrategyWeights = [(Strategy::Rules, 0.9)].into_iter().collect();
        assert_eq!(adapt(&current, &[]), current);
    }

    #[test]
    fn all_wrong_feedback_is_a_no_op() {
        let current: StrategyWeights = [(Strategy::Rules, 0.9)].into_iter().collect();
        assert_eq!(adapt(&current, &batch(Strategy::Rules, 0, 4)), current);
    }
}
