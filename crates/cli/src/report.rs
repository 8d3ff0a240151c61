use categorizer_core::models::{CategorizationResult, StrategyWeights};

pub fn format_results(results: &[CategorizationResult]) -> String {
    if results.is_empty() {
        return "no categories above threshold".to_string();
    }
    results
        .iter()
        .map(|r| {
            let methods: Vec<&str> = r.methods.iter().map(|m| m.as_str()).collect();
            format!(
                "{:<32} {:>5.3}  [{}]  {}",
                r.category_path,
                r.confidence,
                methods.join(","),
                r.explanation
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_weights(weights: &StrategyWeights) -> String {
    weights
        .iter()
        .map(|(strategy, weight)| format!("{:<10} {:.4}", strategy.as_str(), weight))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use categorizer_core::models::{ResultDetails, Strategy};

    #[test]
    fn formats_rows() {
        let results = vec![CategorizationResult {
            category_id: "ai".into(),
            category_path: "Technology/AI".into(),
            confidence: 0.5,
            methods: vec![Strategy::Rules, Strategy::Ml],
            details: ResultDetails::default(),
            explanation: "matched rule: ai".into(),
        }];
        let out = format_results(&results);
        assert!(out.starts_with("Technology/AI"));
        assert!(out.contains("0.500"));
        assert!(out.contains("[rules,ml]"));
        assert_eq!(format_results(&[]), "no categories above threshold");
    }

    #[test]
    fn formats_weights_in_strategy_order() {
        let weights: StrategyWeights = [(Strategy::Ml, 0.5), (Strategy::Rules, 0.25)]
            .into_iter()
            .collect();
        assert_eq!(format_weights(&weights), "rules      0.2500\nml         0.5000");
    }
}
