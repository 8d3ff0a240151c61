use crate::models::CategorizationResult;

/// Builds a `; `-joined rationale from whichever strategy details are present.
pub fn explain(result: &CategorizationResult) -> String {
    let details = &result.details;
    let mut parts: Vec<String> = Vec::new();
    if let Some(rule) = &details.rules {
        parts.push(format!("matched rule: {}", rule.pattern));
    }
    if let Some(keywords) = &details.keywords {
        if !keywords.matched_terms.is_empty() {
            parts.push(format!("keywords: {}", keywords.matched_terms.join(", ")));
        }
    }
    if let Some(ml) = &details.ml {
        if ml.similar_documents > 0 {
            parts.push(format!(
                "similar to {} categorized documents",
                ml.similar_documents
            ));
        }
        if ml.classifier_vote {
            parts.push("predicted by trained classifier".to_string());
        }
    }
    if let Some(entities) = &details.entities {
        parts.push(format!(
            "matched {} entity patterns",
            entities.matched_patterns
        ));
    }
    if parts.is_empty() && !result.methods.is_empty() {
        let methods: Vec<&str> = result.methods.iter().map(|m| m.as_str()).collect();
        parts.push(format!("matched by {}", methods.join(", ")));
    }
    parts.join("; ")
}

pub fn attach_explanations(results: &mut [CategorizationResult]) {
    for result in results.iter_mut() {
        result.explanation = explain(result);
    }
}
