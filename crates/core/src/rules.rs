//! Per-category rule evaluation.
//!
//! Rules are alternative triggers: a category's rule score is the maximum over
//! its rules, never the sum. Each `rule_type` dispatches through a
//! [`RuleRegistry`]; unknown types score zero, malformed patterns abort the call.

use crate::catalog::CategoryManager;
use crate::entities::{entity_match_ratio, LazyEntities};
use crate::error::{CategorizeError, Result};
use crate::models::{clamp_unit, Category, Document, EntitySet, Rule, RuleDetail, StrategyDetail, StrategyScore};
use regex::RegexBuilder;
use serde_json::Value;
use std::collections::HashMap;

/// What a rule is evaluated against.
pub struct RuleInput<'a> {
    /// Lowercased `title content description`.
    pub text: &'a str,
    pub document: &'a Document,
    pub entities: Option<&'a EntitySet>,
}

pub type RuleFn = fn(&Rule, &RuleInput<'_>) -> Result<f32>;

#[derive(Clone, Copy)]
pub struct RuleHandler {
    pub eval: RuleFn,
    /// Whether the handler reads extracted entities.
    pub needs_entities: bool,
}

#[derive(Clone)]
pub struct RuleRegistry {
    handlers: HashMap<String, RuleHandler>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register("regex", eval_regex, false);
        registry.register("contains", eval_contains, false);
        registry.register("entity", eval_entity, true);
        registry.register("metadata", eval_metadata, false);
        registry
    }
}

impl RuleRegistry {
    pub fn register(&mut self, rule_type: &str, eval: RuleFn, needs_entities: bool) {
        self.handlers.insert(
            rule_type.to_string(),
            RuleHandler {
                eval,
                needs_entities,
            },
        );
    }

    pub fn needs_entities(&self, rule_type: &str) -> bool {
        self.handlers
            .get(rule_type)
            .map(|h| h.needs_entities)
            .unwrap_or(false)
    }

    /// Scores a single rule, clamped to [0, 1]. Unknown rule types score zero.
    pub fn evaluate(&self, rule: &Rule, input: &RuleInput<'_>) -> Result<f32> {
        match self.handlers.get(&rule.rule_type) {
            Some(handler) => Ok(clamp_unit((handler.eval)(rule, input)?)),
            None => Ok(0.0),
        }
    }
}

pub struct RuleEvaluator<'a> {
    pub registry: &'a RuleRegistry,
    pub catalog: &'a dyn CategoryManager,
}

impl RuleEvaluator<'_> {
    pub async fn score(
        &self,
        categories: &[Category],
        document: &Document,
        entities: &LazyEntities<'_>,
    ) -> Result<Vec<StrategyScore>> {
        let text = document.rule_text();
        let mut scores = Vec::new();
        for category in categories {
            let rules = self
                .catalog
                .category_rules(&category.id)
                .await
                .map_err(CategorizeError::Catalog)?;
            if rules.is_empty() {
                continue;
            }
            let extracted = if rules.iter().any(|r| self.registry.needs_entities(&r.rule_type)) {
                Some(entities.get().await)
            } else {
                None
            };
            let input = RuleInput {
                text: &text,
                document,
                entities: extracted,
            };

            let mut best: Option<(&Rule, f32)> = None;
            let mut matched = 0usize;
            for rule in &rules {
                let score = self.registry.evaluate(rule, &input)?;
                if score > 0.0 {
                    matched += 1;
                }
                if best.map(|(_, b)| score > b).unwrap_or(true) {
                    best = Some((rule, score));
                }
            }
            if let Some((rule, confidence)) = best.filter(|(_, s)| *s > 0.0) {
                scores.push(StrategyScore {
                    category_id: category.id.clone(),
                    category_path: category.path.clone(),
                    confidence,
                    detail: StrategyDetail::Rules(RuleDetail {
                        rule_id: rule.id,
                        rule_type: rule.rule_type.clone(),
                        pattern: rule.pattern.clone(),
                        matched_rules: matched,
                    }),
                });
            }
        }
        tracing::debug!(matched = scores.len(), "rule strategy finished");
        Ok(scores)
    }
}

fn malformed(rule: &Rule, reason: impl ToString) -> CategorizeError {
    CategorizeError::MalformedRule {
        rule_id: rule.id,
        reason: reason.to_string(),
    }
}

fn eval_regex(rule: &Rule, input: &RuleInput<'_>) -> Result<f32> {
    let re = RegexBuilder::new(&rule.pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| malformed(rule, e))?;
    Ok(if re.is_match(input.text) {
        rule.confidence
    } else {
        0.0
    })
}

fn eval_contains(rule: &Rule, input: &RuleInput<'_>) -> Result<f32> {
    let keywords: Vec<String> = rule
        .pattern
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Ok(0.0);
    }
    let matched = keywords.iter().filter(|k| input.text.contains(k.as_str())).count();
    Ok(matched as f32 / keywords.len() as f32 * rule.confidence)
}

fn eval_entity(rule: &Rule, input: &RuleInput<'_>) -> Result<f32> {
    let template: EntitySet =
        serde_json::from_str(&rule.pattern).map_err(|e| malformed(rule, e))?;
    let Some(entities) = input.entities else {
        return Ok(0.0);
    };
    Ok(entity_match_ratio(entities, &template) * rule.confidence)
}

fn eval_metadata(rule: &Rule, input: &RuleInput<'_>) -> Result<f32> {
    let pattern: Value = serde_json::from_str(&rule.pattern).map_err(|e| malformed(rule, e))?;
    let Value::Object(conditions) = pattern else {
        return Err(malformed(rule, "metadata pattern must be a JSON object"));
    };
    if conditions.is_empty() {
        return Ok(0.0);
    }
    let matched = conditions
        .iter()
        .filter(|(key, expected)| condition_holds(input.document.metadata.get(key.as_str()), expected))
        .count();
    Ok(matched as f32 / conditions.len() as f32 * rule.confidence)
}

static NULL: Value = Value::Null;

/// A missing metadata key never satisfies a condition.
fn condition_holds(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let (operator, value) = match expected {
        Value::Object(obj) if obj.contains_key("operator") => (
            obj.get("operator").and_then(Value::as_str).unwrap_or("=="),
            obj.get("value").unwrap_or(&NULL),
        ),
        literal => ("==", literal),
    };
    match operator {
        ">" => compare(actual, value).map(|o| o.is_gt()).unwrap_or(false),
        ">=" => compare(actual, value).map(|o| o.is_ge()).unwrap_or(false),
        "<" => compare(actual, value).map(|o| o.is_lt()).unwrap_or(false),
        "<=" => compare(actual, value).map(|o| o.is_le()).unwrap_or(false),
        "!=" => !loosely_equal(actual, value),
        "in" => value
            .as_array()
            .map(|items| items.iter().any(|item| loosely_equal(actual, item)))
            .unwrap_or(false),
        "contains" => match actual {
            Value::String(s) => value
                .as_str()
                .map(|needle| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Value::Array(items) => items.iter().any(|item| loosely_equal(item, value)),
            _ => false,
        },
        _ => loosely_equal(actual, value),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    as_number(actual)?.partial_cmp(&as_number(expected)?)
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
