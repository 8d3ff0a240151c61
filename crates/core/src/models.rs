use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Weight applied to a strategy that has no entry in [`StrategyWeights`].
pub const DEFAULT_STRATEGY_WEIGHT: f32 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    /// Materialized hierarchical label, e.g. `Technology/AI`.
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: i64,
    pub category_id: String,
    /// One of `regex`, `contains`, `entity`, `metadata`. Unknown types score zero.
    pub rule_type: String,
    /// Regex source, comma-separated keywords, or a JSON document.
    pub pattern: String,
    /// Upper bound on what this rule can contribute.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeyword {
    pub category_id: String,
    pub term: String,
    pub weight: f32,
}

/// Raw per-category entity template; `pattern` is the JSON form of an [`EntitySet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPattern {
    #[serde(default)]
    pub id: i64,
    pub category_id: String,
    pub weight: f32,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    People,
    Organizations,
    Locations,
    Topics,
    Concepts,
}

/// Named entities grouped by kind. Used both for extraction output and for
/// category templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl EntitySet {
    pub fn get(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::People => &self.people,
            EntityKind::Organizations => &self.organizations,
            EntityKind::Locations => &self.locations,
            EntityKind::Topics => &self.topics,
            EntityKind::Concepts => &self.concepts,
        }
    }

    pub fn push(&mut self, kind: EntityKind, value: String) {
        let bucket = match kind {
            EntityKind::People => &mut self.people,
            EntityKind::Organizations => &mut self.organizations,
            EntityKind::Locations => &mut self.locations,
            EntityKind::Topics => &mut self.topics,
            EntityKind::Concepts => &mut self.concepts,
        };
        if !bucket.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            bucket.push(value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &[String])> {
        [
            EntityKind::People,
            EntityKind::Organizations,
            EntityKind::Locations,
            EntityKind::Topics,
            EntityKind::Concepts,
        ]
        .into_iter()
        .map(move |kind| (kind, self.get(kind)))
    }

    pub fn len(&self) -> usize {
        self.iter().map(|(_, values)| values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Lowercased `title content description`, the text rules are evaluated against.
    pub fn rule_text(&self) -> String {
        format!("{} {} {}", self.title, self.content, self.description).to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Rules,
    Keywords,
    Ml,
    Entities,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Rules,
        Strategy::Keywords,
        Strategy::Ml,
        Strategy::Entities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Rules => "rules",
            Strategy::Keywords => "keywords",
            Strategy::Ml => "ml",
            Strategy::Entities => "entities",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" => Ok(Strategy::Rules),
            "keywords" | "keyword" => Ok(Strategy::Keywords),
            "ml" => Ok(Strategy::Ml),
            "entities" | "entity" => Ok(Strategy::Entities),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDetail {
    pub rule_id: i64,
    pub rule_type: String,
    pub pattern: String,
    pub matched_rules: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordDetail {
    pub matched_terms: Vec<String>,
    pub raw_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlDetail {
    pub similar_documents: usize,
    pub similarity_score: f32,
    pub classifier_vote: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub matched_patterns: usize,
    pub matched_entities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum StrategyDetail {
    Rules(RuleDetail),
    Keywords(KeywordDetail),
    Ml(MlDetail),
    Entities(EntityDetail),
}

impl StrategyDetail {
    pub fn strategy(&self) -> Strategy {
        match self {
            StrategyDetail::Rules(_) => Strategy::Rules,
            StrategyDetail::Keywords(_) => Strategy::Keywords,
            StrategyDetail::Ml(_) => Strategy::Ml,
            StrategyDetail::Entities(_) => Strategy::Entities,
        }
    }
}

/// Per-method diagnostics attached to a combined result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml: Option<MlDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntityDetail>,
}

impl ResultDetails {
    pub fn insert(&mut self, detail: StrategyDetail) {
        match detail {
            StrategyDetail::Rules(d) => self.rules = Some(d),
            StrategyDetail::Keywords(d) => self.keywords = Some(d),
            StrategyDetail::Ml(d) => self.ml = Some(d),
            StrategyDetail::Entities(d) => self.entities = Some(d),
        }
    }
}

/// One strategy's opinion about one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    pub category_id: String,
    pub category_path: String,
    pub confidence: f32,
    pub detail: StrategyDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub category_id: String,
    pub category_path: String,
    pub confidence: f32,
    pub methods: Vec<Strategy>,
    pub details: ResultDetails,
    pub explanation: String,
}

/// Multiplicative coefficient per strategy. Not required to sum to one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyWeights(BTreeMap<Strategy, f32>);

impl StrategyWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, strategy: Strategy) -> f32 {
        self.0
            .get(&strategy)
            .copied()
            .unwrap_or(DEFAULT_STRATEGY_WEIGHT)
    }

    pub fn contains(&self, strategy: Strategy) -> bool {
        self.0.contains_key(&strategy)
    }

    pub fn set(&mut self, strategy: Strategy, weight: f32) {
        self.0.insert(strategy, weight.max(0.0));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strategy, f32)> + '_ {
        self.0.iter().map(|(s, w)| (*s, *w))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Strategy, f32)> for StrategyWeights {
    fn from_iter<I: IntoIterator<Item = (Strategy, f32)>>(iter: I) -> Self {
        let mut weights = StrategyWeights::new();
        for (strategy, weight) in iter {
            weights.set(strategy, weight);
        }
        weights
    }
}

/// Labelled outcome of one strategy's contribution to a past categorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub method: Strategy,
    #[serde(alias = "isCorrect")]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub text: String,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizeOptions {
    pub strategies: Vec<Strategy>,
    pub threshold: f32,
    pub max_categories: usize,
}

impl Default for CategorizeOptions {
    fn default() -> Self {
        Self {
            strategies: Strategy::ALL.to_vec(),
            threshold: 0.3,
            max_categories: 5,
        }
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_default_for_missing_strategy() {
        let mut weights = StrategyWeights::new();
        weights.set(Strategy::Rules, 0.6);
        assert_eq!(weights.get(Strategy::Rules), 0.6);
        assert_eq!(weights.get(Strategy::Ml), DEFAULT_STRATEGY_WEIGHT);
    }

    #[test]
    fn weights_serialize_as_name_map() {
        let weights: StrategyWeights = [(Strategy::Ml, 0.5), (Strategy::Keywords, 0.25)]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&weights).unwrap();
        assert_eq!(json, serde_json::json!({"keywords": 0.25, "ml": 0.5}));
        let back: StrategyWeights = serde_json::from_value(json).unwrap();
        assert_eq!(back, weights);
    }

    #[test]
    fn strategy_parses_loose_names() {
        assert_eq!("Rule".parse::<Strategy>().unwrap(), Strategy::Rules);
        assert_eq!(" ml ".parse::<Strategy>().unwrap(), Strategy::Ml);
        assert!("bayes".parse::<Strategy>().is_err());
    }

    #[test]
    fn feedback_accepts_camel_case_flag() {
        let fb: Feedback =
            serde_json::from_str(r#"{"method":"ml","isCorrect":true}"#).unwrap();
        assert_eq!(
            fb,
            Feedback {
                method: Strategy::Ml,
                is_correct: true
            }
        );
    }

    #[test]
    fn entity_set_push_dedupes_case_insensitively() {
        let mut set = EntitySet::default();
        set.push(EntityKind::People, "Ada Lovelace".into());
        set.push(EntityKind::People, "ada lovelace".into());
        assert_eq!(set.len(), 1);
    }
}
