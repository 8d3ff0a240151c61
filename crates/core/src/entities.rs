//! Named-entity extraction and per-category entity-pattern matching.
//!
//! Extraction asks the configured LLM for JSON and falls back to a
//! capitalization heuristic on any failure.

use crate::catalog::CategoryManager;
use crate::error::{CategorizeError, Result};
use crate::models::{
    clamp_unit, Category, Document, EntityDetail, EntityKind, EntitySet, StrategyDetail,
    StrategyScore,
};
use providers::{CompletionRequest, ProviderRegistry};
use tokio::sync::OnceCell;

const HONORIFICS: &[&str] = &["mr", "mrs", "ms", "miss", "dr", "prof", "sir", "dame", "rev"];
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "llc", "ltd", "limited", "co", "company", "gmbh", "plc", "ag",
    "group", "holdings",
];
const LOCATION_NOUNS: &[&str] = &[
    "city", "county", "street", "st", "avenue", "ave", "road", "boulevard", "state", "province",
    "river", "lake", "mountain", "island", "valley", "bay", "park",
];
/// Capitalized only because they open a sentence.
const SENTENCE_STARTERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "i", "we", "you", "he", "she", "it",
    "they", "in", "on", "at", "for", "but", "and", "or", "if", "when", "while", "after", "before",
    "our", "their", "its", "his", "her", "my", "what", "why", "how", "there", "here",
];

/// Fraction of template entities found (case-insensitive substring) among
/// extracted entities of the same kind.
pub fn entity_match_ratio(extracted: &EntitySet, template: &EntitySet) -> f32 {
    let total = template.len();
    if total == 0 {
        return 0.0;
    }
    let found: usize = template
        .iter()
        .map(|(kind, expected)| {
            let candidates: Vec<String> =
                extracted.get(kind).iter().map(|e| e.to_lowercase()).collect();
            expected
                .iter()
                .filter(|needle| {
                    let needle = needle.to_lowercase();
                    candidates.iter().any(|c| c.contains(&needle))
                })
                .count()
        })
        .sum();
    found as f32 / total as f32
}

#[derive(Clone)]
pub struct EntityExtractor {
    pub registry: ProviderRegistry,
    pub provider: Option<String>,
    pub excerpt_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl EntityExtractor {
    pub async fn extract(&self, document: &Document) -> EntitySet {
        let excerpt: String = document.content.chars().take(self.excerpt_chars).collect();
        match self.extract_with_llm(document, &excerpt).await {
            Ok(entities) => entities,
            Err(err) => {
                tracing::warn!(document = %document.id, error = %err, "llm entity extraction failed, using heuristics");
                extract_heuristic(&format!("{}.\n{}", document.title, excerpt))
            }
        }
    }

    async fn extract_with_llm(&self, document: &Document, excerpt: &str) -> anyhow::Result<EntitySet> {
        let llm = self.registry.llm(self.provider.as_deref())?;
        let prompt = format!(
            "Extract named entities from the following text. Respond with JSON only, using the keys \
             \"people\", \"organizations\", \"locations\", \"topics\" and \"concepts\", each an array of strings.\n\n\
             Title: {}\n\nText:\n{}",
            document.title, excerpt
        );
        let raw = llm
            .complete(CompletionRequest {
                prompt,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .await?;
        parse_entity_json(&raw)
    }
}

/// Accepts bare JSON or JSON wrapped in prose / code fences.
pub fn parse_entity_json(raw: &str) -> anyhow::Result<EntitySet> {
    let start = raw
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in completion"))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| anyhow::anyhow!("unterminated JSON object in completion"))?;
    Ok(serde_json::from_str(&raw[start..=end])?)
}

fn bare(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '&' && c != '-')
        .to_string()
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(|c: char| c == '"' || c == '\'' || c == ')');
    if !trimmed.ends_with(['.', '!', '?']) {
        return false;
    }
    let lower = bare(word).to_lowercase();
    !(HONORIFICS.contains(&lower.as_str()) || CORPORATE_SUFFIXES.contains(&lower.as_str()))
}

/// Splits text into sentences, keeping abbreviations such as `Dr.` or `Inc.` intact.
fn sentences(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn classify_run(words: &[String]) -> (EntityKind, String) {
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    if words.len() > 1 && HONORIFICS.contains(&lower[0].as_str()) {
        return (EntityKind::People, words[1..].join(" "));
    }
    let name = words.join(" ");
    if lower
        .last()
        .map(|w| CORPORATE_SUFFIXES.contains(&w.as_str()))
        .unwrap_or(false)
    {
        return (EntityKind::Organizations, name);
    }
    if lower.iter().any(|w| LOCATION_NOUNS.contains(&w.as_str())) {
        return (EntityKind::Locations, name);
    }
    let name_shaped = words.len() == 2
        && words.iter().all(|w| {
            let mut chars = w.chars();
            chars.next().map(char::is_uppercase).unwrap_or(false)
                && chars.clone().count() > 0
                && chars.all(char::is_lowercase)
        });
    if name_shaped {
        return (EntityKind::People, name);
    }
    (EntityKind::Topics, name)
}

fn flush_run(run: &mut Vec<String>, entities: &mut EntitySet) {
    if run.is_empty() {
        return;
    }
    let (kind, name) = classify_run(run);
    if !name.is_empty() {
        entities.push(kind, name);
    }
    run.clear();
}

/// Capitalized-run heuristic used when no LLM is reachable.
pub fn extract_heuristic(text: &str) -> EntitySet {
    let mut entities = EntitySet::default();
    for sentence in sentences(text) {
        let mut run: Vec<String> = Vec::new();
        for (i, word) in sentence.iter().enumerate() {
            let clean = bare(word);
            if clean.is_empty() || !is_capitalized(&clean) {
                flush_run(&mut run, &mut entities);
                continue;
            }
            if i == 0 && SENTENCE_STARTERS.contains(&clean.to_lowercase().as_str()) {
                continue;
            }
            run.push(clean);
            // A comma or colon ends the run even if the next word is capitalized.
            if word.ends_with([',', ';', ':']) {
                flush_run(&mut run, &mut entities);
            }
        }
        flush_run(&mut run, &mut entities);
    }
    entities
}

/// Extraction result shared by every consumer within one categorization call.
pub struct LazyEntities<'a> {
    extractor: &'a EntityExtractor,
    document: &'a Document,
    cell: OnceCell<EntitySet>,
}

impl<'a> LazyEntities<'a> {
    pub fn new(extractor: &'a EntityExtractor, document: &'a Document) -> Self {
        Self {
            extractor,
            document,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> &EntitySet {
        self.cell
            .get_or_init(|| self.extractor.extract(self.document))
            .await
    }
}

pub struct EntityMatcher<'a> {
    pub catalog: &'a dyn CategoryManager,
}

impl EntityMatcher<'_> {
    /// Averages weighted match ratios over the patterns that matched at all.
    /// Categories without a positive match are omitted.
    pub async fn score(
        &self,
        categories: &[Category],
        entities: &LazyEntities<'_>,
    ) -> Result<Vec<StrategyScore>> {
        let mut scores = Vec::new();
        for category in categories {
            let patterns = self
                .catalog
                .entity_patterns(&category.id)
                .await
                .map_err(CategorizeError::Catalog)?;
            if patterns.is_empty() {
                continue;
            }
            let extracted = entities.get().await;
            let mut positives = Vec::new();
            let mut matched_entities: Vec<String> = Vec::new();
            for pattern in &patterns {
                let template: EntitySet = serde_json::from_str(&pattern.pattern).map_err(|e| {
                    CategorizeError::MalformedPattern {
                        category_id: category.id.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let ratio = entity_match_ratio(extracted, &template);
                if ratio > 0.0 {
                    positives.push(ratio * pattern.weight);
                    for (kind, expected) in template.iter() {
                        for needle in expected {
                            let needle_lower = needle.to_lowercase();
                            let hit = extracted
                                .get(kind)
                                .iter()
                                .any(|e| e.to_lowercase().contains(&needle_lower));
                            if hit && !matched_entities.contains(needle) {
                                matched_entities.push(needle.clone());
                            }
                        }
                    }
                }
            }
            if positives.is_empty() {
                continue;
            }
            let average = positives.iter().sum::<f32>() / positives.len() as f32;
            scores.push(StrategyScore {
                category_id: category.id.clone(),
                category_path: category.path.clone(),
                confidence: clamp_unit(average),
                detail: StrategyDetail::Entities(EntityDetail {
                    matched_patterns: positives.len(),
                    matched_entities,
                }),
            });
        }
        tracing::debug!(matched = scores.len(), "entity strategy finished");
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_classifies_capitalized_runs() {
        let text = "Dr. Grace Hopper joined Acme Widgets Inc. last year. \
                    She moved to Springfield County with Alan Turing. \
                    The talk covered Quantum Computing Applications.";
        let e = extract_heuristic(text);
        assert!(e.people.contains(&"Grace Hopper".to_string()), "{e:?}");
        assert!(e.people.contains(&"Alan Turing".to_string()), "{e:?}");
        assert!(e.organizations.contains(&"Acme Widgets Inc".to_string()), "{e:?}");
        assert!(e.locations.contains(&"Springfield County".to_string()), "{e:?}");
        assert!(e.topics.contains(&"Quantum Computing Applications".to_string()), "{e:?}");
        assert!(!e.topics.iter().any(|t| t == "The" || t == "She"));
    }

    #[tokio::test]
    async fn fallback_reads_title_and_bounded_excerpt() {
        let extractor = EntityExtractor {
            registry: ProviderRegistry::new(),
            provider: None,
            excerpt_chars: 40,
            max_tokens: 100,
            temperature: 0.0,
        };
        let document = Document {
            id: "d".into(),
            title: "Acme Corp quarterly filing".into(),
            content: "revenue grew in every region this year. Later we met Jane Smith.".into(),
            ..Document::default()
        };
        let entities = extractor.extract(&document).await;
        assert_eq!(entities.organizations, vec!["Acme Corp"]);
        // "Jane Smith" sits past the excerpt limit
        assert!(entities.people.is_empty(), "{entities:?}");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Sure!\n```json\n{\"people\": [\"Ada\"], \"topics\": [\"math\"]}\n```";
        let set = parse_entity_json(raw).unwrap();
        assert_eq!(set.people, vec!["Ada"]);
        assert_eq!(set.topics, vec!["math"]);
        assert!(set.locations.is_empty());
        assert!(parse_entity_json("no json here").is_err());
    }

    #[test]
    fn match_ratio_counts_all_kinds() {
        let extracted = EntitySet {
            people: vec!["Geoffrey Hinton".into()],
            topics: vec!["Deep Learning".into()],
            ..EntitySet::default()
        };
        let template = EntitySet {
            people: vec!["hinton".into(), "lecun".into()],
            topics: vec!["learning".into()],
            // Same text, wrong kind: must not count.
            organizations: vec!["hinton".into()],
            ..EntitySet::default()
        };
        assert!((entity_match_ratio(&extracted, &template) - 0.5).abs() < 1e-6);
        assert_eq!(entity_match_ratio(&extracted, &EntitySet::default()), 0.0);
    }
}
