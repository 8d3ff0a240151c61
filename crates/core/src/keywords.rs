//! TF-IDF scoring of a document against per-category keyword dictionaries.

use crate::catalog::CategoryManager;
use crate::error::{CategorizeError, Result};
use crate::models::{
    clamp_unit, Category, CategoryKeyword, Document, KeywordDetail, StrategyDetail, StrategyScore,
};
use std::collections::HashMap;

/// Stands in for a document with no indexable tokens.
pub const EMPTY_DOCUMENT_TOKEN: &str = "__empty__";

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercased alphanumeric word tokens with stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Term-frequency / inverse-document-frequency index over tokenized documents.
///
/// `idf(t) = 1 + ln(N / (1 + df(t)))`.
#[derive(Debug, Default, Clone)]
pub struct TfIdf {
    documents: Vec<HashMap<String, usize>>,
}

impl TfIdf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, tokens: &[String]) {
        let mut counts = HashMap::new();
        if tokens.is_empty() {
            counts.insert(EMPTY_DOCUMENT_TOKEN.to_string(), 1);
        }
        for token in tokens {
            *counts.entry(token.clone()).or_insert(0) += 1;
        }
        self.documents.push(counts);
    }

    pub fn idf(&self, token: &str) -> f32 {
        let df = self
            .documents
            .iter()
            .filter(|d| d.contains_key(token))
            .count();
        1.0 + (self.documents.len() as f32 / (1.0 + df as f32)).ln()
    }

    /// Sum of per-token tf-idf for a (possibly multi-word) term in document `doc`.
    pub fn tfidf(&self, term: &str, doc: usize) -> f32 {
        let Some(counts) = self.documents.get(doc) else {
            return 0.0;
        };
        tokenize(term)
            .iter()
            .map(|token| {
                let tf = counts.get(token).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    0.0
                } else {
                    tf * self.idf(token)
                }
            })
            .sum()
    }
}

/// Cached per-category keyword dictionaries.
#[derive(Debug, Default, Clone)]
pub struct KeywordIndex {
    dictionaries: HashMap<String, Vec<CategoryKeyword>>,
}

impl KeywordIndex {
    pub async fn load(catalog: &dyn CategoryManager, categories: &[Category]) -> Result<Self> {
        let mut dictionaries = HashMap::with_capacity(categories.len());
        for category in categories {
            let keywords = catalog
                .category_keywords(&category.id)
                .await
                .map_err(CategorizeError::Catalog)?;
            dictionaries.insert(category.id.clone(), keywords);
        }
        Ok(Self { dictionaries })
    }

    pub fn get(&self, category_id: &str) -> Option<&[CategoryKeyword]> {
        self.dictionaries.get(category_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }
}

pub struct KeywordScorer<'a> {
    pub catalog: &'a dyn CategoryManager,
    pub index: &'a KeywordIndex,
    /// Scales the raw weighted tf-idf sum before clamping to [0, 1].
    pub normalization: f32,
}

impl KeywordScorer<'_> {
    pub async fn score(
        &self,
        categories: &[Category],
        document: &Document,
    ) -> Result<Vec<StrategyScore>> {
        let text = format!(
            "{} {} {}",
            document.title, document.content, document.description
        );
        let mut tfidf = TfIdf::new();
        tfidf.add_document(&tokenize(&text));

        let mut scores = Vec::new();
        for category in categories {
            let fetched;
            let dictionary = match self.index.get(&category.id) {
                Some(cached) => cached,
                None => {
                    fetched = self
                        .catalog
                        .category_keywords(&category.id)
                        .await
                        .map_err(CategorizeError::Catalog)?;
                    fetched.as_slice()
                }
            };

            let mut raw = 0.0f32;
            let mut matched_terms = Vec::new();
            for keyword in dictionary {
                let value = tfidf.tfidf(&keyword.term, 0);
                if value > 0.0 {
                    raw += value * keyword.weight;
                    matched_terms.push(keyword.term.clone());
                }
            }
            if matched_terms.is_empty() {
                continue;
            }
            scores.push(StrategyScore {
                category_id: category.id.clone(),
                category_path: category.path.clone(),
                confidence: clamp_unit(raw * self.normalization),
                detail: StrategyDetail::Keywords(KeywordDetail {
                    matched_terms,
                    raw_score: raw,
                }),
            });
        }
        tracing::debug!(matched = scores.len(), "keyword strategy finished");
        Ok(scores)
    }
}
