use anyhow::{Context, Result};
use categorizer_core::models::{Document, Feedback, Strategy};
use std::fs;
use std::path::Path;

/// Reads a document from JSON. Plain text files become the document content.
pub fn read_document(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        return serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()));
    }
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let mut lines = raw.lines();
    let title = lines.next().unwrap_or_default().trim().to_string();
    Ok(Document {
        id,
        title,
        content: lines.collect::<Vec<_>>().join("\n"),
        ..Document::default()
    })
}

pub fn read_feedback(path: &Path) -> Result<Vec<Feedback>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Parses `rules,ml`-style lists.
pub fn parse_strategies(list: &str) -> Result<Vec<Strategy>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Strategy>().map_err(anyhow::Error::msg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_files_use_first_line_as_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        fs::write(&path, "Quarterly report\nRevenue grew.\nCosts fell.").unwrap();
        let doc = read_document(&path).unwrap();
        assert_eq!(doc.id, "memo");
        assert_eq!(doc.title, "Quarterly report");
        assert_eq!(doc.content, "Revenue grew.\nCosts fell.");
    }

    #[test]
    fn json_documents_keep_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(
            &path,
            r#"{"id":"d1","title":"T","content":"C","metadata":{"pages":3}}"#,
        )
        .unwrap();
        let doc = read_document(&path).unwrap();
        assert_eq!(doc.metadata.get("pages"), Some(&serde_json::json!(3)));
        assert!(doc.embedding.is_none());
    }

    #[test]
    fn strategy_lists() {
        assert_eq!(
            parse_strategies("rules, ml").unwrap(),
            vec![Strategy::Rules, Strategy::Ml]
        );
        assert!(parse_strategies("rules,bogus").is_err());
    }
}
