use categorizer_core::catalog::{CategoryManager, SnapshotStore, SqliteCatalog};
use categorizer_core::definitions::{import_definitions, load_definitions};
use categorizer_core::models::{Category, CategoryKeyword, Document, Strategy, StrategyWeights};
use categorizer_core::vectorstore::NeighborIndex;
use std::io::Write;

async fn catalog() -> SqliteCatalog {
    let pool = storage::connect("sqlite::memory:").await.unwrap();
    storage::migrate(&pool).await.unwrap();
    SqliteCatalog::new(pool)
}

fn category(id: &str, path: &str, active: bool) -> Category {
    Category {
        id: id.into(),
        path: path.into(),
        name: id.into(),
        description: String::new(),
        is_active: active,
    }
}

#[tokio::test]
async fn inactive_categories_are_filtered() {
    let catalog = catalog().await;
    catalog.insert_category(&category("a", "Work/A", true)).await.unwrap();
    catalog.insert_category(&category("b", "Work/B", false)).await.unwrap();
    assert_eq!(catalog.categories(true).await.unwrap().len(), 1);
    assert_eq!(catalog.categories(false).await.unwrap().len(), 2);
    assert!(catalog.category("b").await.unwrap().is_some());
    assert!(catalog.category("zzz").await.unwrap().is_none());
}

#[tokio::test]
async fn keyword_upsert_keeps_the_larger_weight() {
    let catalog = catalog().await;
    catalog.insert_category(&category("a", "Work/A", true)).await.unwrap();
    for weight in [0.4, 0.9, 0.2] {
        catalog
            .upsert_keyword(&CategoryKeyword {
                category_id: "a".into(),
                term: "Invoice".into(),
                weight,
            })
            .await
            .unwrap();
    }
    let keywords = catalog.category_keywords("a").await.unwrap();
    assert_eq!(keywords.len(), 1);
    assert_eq!(keywords[0].term, "invoice");
    assert!((keywords[0].weight - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn snapshots_version_by_content() {
    let catalog = catalog().await;
    let first = catalog.put("classifier", b"model-a").await.unwrap();
    let same = catalog.put("classifier", b"model-a").await.unwrap();
    let second = catalog.put("classifier", b"model-b").await.unwrap();
    assert_eq!(first.version, 1);
    assert_eq!(same, first);
    assert_eq!(second.version, 2);

    let latest = catalog.latest("classifier").await.unwrap().unwrap();
    assert_eq!(latest.meta, second);
    assert_eq!(latest.bytes, b"model-b");
    assert!(catalog.latest("other").await.unwrap().is_none());
}

#[tokio::test]
async fn tampered_snapshot_is_rejected() {
    let catalog = catalog().await;
    catalog.put("classifier", b"model-a").await.unwrap();
    sqlx::query("UPDATE snapshots SET blob = ?1 WHERE name = 'classifier'")
        .bind(b"model-x".to_vec())
        .execute(catalog.pool())
        .await
        .unwrap();
    assert!(catalog.latest("classifier").await.is_err());
}

#[tokio::test]
async fn strategy_weights_round_trip_through_sqlite() {
    let catalog = catalog().await;
    assert!(catalog.strategy_weights().await.unwrap().is_none());
    let weights: StrategyWeights = [(Strategy::Rules, 0.5), (Strategy::Ml, 0.125)]
        .into_iter()
        .collect();
    catalog.save_strategy_weights(&weights).await.unwrap();
    assert_eq!(catalog.strategy_weights().await.unwrap(), Some(weights));
}

#[tokio::test]
async fn automatic_assignments_never_replace_manual_ones() {
    let catalog = catalog().await;
    catalog.insert_category(&category("a", "Work/A", true)).await.unwrap();
    catalog.insert_category(&category("off", "Work/Off", false)).await.unwrap();
    let doc = Document {
        id: "d1".into(),
        title: "Quarterly invoice".into(),
        content: "payment due".into(),
        ..Document::default()
    };
    catalog.save_document(&doc).await.unwrap();
    catalog.record_categorization("d1", "a", 0.95, "manual", true).await.unwrap();
    catalog.record_categorization("d1", "a", 0.1, "auto", false).await.unwrap();
    catalog.record_categorization("d1", "off", 0.99, "manual", true).await.unwrap();

    let samples = catalog.confirmed_categorizations(0.8).await.unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].category_id, "a");
    assert_eq!(samples[0].text, "Quarterly invoice payment due");
    assert!(catalog.confirmed_categorizations(0.99).await.unwrap().is_empty());
}

#[tokio::test]
async fn stored_embeddings_are_searchable() {
    let catalog = catalog().await;
    catalog.insert_category(&category("a", "Work/A", true)).await.unwrap();
    catalog.insert_category(&category("b", "Work/B", true)).await.unwrap();
    catalog
        .index("near", &[1.0, 0.1], &[("a".to_string(), 0.8)])
        .await
        .unwrap();
    catalog
        .index("far", &[0.0, 1.0], &[("b".to_string(), 0.6)])
        .await
        .unwrap();

    let hits = catalog.nearest(&[1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "near");
    assert_eq!(hits[0].categories, vec![("a".to_string(), 0.8)]);

    let both = catalog.nearest(&[1.0, 0.0], 10).await.unwrap();
    assert_eq!(both.len(), 2);
    assert!(both[0].similarity > both[1].similarity);
}

#[tokio::test]
async fn toml_definitions_populate_the_catalog() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[[categories]]
id = "ai"
path = "Technology/AI"
name = "Artificial Intelligence"

[[categories.rules]]
rule_type = "contains"
pattern = "neural, model, training"
confidence = 0.8

[categories.keywords]
"machine learning" = 1.0
neural = 0.7

[[categories.entity_patterns]]
weight = 0.9
organizations = ["OpenAI", "DeepMind"]

[[categories]]
id = "retired"
path = "Archive/Retired"
name = "Retired"
active = false
"#
    )
    .unwrap();

    let definitions = load_definitions(file.path()).unwrap();
    let catalog = catalog().await;
    let summary = import_definitions(&catalog, &definitions).await.unwrap();
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.rules, 1);
    assert_eq!(summary.keywords, 2);
    assert_eq!(summary.entity_patterns, 1);

    assert_eq!(catalog.categories(true).await.unwrap().len(), 1);
    let rules = catalog.category_rules("ai").await.unwrap();
    assert_eq!(rules[0].rule_type, "contains");
    let patterns = catalog.entity_patterns("ai").await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&patterns[0].pattern).unwrap();
    assert_eq!(parsed["organizations"][1], "DeepMind");

    // a second import replaces rather than duplicates
    import_definitions(&catalog, &definitions).await.unwrap();
    assert_eq!(catalog.category_rules("ai").await.unwrap().len(), 1);
    assert_eq!(catalog.entity_patterns("ai").await.unwrap().len(), 1);
    assert_eq!(catalog.category_keywords("ai").await.unwrap().len(), 2);
    assert_eq!(catalog.categories(false).await.unwrap().len(), 2);
}
