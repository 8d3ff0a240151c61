//! Read-side collaborators the engine consumes, and their SQLite implementation.

use crate::models::{
    Category, CategoryKeyword, Document, EntityPattern, Rule, Strategy, StrategyWeights,
    TrainingSample,
};
use sqlx::{Row, SqlitePool};
use storage::models::{CategoryRow, EntityPatternRow, KeywordRow, RuleRow, SnapshotRow, TrainingRow};

/// Category metadata owned by the category management layer. The engine only reads.
#[async_trait::async_trait]
pub trait CategoryManager: Send + Sync {
    async fn categories(&self, active_only: bool) -> anyhow::Result<Vec<Category>>;
    async fn category(&self, id: &str) -> anyhow::Result<Option<Category>>;
    async fn category_rules(&self, category_id: &str) -> anyhow::Result<Vec<Rule>>;
    async fn category_keywords(&self, category_id: &str) -> anyhow::Result<Vec<CategoryKeyword>>;
    async fn entity_patterns(&self, category_id: &str) -> anyhow::Result<Vec<EntityPattern>>;
    async fn strategy_weights(&self) -> anyhow::Result<Option<StrategyWeights>>;
    async fn save_strategy_weights(&self, weights: &StrategyWeights) -> anyhow::Result<()>;
    /// Manually assigned, confirmed categorizations at or above `min_confidence`.
    async fn confirmed_categorizations(
        &self,
        min_confidence: f32,
    ) -> anyhow::Result<Vec<TrainingSample>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub name: String,
    pub version: i64,
    /// blake3 hex digest of the blob.
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub bytes: Vec<u8>,
}

/// Versioned, content-addressed blob store for trained artifacts.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stores `bytes` as the next version of `name` unless the latest version
    /// already has the same content hash.
    async fn put(&self, name: &str, bytes: &[u8]) -> anyhow::Result<SnapshotMeta>;
    async fn latest(&self, name: &str) -> anyhow::Result<Option<Snapshot>>;
}

pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_category(&self, category: &Category) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, path, name, description, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                path=excluded.path,
                name=excluded.name,
                description=excluded.description,
                is_active=excluded.is_active
            "#,
        )
        .bind(&category.id)
        .bind(&category.path)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_rule(&self, rule: &Rule) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO category_rules (category_id, rule_type, pattern, confidence) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&rule.category_id)
        .bind(&rule.rule_type)
        .bind(&rule.pattern)
        .bind(rule.confidence as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Inserts a keyword, keeping the larger weight when the term already exists.
    pub async fn upsert_keyword(&self, keyword: &CategoryKeyword) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO category_keywords (category_id, term, weight)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(category_id, term) DO UPDATE SET
                weight=MAX(category_keywords.weight, excluded.weight)
            "#,
        )
        .bind(&keyword.category_id)
        .bind(keyword.term.to_lowercase())
        .bind(keyword.weight as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes a category's rules and entity patterns so a definition can be
    /// re-imported without duplicating them. Returns the number of rows deleted.
    pub async fn clear_rules_and_patterns(&self, category_id: &str) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let rules = sqlx::query("DELETE FROM category_rules WHERE category_id = ?1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let patterns = sqlx::query("DELETE FROM entity_patterns WHERE category_id = ?1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(rules + patterns)
    }

    pub async fn insert_entity_pattern(&self, pattern: &EntityPattern) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO entity_patterns (category_id, pattern_json, weight) VALUES (?1, ?2, ?3)",
        )
        .bind(&pattern.category_id)
        .bind(&pattern.pattern)
        .bind(pattern.weight as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn save_document(&self, document: &Document) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, description, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title=excluded.title,
                content=excluded.content,
                description=excluded.description,
                metadata_json=excluded.metadata_json
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(&document.description)
        .bind(serde_json::Value::Object(document.metadata.clone()).to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a document-category assignment. Manual rows are never
    /// overwritten by automatic ones.
    pub async fn record_categorization(
        &self,
        document_id: &str,
        category_id: &str,
        confidence: f32,
        source: &str,
        confirmed: bool,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_categories (document_id, category_id, confidence, source, confirmed)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(document_id, category_id) DO UPDATE SET
                confidence=excluded.confidence,
                source=excluded.source,
                confirmed=excluded.confirmed
            WHERE document_categories.source != 'manual' OR excluded.source = 'manual'
            "#,
        )
        .bind(document_id)
        .bind(category_id)
        .bind(confidence as f64)
        .bind(source)
        .bind(confirmed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn category_from_row(row: CategoryRow) -> Category {
    Category {
        id: row.id,
        path: row.path,
        name: row.name,
        description: row.description,
        is_active: row.is_active != 0,
    }
}

#[async_trait::async_trait]
impl CategoryManager for SqliteCatalog {
    async fn categories(&self, active_only: bool) -> anyhow::Result<Vec<Category>> {
        let sql = if active_only {
            "SELECT id, path, name, description, is_active FROM categories WHERE is_active = 1 ORDER BY path"
        } else {
            "SELECT id, path, name, description, is_active FROM categories ORDER BY path"
        };
        let rows = sqlx::query_as::<_, CategoryRow>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(category_from_row).collect())
    }

    async fn category(&self, id: &str) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, path, name, description, is_active FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(category_from_row))
    }

    async fn category_rules(&self, category_id: &str) -> anyhow::Result<Vec<Rule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            "SELECT id, category_id, rule_type, pattern, confidence FROM category_rules WHERE category_id = ?1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Rule {
                id: r.id,
                category_id: r.category_id,
                rule_type: r.rule_type,
                pattern: r.pattern,
                confidence: r.confidence as f32,
            })
            .collect())
    }

    async fn category_keywords(&self, category_id: &str) -> anyhow::Result<Vec<CategoryKeyword>> {
        let rows = sqlx::query_as::<_, KeywordRow>(
            "SELECT category_id, term, weight FROM category_keywords WHERE category_id = ?1 ORDER BY term",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| CategoryKeyword {
                category_id: r.category_id,
                term: r.term,
                weight: r.weight as f32,
            })
            .collect())
    }

    async fn entity_patterns(&self, category_id: &str) -> anyhow::Result<Vec<EntityPattern>> {
        let rows = sqlx::query_as::<_, EntityPatternRow>(
            "SELECT id, category_id, pattern_json, weight FROM entity_patterns WHERE category_id = ?1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| EntityPattern {
                id: r.id,
                category_id: r.category_id,
                weight: r.weight as f32,
                pattern: r.pattern_json,
            })
            .collect())
    }

    async fn strategy_weights(&self) -> anyhow::Result<Option<StrategyWeights>> {
        let rows = sqlx::query("SELECT strategy, weight FROM strategy_weights")
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let mut weights = StrategyWeights::new();
        for row in rows {
            let name: String = row.try_get("strategy")?;
            let weight: f64 = row.try_get("weight")?;
            match name.parse::<Strategy>() {
                Ok(strategy) => weights.set(strategy, weight as f32),
                Err(err) => tracing::warn!(%err, "skipping persisted weight"),
            }
        }
        Ok(Some(weights))
    }

    async fn save_strategy_weights(&self, weights: &StrategyWeights) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for (strategy, weight) in weights.iter() {
            sqlx::query(
                r#"
                INSERT INTO strategy_weights (strategy, weight, updated_at)
                VALUES (?1, ?2, strftime('%s','now'))
                ON CONFLICT(strategy) DO UPDATE SET
                    weight=excluded.weight,
                    updated_at=excluded.updated_at
                "#,
            )
            .bind(strategy.as_str())
            .bind(weight as f64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn confirmed_categorizations(
        &self,
        min_confidence: f32,
    ) -> anyhow::Result<Vec<TrainingSample>> {
        let rows = sqlx::query_as::<_, TrainingRow>(
            r#"
            SELECT d.id AS document_id, d.title, d.content, dc.category_id
            FROM document_categories dc
            JOIN documents d ON d.id = dc.document_id
            JOIN categories c ON c.id = dc.category_id
            WHERE dc.source = 'manual' AND dc.confirmed = 1 AND dc.confidence >= ?1
              AND c.is_active = 1
            ORDER BY d.id, dc.category_id
            "#,
        )
        .bind(min_confidence as f64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| TrainingSample {
                text: format!("{} {}", r.title, r.content),
                category_id: r.category_id,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteCatalog {
    async fn put(&self, name: &str, bytes: &[u8]) -> anyhow::Result<SnapshotMeta> {
        let hash = content_hash(bytes);
        let mut tx = self.pool.begin().await?;
        let latest = sqlx::query(
            "SELECT version, hash FROM snapshots WHERE name = ?1 ORDER BY version DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
        let next_version = match latest {
            Some(row) => {
                let version: i64 = row.try_get("version")?;
                let existing: String = row.try_get("hash")?;
                if existing == hash {
                    tx.commit().await?;
                    return Ok(SnapshotMeta {
                        name: name.to_string(),
                        version,
                        hash,
                    });
                }
                version + 1
            }
            None => 1,
        };
        sqlx::query("INSERT INTO snapshots (name, version, hash, blob) VALUES (?1, ?2, ?3, ?4)")
            .bind(name)
            .bind(next_version)
            .bind(&hash)
            .bind(bytes)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(SnapshotMeta {
            name: name.to_string(),
            version: next_version,
            hash,
        })
    }

    async fn latest(&self, name: &str) -> anyhow::Result<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT name, version, hash, blob FROM snapshots WHERE name = ?1 ORDER BY version DESC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let actual = content_hash(&row.blob);
                if actual != row.hash {
                    anyhow::bail!(
                        "snapshot {} v{} hash mismatch (stored {}, computed {})",
                        row.name,
                        row.version,
                        row.hash,
                        actual
                    );
                }
                Ok(Some(Snapshot {
                    meta: SnapshotMeta {
                        name: row.name,
                        version: row.version,
                        hash: row.hash,
                    },
                    bytes: row.blob,
                }))
            }
            None => Ok(None),
        }
    }
}
