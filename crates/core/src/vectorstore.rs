use crate::catalog::SqliteCatalog;
use providers::qdrant::{QdrantClient, QdrantPoint};
use sqlx::Row;
use std::collections::HashMap;
use storage::models::EmbeddingRow;

/// A previously categorized document close to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub document_id: String,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
    /// `(category_id, confidence)` assignments of the neighbor.
    pub categories: Vec<(String, f32)>,
}

#[async_trait::async_trait]
pub trait NeighborIndex: Send + Sync {
    async fn nearest(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>>;
    async fn index(
        &self,
        document_id: &str,
        vector: &[f32],
        categories: &[(String, f32)],
    ) -> anyhow::Result<()>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

/// Brute-force search over embeddings stored next to the catalog.
#[async_trait::async_trait]
impl NeighborIndex for SqliteCatalog {
    async fn nearest(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if k == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EmbeddingRow>(
            "SELECT document_id, vector_json FROM document_embeddings ORDER BY document_id",
        )
        .fetch_all(self.pool())
        .await?;

        let mut scored: Vec<(String, f32)> = Vec::new();
        for row in rows {
            let stored: Vec<f32> = serde_json::from_str(&row.vector_json)?;
            if let Some(sim) = cosine_similarity(vector, &stored) {
                scored.push((row.document_id, sim));
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let mut neighbors = Vec::with_capacity(scored.len());
        for (document_id, similarity) in scored {
            let rows = sqlx::query(
                "SELECT category_id, confidence FROM document_categories WHERE document_id = ?1 ORDER BY category_id",
            )
            .bind(&document_id)
            .fetch_all(self.pool())
            .await?;
            let mut categories = Vec::with_capacity(rows.len());
            for row in rows {
                let category_id: String = row.try_get("category_id")?;
                let confidence: f64 = row.try_get("confidence")?;
                categories.push((category_id, confidence as f32));
            }
            neighbors.push(Neighbor {
                document_id,
                similarity,
                categories,
            });
        }
        Ok(neighbors)
    }

    async fn index(
        &self,
        document_id: &str,
        vector: &[f32],
        categories: &[(String, f32)],
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_embeddings (document_id, vector_json) VALUES (?1, ?2)
            ON CONFLICT(document_id) DO UPDATE SET vector_json=excluded.vector_json
            "#,
        )
        .bind(document_id)
        .bind(serde_json::to_string(vector)?)
        .execute(self.pool())
        .await?;
        for (category_id, confidence) in categories {
            self.record_categorization(document_id, category_id, *confidence, "auto", false)
                .await?;
        }
        Ok(())
    }
}

pub struct QdrantNeighbors {
    client: QdrantClient,
}

impl QdrantNeighbors {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

/// Qdrant only accepts UUID or integer point ids.
fn point_id(document_id: &str) -> String {
    let hex = blake3::hash(document_id.as_bytes()).to_hex();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[async_trait::async_trait]
impl NeighborIndex for QdrantNeighbors {
    async fn nearest(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if k == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self.client.search(vector.to_vec(), k as u64).await?;
        Ok(resp
            .result
            .into_iter()
            .filter_map(|hit| {
                let payload = hit.payload?;
                let document_id = payload.get("document_id")?.as_str()?.to_string();
                let categories = payload
                    .get("categories")
                    .and_then(|c| c.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| {
                                let id = item.get("category_id")?.as_str()?.to_string();
                                let conf = item.get("confidence")?.as_f64()? as f32;
                                Some((id, conf))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(Neighbor {
                    document_id,
                    similarity: hit.score,
                    categories,
                })
            })
            .collect())
    }

    async fn index(
        &self,
        document_id: &str,
        vector: &[f32],
        categories: &[(String, f32)],
    ) -> anyhow::Result<()> {
        let mut payload = HashMap::new();
        payload.insert("document_id".to_string(), serde_json::json!(document_id));
        payload.insert(
            "categories".to_string(),
            serde_json::Value::Array(
                categories
                    .iter()
                    .map(|(id, conf)| serde_json::json!({ "category_id": id, "confidence": conf }))
                    .collect(),
            ),
        );
        self.client
            .upsert(vec![QdrantPoint {
                id: point_id(document_id),
                vector: vector.to_vec(),
                payload,
            }])
            .await?;
        Ok(())
    }
}
