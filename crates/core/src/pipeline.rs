use crate::catalog::SqliteCatalog;
use crate::config::AppConfig;
use crate::engine::{AutoCategorizer, Collaborators};
use crate::vectorstore::{NeighborIndex, QdrantNeighbors};
use anyhow::Context;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::ProviderRegistry;
use std::sync::Arc;
use storage::{connect, migrate};
use tracing::{info, warn};

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new()
        .with_embedding("noop", Arc::new(NoopProvider))
        .with_llm("noop", Arc::new(NoopProvider));

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: config.embeddings.model.clone(),
            chat_model: config.llm.model.clone(),
        });
        reg = reg
            .with_embedding("openai", Arc::new(provider.clone()))
            .with_llm("openai", Arc::new(provider));
    }

    reg = reg.set_preferred_embedding(&config.embeddings.provider);
    match &config.llm.provider {
        Some(name) => reg.set_preferred_llm(name),
        None => reg.set_preferred_llm("noop"),
    }
}

pub fn build_neighbor_index(config: &AppConfig, catalog: &SqliteCatalog) -> Arc<dyn NeighborIndex> {
    match config.vectors.provider.as_str() {
        "qdrant" => {
            if let Some(url) = &config.vectors.url {
                let client = QdrantClient::new(QdrantConfig {
                    url: url.clone(),
                    collection: config.vectors.collection.clone(),
                    api_key: std::env::var("QDRANT_API_KEY").ok(),
                });
                return Arc::new(QdrantNeighbors::new(client));
            }
            warn!("qdrant selected without a url, falling back to sqlite neighbors");
            Arc::new(catalog.clone())
        }
        _ => Arc::new(catalog.clone()),
    }
}

/// Connects, migrates and wires an engine over the SQLite catalog.
pub async fn build_engine(config: &AppConfig) -> anyhow::Result<(AutoCategorizer, SqliteCatalog)> {
    let pool = connect(&config.database.path).await.context("db connect")?;
    migrate(&pool).await.context("db migrate")?;
    let catalog = SqliteCatalog::new(pool);

    let collaborators = Collaborators {
        catalog: Arc::new(catalog.clone()),
        snapshots: Arc::new(catalog.clone()),
        neighbors: build_neighbor_index(config, &catalog),
        registry: build_registry(config),
        llm_provider: config.llm.provider.clone(),
    };
    let engine = AutoCategorizer::new(
        config.categorization.clone(),
        config.initial_weights(),
        collaborators,
    );
    info!(database = %config.database.path, "engine ready");
    Ok((engine, catalog))
}
