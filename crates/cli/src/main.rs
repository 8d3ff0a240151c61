use anyhow::Result;
use categorizer_core::catalog::CategoryManager;
use categorizer_core::config;
use categorizer_core::definitions;
use categorizer_core::pipeline;
use clap::{Parser, Subcommand};
use cli::{input, report};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let (engine, catalog) = pipeline::build_engine(&cfg).await?;

    match cli.command {
        Commands::Init => {
            engine.initialize().await?;
            println!("{}", report::format_weights(&engine.strategy_weights().await));
        }
        Commands::Import { file } => {
            let defs = definitions::load_definitions(&file)?;
            let summary = definitions::import_definitions(&catalog, &defs).await?;
            engine.refresh_keyword_index().await?;
            println!(
                "imported {} categories, {} rules, {} keywords, {} entity patterns",
                summary.categories, summary.rules, summary.keywords, summary.entity_patterns
            );
        }
        Commands::Categorize {
            document,
            strategies,
            threshold,
            max,
            record,
            json,
        } => {
            let doc = input::read_document(&document)?;
            let mut options = cfg.categorization.options();
            if let Some(list) = strategies {
                options.strategies = input::parse_strategies(&list)?;
            }
            if let Some(t) = threshold {
                options.threshold = t;
            }
            if let Some(m) = max {
                options.max_categories = m;
            }
            let results = engine.categorize_document(&doc, &options).await?;
            if record {
                catalog.save_document(&doc).await?;
                if let Err(err) = engine.index_categorized(&doc, &results).await {
                    tracing::warn!(error = %err, "document stored without neighbor index entry");
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("{}", report::format_results(&results));
            }
        }
        Commands::Train => {
            let samples = catalog
                .confirmed_categorizations(cfg.categorization.training_min_confidence)
                .await?;
            match engine.rebuild_classifier(&samples).await? {
                Some(meta) => println!(
                    "trained on {} samples -> {} v{} ({})",
                    samples.len(),
                    meta.name,
                    meta.version,
                    meta.hash
                ),
                None => println!("no confirmed categorizations to train on"),
            }
        }
        Commands::Feedback { file } => {
            let feedback = input::read_feedback(&file)?;
            let weights = engine.update_strategy_weights(&feedback).await?;
            catalog.save_strategy_weights(&weights).await?;
            println!("{}", report::format_weights(&weights));
        }
        Commands::Weights { json } => {
            engine.initialize().await?;
            let weights = engine.strategy_weights().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&weights)?);
            } else {
                println!("{}", report::format_weights(&weights));
            }
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "categorizer")]
#[command(about = "Ensemble document auto-categorization", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the database and load persisted state
    Init,
    /// Import category definitions from a TOML file
    Import { file: PathBuf },
    /// Categorize a document (JSON, or plain text with the title on line one)
    Categorize {
        document: PathBuf,
        /// Comma-separated strategies: rules,keywords,ml,entities
        #[arg(long)]
        strategies: Option<String>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        max: Option<usize>,
        /// Store the document and index it for future similarity lookups
        #[arg(long)]
        record: bool,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the classifier from confirmed manual categorizations
    Train,
    /// Update strategy weights from a JSON feedback array
    Feedback { file: PathBuf },
    /// Print current strategy weights
    Weights {
        #[arg(long)]
        json: bool,
    },
}
