//! CLI: ingest a HuggingFace model package's static embedding table via
//! nearest-neighbor category relations. Feature-gated (`model-ingest`)
//! since it pulls in `safetensors`/`tokenizers`.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use substrate_core::ingest::model::ingest_model;
use substrate_core::storage::{AsyncFlusher, PostgresDatastore};
use substrate_core::unicode::{AtomStore, UcdLoader};
use substrate_core::Result;

#[derive(Parser)]
#[command(about = "Ingest a model package's embedding table into the substrate")]
struct Args {
    #[arg(long)]
    source_name: String,
    /// Path to the tokenizer.json
    #[arg(long)]
    tokenizer: PathBuf,
    /// Path to the .safetensors weights file
    #[arg(long)]
    weights: PathBuf,
    /// Name of the 2D embedding tensor within the safetensors file
    #[arg(long, default_value = "embeddings.weight")]
    tensor_name: String,
    #[arg(long, env = "UCD_XML_PATH")]
    ucd_xml: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = substrate_core::config::Config::from_env()?;
    config.init_logging();

    let args = Args::parse();

    let ucd_file = std::fs::File::open(&args.ucd_xml)?;
    let records = UcdLoader::load_xml(std::io::BufReader::new(ucd_file))?;
    let lookup = AtomStore::from_total_order(&records);

    let datastore = PostgresDatastore::connect(&config.database.url, config.database.pool_size).await?;
    datastore.initialize_schema().await?;
    let flusher = AsyncFlusher::spawn(Arc::new(datastore), config.flusher.clone());

    let stats = ingest_model(
        &args.source_name,
        &args.tokenizer,
        &args.weights,
        &args.tensor_name,
        &lookup,
        &flusher,
    )
    .await?;
    flusher.shutdown().await;

    tracing::info!(?stats, "ingestion complete");
    println!(
        "compositions={} relations={} skipped_empty={}",
        stats.compositions, stats.relations, stats.skipped_empty
    );
    Ok(())
}
