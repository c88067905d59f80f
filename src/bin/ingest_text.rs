//! CLI: ingest a plain-text file via word-adjacency relations.

use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use substrate_core::ingest::text::ingest_text;
use substrate_core::storage::{AsyncFlusher, PostgresDatastore};
use substrate_core::unicode::{AtomStore, UcdLoader};
use substrate_core::Result;

#[derive(Parser)]
#[command(about = "Ingest a plain-text corpus into the substrate")]
struct Args {
    /// Name used to key this document's relation evidence
    #[arg(long)]
    source_name: String,
    /// Path to the text file to ingest
    #[arg(long)]
    input: PathBuf,
    /// Path to a `ucd.all.flat.xml` file used to seed the Atom lookup table
    #[arg(long, env = "UCD_XML_PATH")]
    ucd_xml: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = substrate_core::config::Config::from_env()?;
    config.init_logging();

    let args = Args::parse();

    let ucd_file = std::fs::File::open(&args.ucd_xml)?;
    let records = UcdLoader::load_xml(BufReader::new(ucd_file))?;
    let lookup = AtomStore::from_total_order(&records);

    let datastore = PostgresDatastore::connect(&config.database.url, config.database.pool_size).await?;
    datastore.initialize_schema().await?;
    let flusher = AsyncFlusher::spawn(Arc::new(datastore), config.flusher.clone());

    let text = std::fs::read_to_string(&args.input)?;
    let stats = ingest_text(&args.source_name, &text, &lookup, &flusher).await?;
    flusher.shutdown().await;

    tracing::info!(?stats, "ingestion complete");
    println!(
        "compositions={} relations={} skipped_empty={}",
        stats.compositions, stats.relations, stats.skipped_empty
    );
    Ok(())
}
