//! CLI: ingest a simplified Wiktionary XML export via gloss/synonym/antonym/
//! hypernym relations.

use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use substrate_core::ingest::wiktionary::ingest_wiktionary;
use substrate_core::storage::{AsyncFlusher, PostgresDatastore};
use substrate_core::unicode::{AtomStore, UcdLoader};
use substrate_core::Result;

#[derive(Parser)]
#[command(about = "Ingest a Wiktionary XML export into the substrate")]
struct Args {
    #[arg(long)]
    source_name: String,
    #[arg(long)]
    input: PathBuf,
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

    let xml = std::fs::read_to_string(&args.input)?;
    let stats = ingest_wiktionary(&args.source_name, &xml, &lookup, &flusher).await?;
    flusher.shutdown().await;

    tracing::info!(?stats, "ingestion complete");
    println!(
        "compositions={} relations={} skipped_empty={}",
        stats.compositions, stats.relations, stats.skipped_empty
    );
    Ok(())
}
