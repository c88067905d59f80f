//! CLI: parse a UCD XML dump and report the seeded Atom table's size, as a
//! smoke test for the ordering/seeding pipeline before it's handed to an
//! ingester.

use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use substrate_core::unicode::{AtomStore, UcdLoader};
use substrate_core::Result;

#[derive(Parser)]
#[command(about = "Seed the Atom table from a UCD XML dump")]
struct Args {
    /// Path to a `ucd.all.flat.xml` file
    #[arg(long, env = "UCD_XML_PATH")]
    ucd_xml: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = substrate_core::config::Config::from_env()?;
    config.init_logging();

    let args = Args::parse();
    let file = File::open(&args.ucd_xml)?;
    let records = UcdLoader::load_xml(BufReader::new(file))?;
    tracing::info!(codepoints = records.len(), "parsed UCD total order");

    let store = AtomStore::from_total_order(&records);
    tracing::info!(atoms = store.len(), "seeded Atom table");
    println!("seeded {} atoms from {} codepoints", store.len(), records.len());

    Ok(())
}
