//! CLI: run a goal-attracted random walk from one composition toward
//! another and print the trajectory, for exercising the WalkEngine against
//! a live datastore without writing a full reasoning service.

use clap::Parser;
use std::sync::Arc;
use substrate_core::storage::PostgresDatastore;
use substrate_core::walk::{WalkEngine, WalkParameters};
use substrate_core::Result;

#[derive(Parser)]
#[command(about = "Run a goal-attracted random walk over the substrate")]
struct Args {
    /// Starting composition id (decimal u128)
    #[arg(long)]
    start: u128,
    /// Optional goal composition id; the walk runs until energy is
    /// exhausted if omitted
    #[arg(long)]
    goal: Option<u128>,
    #[arg(long, default_value_t = 1.0)]
    initial_energy: f64,
    #[arg(long, default_value_t = 200)]
    max_steps: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = substrate_core::config::Config::from_env()?;
    config.init_logging();

    let args = Args::parse();

    let datastore = PostgresDatastore::connect(&config.database.url, config.database.pool_size).await?;
    let datastore: Arc<dyn substrate_core::storage::Datastore> = Arc::new(datastore);
    let engine = WalkEngine::new(datastore.as_ref());
    let params = WalkParameters::default();
    let mut rng = rand::thread_rng();

    let mut state = engine.init_walk(args.start, args.initial_energy).await?;
    if let Some(goal_id) = args.goal {
        let comp = datastore
            .fetch_composition(goal_id)
            .await?
            .ok_or_else(|| substrate_core::SubstrateError::InvalidComposition(format!("{goal_id:#x} not found")))?;
        let phys = datastore
            .fetch_physicality(comp.phys_id)
            .await?
            .ok_or_else(|| substrate_core::SubstrateError::Invariant("goal missing physicality".into()))?;
        state.set_goal(goal_id, phys.centroid);
    }

    println!("{:#x}", args.start);
    for _ in 0..args.max_steps {
        let step = engine.step(&mut state, &params, &mut rng).await?;
        if let Some(next) = step.next_composition {
            println!("{:#x} (p={:.4}, energy={:.4})", next, step.probability, step.energy_remaining);
        }
        if step.terminated {
            println!("terminated: {}", step.reason);
            break;
        }
    }

    Ok(())
}
