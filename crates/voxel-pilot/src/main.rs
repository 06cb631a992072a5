use anyhow::Result;
use clap::{Parser, ValueEnum};
use guidance::{Axis, BlockPos, Item, NavConfig, PortalKind, Position};
use std::path::PathBuf;
use tracing::info;
use voxel_pilot::sim::Sim;
use voxel_pilot::Pilot;

/// Run one navigation scenario against the built-in simulation world.
#[derive(Parser)]
#[command(name = "voxel-pilot", about = "Navigation & recovery controller demo")]
struct Cli {
    /// Which scenario to run.
    #[arg(long, value_enum, default_value = "climb")]
    scenario: Scenario,

    /// Optional TOML config for the navigation tunables.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// Target six blocks overhead: stall, then pillar recovery.
    Climb,
    /// No hostiles around: flee in a random direction.
    Flee,
    /// Carve a short tunnel east.
    Tunnel,
    /// Walk into a nether portal and wait out the transit.
    Portal,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    }
    .with_env_overrides();

    let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
    sim.world.fill_floor(63, -40, 40, -40, 40, "stone");
    sim.world.set_inventory(vec![
        Item::new("cobblestone", 64, true),
        Item::new("iron_pickaxe", 1, false),
    ]);

    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), cfg);
    info!(start = %sim.world.agent_position(), "scenario starting");

    let outcome = match cli.scenario {
        Scenario::Climb => pilot.move_to(0.5, 70.0, 0.5).await,
        Scenario::Flee => pilot.flee(20.0).await,
        Scenario::Tunnel => {
            // A ridge to dig through.
            for x in 5..8 {
                for y in 64..68 {
                    for z in -3..=3 {
                        sim.world.set_block(BlockPos::new(x, y, z), "stone");
                    }
                }
            }
            pilot.dig_tunnel(guidance::Direction::East, 10).await
        }
        Scenario::Portal => {
            sim.world
                .set_portal(BlockPos::new(6, 64, 0), PortalKind::Nether, Axis::X);
            pilot.enter_portal(Some(PortalKind::Nether)).await
        }
    };

    info!(finish = %sim.world.agent_position(), "scenario finished");
    println!("{outcome}");
    Ok(())
}
