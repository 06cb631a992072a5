//! Flee behavior: direction choice, success fraction, and graceful
//! degradation when the world drops mid-flight.

use guidance::{Entity, NavConfig, Position};
use std::sync::Arc;
use std::time::Duration;
use voxel_pilot::sim::Sim;
use voxel_pilot::Pilot;

fn open_field() -> Sim {
    let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
    sim.world.fill_floor(63, -40, 40, -40, 40, "stone");
    sim
}

#[tokio::test(start_paused = true)]
async fn test_flee_without_hostiles_is_generic() {
    let sim = open_field();
    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());
    let start = sim.world.agent_position();

    let msg = pilot.flee(20.0).await;

    assert!(msg.contains("Fled danger"), "unexpected: {msg}");
    assert!(
        !msg.contains("zombie") && !msg.contains("creeper"),
        "no mob should be named: {msg}"
    );
    // 70% of the requested distance counts as success.
    let covered = start.distance_to(sim.world.agent_position());
    assert!(covered >= 14.0, "only covered {covered:.1} blocks");
}

#[tokio::test(start_paused = true)]
async fn test_flee_runs_away_from_named_hostile() {
    let sim = open_field();
    sim.world.add_entity(Entity {
        id: 7,
        name: "zombie".to_string(),
        position: Position::new(5.5, 64.0, 0.5),
    });
    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());

    let msg = pilot.flee(20.0).await;

    assert!(msg.contains("zombie"), "unexpected: {msg}");
    // Hostile sits east of the agent, so the flight goes west.
    let end = sim.world.agent_position();
    assert!(end.x < 0.5, "should have fled west, ended at {end}");
}

#[tokio::test(start_paused = true)]
async fn test_flee_survives_mid_flight_disconnect() {
    let sim = open_field();
    let pilot = Arc::new(Pilot::new(
        sim.world.clone(),
        sim.engine.clone(),
        NavConfig::default(),
    ));

    let task = {
        let pilot = pilot.clone();
        tokio::spawn(async move { pilot.flee(30.0).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    sim.world.disconnect();

    let msg = task.await.unwrap();
    assert!(
        msg.contains("Flee interrupted"),
        "disconnect must degrade, not crash: {msg}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_flee_is_bounded_by_its_timeout() {
    let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
    // Tiny island: the agent cannot cover 70% of the distance.
    sim.world.fill_floor(63, -2, 2, -2, 2, "stone");
    for x in -2..=2 {
        for y in 64..=66 {
            for z in [-2, 2] {
                sim.world.set_block(guidance::BlockPos::new(x, y, z), "stone");
                sim.world.set_block(guidance::BlockPos::new(z, y, x), "stone");
            }
        }
    }
    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());

    let started = tokio::time::Instant::now();
    let msg = pilot.flee(30.0).await;

    // Walled in: the engine keeps trying until the 8 s flee ceiling.
    assert!(msg.starts_with("Fled"), "unexpected: {msg}");
    let elapsed = started.elapsed();
    assert!(
        elapsed <= Duration::from_secs(10),
        "flee overran its bound: {elapsed:?}"
    );
}
