//! Portal handshake: approach generation, forced entry, transit wait —
//! and the avoidance-set restore, which must be identical on the success
//! and the timeout path.

use guidance::{Axis, BlockPos, Dimension, NavConfig, PortalKind, Position};
use voxel_pilot::sim::Sim;
use voxel_pilot::{PathEngine, Pilot};

fn portal_field() -> Sim {
    let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
    sim.world.fill_floor(63, -20, 20, -20, 20, "stone");
    sim.world
        .set_portal(BlockPos::new(6, 64, 0), PortalKind::Nether, Axis::X);
    sim
}

/// Seal the portal column behind stone so no approach can land the
/// agent's feet inside it.
fn seal_portal(sim: &Sim) {
    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
        for y in 64..=66 {
            sim.world
                .set_block(BlockPos::new(6 + dx, y, dz), "obsidian");
        }
    }
    sim.world.set_block(BlockPos::new(6, 66, 0), "obsidian");
}

#[tokio::test(start_paused = true)]
async fn test_portal_entry_success_and_restore() {
    let sim = portal_field();
    let original = sim.engine.avoided_blocks();
    assert!(original.iter().any(|n| n == "nether_portal"));

    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());
    let msg = pilot.enter_portal(Some(PortalKind::Nether)).await;

    assert!(msg.contains("now in the nether"), "unexpected: {msg}");
    assert_eq!(sim.world.dimension_now(), Dimension::Nether);
    assert_eq!(sim.engine.avoided_blocks(), original);
}

#[tokio::test(start_paused = true)]
async fn test_sealed_portal_times_out_and_restores_identically() {
    let sim = portal_field();
    seal_portal(&sim);
    let original = sim.engine.avoided_blocks();

    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());
    let msg = pilot.enter_portal(Some(PortalKind::Nether)).await;

    // Never got in, still waited out the dimension bound.
    assert!(
        msg.contains("no dimension change within 30s"),
        "unexpected: {msg}"
    );
    assert_eq!(sim.world.dimension_now(), Dimension::Overworld);
    assert_eq!(sim.engine.avoided_blocks(), original);
    // Goal and listeners cleaned up on the failure path too.
    assert!(sim.engine.current_goal().is_none());
    assert_eq!(sim.engine.path_event_subscribers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_portal_in_range_reports_cleanly() {
    let sim = Sim::spawn(Position::new(0.5, 64.0, 0.5));
    sim.world.fill_floor(63, -20, 20, -20, 20, "stone");
    let original = sim.engine.avoided_blocks();

    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());
    let msg = pilot.enter_portal(Some(PortalKind::Nether)).await;

    assert!(msg.contains("No nether portal found"), "unexpected: {msg}");
    assert_eq!(sim.engine.avoided_blocks(), original);
}

#[tokio::test(start_paused = true)]
async fn test_move_to_portal_block_delegates_to_handshake() {
    let sim = portal_field();
    let pilot = Pilot::new(sim.world.clone(), sim.engine.clone(), NavConfig::default());

    // Asking to "move to" the portal cell means transit, not approach.
    let msg = pilot.move_to(6.5, 64.0, 0.5).await;

    assert!(msg.contains("now in the nether"), "unexpected: {msg}");
    assert_eq!(sim.world.dimension_now(), Dimension::Nether);
}
