//! Straight 1×2 tunnel excavation along a cardinal direction.
//!
//! Per cell: clear the head and feet blocks ahead, refuse to breach a
//! liquid, stop fatally on unbreakable material, then step forward and
//! verify the step landed.

use crate::controller::Pilot;
use crate::monitor::{watch_goal, GoalOutcome, WatchOptions};
use crate::world::equip_excavation_tool;
use guidance::{Direction, NavError};
use std::time::Duration;

/// Sub-cell acceptance radius for each forward step, so the agent really
/// crosses into the freshly dug pair before the next one is probed.
const STEP_RADIUS: f64 = 0.45;

pub(crate) async fn dig_tunnel(
    pilot: &Pilot,
    direction: Direction,
    length: u32,
) -> Result<String, NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;
    let (dx, dz) = direction.step();
    tracing::info!(%direction, length, "tunnel starting");

    let mut completed = 0u32;
    while completed < length {
        let feet = world.position()?.block();
        let ahead_feet = feet.offset(dx, 0, dz);
        let ahead_head = ahead_feet.up();

        // Head first — dropping the top block into a cleared feet cell
        // just makes more digging.
        for cell in [ahead_head, ahead_feet] {
            // Fresh query per cell, per step.
            let Some(block) = world.block_at(cell) else {
                continue;
            };
            if block.liquid {
                return Ok(format!(
                    "Tunnel stopped before breaching {} at {cell}; {completed}/{length} cells dug {direction}.",
                    block.name
                ));
            }
            if block.is_solid_ground() {
                if !block.diggable {
                    return Ok(format!(
                        "Tunnel stopped at unbreakable {} at {cell}; {completed}/{length} cells dug {direction}.",
                        block.name
                    ));
                }
                equip_excavation_tool(world).await?;
                world.excavate(cell).await?;
            }
        }

        // Step into the cleared pair.
        let outcome = watch_goal(
            pilot.engine.as_ref(),
            world,
            cfg,
            &pilot.slot,
            ahead_feet.center(),
            WatchOptions::radius(STEP_RADIUS)
                .with_timeout(Duration::from_secs(cfg.detour_timeout_secs)),
        )
        .await?;
        match outcome {
            GoalOutcome::Reached => completed += 1,
            GoalOutcome::Superseded => {
                return Ok(format!(
                    "Tunnel superseded; {completed}/{length} cells dug {direction}."
                ));
            }
            GoalOutcome::Stuck(reason) => {
                return Ok(format!(
                    "Tunnel blocked ({reason}); {completed}/{length} cells dug {direction}."
                ));
            }
        }
    }

    Ok(format!("Tunnel complete: {length} cells {direction}."))
}
