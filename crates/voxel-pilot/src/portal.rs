//! The portal-entry handshake.
//!
//! Portals are normally on the path engine's avoidance list so that
//! routine navigation never blunders through one. Entering on purpose
//! means lifting that policy, walking the agent's feet into the lowest
//! contiguous portal cell, and waiting out the dimension change — and the
//! policy must be restored on every exit path, exactly once, which the
//! [`AvoidanceRestore`](crate::engine::AvoidanceRestore) drop guard owns.

use crate::controller::Pilot;
use crate::engine::AvoidanceRestore;
use crate::monitor::{watch_goal, GoalOutcome, WatchOptions};
use crate::world::{Control, WorldEvent, WorldView};
use guidance::{Axis, BlockInfo, BlockPos, NavError, PortalKind, Position};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, timeout};

/// Locate, approach and enter a portal, then wait for the transit.
pub(crate) async fn enter_portal(
    pilot: &Pilot,
    kind: Option<PortalKind>,
) -> Result<String, NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;
    let start_dim = world.dimension();

    // Already standing in a portal: just wait out the transit.
    let feet = world.position()?.block();
    if world.block_at(feet).is_some_and(|b| b.is_portal()) {
        return Ok(match await_dimension_change(pilot, start_dim).await? {
            TransitOutcome::Changed(dim) => {
                format!("Went through the portal; now in the {dim}.")
            }
            TransitOutcome::TimedOut => format!(
                "Stood in the portal but no dimension change arrived within {}s.",
                cfg.dimension_wait_secs
            ),
        });
    }

    let Some(found) = find_portal(world, kind, cfg.portal_search_range) else {
        let wanted = kind.map(|k| k.to_string()).unwrap_or_else(|| "any".into());
        return Ok(format!(
            "No {wanted} portal found within {:.0} blocks.",
            cfg.portal_search_range
        ));
    };

    let entry = lowest_portal_cell(world, &found);
    let axis = found.axis.unwrap_or(Axis::X);
    let kind = PortalKind::from_block_name(&found.name).unwrap_or(PortalKind::Nether);
    tracing::info!(portal = %kind, cell = %entry, ?axis, "portal handshake starting");

    // Lift the avoidance policy for the duration of the handshake. The
    // guard restores the saved set on drop, whatever path we leave by.
    let saved = pilot.engine.avoided_blocks();
    let lifted: Vec<String> = saved
        .iter()
        .filter(|n| PortalKind::from_block_name(n).is_none())
        .cloned()
        .collect();
    let _restore = AvoidanceRestore::install(pilot.engine.as_ref(), lifted);

    let entered = walk_into_portal(pilot, entry, axis).await?;
    if !entered {
        tracing::warn!(
            attempts = 1 + cfg.portal_forced_attempts,
            "feet never landed in the portal cell"
        );
    }

    // The dimension wait runs even after failed walk-ins — the frame may
    // still take an agent standing half inside it.
    match await_dimension_change(pilot, start_dim).await? {
        TransitOutcome::Changed(dim) => {
            Ok(format!("Went through the portal; now in the {dim}."))
        }
        TransitOutcome::TimedOut if entered => Ok(format!(
            "Stood in the portal but no dimension change arrived within {}s.",
            cfg.dimension_wait_secs
        )),
        TransitOutcome::TimedOut => Ok(format!(
            "Could not enter the {kind} portal at {entry} after {} attempts; \
             no dimension change within {}s.",
            1 + cfg.portal_forced_attempts,
            cfg.dimension_wait_secs
        )),
    }
}

/// Nearest portal block of the requested kind (or either).
fn find_portal(
    world: &dyn WorldView,
    kind: Option<PortalKind>,
    range: f64,
) -> Option<BlockInfo> {
    world.find_nearest_block(
        &|b: &BlockInfo| match kind {
            Some(k) => b.name == k.block_name(),
            None => b.is_portal(),
        },
        range,
    )
}

/// Walk a portal column down to the lowest contiguous portal cell — the
/// one the agent's feet must occupy.
fn lowest_portal_cell(world: &dyn WorldView, portal: &BlockInfo) -> BlockPos {
    let mut cell = portal.pos;
    while world
        .block_at(cell.down())
        .is_some_and(|b| b.name == portal.name)
    {
        cell = cell.down();
    }
    cell
}

/// Approach points perpendicular to the portal plane, center first, so
/// the agent stops bouncing off the frame.
fn approach_points(entry: BlockPos, axis: Axis, count: u32) -> Vec<Position> {
    let center = entry.center();
    let mut points = vec![center];
    for magnitude in 1..=2i32 {
        for sign in [1, -1] {
            let offset = (magnitude * sign) as f64;
            points.push(match axis {
                // The plane extends along the axis; approach across it.
                Axis::X => center.offset(0.0, 0.0, offset),
                Axis::Z => center.offset(offset, 0.0, 0.0),
            });
        }
    }
    points.truncate(count as usize);
    points
}

/// Direct navigation first, then bounded forced walk-ins. `Ok(true)` once
/// the agent's feet occupy a portal cell.
async fn walk_into_portal(pilot: &Pilot, entry: BlockPos, axis: Axis) -> Result<bool, NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;

    let feet_in_portal = |world: &dyn WorldView| -> Result<bool, NavError> {
        let feet = world.position()?.block();
        Ok(world.block_at(feet).is_some_and(|b| b.is_portal()))
    };

    // Attempt 1: let the engine drive straight to the cell.
    let outcome = watch_goal(
        pilot.engine.as_ref(),
        world,
        cfg,
        &pilot.slot,
        entry.center(),
        WatchOptions::radius(cfg.goal_radius).with_timeout(Duration::from_secs(10)),
    )
    .await?;
    if outcome == GoalOutcome::Superseded {
        return Ok(false);
    }
    if feet_in_portal(world)? {
        return Ok(true);
    }

    // Forced walk-ins from the approach points.
    let points = approach_points(entry, axis, cfg.portal_forced_attempts);
    for (i, point) in points.iter().enumerate() {
        tracing::debug!(attempt = i + 1, %point, "forced walk-in");
        world.look_at(entry.center().offset(0.0, 0.5, 0.0)).await?;
        world.set_control(Control::Forward, true).await?;
        sleep(Duration::from_millis(cfg.walk_pulse_ms)).await;
        world.set_control(Control::Forward, false).await?;

        if feet_in_portal(world)? {
            return Ok(true);
        }
        // Re-position for the next angle.
        let reposition = watch_goal(
            pilot.engine.as_ref(),
            world,
            cfg,
            &pilot.slot,
            *point,
            WatchOptions::radius(cfg.goal_radius).with_timeout(Duration::from_secs(5)),
        )
        .await?;
        if reposition == GoalOutcome::Superseded {
            return Ok(false);
        }
        if feet_in_portal(world)? {
            return Ok(true);
        }
    }
    Ok(false)
}

enum TransitOutcome {
    Changed(guidance::Dimension),
    TimedOut,
}

/// Wait (bounded) for the externally-signaled dimension change.
async fn await_dimension_change(
    pilot: &Pilot,
    from: guidance::Dimension,
) -> Result<TransitOutcome, NavError> {
    let mut events = pilot.world.events();
    let wait = pilot.cfg.dimension_wait();
    tracing::info!(%from, wait_secs = wait.as_secs(), "awaiting dimension change");

    let result = timeout(wait, async {
        loop {
            match events.recv().await {
                Ok(WorldEvent::DimensionChanged(dim)) if dim != from => return Ok(dim),
                Ok(WorldEvent::Disconnected) => {
                    return Err(NavError::Disconnected("world connection dropped".into()))
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return Err(NavError::Disconnected("world event stream closed".into()))
                }
            }
        }
    })
    .await;

    match result {
        Ok(Ok(dim)) => Ok(TransitOutcome::Changed(dim)),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(TransitOutcome::TimedOut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_points_perpendicular_to_axis() {
        let entry = BlockPos::new(10, 64, 10);
        let points = approach_points(entry, Axis::X, 5);
        assert_eq!(points.len(), 5);
        // Plane along X → every offset is on Z, X stays fixed.
        for p in &points {
            assert!((p.x - entry.center().x).abs() < 1e-9);
        }
        let zs: Vec<f64> = points.iter().map(|p| p.z - entry.center().z).collect();
        assert_eq!(zs, vec![0.0, 1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_approach_points_axis_z() {
        let entry = BlockPos::new(0, 64, 0);
        let points = approach_points(entry, Axis::Z, 5);
        for p in &points {
            assert!((p.z - entry.center().z).abs() < 1e-9);
        }
    }

    #[test]
    fn test_approach_points_truncated_to_budget() {
        let points = approach_points(BlockPos::new(0, 64, 0), Axis::X, 3);
        assert_eq!(points.len(), 3);
    }
}
