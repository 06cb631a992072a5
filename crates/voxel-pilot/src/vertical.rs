//! Vertical construction — physics-timed jump-and-place and dig-and-rise
//! loops.
//!
//! Placement is fussy: the reference block beneath the feet must be
//! re-queried fresh on every attempt (stale references are the classic
//! cause of placements that silently miss), the jump apex has to be
//! caught before the agent starts falling, and each level is verified by
//! an actual rise before it counts.

use crate::controller::Pilot;
use crate::world::{equip_excavation_tool, Control, WorldView};
use guidance::world::{is_scaffold_candidate, scaffold_count};
use guidance::{BlockPos, Face, NavConfig, NavError, PillarReport, Position};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Build a scaffold pillar up to `height` blocks tall.
///
/// Terminates on: target height reached, scaffold exhausted, repeated
/// placement failure at one level, an unbreakable ceiling, or (in
/// `until_sky` mode) open sky overhead. Shortfalls come back as a
/// `PARTIAL` report with the cause.
pub(crate) async fn pillar_up(
    pilot: &Pilot,
    height: u32,
    until_sky: bool,
) -> Result<PillarReport, NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;

    let start = world.position()?;
    let initial_scaffold = scaffold_count(&world.inventory_items(), &cfg.scaffold_exclusions);
    tracing::info!(height, until_sky, scaffold = initial_scaffold, "pillar up starting");

    let mut placed: u32 = 0;
    let mut cause: Option<String> = None;

    while placed < height {
        if until_sky && sky_open(world, cfg)? {
            cause = Some("reached open sky".to_string());
            break;
        }

        if scaffold_count(&world.inventory_items(), &cfg.scaffold_exclusions) == 0 {
            cause = Some(if initial_scaffold == 0 {
                "No scaffolding blocks in inventory".to_string()
            } else {
                format!("Only had {initial_scaffold} blocks")
            });
            break;
        }

        let level_start = world.position()?;
        let feet = level_start.block();

        // Jump clearance: cells 2 and 3 above the feet must be open.
        if let Some(cell) = clear_overhead(world, feet).await? {
            cause = Some(format!("unbreakable ceiling at {cell}"));
            break;
        }

        // The reference must be solid footing, freshly queried.
        let reference = feet.down();
        if !world
            .block_at(reference)
            .is_some_and(|b| b.is_solid_ground())
        {
            wait_for_settle(world, cfg).await?;
            if !world
                .block_at(reference)
                .is_some_and(|b| b.is_solid_ground())
            {
                cause = Some(format!("no solid footing beneath {feet}"));
                break;
            }
        }

        let mut level_done = false;
        for attempt in 1..=cfg.pillar_attempts_per_level {
            if place_one_level(world, cfg, level_start, reference).await? {
                placed += 1;
                level_done = true;
                break;
            }
            tracing::debug!(level = placed + 1, attempt, "placement attempt missed");
        }

        if !level_done {
            cause = Some(format!(
                "placement failed {} times at level {}",
                cfg.pillar_attempts_per_level,
                placed + 1
            ));
            break;
        }
    }

    let final_y = world.position()?.y;
    tracing::info!(placed, requested = height, final_y, "pillar up finished");
    Ok(PillarReport {
        requested: height,
        placed,
        cause,
        final_y: final_y.max(start.y),
    })
}

/// Clear cells 2 and 3 above the feet. Returns the offending cell when
/// one of them is unbreakable (the pillar cannot continue past it).
async fn clear_overhead(
    world: &dyn WorldView,
    feet: BlockPos,
) -> Result<Option<BlockPos>, NavError> {
    for dy in [2, 3] {
        let cell = feet.offset(0, dy, 0);
        // Fresh query per cell; the previous excavation may have shifted
        // gravel into this one.
        if let Some(block) = world.block_at(cell) {
            if block.is_solid_ground() {
                if !block.diggable {
                    return Ok(Some(cell));
                }
                equip_excavation_tool(world).await?;
                world.excavate(cell).await?;
            }
        }
    }
    Ok(None)
}

/// One jump-and-place cycle. `Ok(true)` when the agent verifiably rose.
async fn place_one_level(
    world: &dyn WorldView,
    cfg: &NavConfig,
    level_start: Position,
    reference: BlockPos,
) -> Result<bool, NavError> {
    // Equip a scaffold block (checked by the caller, re-picked fresh here).
    let items = world.inventory_items();
    let Some(scaffold) = items
        .iter()
        .find(|i| is_scaffold_candidate(i, &cfg.scaffold_exclusions))
    else {
        return Ok(false);
    };
    world.equip(scaffold).await?;

    // Centering stance: look straight down so the placement lands on the
    // reference cell, then jump.
    world.look_at(level_start.offset(0.0, -1.0, 0.0)).await?;
    world.set_control(Control::Jump, true).await?;
    wait_for_apex(world, level_start.y, cfg).await?;

    let place_result = world.place_block(reference, Face::Up).await;
    world.set_control(Control::Jump, false).await?;
    if let Err(e) = place_result {
        tracing::debug!(error = %e, "placement rejected");
        return Ok(false);
    }

    sleep(Duration::from_millis(cfg.place_settle_ms)).await;
    let now = world.position()?;
    Ok(now.y - level_start.y >= cfg.pillar_min_rise)
}

/// Poll until the jump apex: the agent has risen most of a block and has
/// begun falling, or the elapsed-time cap is hit.
async fn wait_for_apex(
    world: &dyn WorldView,
    base_y: f64,
    cfg: &NavConfig,
) -> Result<(), NavError> {
    let deadline = Instant::now() + Duration::from_millis(cfg.jump_apex_ms);
    let mut prev_y = base_y;
    loop {
        sleep(Duration::from_millis(cfg.settle_poll_ms)).await;
        let y = world.position()?.y;
        if y - base_y > 0.9 && y < prev_y {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Ok(());
        }
        prev_y = y;
    }
}

/// Poll until vertical motion stops (an in-flight fall has landed).
async fn wait_for_settle(world: &dyn WorldView, cfg: &NavConfig) -> Result<(), NavError> {
    let deadline = Instant::now() + Duration::from_millis(cfg.settle_max_ms);
    let mut prev_y = world.position()?.y;
    let mut calm_polls = 0;
    while Instant::now() < deadline {
        sleep(Duration::from_millis(cfg.settle_poll_ms)).await;
        let y = world.position()?.y;
        if (y - prev_y).abs() < 0.01 {
            calm_polls += 1;
            if calm_polls >= 3 {
                return Ok(());
            }
        } else {
            calm_polls = 0;
        }
        prev_y = y;
    }
    Ok(())
}

/// Whether the cells directly overhead are open and lit like the sky.
fn sky_open(world: &dyn WorldView, cfg: &NavConfig) -> Result<bool, NavError> {
    let feet = world.position()?.block();
    let mut max_light = 0u8;
    for dy in [2, 3] {
        let cell = feet.offset(0, dy, 0);
        match world.block_at(cell) {
            // Outside the loaded column counts as open.
            None => max_light = max_light.max(15),
            Some(block) => {
                if !block.is_passable() {
                    return Ok(false);
                }
                max_light = max_light.max(block.light);
            }
        }
    }
    Ok(max_light >= cfg.sky_light_min)
}

/// Dig straight up toward the surface, at most `max_blocks` cells.
///
/// An explicit loop with a remaining-budget counter — a fall mid-shaft
/// waits for the agent to settle and continues with the budget reduced,
/// so the termination bound stays auditable.
pub(crate) async fn emergency_dig_up(pilot: &Pilot, max_blocks: u32) -> Result<String, NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;

    let start = world.position()?;
    let mut budget = max_blocks;
    tracing::info!(max_blocks, start_y = start.y, "emergency dig-up starting");

    while budget > 0 {
        let pos = world.position()?;
        let risen = (pos.y - start.y).max(0.0);

        // Surface heuristic: enough light overhead, or enough height
        // gained over the start.
        let overhead = pos.block().offset(0, 2, 0);
        let light = world.block_at(overhead).map(|b| b.light).unwrap_or(15);
        if light >= cfg.surface_light_min || risen as i32 >= cfg.surface_rise {
            return Ok(format!(
                "Surfaced after rising {:.0} blocks (light level {light}).",
                risen
            ));
        }

        // Clear the cell overhead.
        if let Some(block) = world.block_at(overhead) {
            if block.is_solid_ground() {
                if !block.diggable {
                    return Err(NavError::Unbreakable(overhead));
                }
                equip_excavation_tool(world).await?;
                world.excavate(overhead).await?;
            }
        }

        // Rise one level: jump, placing scaffold beneath when one exists.
        let level_y = pos.y;
        rise_one(world, cfg, pos).await?;

        let now = world.position()?;
        budget = budget.saturating_sub(1);

        if now.y < level_y - 1.0 {
            // Unexpected fall — let it land, then continue with whatever
            // budget the regained height leaves.
            tracing::warn!(from_y = level_y, to_y = now.y, "fell mid-shaft, settling");
            wait_for_settle(world, cfg).await?;
            let settled = world.position()?;
            let regained = (settled.y - start.y).max(0.0) as u32;
            budget = budget.min(max_blocks.saturating_sub(regained));
        }
    }

    let final_pos = world.position()?;
    Ok(format!(
        "Dig-up budget of {max_blocks} blocks exhausted; still enclosed at y={:.0}.",
        final_pos.y
    ))
}

/// Jump one level, backfilling beneath with scaffold when available.
async fn rise_one(world: &dyn WorldView, cfg: &NavConfig, pos: Position) -> Result<(), NavError> {
    let reference = pos.block().down();
    let scaffold = {
        let items = world.inventory_items();
        items
            .iter()
            .find(|i| is_scaffold_candidate(i, &cfg.scaffold_exclusions))
            .cloned()
    };

    if let Some(item) = &scaffold {
        world.equip(item).await?;
    }
    world.set_control(Control::Jump, true).await?;
    wait_for_apex(world, pos.y, cfg).await?;
    if scaffold.is_some() {
        if let Err(e) = world.place_block(reference, Face::Up).await {
            tracing::debug!(error = %e, "backfill placement rejected");
        }
    }
    world.set_control(Control::Jump, false).await?;
    sleep(Duration::from_millis(cfg.place_settle_ms)).await;
    Ok(())
}
