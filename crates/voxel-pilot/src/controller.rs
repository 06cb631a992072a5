//! The move controller — `move_to` and the recovery ladder execution.
//!
//! `move_to` resolves a coordinate into a goal, runs the goal monitor and,
//! on stall, walks the planned recovery ladder: each rung performs its
//! world actions and retries the original goal once. Rung failures are
//! swallowed — the ladder simply advances — and only full exhaustion
//! (plus one last-resort excavation) surfaces a failure string.

use crate::engine::PathEngine;
use crate::monitor::{watch_goal, GoalOutcome, GoalSlot, WatchOptions};
use crate::threat::{NameThreats, ThreatClassifier};
use crate::world::{equip_excavation_tool, WorldView};
use crate::{portal, threat, tunnel, vertical};
use guidance::world::scaffold_count;
use guidance::{
    plan_recovery, AdvisoryLocks, AttemptState, BlockPos, Direction, MoveReport, MovementAttempt,
    NavConfig, NavError, PortalKind, Position, PositionLock, RecoveryContext, RecoveryStrategy,
    StuckReason, DETOUR_OFFSETS,
};
use std::sync::Arc;
use std::time::Duration;

const SUPERSEDED_MSG: &str = "Movement superseded by a newer goal.";

/// The navigation controller for one agent.
///
/// One pilot owns one [`GoalSlot`], so at most one goal monitor runs per
/// agent; a new operation supersedes the previous one.
pub struct Pilot {
    pub(crate) world: Arc<dyn WorldView>,
    pub(crate) engine: Arc<dyn PathEngine>,
    pub(crate) threats: Arc<dyn ThreatClassifier>,
    pub(crate) cfg: NavConfig,
    pub(crate) slot: GoalSlot,
    locks: AdvisoryLocks,
}

impl Pilot {
    pub fn new(world: Arc<dyn WorldView>, engine: Arc<dyn PathEngine>, cfg: NavConfig) -> Self {
        Self {
            world,
            engine,
            threats: Arc::new(NameThreats::default()),
            cfg,
            slot: GoalSlot::new(),
            locks: AdvisoryLocks::new(),
        }
    }

    /// Swap in a different hostility registry.
    pub fn with_threats(mut self, threats: Arc<dyn ThreatClassifier>) -> Self {
        self.threats = threats;
        self
    }

    pub fn config(&self) -> &NavConfig {
        &self.cfg
    }

    /// The advisory lock table shared with sibling agents on this world.
    pub fn locks(&self) -> &AdvisoryLocks {
        &self.locks
    }

    /// Reserve a shared position (a chest, a furnace) for `owner` with the
    /// configured TTL. Advisory only; `None` means someone else holds it.
    pub fn reserve(&self, pos: BlockPos, owner: &str) -> Option<PositionLock> {
        self.locks.try_acquire(pos, owner, self.cfg.lock_ttl())
    }

    // ── exposed operations ────────────────────────────────────────────

    /// Move to a coordinate, recovering from stalls along the way.
    pub async fn move_to(&self, x: f64, y: f64, z: f64) -> String {
        let target = Position::new(x, y, z);
        match self.run_move(target).await {
            Ok(msg) => msg,
            Err(e) if e.is_benign() => format!("Movement interrupted: {e}."),
            Err(e) => format!("Movement failed: {e}."),
        }
    }

    /// Build a scaffold pillar `height` blocks tall (or until open sky).
    pub async fn pillar_up(&self, height: u32, until_sky: bool) -> String {
        match vertical::pillar_up(self, height, until_sky).await {
            Ok(report) => report.render(),
            Err(e) if e.is_benign() => format!("Pillaring interrupted: {e}."),
            Err(e) => format!("Pillaring failed: {e}."),
        }
    }

    /// Dig straight up toward the surface, at most `max_blocks` cells.
    pub async fn emergency_dig_up(&self, max_blocks: u32) -> String {
        match vertical::emergency_dig_up(self, max_blocks).await {
            Ok(msg) => msg,
            Err(e) if e.is_benign() => format!("Dig-up interrupted: {e}."),
            Err(e) => format!("Dig-up failed: {e}."),
        }
    }

    /// Run from the nearest hostile (or in a random direction).
    pub async fn flee(&self, distance: f64) -> String {
        threat::flee(self, distance).await
    }

    /// Carve a 1×2 tunnel `length` cells in a cardinal direction.
    pub async fn dig_tunnel(&self, direction: Direction, length: u32) -> String {
        match tunnel::dig_tunnel(self, direction, length).await {
            Ok(msg) => msg,
            Err(e) if e.is_benign() => format!("Tunneling interrupted: {e}."),
            Err(e) => format!("Tunneling failed: {e}."),
        }
    }

    /// Locate, approach and enter a portal, then wait out the transit.
    pub async fn enter_portal(&self, kind: Option<PortalKind>) -> String {
        match portal::enter_portal(self, kind).await {
            Ok(msg) => msg,
            Err(e) if e.is_benign() => format!("Portal entry interrupted: {e}."),
            Err(e) => format!("Portal entry failed: {e}."),
        }
    }

    // ── move_to internals ─────────────────────────────────────────────

    async fn run_move(&self, target: Position) -> Result<String, NavError> {
        let target_cell = target.block();

        // Pre-check: a portal target means the caller wants transit, not
        // a walk onto the frame.
        if let Some(block) = self.world.block_at(target_cell) {
            if let Some(kind) = PortalKind::from_block_name(&block.name) {
                let home = match kind {
                    PortalKind::Nether => guidance::Dimension::Nether,
                    PortalKind::End => guidance::Dimension::End,
                };
                if self.world.dimension() != home {
                    tracing::info!(%target, portal = %kind, "target is a portal, delegating to handshake");
                    return portal::enter_portal(self, Some(kind)).await;
                }
            }
        }

        // Pre-check: a risky big descent is logged, never blocked — the
        // engine's own excavation/tower capability may handle it.
        let start = self.world.position()?;
        let descent = start.y - target.y;
        if descent > self.cfg.descent_warning {
            let landing_solid = self
                .world
                .block_at(target_cell.down())
                .is_some_and(|b| b.is_solid_ground());
            if landing_solid {
                tracing::warn!(%target, descent, "large descent onto solid ground — proceeding anyway");
            }
        }

        let mut attempt = MovementAttempt::new();
        attempt.advance(AttemptState::Active, None).ok();

        // Pre-check: a solid target cell cannot be stood in — retarget to
        // the nearest reachable standable neighbor first.
        if self
            .world
            .block_at(target_cell)
            .is_some_and(|b| !b.is_passable())
        {
            match self.retarget_near_solid(target).await? {
                RetargetOutcome::Reached(pos) => {
                    attempt.advance(AttemptState::Succeeded, Some("retargeted")).ok();
                    tracing::debug!("{}", attempt.summary());
                    return Ok(format!(
                        "Target cell is solid; reached the nearest open spot {pos}."
                    ));
                }
                RetargetOutcome::Superseded => return Ok(SUPERSEDED_MSG.to_string()),
                // Fall through: the engine may still excavate its way in.
                RetargetOutcome::NoneReachable => {}
            }
        }

        let outcome = watch_goal(
            self.engine.as_ref(),
            self.world.as_ref(),
            &self.cfg,
            &self.slot,
            target,
            WatchOptions::radius(self.cfg.goal_radius),
        )
        .await?;

        match outcome {
            GoalOutcome::Reached => {
                attempt.advance(AttemptState::Succeeded, None).ok();
                tracing::debug!("{}", attempt.summary());
                let pos = self.world.position()?;
                Ok(MoveReport::success(target, pos).render())
            }
            GoalOutcome::Superseded => Ok(SUPERSEDED_MSG.to_string()),
            GoalOutcome::Stuck(reason) => {
                attempt.mark_stuck(reason).ok();
                let msg = self.recover(&mut attempt, target, reason).await?;
                tracing::debug!("{}", attempt.summary());
                Ok(msg)
            }
        }
    }

    /// Walk the recovery ladder, then the last-resort excavation.
    async fn recover(
        &self,
        attempt: &mut MovementAttempt,
        target: Position,
        reason: StuckReason,
    ) -> Result<String, NavError> {
        let pos = self.world.position()?;
        let ctx = RecoveryContext {
            reason,
            vertical_deficit: target.y - pos.y,
            scaffold_blocks: scaffold_count(
                &self.world.inventory_items(),
                &self.cfg.scaffold_exclusions,
            ),
        };
        let ladder = plan_recovery(&ctx, self.cfg.max_pillar_height);
        tracing::info!(
            %reason,
            rungs = ladder.len(),
            deficit = ctx.vertical_deficit,
            scaffold = ctx.scaffold_blocks,
            "entering recovery ladder"
        );

        if !ladder.is_empty() {
            attempt.advance(AttemptState::Recovering, None).ok();
        }

        for strategy in ladder {
            let acted = match self.apply_strategy(strategy, target).await {
                Ok(acted) => acted,
                Err(e) if matches!(e, NavError::Disconnected(_)) => return Err(e),
                Err(e) => {
                    // A failed rung is not a failed move — advance the ladder.
                    tracing::warn!(strategy = %strategy, error = %e, "recovery rung failed");
                    false
                }
            };
            if !acted {
                continue;
            }

            match watch_goal(
                self.engine.as_ref(),
                self.world.as_ref(),
                &self.cfg,
                &self.slot,
                target,
                WatchOptions::radius(self.cfg.goal_radius),
            )
            .await?
            {
                GoalOutcome::Reached => {
                    attempt.advance(AttemptState::Succeeded, Some(strategy.marker())).ok();
                    let pos = self.world.position()?;
                    return Ok(MoveReport::recovered(target, pos, strategy).render());
                }
                GoalOutcome::Superseded => return Ok(SUPERSEDED_MSG.to_string()),
                GoalOutcome::Stuck(retry_reason) => {
                    tracing::info!(strategy = %strategy, %retry_reason, "retry after recovery still stuck");
                }
            }
        }

        // Last resort: carve the first obstruction on the straight line
        // and try once more.
        if attempt.state() == AttemptState::Stuck {
            attempt
                .advance(AttemptState::Recovering, Some("last-resort only"))
                .ok();
        }
        if self.excavate_toward(target, true).await.unwrap_or(false) {
            if let GoalOutcome::Reached = watch_goal(
                self.engine.as_ref(),
                self.world.as_ref(),
                &self.cfg,
                &self.slot,
                target,
                WatchOptions::radius(self.cfg.goal_radius),
            )
            .await?
            {
                attempt
                    .advance(AttemptState::Succeeded, Some("last-resort excavation"))
                    .ok();
                let pos = self.world.position()?;
                return Ok(format!("Reached {pos} after clearing obstructions."));
            }
        }

        attempt
            .advance(AttemptState::Failed, Some("recovery exhausted"))
            .ok();
        let final_pos = self.world.position()?;
        Ok(MoveReport::failure(target, final_pos, reason).render())
    }

    /// Perform one rung's world actions. `Ok(true)` means the rung acted
    /// and the original goal deserves a retry.
    async fn apply_strategy(
        &self,
        strategy: RecoveryStrategy,
        target: Position,
    ) -> Result<bool, NavError> {
        match strategy {
            RecoveryStrategy::PillarUp { height } => {
                let report = vertical::pillar_up(self, height, false).await?;
                tracing::info!(placed = report.placed, requested = height, "pillar rung finished");
                Ok(report.placed > 0)
            }
            RecoveryStrategy::DigThrough => self.excavate_toward(target, false).await,
            RecoveryStrategy::RandomOffsetDetour => self.detour(target).await,
        }
    }

    /// Probe the straight line toward `target` and excavate the first
    /// solid, non-liquid block. `head_clearance` always clears the cell
    /// above; otherwise only horizontal obstacles get that treatment.
    async fn excavate_toward(
        &self,
        target: Position,
        head_clearance: bool,
    ) -> Result<bool, NavError> {
        let pos = self.world.position()?;
        let feet = pos.block();
        let delta = (target.x - pos.x, target.y - pos.y, target.z - pos.z);
        let len = (delta.0 * delta.0 + delta.1 * delta.1 + delta.2 * delta.2).sqrt();
        if len < 1e-9 {
            return Ok(false);
        }
        let dir = (delta.0 / len, delta.1 / len, delta.2 / len);

        for step in 1..=self.cfg.dig_probe_range {
            let probe = pos.offset(
                dir.0 * step as f64,
                dir.1 * step as f64,
                dir.2 * step as f64,
            );
            let cell = probe.block();
            // Fresh query per probe; the path engine digs concurrently.
            let Some(block) = self.world.block_at(cell) else {
                continue;
            };
            if block.is_air() || block.liquid {
                continue;
            }
            if !block.diggable {
                return Err(NavError::Unbreakable(cell));
            }

            tracing::info!(%cell, name = %block.name, "excavating obstruction");
            equip_excavation_tool(self.world.as_ref()).await?;
            self.world.excavate(cell).await?;

            let horizontal = cell.y == feet.y;
            if head_clearance || horizontal {
                let above = cell.up();
                if let Some(b) = self.world.block_at(above) {
                    if b.is_solid_ground() && b.diggable {
                        self.world.excavate(above).await?;
                    }
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Try the fixed detour offsets; `Ok(true)` once one is reached.
    async fn detour(&self, _target: Position) -> Result<bool, NavError> {
        let pos = self.world.position()?;
        for (dx, dz) in DETOUR_OFFSETS {
            let candidate = pos.offset(dx as f64, 0.0, dz as f64);
            let outcome = watch_goal(
                self.engine.as_ref(),
                self.world.as_ref(),
                &self.cfg,
                &self.slot,
                candidate,
                WatchOptions::radius(self.cfg.goal_radius)
                    .with_timeout(Duration::from_secs(self.cfg.detour_timeout_secs)),
            )
            .await?;
            match outcome {
                GoalOutcome::Reached => {
                    tracing::debug!(dx, dz, "detour offset reached");
                    return Ok(true);
                }
                GoalOutcome::Superseded => return Ok(false),
                GoalOutcome::Stuck(_) => continue,
            }
        }
        Ok(false)
    }

    /// Search the neighborhood of a solid target for standable cells and
    /// try to reach the closest ones.
    async fn retarget_near_solid(&self, target: Position) -> Result<RetargetOutcome, NavError> {
        let center = target.block();
        let r = self.cfg.retarget_radius;
        let mut candidates: Vec<BlockPos> = Vec::new();

        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let cell = center.offset(dx, dy, dz);
                    let standable = self.world.block_at(cell).is_some_and(|b| b.is_passable())
                        && self
                            .world
                            .block_at(cell.up())
                            .is_some_and(|b| b.is_passable())
                        && self
                            .world
                            .block_at(cell.down())
                            .is_some_and(|b| b.is_solid_ground());
                    if standable {
                        candidates.push(cell);
                    }
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.distance_to(center)
                .partial_cmp(&b.distance_to(center))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            count = candidates.len(),
            "solid target — trying standable neighbors"
        );

        for cell in candidates.into_iter().take(self.cfg.retarget_candidates) {
            let outcome = watch_goal(
                self.engine.as_ref(),
                self.world.as_ref(),
                &self.cfg,
                &self.slot,
                cell.center(),
                WatchOptions::radius(self.cfg.goal_radius),
            )
            .await?;
            match outcome {
                GoalOutcome::Reached => {
                    let pos = self.world.position()?;
                    return Ok(RetargetOutcome::Reached(pos));
                }
                GoalOutcome::Superseded => return Ok(RetargetOutcome::Superseded),
                GoalOutcome::Stuck(_) => continue,
            }
        }
        Ok(RetargetOutcome::NoneReachable)
    }
}

enum RetargetOutcome {
    Reached(Position),
    Superseded,
    NoneReachable,
}
