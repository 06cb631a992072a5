//! The goal monitor — drive the path engine toward one goal and resolve
//! exactly once.
//!
//! One periodic progress tick races against the engine's lifecycle
//! events, a hard deadline and the supersede token; whichever fires first
//! wins, and the loop returns. Teardown (clear the goal, drop the event
//! receivers, stop the ticker) runs on every exit path: the receivers and
//! ticker die with the future, and a drop guard clears the goal.
//!
//! At most one monitor runs per agent. Starting a new one cancels the
//! predecessor through the [`GoalSlot`] and waits for its teardown to
//! finish before touching the engine.

use crate::engine::{Goal, PathEngine, PathEvent};
use crate::world::{WorldEvent, WorldView};
use guidance::stall::TickVerdict;
use guidance::{NavConfig, NavError, Position, ProgressTracker, StuckReason};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// How one monitor run resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOutcome {
    /// The success predicate held.
    Reached,
    /// Stall declared; carries the classified reason.
    Stuck(StuckReason),
    /// A newer goal took over this agent.
    Superseded,
}

/// Caller-supplied success predicate: receives the fresh position and
/// whether the engine reports it is still moving.
pub type SuccessFn = Box<dyn Fn(Position, bool) -> bool + Send + Sync>;

/// Options for one monitor run.
pub struct WatchOptions {
    pub radius: f64,
    /// Hard ceiling; defaults to `max(floor, secs_per_block × distance)`.
    pub timeout: Option<Duration>,
    /// Replaces the default distance-based success check.
    pub success: Option<SuccessFn>,
}

impl WatchOptions {
    pub fn radius(radius: f64) -> Self {
        Self {
            radius,
            timeout: None,
            success: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_success(mut self, success: SuccessFn) -> Self {
        self.success = Some(success);
        self
    }
}

/// Serializes monitor runs for one agent and lets a newcomer cancel its
/// predecessor.
#[derive(Default)]
pub struct GoalSlot {
    current: std::sync::Mutex<Option<CancellationToken>>,
    gate: tokio::sync::Mutex<()>,
}

impl GoalSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the predecessor (if any) and register a fresh token.
    fn begin(&self) -> CancellationToken {
        let mut current = self.current.lock().expect("goal slot poisoned");
        if let Some(old) = current.take() {
            old.cancel();
        }
        let token = CancellationToken::new();
        *current = Some(token.clone());
        token
    }
}

/// Clears the engine goal on drop — the monitor's half of teardown.
struct ClearGoal<'a> {
    engine: &'a dyn PathEngine,
}

impl Drop for ClearGoal<'_> {
    fn drop(&mut self) {
        self.engine.set_goal(None);
    }
}

/// Drive the engine toward `target` and resolve exactly once.
pub async fn watch_goal(
    engine: &dyn PathEngine,
    world: &dyn WorldView,
    cfg: &NavConfig,
    slot: &GoalSlot,
    target: Position,
    opts: WatchOptions,
) -> Result<GoalOutcome, NavError> {
    let start = world.position()?;
    let initial_distance = start.distance_to(target);

    // Already there: resolve without disturbing the engine at all.
    if opts.success.is_none() && initial_distance < opts.radius {
        return Ok(GoalOutcome::Reached);
    }

    let token = slot.begin();
    // Wait for the predecessor's teardown before touching the engine.
    let _permit = slot.gate.lock().await;
    if token.is_cancelled() {
        return Ok(GoalOutcome::Superseded);
    }

    // Subscribe before setting the goal so no lifecycle event is missed.
    let mut events = engine.subscribe();
    let mut world_events = world.events();

    engine.set_goal(Some(Goal::new(target, opts.radius)));
    let _clear = ClearGoal { engine };

    let timeout = opts
        .timeout
        .unwrap_or_else(|| cfg.timeout_for(initial_distance));
    let deadline = Instant::now() + timeout;

    tracing::debug!(
        %target,
        radius = opts.radius,
        distance = initial_distance,
        timeout_secs = timeout.as_secs_f64(),
        "goal monitor started"
    );

    let mut tracker = ProgressTracker::new(cfg);
    let mut stop_confirm: u32 = 0;
    let mut ticker = interval(cfg.tick_interval());

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(%target, "goal superseded");
                return Ok(GoalOutcome::Superseded);
            }

            _ = sleep_until(deadline) => {
                let pos = world.position()?;
                if pos.distance_to(target) < opts.radius {
                    return Ok(GoalOutcome::Reached);
                }
                tracing::warn!(%target, elapsed_secs = timeout.as_secs_f64(), "goal timed out");
                return Ok(GoalOutcome::Stuck(StuckReason::Timeout));
            }

            event = events.recv() => match event {
                Ok(PathEvent::GoalReached) => {
                    tracing::debug!(%target, "engine reports goal reached");
                    return Ok(GoalOutcome::Reached);
                }
                Ok(PathEvent::PathReset) => {
                    let pos = world.position()?;
                    if let Some(reason) = tracker.observe_path_reset(pos) {
                        tracing::info!(%target, "repeated path resets without progress");
                        return Ok(GoalOutcome::Stuck(reason));
                    }
                }
                Ok(PathEvent::GoalReplaced) => {
                    tracing::debug!(%target, "goal replaced externally");
                    return Ok(GoalOutcome::Superseded);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::trace!(missed, "lifecycle events lagged");
                }
                Err(RecvError::Closed) => {
                    return Err(NavError::Disconnected("path engine event stream closed".into()));
                }
            },

            event = world_events.recv() => match event {
                Ok(WorldEvent::Disconnected) => {
                    return Err(NavError::Disconnected("world connection dropped".into()));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    return Err(NavError::Disconnected("world event stream closed".into()));
                }
            },

            _ = ticker.tick() => {
                let pos = world.position()?;
                let moving = engine.is_moving();
                let excavating = engine.is_excavating();
                let distance = pos.distance_to(target);

                let reached = match &opts.success {
                    Some(pred) => pred(pos, moving),
                    None => distance < opts.radius,
                };
                if reached {
                    return Ok(GoalOutcome::Reached);
                }

                if let TickVerdict::Stalled(reason) = tracker.observe_tick(pos, target, excavating) {
                    tracing::info!(%target, %reason, %pos, "stall declared");
                    return Ok(GoalOutcome::Stuck(reason));
                }

                // The engine giving up shows up as "not moving, not
                // excavating, distance left" — confirmed over a short
                // window to ride out re-planning gaps.
                if !moving && !excavating && distance > opts.radius {
                    stop_confirm += 1;
                    if stop_confirm >= cfg.stop_confirm_ticks {
                        tracing::info!(%target, distance, "path engine stopped short");
                        return Ok(GoalOutcome::Stuck(StuckReason::PathfinderStopped));
                    }
                } else {
                    stop_confirm = 0;
                }
            }
        }
    }
}
