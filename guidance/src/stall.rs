//! Stall detection and stuck-cause classification.
//!
//! The goal monitor feeds one observation per tick into a
//! [`ProgressTracker`]; the tracker owns every counter the stall rules
//! need — consecutive no-progress ticks, the excavation-suppression
//! window, and the run of path resets without spatial progress. It never
//! reads the clock: the monitor's ticker is the clock.

use crate::config::NavConfig;
use crate::geometry::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an attempt was declared stuck. Assigned exactly once per attempt,
/// at the moment stall is declared, and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckReason {
    /// Target is more than the vertical split above the agent.
    TargetHigher,
    /// Target is more than the vertical split below the agent.
    TargetLower,
    /// No progress at roughly the same height — something is in the way.
    Obstacle,
    /// The path engine stopped moving with distance still to cover.
    PathfinderStopped,
    /// Repeated path recalculations with no spatial progress between them.
    NoPath,
    /// Hard wall-clock ceiling reached.
    Timeout,
}

impl StuckReason {
    /// Reason-specific advice appended to failure messages.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::TargetHigher => {
                "The target is above; gather scaffolding blocks (cobblestone, dirt) to climb."
            }
            Self::TargetLower => "The target is below; dig down or carve a staircase.",
            Self::NoPath => "No route exists; consider tunneling or approaching from another side.",
            _ => "Something is blocking the way; clearing blocks or a detour may help.",
        }
    }
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetHigher => write!(f, "target_higher"),
            Self::TargetLower => write!(f, "target_lower"),
            Self::Obstacle => write!(f, "obstacle"),
            Self::PathfinderStopped => write!(f, "pathfinder_stopped"),
            Self::NoPath => write!(f, "no_path"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Classify a stall from the vertical delta between agent and target.
pub fn classify_stall(current: Position, target: Position, vertical_split: f64) -> StuckReason {
    let dy = target.y - current.y;
    if dy > vertical_split {
        StuckReason::TargetHigher
    } else if dy < -vertical_split {
        StuckReason::TargetLower
    } else {
        StuckReason::Obstacle
    }
}

/// Verdict for a single monitoring tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickVerdict {
    /// The agent moved since the last tick.
    Progressing,
    /// No movement this tick; carries the consecutive count so far.
    NoProgress { consecutive: u32 },
    /// The no-progress run crossed the threshold.
    Stalled(StuckReason),
}

/// Per-attempt progress bookkeeping.
///
/// One tracker per goal-monitor run; destroyed with it.
#[derive(Debug)]
pub struct ProgressTracker {
    epsilon: f64,
    stall_ticks: u32,
    excavation_grace_ticks: u32,
    vertical_split: f64,
    path_reset_run: u32,
    reset_progress_epsilon: f64,

    no_progress: u32,
    suppressed: u32,
    resets_without_progress: u32,
    last_pos: Option<Position>,
    last_reset_pos: Option<Position>,
}

impl ProgressTracker {
    pub fn new(cfg: &NavConfig) -> Self {
        Self {
            epsilon: cfg.stall_epsilon,
            stall_ticks: cfg.stall_ticks,
            excavation_grace_ticks: cfg.excavation_grace_ticks,
            vertical_split: cfg.vertical_split,
            path_reset_run: cfg.path_reset_run,
            reset_progress_epsilon: cfg.reset_progress_epsilon,
            no_progress: 0,
            suppressed: 0,
            resets_without_progress: 0,
            last_pos: None,
            last_reset_pos: None,
        }
    }

    /// Feed one periodic tick. `excavating` is the path engine's
    /// dig-in-progress flag; while set, the no-progress counter is frozen
    /// rather than advanced — up to `excavation_grace_ticks` in a row,
    /// after which a never-ending dig stops masking the stall.
    pub fn observe_tick(
        &mut self,
        pos: Position,
        target: Position,
        excavating: bool,
    ) -> TickVerdict {
        let moved = match self.last_pos {
            Some(prev) => prev.distance_to(pos),
            None => f64::MAX,
        };
        self.last_pos = Some(pos);

        if moved >= self.epsilon {
            self.no_progress = 0;
            self.suppressed = 0;
            return TickVerdict::Progressing;
        }

        if excavating && self.suppressed < self.excavation_grace_ticks {
            self.suppressed += 1;
            return TickVerdict::NoProgress {
                consecutive: self.no_progress,
            };
        }

        self.no_progress += 1;
        if self.no_progress >= self.stall_ticks {
            TickVerdict::Stalled(classify_stall(pos, target, self.vertical_split))
        } else {
            TickVerdict::NoProgress {
                consecutive: self.no_progress,
            }
        }
    }

    /// Feed a "path invalidated / recalculated" lifecycle signal. These are
    /// routine while the engine excavates; only a run of them with no
    /// spatial progress in between resolves to `NoPath`.
    pub fn observe_path_reset(&mut self, pos: Position) -> Option<StuckReason> {
        let moved = match self.last_reset_pos {
            Some(prev) => prev.distance_to(pos),
            None => f64::MAX,
        };
        self.last_reset_pos = Some(pos);

        if moved < self.reset_progress_epsilon {
            self.resets_without_progress += 1;
        } else {
            self.resets_without_progress = 1;
        }

        if self.resets_without_progress >= self.path_reset_run {
            Some(StuckReason::NoPath)
        } else {
            None
        }
    }

    /// Consecutive no-progress ticks so far.
    pub fn no_progress_ticks(&self) -> u32 {
        self.no_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> NavConfig {
        NavConfig::default()
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(&cfg())
    }

    const TARGET: Position = Position {
        x: 0.0,
        y: 64.0,
        z: 10.0,
    };

    #[test]
    fn test_movement_resets_counter() {
        let mut t = tracker();
        let mut pos = Position::new(0.0, 64.0, 0.0);
        assert_eq!(t.observe_tick(pos, TARGET, false), TickVerdict::Progressing);

        // Two stationary ticks, then movement again.
        t.observe_tick(pos, TARGET, false);
        t.observe_tick(pos, TARGET, false);
        assert_eq!(t.no_progress_ticks(), 2);

        pos = pos.offset(0.0, 0.0, 0.3);
        assert_eq!(t.observe_tick(pos, TARGET, false), TickVerdict::Progressing);
        assert_eq!(t.no_progress_ticks(), 0);
    }

    #[test]
    fn test_stall_after_exact_threshold() {
        let c = cfg();
        let mut t = ProgressTracker::new(&c);
        let pos = Position::new(0.0, 64.0, 0.0);
        t.observe_tick(pos, TARGET, false); // first sighting — progressing

        for i in 1..c.stall_ticks {
            match t.observe_tick(pos, TARGET, false) {
                TickVerdict::NoProgress { consecutive } => assert_eq!(consecutive, i),
                v => panic!("unexpected verdict before threshold: {v:?}"),
            }
        }
        assert_eq!(
            t.observe_tick(pos, TARGET, false),
            TickVerdict::Stalled(StuckReason::Obstacle)
        );
    }

    #[test]
    fn test_excavation_suppresses_stall() {
        let c = cfg();
        let mut t = ProgressTracker::new(&c);
        let pos = Position::new(0.0, 64.0, 0.0);
        t.observe_tick(pos, TARGET, false);

        // Far more stationary ticks than the threshold, all excavating.
        for _ in 0..c.stall_ticks * 3 {
            let v = t.observe_tick(pos, TARGET, true);
            assert!(!matches!(v, TickVerdict::Stalled(_)));
        }
        assert_eq!(t.no_progress_ticks(), 0);
    }

    #[test]
    fn test_excavation_grace_is_bounded() {
        let mut c = cfg();
        c.excavation_grace_ticks = 5;
        let mut t = ProgressTracker::new(&c);
        let pos = Position::new(0.0, 64.0, 0.0);
        t.observe_tick(pos, TARGET, false);

        let mut stalled = false;
        for _ in 0..c.excavation_grace_ticks + c.stall_ticks {
            if let TickVerdict::Stalled(_) = t.observe_tick(pos, TARGET, true) {
                stalled = true;
                break;
            }
        }
        assert!(stalled, "endless excavation must stop masking the stall");
    }

    #[test]
    fn test_classification_by_vertical_delta() {
        let split = cfg().vertical_split;
        let pos = Position::new(0.0, 64.0, 0.0);
        assert_eq!(
            classify_stall(pos, Position::new(0.0, 70.0, 0.0), split),
            StuckReason::TargetHigher
        );
        assert_eq!(
            classify_stall(pos, Position::new(0.0, 55.0, 0.0), split),
            StuckReason::TargetLower
        );
        assert_eq!(
            classify_stall(pos, Position::new(8.0, 65.0, 0.0), split),
            StuckReason::Obstacle
        );
    }

    #[test]
    fn test_path_reset_run_without_progress() {
        let c = cfg();
        let mut t = ProgressTracker::new(&c);
        let pos = Position::new(0.0, 64.0, 0.0);

        for _ in 0..c.path_reset_run - 1 {
            assert_eq!(t.observe_path_reset(pos), None);
        }
        assert_eq!(t.observe_path_reset(pos), Some(StuckReason::NoPath));
    }

    #[test]
    fn test_path_reset_with_progress_is_routine() {
        let c = cfg();
        let mut t = ProgressTracker::new(&c);
        let mut pos = Position::new(0.0, 64.0, 0.0);

        // The engine recalculates constantly while excavating forward;
        // as long as the agent covers ground between resets, never NoPath.
        for _ in 0..c.path_reset_run * 4 {
            assert_eq!(t.observe_path_reset(pos), None);
            pos = pos.offset(0.0, 0.0, 1.0);
        }
    }

    #[test]
    fn test_stuck_reason_display_and_hints() {
        assert_eq!(StuckReason::TargetHigher.to_string(), "target_higher");
        assert_eq!(StuckReason::PathfinderStopped.to_string(), "pathfinder_stopped");
        assert!(StuckReason::TargetHigher.hint().contains("gather"));
        assert!(StuckReason::TargetLower.hint().contains("dig"));
    }
}
