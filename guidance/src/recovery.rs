//! The recovery ladder — ordered fallback strategies after a stall.
//!
//! Planning is pure: given the stuck reason and what the agent has to work
//! with, produce the ordered list of applicable strategies. The pilot walks
//! the list, performs each strategy's world actions, and stops at the first
//! one whose retried move succeeds. Order is fixed and never revisited:
//! `pillar_up` → `dig_through` → `random_offset_detour`.

use crate::stall::StuckReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One rung of the recovery ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Build a scaffold pillar to close a vertical deficit.
    PillarUp { height: u32 },
    /// Excavate the first solid block on the line toward the target.
    DigThrough,
    /// Walk to a fixed nearby offset, then retry the original goal.
    RandomOffsetDetour,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PillarUp { height } => write!(f, "pillar_up({height})"),
            Self::DigThrough => write!(f, "dig_through"),
            Self::RandomOffsetDetour => write!(f, "random_offset_detour"),
        }
    }
}

impl RecoveryStrategy {
    /// Short marker used in outcome messages.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::PillarUp { .. } => "pillar_up",
            Self::DigThrough => "dig_through",
            Self::RandomOffsetDetour => "random_offset_detour",
        }
    }
}

/// What the planner knows at the moment a stall is declared.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryContext {
    pub reason: StuckReason,
    /// How far above the agent the target sits (positive = above).
    pub vertical_deficit: f64,
    /// Aggregate scaffold blocks in the inventory.
    pub scaffold_blocks: u32,
}

/// Fixed detour offsets `(dx, dz)` — cardinals at magnitude 2 plus the
/// four diagonals, tried in this order.
pub const DETOUR_OFFSETS: [(i32, i32); 8] = [
    (2, 0),
    (-2, 0),
    (0, 2),
    (0, -2),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Produce the ordered list of applicable strategies for one stall.
///
/// Each strategy appears at most once; the detour is always the last
/// resort. Returns an empty ladder only for `Timeout`, which is terminal
/// by definition.
pub fn plan_recovery(ctx: &RecoveryContext, max_pillar_height: u32) -> Vec<RecoveryStrategy> {
    if ctx.reason == StuckReason::Timeout {
        return Vec::new();
    }

    let mut ladder = Vec::with_capacity(3);

    if ctx.reason == StuckReason::TargetHigher
        && ctx.vertical_deficit > 0.0
        && ctx.scaffold_blocks > 0
    {
        let height = (ctx.vertical_deficit.ceil() as u32).min(max_pillar_height.max(1));
        ladder.push(RecoveryStrategy::PillarUp { height });
    }

    // The real applicability test for dig_through is the execution-time
    // probe: a solid obstruction on the line toward the target. The rung
    // fails fast when the probe finds only air.
    ladder.push(RecoveryStrategy::DigThrough);
    ladder.push(RecoveryStrategy::RandomOffsetDetour);
    ladder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_higher_with_scaffold_gets_pillar_first() {
        let ladder = plan_recovery(
            &RecoveryContext {
                reason: StuckReason::TargetHigher,
                vertical_deficit: 6.0,
                scaffold_blocks: 40,
            },
            5,
        );
        assert_eq!(
            ladder,
            vec![
                RecoveryStrategy::PillarUp { height: 5 },
                RecoveryStrategy::DigThrough,
                RecoveryStrategy::RandomOffsetDetour,
            ]
        );
    }

    #[test]
    fn test_pillar_height_is_ceil_of_deficit_capped() {
        let ladder = plan_recovery(
            &RecoveryContext {
                reason: StuckReason::TargetHigher,
                vertical_deficit: 3.2,
                scaffold_blocks: 10,
            },
            5,
        );
        assert_eq!(ladder[0], RecoveryStrategy::PillarUp { height: 4 });
    }

    #[test]
    fn test_no_scaffold_skips_pillar() {
        let ladder = plan_recovery(
            &RecoveryContext {
                reason: StuckReason::TargetHigher,
                vertical_deficit: 6.0,
                scaffold_blocks: 0,
            },
            5,
        );
        assert_eq!(
            ladder,
            vec![
                RecoveryStrategy::DigThrough,
                RecoveryStrategy::RandomOffsetDetour,
            ]
        );
    }

    #[test]
    fn test_obstacle_gets_dig_then_detour() {
        for reason in [StuckReason::Obstacle, StuckReason::PathfinderStopped] {
            let ladder = plan_recovery(
                &RecoveryContext {
                    reason,
                    vertical_deficit: 0.5,
                    scaffold_blocks: 12,
                },
                5,
            );
            assert_eq!(
                ladder,
                vec![
                    RecoveryStrategy::DigThrough,
                    RecoveryStrategy::RandomOffsetDetour,
                ]
            );
        }
    }

    #[test]
    fn test_detour_is_always_last_and_always_present() {
        for reason in [
            StuckReason::TargetHigher,
            StuckReason::TargetLower,
            StuckReason::Obstacle,
            StuckReason::PathfinderStopped,
            StuckReason::NoPath,
        ] {
            let ladder = plan_recovery(
                &RecoveryContext {
                    reason,
                    vertical_deficit: 3.0,
                    scaffold_blocks: 4,
                },
                5,
            );
            assert_eq!(ladder.last(), Some(&RecoveryStrategy::RandomOffsetDetour));
        }
    }

    #[test]
    fn test_timeout_has_no_ladder() {
        let ladder = plan_recovery(
            &RecoveryContext {
                reason: StuckReason::Timeout,
                vertical_deficit: 3.0,
                scaffold_blocks: 4,
            },
            5,
        );
        assert!(ladder.is_empty());
    }

    #[test]
    fn test_detour_offsets_are_fixed_and_bounded() {
        assert_eq!(DETOUR_OFFSETS.len(), 8);
        for (dx, dz) in DETOUR_OFFSETS {
            let mag = ((dx * dx + dz * dz) as f64).sqrt();
            assert!((1.0..=2.0).contains(&mag), "offset magnitude out of range");
        }
    }
}
