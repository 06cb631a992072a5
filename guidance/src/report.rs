//! Outcome reports rendered as human-readable strings.
//!
//! The consumer of every operation is an LLM-driven orchestration layer
//! reading free text, so the outward contract is prose, not codes. These
//! types keep the prose in one place and make it assertable.

use crate::geometry::Position;
use crate::recovery::RecoveryStrategy;
use crate::stall::StuckReason;
use serde::{Deserialize, Serialize};

/// Resolution of one `move_to` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveReport {
    pub target: Position,
    pub final_position: Position,
    pub remaining_distance: f64,
    pub succeeded: bool,
    /// The recovery strategy that saved the attempt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryStrategy>,
    /// Why the attempt stalled, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StuckReason>,
}

impl MoveReport {
    pub fn success(target: Position, final_position: Position) -> Self {
        Self {
            remaining_distance: final_position.distance_to(target),
            target,
            final_position,
            succeeded: true,
            recovery: None,
            reason: None,
        }
    }

    pub fn recovered(target: Position, final_position: Position, via: RecoveryStrategy) -> Self {
        Self {
            recovery: Some(via),
            ..Self::success(target, final_position)
        }
    }

    pub fn failure(target: Position, final_position: Position, reason: StuckReason) -> Self {
        Self {
            remaining_distance: final_position.distance_to(target),
            target,
            final_position,
            succeeded: false,
            recovery: None,
            reason: Some(reason),
        }
    }

    /// Render the outcome string handed back to the orchestration layer.
    pub fn render(&self) -> String {
        if self.succeeded {
            match self.recovery {
                Some(via) => format!(
                    "Reached {} after {} recovery.",
                    self.final_position,
                    via.marker()
                ),
                None => format!("Reached {}.", self.final_position),
            }
        } else {
            let reason = self
                .reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let hint = self
                .reason
                .map(|r| r.hint())
                .unwrap_or("No further strategies available.");
            format!(
                "Could not reach {}: stopped at {}, {:.1} blocks short ({reason}). {hint}",
                self.target, self.final_position, self.remaining_distance,
            )
        }
    }
}

/// Resolution of one `pillar_up` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarReport {
    pub requested: u32,
    pub placed: u32,
    /// Why the pillar fell short (or ended early in until-sky mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub final_y: f64,
}

impl PillarReport {
    pub fn shortfall(&self) -> u32 {
        self.requested.saturating_sub(self.placed)
    }

    pub fn render(&self) -> String {
        if self.placed >= self.requested {
            format!(
                "Pillared up {} blocks to y={:.0}.",
                self.placed, self.final_y
            )
        } else {
            let cause = self.cause.as_deref().unwrap_or("unknown cause");
            format!(
                "PARTIAL: placed {}/{} blocks (short {}) — {}. Now at y={:.0}.",
                self.placed,
                self.requested,
                self.shortfall(),
                cause,
                self.final_y,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: f64, y: f64, z: f64) -> Position {
        Position::new(x, y, z)
    }

    #[test]
    fn test_plain_success_message() {
        let r = MoveReport::success(pos(0.0, 70.0, 0.0), pos(0.3, 70.0, 0.2));
        let msg = r.render();
        assert!(msg.starts_with("Reached"));
        assert!(!msg.contains("recovery"));
    }

    #[test]
    fn test_recovered_success_carries_marker() {
        let r = MoveReport::recovered(
            pos(0.0, 70.0, 0.0),
            pos(0.5, 70.0, 0.5),
            RecoveryStrategy::PillarUp { height: 6 },
        );
        let msg = r.render();
        assert!(msg.contains("pillar_up recovery"));
        assert!(msg.contains("70.0"));
    }

    #[test]
    fn test_failure_message_carries_reason_and_hint() {
        let r = MoveReport::failure(
            pos(0.0, 70.0, 0.0),
            pos(0.0, 64.0, 0.0),
            StuckReason::TargetHigher,
        );
        let msg = r.render();
        assert!(msg.contains("target_higher"));
        assert!(msg.contains("gather scaffolding"));
        assert!(msg.contains("6.0 blocks short"));
        assert!(msg.contains("(0.0, 64.0, 0.0)"));
    }

    #[test]
    fn test_partial_pillar_report() {
        let r = PillarReport {
            requested: 5,
            placed: 3,
            cause: Some("Only had 3 blocks".to_string()),
            final_y: 67.0,
        };
        assert_eq!(r.shortfall(), 2);
        let msg = r.render();
        assert!(msg.contains("PARTIAL"));
        assert!(msg.contains("3/5"));
        assert!(msg.contains("Only had 3 blocks"));
    }

    #[test]
    fn test_full_pillar_report() {
        let r = PillarReport {
            requested: 4,
            placed: 4,
            cause: None,
            final_y: 68.0,
        };
        let msg = r.render();
        assert!(!msg.contains("PARTIAL"));
        assert!(msg.contains("4 blocks"));
    }

    #[test]
    fn test_report_serializes() {
        let r = MoveReport::failure(
            pos(0.0, 70.0, 0.0),
            pos(0.0, 64.0, 0.0),
            StuckReason::NoPath,
        );
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("no_path"));
    }
}
