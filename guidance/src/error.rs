//! Navigation error taxonomy with benign/fatal classification.
//!
//! Callers never string-match: whether a failure should degrade the
//! operation to an "interrupted" outcome (instead of propagating) is
//! queryable on the error itself.
//!
//! | Variant            | Benign | Notes |
//! |--------------------|--------|-------|
//! | EntityVanished     | yes    | flee/attack target disappeared mid-op |
//! | Disconnected       | yes    | world read failed mid-op |
//! | Unbreakable        | no     | halts excavation-based recovery |
//! | Timeout            | no     | hard ceiling reached, always reported |
//! | RecoveryExhausted  | no     | whole ladder tried and failed |
//! | World              | no     | accessor rejected a primitive |
//! | Config             | no     | bad tunables file |

use crate::geometry::BlockPos;
use crate::stall::StuckReason;
use std::time::Duration;
use thiserror::Error;

/// Unified error type for navigation operations.
#[derive(Debug, Error)]
pub enum NavError {
    /// Indestructible material where excavation was required.
    #[error("unbreakable block at {0}")]
    Unbreakable(BlockPos),

    /// The entity an operation was tracking no longer exists.
    #[error("target entity vanished")]
    EntityVanished,

    /// A world read failed mid-operation (disconnect race).
    #[error("world connection lost: {0}")]
    Disconnected(String),

    /// Hard wall-clock ceiling reached.
    #[error("operation timed out after {0:.1?}")]
    Timeout(Duration),

    /// Every applicable recovery strategy was tried and failed.
    #[error("all recovery strategies exhausted ({reason})")]
    RecoveryExhausted { reason: StuckReason },

    /// The world accessor rejected a movement/excavation/placement primitive.
    #[error("world action failed: {0}")]
    World(String),

    /// Configuration could not be loaded or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl NavError {
    /// Benign errors degrade the operation to an "interrupted" outcome
    /// rather than surfacing as a controller failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::EntityVanished | Self::Disconnected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_classification() {
        assert!(NavError::EntityVanished.is_benign());
        assert!(NavError::Disconnected("socket closed".into()).is_benign());
        assert!(!NavError::Unbreakable(BlockPos::new(0, 5, 0)).is_benign());
        assert!(!NavError::Timeout(Duration::from_secs(30)).is_benign());
    }

    #[test]
    fn test_display_carries_position() {
        let msg = NavError::Unbreakable(BlockPos::new(1, -60, 2)).to_string();
        assert!(msg.contains("(1, -60, 2)"));
    }

    #[test]
    fn test_exhaustion_names_the_reason() {
        let err = NavError::RecoveryExhausted {
            reason: StuckReason::TargetHigher,
        };
        assert!(err.to_string().contains("target_higher"));
        assert!(!err.is_benign());
    }
}
