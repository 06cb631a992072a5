//! Movement-attempt state machine — explicit states and legal transition
//! guards.
//!
//! One `MovementAttempt` is created per `move_to` call and destroyed on
//! resolution; it is never persisted. The typed model buys two things:
//! every transition is auditable (recorded with elapsed time and an
//! optional note), and illegal edges are rejected instead of silently
//! corrupting the attempt.
//!
//! ```text
//! Idle → Active → Succeeded
//!               → Stuck → Recovering → Succeeded
//!                                    → Failed
//!                       → Failed
//! ```

use crate::stall::StuckReason;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// The states of one movement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    /// Created, monitor not yet started.
    Idle,
    /// Goal handed to the path engine, monitor running.
    Active,
    /// Stall declared; a stuck reason has been assigned.
    Stuck,
    /// Walking the recovery ladder.
    Recovering,
    /// Terminal: target reached.
    Succeeded,
    /// Terminal: exhausted or timed out.
    Failed,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Active => write!(f, "Active"),
            Self::Stuck => write!(f, "Stuck"),
            Self::Recovering => write!(f, "Recovering"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: AttemptState, to: AttemptState) -> bool {
    use AttemptState::*;
    matches!(
        (from, to),
        (Idle, Active)
            | (Active, Succeeded)
            | (Active, Stuck)
            | (Stuck, Recovering)
            | (Stuck, Failed)
            | (Recovering, Succeeded)
            | (Recovering, Failed)
    )
}

/// One recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: AttemptState,
    pub to: AttemptState,
    /// Milliseconds since the attempt was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: AttemptState,
    pub to: AttemptState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal attempt transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// One movement attempt, from creation to resolution.
pub struct MovementAttempt {
    id: Uuid,
    state: AttemptState,
    stuck_reason: Option<StuckReason>,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl MovementAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AttemptState::Idle,
            stuck_reason: None,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// The stuck reason, once assigned. Immutable thereafter.
    pub fn stuck_reason(&self) -> Option<StuckReason> {
        self.stuck_reason
    }

    /// Advance to the next state, recording the transition.
    pub fn advance(
        &mut self,
        to: AttemptState,
        note: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.state, to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }

        tracing::debug!(
            attempt = %self.id,
            from = %self.state,
            to = %to,
            note = note.unwrap_or(""),
            "attempt transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.state,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            note: note.map(String::from),
        });
        self.state = to;
        Ok(())
    }

    /// Declare the stall. The reason is assigned here, exactly once.
    pub fn mark_stuck(&mut self, reason: StuckReason) -> Result<(), IllegalTransition> {
        let note = reason.to_string();
        self.advance(AttemptState::Stuck, Some(note.as_str()))?;
        debug_assert!(self.stuck_reason.is_none());
        self.stuck_reason.get_or_insert(reason);
        Ok(())
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history for logging.
    pub fn summary(&self) -> String {
        let path: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        format!(
            "attempt {} [{}] ({} transitions, {}ms)",
            self.id,
            path.join(" → "),
            self.transitions.len(),
            self.created_at.elapsed().as_millis(),
        )
    }
}

impl Default for MovementAttempt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut a = MovementAttempt::new();
        a.advance(AttemptState::Active, None).unwrap();
        a.advance(AttemptState::Succeeded, Some("within radius"))
            .unwrap();
        assert!(a.state().is_terminal());
        assert_eq!(a.transitions().len(), 2);
        assert!(a.stuck_reason().is_none());
    }

    #[test]
    fn test_recovery_path_records_reason_once() {
        let mut a = MovementAttempt::new();
        a.advance(AttemptState::Active, None).unwrap();
        a.mark_stuck(StuckReason::TargetHigher).unwrap();
        assert_eq!(a.stuck_reason(), Some(StuckReason::TargetHigher));

        a.advance(AttemptState::Recovering, Some("pillar_up")).unwrap();
        a.advance(AttemptState::Succeeded, None).unwrap();
        // Reason survives resolution untouched.
        assert_eq!(a.stuck_reason(), Some(StuckReason::TargetHigher));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut a = MovementAttempt::new();
        // Can't resolve an attempt that never started.
        let err = a.advance(AttemptState::Succeeded, None).unwrap_err();
        assert_eq!(err.from, AttemptState::Idle);

        a.advance(AttemptState::Active, None).unwrap();
        a.advance(AttemptState::Succeeded, None).unwrap();
        // Terminal states are final.
        assert!(a.advance(AttemptState::Stuck, None).is_err());
        assert!(a.advance(AttemptState::Active, None).is_err());
    }

    #[test]
    fn test_stuck_requires_active() {
        let mut a = MovementAttempt::new();
        assert!(a.mark_stuck(StuckReason::Obstacle).is_err());
        assert!(a.stuck_reason().is_none());
    }

    #[test]
    fn test_failed_from_stuck_without_recovery() {
        let mut a = MovementAttempt::new();
        a.advance(AttemptState::Active, None).unwrap();
        a.mark_stuck(StuckReason::Timeout).unwrap();
        a.advance(AttemptState::Failed, Some("no ladder for timeout"))
            .unwrap();
        assert!(a.state().is_terminal());
    }

    #[test]
    fn test_summary_mentions_path() {
        let mut a = MovementAttempt::new();
        a.advance(AttemptState::Active, None).unwrap();
        a.mark_stuck(StuckReason::Obstacle).unwrap();
        let s = a.summary();
        assert!(s.contains("Active → Stuck"));
        assert!(s.contains("2 transitions"));
    }
}
