//! The external path-search engine, as the controller sees it.
//!
//! The engine computes routes, moves the agent and excavates on its own;
//! the controller only sets goals, watches the lifecycle events and reads
//! the movement/excavation flags. Events arrive over a tokio broadcast
//! channel — dropping the receiver is how a monitor detaches its
//! listeners.

use guidance::Position;
use tokio::sync::broadcast;

/// A target position plus acceptance radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub target: Position,
    pub radius: f64,
}

impl Goal {
    pub fn new(target: Position, radius: f64) -> Self {
        Self { target, radius }
    }
}

/// Lifecycle signals emitted by the path engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    /// The engine believes the current goal has been reached.
    GoalReached,
    /// The route was invalidated and recalculated. Routine while the
    /// engine excavates; only a run of these without progress matters.
    PathReset,
    /// The current goal was replaced by another one.
    GoalReplaced,
}

/// Contract with the external path-search engine.
///
/// Goal setting and policy mutation are synchronous state changes on the
/// engine; actual movement happens on the engine's own schedule.
pub trait PathEngine: Send + Sync {
    /// Hand the engine a goal, or clear the active one with `None`.
    fn set_goal(&self, goal: Option<Goal>);

    /// The goal the engine is currently driving toward.
    fn current_goal(&self) -> Option<Goal>;

    /// Whether the engine is actively moving the agent.
    fn is_moving(&self) -> bool;

    /// Whether the engine is mid-excavation (dig delays suppress stalls).
    fn is_excavating(&self) -> bool;

    /// Subscribe to lifecycle events. Dropping the receiver detaches.
    fn subscribe(&self) -> broadcast::Receiver<PathEvent>;

    /// Block names the engine refuses to path through.
    fn avoided_blocks(&self) -> Vec<String>;

    /// Replace the avoidance set (used to temporarily allow portal cells).
    fn set_avoided_blocks(&self, blocks: Vec<String>);
}

/// Restores the engine's avoidance set on drop — exactly once, on every
/// exit path of the scope that altered it.
pub struct AvoidanceRestore<'a> {
    engine: &'a dyn PathEngine,
    saved: Option<Vec<String>>,
}

impl<'a> AvoidanceRestore<'a> {
    /// Capture the current avoidance set and install `replacement`.
    pub fn install(engine: &'a dyn PathEngine, replacement: Vec<String>) -> Self {
        let saved = engine.avoided_blocks();
        engine.set_avoided_blocks(replacement);
        Self {
            engine,
            saved: Some(saved),
        }
    }
}

impl Drop for AvoidanceRestore<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.engine.set_avoided_blocks(saved);
            tracing::debug!("avoidance set restored");
        }
    }
}
