//! Async navigation and recovery controller for a voxel-world agent.
//!
//! The pilot turns high-level requests — reach a position, gain height,
//! flee danger, enter a portal — into sequences of low-level movement and
//! world-modification primitives, continuously judges whether progress is
//! being made, classifies failure causes, and escalates through a ladder
//! of recovery strategies before giving up.
//!
//! Collaborators are traits: [`world::WorldView`] (block/entity/inventory
//! access and actuation), [`engine::PathEngine`] (the external path-search
//! engine) and [`threat::ThreatClassifier`] (hostility registry). The
//! deterministic decisions — stall classification, recovery planning,
//! outcome rendering — live in the `guidance` crate; this crate owns the
//! timers, the event races and the world side effects.
//!
//! Every exposed operation resolves to a human-readable `String`, the
//! stable contract surface the LLM-driven orchestration layer reads.

pub mod controller;
pub mod engine;
pub mod monitor;
pub mod portal;
pub mod sim;
pub mod threat;
pub mod tunnel;
pub mod vertical;
pub mod world;

pub use controller::Pilot;
pub use engine::{Goal, PathEngine, PathEvent};
pub use monitor::{GoalOutcome, GoalSlot, WatchOptions};
pub use threat::{NameThreats, ThreatClassifier};
pub use world::{Control, WorldEvent, WorldView};
