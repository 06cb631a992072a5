//! Deterministic decision core for the voxel pilot.
//!
//! Everything in this crate is synchronous and side-effect free (the only
//! I/O is config loading), so every navigation decision is unit-testable
//! without a world or a runtime:
//!
//! - `stall`: per-tick progress bookkeeping and stuck-cause classification
//! - `recovery`: the fixed-order recovery ladder and its applicability rules
//! - `attempt`: the movement-attempt state machine with a transition log
//! - `world`: block/item/entity types and pure probe predicates
//! - `locks`: advisory per-position TTL locks for shared resources
//! - `report`: rendering of human-readable outcome strings
//! - `config`: every tunable, loadable from TOML with env overrides
//!
//! The async side — actually driving the path engine and the world — lives
//! in the `voxel-pilot` crate, which consumes these types.

pub mod attempt;
pub mod config;
pub mod error;
pub mod geometry;
pub mod locks;
pub mod recovery;
pub mod report;
pub mod stall;
pub mod world;

// Re-export the types the pilot touches on every operation.
pub use attempt::{AttemptState, IllegalTransition, MovementAttempt, TransitionRecord};
pub use config::NavConfig;
pub use error::NavError;
pub use geometry::{Axis, BlockPos, Direction, Face, Position};
pub use locks::{AdvisoryLocks, PositionLock};
pub use recovery::{plan_recovery, RecoveryContext, RecoveryStrategy, DETOUR_OFFSETS};
pub use report::{MoveReport, PillarReport};
pub use stall::{classify_stall, ProgressTracker, StuckReason, TickVerdict};
pub use world::{BlockInfo, Dimension, Entity, Item, PortalKind};
