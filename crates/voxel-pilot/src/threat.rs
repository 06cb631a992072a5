//! Threat response — flee from hostiles (or from generic danger).
//!
//! Every entity/position read here is wrapped so that a mid-flight
//! disconnect degrades the operation to an "interrupted" outcome instead
//! of crashing the controller.

use crate::controller::Pilot;
use crate::monitor::{watch_goal, GoalOutcome, WatchOptions};
use guidance::{Entity, Position};
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(test)]
use mockall::automock;

/// The external entity/mob classification registry.
#[cfg_attr(test, automock)]
pub trait ThreatClassifier: Send + Sync {
    fn is_hostile(&self, entity: &Entity) -> bool;
}

/// Name-list classifier used when no registry is wired in.
#[derive(Debug, Clone)]
pub struct NameThreats {
    hostile: Vec<String>,
}

impl Default for NameThreats {
    fn default() -> Self {
        Self {
            hostile: [
                "zombie", "skeleton", "creeper", "spider", "witch", "drowned", "piglin",
                "blaze", "enderman", "warden",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ThreatClassifier for NameThreats {
    fn is_hostile(&self, entity: &Entity) -> bool {
        let name = entity.name.to_ascii_lowercase();
        self.hostile.iter().any(|h| name.contains(h.as_str()))
    }
}

/// Run `distance` blocks away from the nearest hostile, or in a random
/// direction when none is visible.
pub(crate) async fn flee(pilot: &Pilot, distance: f64) -> String {
    match run_flee(pilot, distance).await {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(error = %e, "flee degraded");
            format!("Flee interrupted: {e}.")
        }
    }
}

async fn run_flee(pilot: &Pilot, distance: f64) -> Result<String, guidance::NavError> {
    let world = pilot.world.as_ref();
    let cfg = &pilot.cfg;

    let start = world.position()?;
    let hostile = nearest_hostile(pilot, start)?;

    // Directly away from the threat; a hostile standing in our own
    // column (or none at all) gets a random direction.
    let (direction, from) = match &hostile {
        Some(h) => match h.position.horizontal_direction_to(start) {
            Some(dir) => (dir, Some(h.name.clone())),
            None => (random_direction(), Some(h.name.clone())),
        },
        None => (random_direction(), None),
    };
    let (dx, dz) = direction;

    let target = start.offset(dx * distance, 0.0, dz * distance);
    tracing::info!(%target, threat = from.as_deref().unwrap_or("none"), "fleeing");

    // Success: covered 70% of the requested distance, or the engine
    // stopped on its own — but only after a couple of ticks, so an
    // engine that has not started yet does not end the flee instantly.
    let needed = cfg.flee_fraction * distance;
    let ticks = AtomicU32::new(0);
    let success = Box::new(move |pos: Position, moving: bool| {
        let tick = ticks.fetch_add(1, Ordering::Relaxed);
        let covered = start.distance_to(pos);
        covered >= needed || (tick >= 2 && !moving)
    });

    let outcome = watch_goal(
        pilot.engine.as_ref(),
        world,
        cfg,
        &pilot.slot,
        target,
        WatchOptions::radius(cfg.goal_radius)
            .with_timeout(cfg.flee_timeout())
            .with_success(success),
    )
    .await?;

    let end = world.position()?;
    let covered = start.distance_to(end);
    Ok(match (outcome, from) {
        (GoalOutcome::Superseded, _) => "Flee superseded by a newer goal.".to_string(),
        (_, Some(name)) => format!("Fled {covered:.1} blocks away from the {name}; now at {end}."),
        (_, None) => format!("Fled danger: moved {covered:.1} blocks to {end}."),
    })
}

/// Nearest hostile within detection range. A read failure here surfaces
/// as the benign `Disconnected` and degrades the whole flee.
fn nearest_hostile(pilot: &Pilot, from: Position) -> Result<Option<Entity>, guidance::NavError> {
    let entities = pilot.world.find_entities(pilot.cfg.flee_detect_range)?;
    Ok(entities
        .into_iter()
        .filter(|e| pilot.threats.is_hostile(e))
        .min_by(|a, b| {
            from.distance_to(a.position)
                .partial_cmp(&from.distance_to(b.position))
                .unwrap_or(std::cmp::Ordering::Equal)
        }))
}

/// A uniformly random horizontal unit direction.
fn random_direction() -> (f64, f64) {
    let angle = rand::thread_rng().gen_range(0.0..std::f64::consts::TAU);
    (angle.cos(), angle.sin())
}
