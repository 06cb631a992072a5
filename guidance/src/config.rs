//! Navigation tunables.
//!
//! Every numeric knob the controller uses lives here, with the defaults
//! the system was tuned at. Values load from a TOML file (unknown keys are
//! rejected — a typo'd knob should fail loudly, not silently fall back)
//! and a handful of operational knobs can be overridden via `PILOT_*`
//! environment variables.

use crate::error::NavError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavConfig {
    // ── goal monitor ──────────────────────────────────────────────────
    /// Progress-check cadence in milliseconds.
    pub tick_interval_ms: u64,
    /// Movement below this per tick counts as no progress.
    pub stall_epsilon: f64,
    /// Consecutive no-progress ticks before a stall is declared.
    pub stall_ticks: u32,
    /// How long the excavating flag may suppress the stall counter.
    pub excavation_grace_ticks: u32,
    /// |Δy| beyond this splits stalls into target_higher/target_lower.
    pub vertical_split: f64,
    /// Path resets without progress before resolving no_path.
    pub path_reset_run: u32,
    /// Movement between resets below this counts as "no progress".
    pub reset_progress_epsilon: f64,
    /// Ticks the engine must stay stopped before pathfinder_stopped.
    pub stop_confirm_ticks: u32,
    /// Hard timeout floor in seconds.
    pub timeout_floor_secs: u64,
    /// Additional timeout budget per block of initial distance.
    pub timeout_secs_per_block: f64,
    /// Default goal acceptance radius.
    pub goal_radius: f64,

    // ── move controller ───────────────────────────────────────────────
    /// Neighborhood radius searched when the target cell is solid.
    pub retarget_radius: i32,
    /// Monitor runs spent on retarget candidates before falling through.
    pub retarget_candidates: usize,
    /// Descents beyond this many blocks are logged as risky.
    pub descent_warning: f64,
    /// Cells probed along the line toward the target for dig_through.
    pub dig_probe_range: u32,
    /// Timeout per detour-offset probe, in seconds.
    pub detour_timeout_secs: u64,

    // ── vertical construction ─────────────────────────────────────────
    /// Pillar height cap per recovery.
    pub max_pillar_height: u32,
    /// Jump-and-place attempts per pillar level.
    pub pillar_attempts_per_level: u32,
    /// Minimum vertical gain for a level to count as placed.
    pub pillar_min_rise: f64,
    /// Wall-clock cap on apex detection per jump, in milliseconds.
    pub jump_apex_ms: u64,
    /// Settle time after a placement before verifying the rise.
    pub place_settle_ms: u64,
    /// Position-poll cadence while waiting on physics (apex, falls).
    pub settle_poll_ms: u64,
    /// Cap on waiting for an in-flight fall to settle.
    pub settle_max_ms: u64,
    /// Duration of one forced walk-in pulse (portal approach).
    pub walk_pulse_ms: u64,
    /// Light level above which overhead cells count as open sky.
    pub sky_light_min: u8,
    /// Light level that satisfies the dig-up surface heuristic.
    pub surface_light_min: u8,
    /// Height gain over the start that satisfies the surface heuristic.
    pub surface_rise: i32,

    // ── threat response ───────────────────────────────────────────────
    /// Hostile detection range for flee.
    pub flee_detect_range: f64,
    /// Fraction of the requested flee distance that counts as success.
    pub flee_fraction: f64,
    /// Hard flee timeout in seconds.
    pub flee_timeout_secs: u64,

    // ── portal handshake ──────────────────────────────────────────────
    /// Search range for portal blocks.
    pub portal_search_range: f64,
    /// Forced walk-in attempts before giving up.
    pub portal_forced_attempts: u32,
    /// Seconds to wait for the dimension change once inside.
    pub dimension_wait_secs: u64,

    // ── inventory / shared resources ──────────────────────────────────
    /// Name fragments that disqualify an item as pillar scaffolding.
    pub scaffold_exclusions: Vec<String>,
    /// Advisory lock TTL in seconds.
    pub lock_ttl_secs: u64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            stall_epsilon: 0.05,
            stall_ticks: 30,
            excavation_grace_ticks: 240,
            vertical_split: 2.0,
            path_reset_run: 4,
            reset_progress_epsilon: 0.5,
            stop_confirm_ticks: 3,
            timeout_floor_secs: 30,
            timeout_secs_per_block: 1.5,
            goal_radius: 1.0,
            retarget_radius: 3,
            retarget_candidates: 5,
            descent_warning: 20.0,
            dig_probe_range: 5,
            detour_timeout_secs: 5,
            max_pillar_height: 5,
            pillar_attempts_per_level: 3,
            pillar_min_rise: 0.5,
            jump_apex_ms: 400,
            place_settle_ms: 250,
            settle_poll_ms: 50,
            settle_max_ms: 3000,
            walk_pulse_ms: 800,
            sky_light_min: 12,
            surface_light_min: 10,
            surface_rise: 20,
            flee_detect_range: 16.0,
            flee_fraction: 0.7,
            flee_timeout_secs: 8,
            portal_search_range: 32.0,
            portal_forced_attempts: 5,
            dimension_wait_secs: 30,
            scaffold_exclusions: [
                "ore", "diamond", "emerald", "ancient_debris", "spawner", "portal", "beacon",
                "shulker",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            lock_ttl_secs: 60,
        }
    }
}

impl NavConfig {
    /// Parse from a TOML string. Missing fields take defaults; unknown
    /// fields are an error.
    pub fn from_toml_str(s: &str) -> Result<Self, NavError> {
        toml::from_str(s).map_err(|e| NavError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NavError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NavError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `PILOT_*` environment overrides for the operational knobs.
    pub fn with_env_overrides(mut self) -> Self {
        fn read<T: std::str::FromStr>(name: &str, into: &mut T) {
            if let Some(v) = std::env::var(name).ok().and_then(|v| v.parse().ok()) {
                *into = v;
            }
        }
        read("PILOT_TICK_INTERVAL_MS", &mut self.tick_interval_ms);
        read("PILOT_STALL_TICKS", &mut self.stall_ticks);
        read("PILOT_TIMEOUT_FLOOR_SECS", &mut self.timeout_floor_secs);
        read("PILOT_FLEE_TIMEOUT_SECS", &mut self.flee_timeout_secs);
        read("PILOT_DIMENSION_WAIT_SECS", &mut self.dimension_wait_secs);
        read("PILOT_LOCK_TTL_SECS", &mut self.lock_ttl_secs);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Hard timeout for a goal at the given initial distance:
    /// `max(floor, secs_per_block × distance)`.
    pub fn timeout_for(&self, initial_distance: f64) -> Duration {
        let scaled = self.timeout_secs_per_block * initial_distance.max(0.0);
        Duration::from_secs_f64(scaled.max(self.timeout_floor_secs as f64))
    }

    pub fn flee_timeout(&self) -> Duration {
        Duration::from_secs(self.flee_timeout_secs)
    }

    pub fn dimension_wait(&self) -> Duration {
        Duration::from_secs(self.dimension_wait_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_tuning() {
        let cfg = NavConfig::default();
        assert_eq!(cfg.tick_interval_ms, 500);
        assert_eq!(cfg.stall_ticks, 30);
        assert_eq!(cfg.max_pillar_height, 5);
        assert_eq!(cfg.portal_forced_attempts, 5);
        assert!((cfg.flee_fraction - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_timeout_scaling() {
        let cfg = NavConfig::default();
        // Short hops get the floor.
        assert_eq!(cfg.timeout_for(2.0), Duration::from_secs(30));
        // Long hauls scale at 1.5 s/block.
        assert_eq!(cfg.timeout_for(100.0), Duration::from_secs(150));
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let cfg = NavConfig::from_toml_str("stall_ticks = 10\nflee_timeout_secs = 4\n").unwrap();
        assert_eq!(cfg.stall_ticks, 10);
        assert_eq!(cfg.flee_timeout_secs, 4);
        assert_eq!(cfg.tick_interval_ms, 500);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = NavConfig::from_toml_str("stall_tickz = 10\n").unwrap_err();
        assert!(err.to_string().contains("stall_tickz"));
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "max_pillar_height = 3").unwrap();
        let cfg = NavConfig::load(f.path()).unwrap();
        assert_eq!(cfg.max_pillar_height, 3);

        assert!(NavConfig::load("/definitely/not/a/file.toml").is_err());
    }

    #[test]
    fn test_env_override_wins() {
        std::env::set_var("PILOT_STALL_TICKS", "7");
        let cfg = NavConfig::default().with_env_overrides();
        std::env::remove_var("PILOT_STALL_TICKS");
        assert_eq!(cfg.stall_ticks, 7);
    }

    #[test]
    fn test_toml_roundtrip() {
        let cfg = NavConfig::default();
        let s = toml::to_string(&cfg).unwrap();
        let back = NavConfig::from_toml_str(&s).unwrap();
        assert_eq!(back.stall_ticks, cfg.stall_ticks);
        assert_eq!(back.scaffold_exclusions, cfg.scaffold_exclusions);
    }
}
