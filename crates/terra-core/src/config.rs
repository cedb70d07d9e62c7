//! Closed set of configuration options consumed by map generation and the
//! simulation. Every field has a documented default; a config loaded from an
//! env var overlay that omits a key falls back to that default.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub world: WorldConfig,
    pub gameplay: GameplayConfig,
    pub runtime: RuntimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            gameplay: GameplayConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Config {
    /// Overlay documented defaults with environment variables. Any var that's
    /// unset, or fails to parse, keeps the default rather than erroring --
    /// config is best-effort, not a hard boot precondition.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_f32("TICK_PERIOD_MS") {
            cfg.runtime.tick_period_ms = v as u64;
        }
        if let Some(v) = env_f32("IDLE_ROOM_TTL_MS") {
            cfg.runtime.idle_room_ttl_ms = v as u64;
        }
        if let Some(v) = env_f32("IDLE_SWEEP_INTERVAL_MS") {
            cfg.runtime.idle_sweep_interval_ms = v as u64;
        }
        if let Ok(v) = std::env::var("RESET_ON_BOOT") {
            cfg.runtime.reset_on_boot = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("CLEAR_ROOMS") {
            cfg.runtime.clear_rooms = parse_bool(&v);
        }
        cfg
    }
}

fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
fn parse_bool(s: &str) -> bool {
    matches!(s.trim(), "1" | "true" | "TRUE" | "yes")
}

/// Thresholds and weights consumed by the map generation pipeline (component B).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    pub sea_level: f32,
    pub coastal_level: f32,
    pub mountain_level: f32,
    pub elevation_offset: f32,

    pub noise_weight: f32,
    pub anchor_weight: f32,
    pub warp1_scale: f32,
    pub warp1_amplitude: f32,
    pub warp2_scale: f32,
    pub warp2_amplitude: f32,

    pub fbm_octaves: u32,
    pub fbm_frequency: f32,
    pub fbm_persistence: f32,
    pub border_width: f32,

    pub anchor_margin: f32,
    pub anchor_min_strength: f32,
    pub anchor_strength_range: f32,
    pub anchor_min_sigma: f32,
    pub anchor_sigma_range: f32,

    pub peak_amplify_strength: f32,
    pub sub_sea_push: f32,

    pub river_flow_multiplier: f32,
    pub river_widen_multiplier: f32,

    pub moisture_influence_radius: f32,
    pub rain_shadow_decay: f32,
    pub moisture_smooth_passes: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            sea_level: 0.35,
            coastal_level: 0.40,
            mountain_level: 0.85,
            elevation_offset: 0.40,

            noise_weight: 0.6,
            anchor_weight: 0.4,
            warp1_scale: 0.003,
            warp1_amplitude: 40.0,
            warp2_scale: 0.006,
            warp2_amplitude: 20.0,

            fbm_octaves: 6,
            fbm_frequency: 0.008,
            fbm_persistence: 0.5,
            border_width: 0.18,

            anchor_margin: 0.15,
            anchor_min_strength: 0.4,
            anchor_strength_range: 0.35,
            anchor_min_sigma: 0.15,
            anchor_sigma_range: 0.12,

            peak_amplify_strength: 0.8,
            sub_sea_push: 0.6,

            river_flow_multiplier: 0.12,
            river_widen_multiplier: 4.0,

            moisture_influence_radius: 15.0,
            rain_shadow_decay: 0.92,
            moisture_smooth_passes: 3,
        }
    }
}

/// Gameplay tuning consumed by the nation updater (component E).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameplayConfig {
    pub win_condition_percentage: f32,
    pub population: PopulationConfig,
    pub city_bonus: f32,
    pub resource: ResourceConfig,
    pub cell_desirability_bonus: CellDesirabilityBonus,
    pub biome_desirability_scores: BTreeMap<String, f32>,
    pub build_costs: BuildCosts,
    pub armies: ArmyConfig,
    /// Whether `winConditionPercentage` counts all land cells (true) or all
    /// map cells including ocean (false). Open Question, decided in DESIGN.md.
    pub win_counts_all_land_cells: bool,
    /// Maximum concurrent attack arrows per nation. Open Question, decided
    /// in DESIGN.md.
    pub max_attack_arrows: usize,
    /// Ticks a defeated nation's former cells stay "scorched" (unclaimable)
    /// before reverting to ordinary unowned land. Open Question, decided in
    /// DESIGN.md; 0 disables the cooldown.
    pub scorched_cooldown_ticks: u64,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        let mut biome_desirability_scores = BTreeMap::new();
        for (biome, score) in [
            ("GRASSLAND", 1.0),
            ("WOODLAND", 0.9),
            ("FOREST", 0.8),
            ("SAVANNA", 0.75),
            ("COASTAL", 0.7),
            ("TROPICAL_FOREST", 0.6),
            ("TAIGA", 0.5),
            ("TUNDRA", 0.35),
            ("RAINFOREST", 0.45),
            ("DESERT", 0.25),
            ("MOUNTAIN", 0.2),
            ("RIVER", 0.85),
            ("OCEAN", 0.0),
        ] {
            biome_desirability_scores.insert(biome.to_string(), score);
        }
        Self {
            win_condition_percentage: 75.0,
            population: PopulationConfig::default(),
            city_bonus: 500.0,
            resource: ResourceConfig::default(),
            cell_desirability_bonus: CellDesirabilityBonus::default(),
            biome_desirability_scores,
            build_costs: BuildCosts::default(),
            armies: ArmyConfig::default(),
            win_counts_all_land_cells: true,
            max_attack_arrows: 3,
            scorched_cooldown_ticks: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationConfig {
    pub growth_rate: f32,
    pub max_per_territory: f32,
}
impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            growth_rate: 0.02,
            max_per_territory: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub base_yield: f32,
}
impl Default for ResourceConfig {
    fn default() -> Self {
        Self { base_yield: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDesirabilityBonus {
    pub adjacent_weight: f32,
}
impl Default for CellDesirabilityBonus {
    fn default() -> Self {
        Self {
            adjacent_weight: 40.0,
        }
    }
}

/// Structure and army build costs, keyed by type name. A table rather than an
/// enum-keyed map because the set of buildable types is a config concern, not
/// a wire-protocol concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCosts {
    pub structures: BTreeMap<String, BTreeMap<String, f32>>,
    pub armies: BTreeMap<String, BTreeMap<String, f32>>,
}
impl Default for BuildCosts {
    fn default() -> Self {
        let mut structures = BTreeMap::new();
        structures.insert(
            "city".to_string(),
            BTreeMap::from([("wood".to_string(), 50.0), ("stone".to_string(), 20.0)]),
        );
        structures.insert(
            "fort".to_string(),
            BTreeMap::from([("stone".to_string(), 80.0), ("iron".to_string(), 20.0)]),
        );
        let mut armies = BTreeMap::new();
        armies.insert(
            "attack".to_string(),
            BTreeMap::from([("food".to_string(), 10.0)]),
        );
        armies.insert(
            "defend".to_string(),
            BTreeMap::from([("food".to_string(), 8.0)]),
        );
        Self { structures, armies }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmyConfig {
    pub stats: BTreeMap<String, ArmyStats>,
    pub structure_descriptions: BTreeMap<String, String>,
}
impl Default for ArmyConfig {
    fn default() -> Self {
        let mut stats = BTreeMap::new();
        stats.insert(
            "attack".to_string(),
            ArmyStats {
                speed: 1.0,
                power: 1.0,
                population_cost: 0.0,
            },
        );
        stats.insert(
            "defend".to_string(),
            ArmyStats {
                speed: 1.0,
                power: 1.2,
                population_cost: 0.0,
            },
        );
        let mut structure_descriptions = BTreeMap::new();
        structure_descriptions.insert("city".to_string(), "boosts population cap and yield".to_string());
        structure_descriptions.insert("fort".to_string(), "multiplies defensive power".to_string());
        Self {
            stats,
            structure_descriptions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmyStats {
    pub speed: f32,
    pub power: f32,
    pub population_cost: f32,
}

/// Environment toggles and server-side cadence knobs (not part of the
/// generation/gameplay config a client can see, but still config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub tick_period_ms: u64,
    pub idle_room_ttl_ms: u64,
    pub idle_sweep_interval_ms: u64,
    pub max_worker_restarts: u32,
    /// Base delay before the manager's first restart attempt after a room's
    /// worker errors out; doubled per subsequent attempt up to
    /// `max_worker_restarts`.
    pub worker_restart_backoff_base_ms: u64,
    pub reset_on_boot: bool,
    pub clear_rooms: bool,
    pub use_packed_deltas: bool,
    pub max_rows_per_chunk: u32,
    pub full_snapshot_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            idle_room_ttl_ms: 10 * 60 * 1000,
            idle_sweep_interval_ms: 30 * 1000,
            max_worker_restarts: 3,
            worker_restart_backoff_base_ms: 500,
            reset_on_boot: false,
            clear_rooms: false,
            use_packed_deltas: false,
            max_rows_per_chunk: 64,
            full_snapshot_interval_ms: 15 * 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.world.sea_level, 0.35);
        assert_eq!(cfg.world.mountain_level, 0.85);
        assert_eq!(cfg.gameplay.win_condition_percentage, 75.0);
        assert_eq!(cfg.gameplay.population.growth_rate, 0.02);
        assert_eq!(cfg.runtime.tick_period_ms, 100);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        std::env::remove_var("TICK_PERIOD_MS");
        let cfg = Config::from_env();
        assert_eq!(cfg.runtime.tick_period_ms, 100);
    }
}
