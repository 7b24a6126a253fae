//! Configuration types for the simulation.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The four orthogonal neighbors of a cell
pub const ADJACENT_NEIGHBORS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// All eight neighbors of a cell
pub const ALL_NEIGHBORS: [(i32, i32); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
];

/// Evolution and behavior parameters consumed by the simulation core.
///
/// Probabilities are percentages in `0..=100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparams {
    /// Lifespan in ticks per body cell
    pub lifespan_multiplier: u64,
    /// Chance per tick that a producer cell grows food
    pub food_prod_prob: f64,
    /// Chance per drop attempt that food falls on an empty cell
    pub food_drop_prob: f64,
    /// Allow organisms to rotate their bodies
    pub rotation_enabled: bool,
    /// A single killer hit is lethal
    pub insta_kill: bool,
    /// How many tiles an eye can see
    pub look_range: u32,
    /// Eyes skip cells belonging to their own organism
    pub see_through_self: bool,
    /// Extra food needed per mover cell before reproducing
    pub extra_mover_food_cost: u32,
    /// Use `global_mutability` for every organism instead of per-organism drift
    pub use_global_mutability: bool,
    /// Mutation chance used when `use_global_mutability` is set
    pub global_mutability: u32,
    /// Chance a mutation pass adds a cell
    pub add_prob: f64,
    /// Chance a mutation pass changes a cell's type
    pub change_prob: f64,
    /// Chance a mutation pass removes a cell
    pub remove_prob: f64,
    /// Producers keep producing on organisms that can move
    pub movers_can_produce: bool,
    /// Food on a target cell blocks offspring placement
    pub food_blocks_reproduction: bool,
    /// Offsets a mouth can eat from
    pub edible_neighbors: Vec<(i32, i32)>,
    /// Offsets a producer can grow food into
    pub growable_neighbors: Vec<(i32, i32)>,
    /// Offsets a killer can strike
    pub killable_neighbors: Vec<(i32, i32)>,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            lifespan_multiplier: 100,
            food_prod_prob: 5.0,
            food_drop_prob: 0.0,
            rotation_enabled: true,
            insta_kill: false,
            look_range: 20,
            see_through_self: false,
            extra_mover_food_cost: 0,
            use_global_mutability: false,
            global_mutability: 5,
            add_prob: 33.0,
            change_prob: 33.0,
            remove_prob: 33.0,
            movers_can_produce: false,
            food_blocks_reproduction: true,
            edible_neighbors: ADJACENT_NEIGHBORS.to_vec(),
            growable_neighbors: ADJACENT_NEIGHBORS.to_vec(),
            killable_neighbors: ADJACENT_NEIGHBORS.to_vec(),
        }
    }
}

/// World layout and environment-level behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Number of grid columns
    pub cols: i32,
    /// Number of grid rows
    pub rows: i32,
    /// Organisms dropped by `spawn_random_organisms` when no count is given
    pub num_random_orgs: usize,
    /// Remove walls when the world is reset
    pub clear_walls_on_reset: bool,
    /// Restart from the origin of life once every organism has died
    pub auto_reset: bool,
    /// Radius of the square brush used by editing operations
    pub brush_size: i32,
    /// Ticks between fossil record samples
    pub data_update_rate: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cols: 100,
            rows: 100,
            num_random_orgs: 100,
            clear_walls_on_reset: false,
            auto_reset: false,
            brush_size: 2,
            data_update_rate: 100,
        }
    }
}

/// Everything needed to construct a simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    pub world: WorldConfig,
    pub hyperparams: Hyperparams,
}

impl SimulationConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Optional path to a `SimulationConfig` JSON file
    pub config_path: Option<String>,
    /// Number of ticks to run (0 runs until interrupted)
    pub num_ticks: u64,
    /// Delay between ticks in milliseconds (0 runs flat out)
    pub tick_interval_ms: u64,
    /// Checkpoint directory
    pub checkpoint_dir: String,
    /// Ticks between checkpoints (0 disables periodic checkpoints)
    pub checkpoint_interval_ticks: u64,
    /// Ticks between population metric log lines
    pub metrics_interval_ticks: u64,
    /// Resume from the newest checkpoint in `checkpoint_dir` if one exists
    pub resume: bool,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            num_ticks: 0,
            tick_interval_ms: 0,
            checkpoint_dir: "./data/checkpoints".to_string(),
            checkpoint_interval_ticks: 10_000,
            metrics_interval_ticks: 1_000,
            resume: false,
            json_logs: false,
        }
    }
}

impl RunnerConfig {
    /// Overlay `LIFE_*` environment variables on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("LIFE_CONFIG") {
            config.config_path = Some(path);
        }
        if let Some(v) = env_parse("LIFE_NUM_TICKS") {
            config.num_ticks = v;
        }
        if let Some(v) = env_parse("LIFE_TICK_INTERVAL_MS") {
            config.tick_interval_ms = v;
        }
        if let Ok(dir) = std::env::var("LIFE_CHECKPOINT_DIR") {
            config.checkpoint_dir = dir;
        }
        if let Some(v) = env_parse("LIFE_CHECKPOINT_INTERVAL") {
            config.checkpoint_interval_ticks = v;
        }
        if let Some(v) = env_parse("LIFE_METRICS_INTERVAL") {
            config.metrics_interval_ticks = v;
        }
        if let Some(v) = env_parse("LIFE_RESUME") {
            config.resume = v;
        }
        if let Some(v) = env_parse("LIFE_JSON_LOGS") {
            config.json_logs = v;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let hyperparams = Hyperparams::default();
        assert_eq!(hyperparams.lifespan_multiplier, 100);
        assert_eq!(hyperparams.look_range, 20);
        assert_eq!(hyperparams.edible_neighbors.len(), 4);

        let world = WorldConfig::default();
        assert_eq!(world.cols, 100);
        assert_eq!(world.rows, 100);
        assert_eq!(world.data_update_rate, 100);

        let runner = RunnerConfig::default();
        assert_eq!(runner.num_ticks, 0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "seed": 9, "world": { "cols": 40 }, "hyperparams": { "insta_kill": true } }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.world.cols, 40);
        assert_eq!(config.world.rows, 100);
        assert!(config.hyperparams.insta_kill);
        assert_eq!(config.hyperparams.add_prob, 33.0);
    }

    #[test]
    fn test_hyperparams_serialization() {
        let params = Hyperparams::default();
        let json = serde_json::to_string(&params).unwrap();
        let deserialized: Hyperparams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, deserialized);
    }
}
