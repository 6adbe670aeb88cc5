use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SIMULATION_CONFIG_REL_PATH: &str = "default.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoadConfig {
    pub center_x: f64,
    pub width: f64,
    /// Half-length of each border along the travel axis.
    #[serde(default = "default_border_extent")]
    pub border_extent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    pub viewport_height: f64,
    /// Fraction of the viewport kept above the best car.
    pub anchor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub width: f64,
    pub height: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub friction: f64,
    #[serde(default = "default_pivot_offset")]
    pub pivot_offset: f64,
    #[serde(default = "default_agent_lane")]
    pub lane: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficConfig {
    pub width: f64,
    pub height: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub friction: f64,
    #[serde(default = "default_pivot_offset")]
    pub pivot_offset: f64,
    pub spacing: f64,
    pub spacing_jitter_min: f64,
    pub spacing_jitter_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorConfig {
    pub ray_count: u32,
    pub ray_length: f64,
    /// Total fan angle in radians, centered on the car heading.
    pub ray_spread: f64,
    /// Where along the car's length the rays start, measured back from the nose.
    pub origin_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrainConfig {
    pub hidden_layers: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolutionConfig {
    pub base_mutation_rate: f64,
    pub attempt_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StallingConfig {
    pub warmup_ms: f64,
    /// Idle budget for a car standing still.
    pub idle_long_ms: f64,
    /// Idle budget for a car at full speed.
    pub idle_short_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    pub subjects_count: u32,
    pub enemies_count: u32,
    pub seed_phrase: String,
    #[serde(default = "default_seed_length")]
    pub seed_length: u32,
    #[serde(default = "default_start_level")]
    pub start_level: u32,
    #[serde(default)]
    pub rng_seed: u64,
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u32,
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: f64,
    pub road: RoadConfig,
    pub camera: CameraConfig,
    pub agent: AgentConfig,
    pub traffic: TrafficConfig,
    pub sensor: SensorConfig,
    pub brain: BrainConfig,
    pub evolution: EvolutionConfig,
    pub stalling: StallingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        default_simulation_config()
    }
}

impl SimulationConfig {
    /// Milliseconds of session time covered by one tick.
    pub fn tick_ms(&self) -> f64 {
        1000.0 / f64::from(self.ticks_per_second.max(1))
    }

    /// Controller layer sizes: one input per ray, four control outputs.
    pub fn brain_topology(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.brain.hidden_layers.len() + 2);
        sizes.push(self.sensor.ray_count as usize);
        sizes.extend(self.brain.hidden_layers.iter().map(|n| *n as usize));
        sizes.push(CONTROL_OUTPUTS);
        sizes
    }
}

/// forward, reverse, left, right
pub const CONTROL_OUTPUTS: usize = 4;

pub fn simulation_config_from_toml_str(raw: &str) -> Result<SimulationConfig, toml::de::Error> {
    toml::from_str(raw)
}

pub fn default_simulation_config() -> SimulationConfig {
    simulation_config_from_toml_str(include_str!("../default.toml"))
        .expect("default simulation config TOML must deserialize")
}

pub fn default_simulation_config_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_SIMULATION_CONFIG_REL_PATH)
}

pub fn load_default_simulation_config() -> Result<SimulationConfig> {
    load_simulation_config_from_path(&default_simulation_config_path())
}

pub fn load_simulation_config_from_path(path: &Path) -> Result<SimulationConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read simulation config from {}", path.display()))?;
    simulation_config_from_toml_str(&raw)
        .context("simulation config TOML failed schema deserialization")
        .with_context(|| format!("failed to parse simulation config from {}", path.display()))
}

pub fn validate_simulation_config(config: &SimulationConfig) -> Result<(), String> {
    if config.subjects_count == 0 {
        return Err("subjects_count must be greater than zero".to_owned());
    }
    if config.start_level == 0 {
        return Err("start_level must be >= 1".to_owned());
    }
    if config.seed_phrase.is_empty() {
        return Err("seed_phrase must not be empty".to_owned());
    }
    if config.seed_length == 0 {
        return Err("seed_length must be greater than zero".to_owned());
    }
    if config.ticks_per_second == 0 {
        return Err("ticks_per_second must be greater than zero".to_owned());
    }
    if !config.transition_delay_ms.is_finite() || config.transition_delay_ms < 0.0 {
        return Err("transition_delay_ms must be finite and >= 0".to_owned());
    }
    if !config.road.center_x.is_finite() {
        return Err("road.center_x must be finite".to_owned());
    }
    if !config.road.width.is_finite() || config.road.width <= 0.0 {
        return Err("road.width must be finite and greater than zero".to_owned());
    }
    if !config.road.border_extent.is_finite() || config.road.border_extent <= 0.0 {
        return Err("road.border_extent must be finite and greater than zero".to_owned());
    }
    if !config.camera.viewport_height.is_finite() || config.camera.viewport_height <= 0.0 {
        return Err("camera.viewport_height must be finite and greater than zero".to_owned());
    }
    if !(0.0..=1.0).contains(&config.camera.anchor) {
        return Err("camera.anchor must be within [0, 1]".to_owned());
    }
    validate_car_dimensions(
        "agent",
        config.agent.width,
        config.agent.height,
        config.agent.max_speed,
        config.agent.acceleration,
        config.agent.friction,
    )?;
    validate_car_dimensions(
        "traffic",
        config.traffic.width,
        config.traffic.height,
        config.traffic.max_speed,
        config.traffic.acceleration,
        config.traffic.friction,
    )?;
    if !(0.0..1.0).contains(&config.agent.pivot_offset)
        || !(0.0..1.0).contains(&config.traffic.pivot_offset)
    {
        return Err("pivot_offset must be within [0, 1)".to_owned());
    }
    if !config.traffic.spacing.is_finite() || config.traffic.spacing < 0.0 {
        return Err("traffic.spacing must be finite and >= 0".to_owned());
    }
    if !config.traffic.spacing_jitter_min.is_finite()
        || !config.traffic.spacing_jitter_max.is_finite()
    {
        return Err("traffic spacing jitter bounds must be finite".to_owned());
    }
    if config.sensor.ray_count == 0 {
        return Err("sensor.ray_count must be greater than zero".to_owned());
    }
    if !config.sensor.ray_length.is_finite() || config.sensor.ray_length <= 0.0 {
        return Err("sensor.ray_length must be finite and greater than zero".to_owned());
    }
    if !(0.0..=1.0).contains(&config.sensor.origin_fraction) {
        return Err("sensor.origin_fraction must be within [0, 1]".to_owned());
    }
    if !config.sensor.ray_spread.is_finite() || config.sensor.ray_spread < 0.0 {
        return Err("sensor.ray_spread must be finite and >= 0".to_owned());
    }
    if config.brain.hidden_layers.iter().any(|width| *width == 0) {
        return Err("brain.hidden_layers entries must be greater than zero".to_owned());
    }
    if !config.evolution.base_mutation_rate.is_finite()
        || config.evolution.base_mutation_rate < 0.0
    {
        return Err("evolution.base_mutation_rate must be finite and >= 0".to_owned());
    }
    if !config.evolution.attempt_scale.is_finite() || config.evolution.attempt_scale <= 0.0 {
        return Err("evolution.attempt_scale must be finite and greater than zero".to_owned());
    }
    if config.stalling.warmup_ms.is_nan() || config.stalling.warmup_ms < 0.0 {
        return Err("stalling.warmup_ms must be >= 0".to_owned());
    }
    if !config.stalling.idle_long_ms.is_finite() || !config.stalling.idle_short_ms.is_finite() {
        return Err("stalling idle windows must be finite".to_owned());
    }
    if config.stalling.idle_short_ms < 0.0
        || config.stalling.idle_short_ms > config.stalling.idle_long_ms
    {
        return Err("stalling.idle_short_ms must be within [0, idle_long_ms]".to_owned());
    }
    Ok(())
}

fn validate_car_dimensions(
    table: &str,
    width: f64,
    height: f64,
    max_speed: f64,
    acceleration: f64,
    friction: f64,
) -> Result<(), String> {
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(format!(
            "{table} width and height must be finite and greater than zero"
        ));
    }
    if !max_speed.is_finite() || max_speed <= 0.0 {
        return Err(format!("{table}.max_speed must be finite and greater than zero"));
    }
    if !acceleration.is_finite() || acceleration < 0.0 {
        return Err(format!("{table}.acceleration must be finite and >= 0"));
    }
    // Coasting cars must come to rest.
    if !friction.is_finite() || friction <= 0.0 {
        return Err(format!("{table}.friction must be finite and greater than zero"));
    }
    Ok(())
}

fn default_border_extent() -> f64 {
    1_000_000.0
}

fn default_pivot_offset() -> f64 {
    0.5
}

fn default_agent_lane() -> i32 {
    1
}

fn default_seed_length() -> u32 {
    100
}

fn default_start_level() -> u32 {
    1
}

fn default_ticks_per_second() -> u32 {
    60
}

fn default_transition_delay_ms() -> f64 {
    500.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_defaults_are_valid() {
        let cfg = default_simulation_config();
        validate_simulation_config(&cfg).expect("bundled defaults must validate");
        assert_eq!(cfg.brain_topology(), vec![5, 6, 4]);
        assert_eq!(cfg.seed_phrase, "beograd");
    }

    #[test]
    fn config_roundtrip() {
        let cfg = SimulationConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize config");
        let parsed: SimulationConfig = serde_json::from_str(&json).expect("deserialize config");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn optional_keys_fall_back_to_defaults() {
        let raw = include_str!("../default.toml")
            .lines()
            .filter(|line| {
                !line.starts_with("seed_length") && !line.starts_with("transition_delay_ms")
            })
            .collect::<Vec<_>>()
            .join("\n");

        let parsed = simulation_config_from_toml_str(&raw).expect("deserialize trimmed config");
        assert_eq!(parsed.seed_length, 100);
        assert_eq!(parsed.transition_delay_ms, 500.0);
    }

    #[test]
    fn validation_rejects_empty_population() {
        let mut cfg = SimulationConfig::default();
        cfg.subjects_count = 0;
        let err = validate_simulation_config(&cfg).expect_err("zero subjects must be rejected");
        assert!(err.contains("subjects_count"));
    }

    #[test]
    fn validation_rejects_inverted_stall_window() {
        let mut cfg = SimulationConfig::default();
        cfg.stalling.idle_short_ms = cfg.stalling.idle_long_ms + 1.0;
        let err = validate_simulation_config(&cfg).expect_err("inverted window must be rejected");
        assert!(err.contains("idle_short_ms"));
    }

    #[test]
    fn validation_rejects_nan_car_dimensions() {
        let mut cfg = SimulationConfig::default();
        cfg.agent.width = f64::NAN;
        let err = validate_simulation_config(&cfg).expect_err("NaN width must be rejected");
        assert!(err.contains("agent width"));

        let mut cfg = SimulationConfig::default();
        cfg.traffic.max_speed = f64::NAN;
        let err = validate_simulation_config(&cfg).expect_err("NaN speed must be rejected");
        assert!(err.contains("traffic.max_speed"));
    }

    #[test]
    fn validation_requires_positive_finite_friction() {
        for friction in [0.0, f64::NAN, f64::INFINITY] {
            let mut cfg = SimulationConfig::default();
            cfg.agent.friction = friction;
            let err = validate_simulation_config(&cfg).expect_err("friction must be rejected");
            assert!(err.contains("agent.friction"), "{friction}: {err}");
        }
    }

    #[test]
    fn validation_rejects_non_finite_scalars() {
        let cases: [(&str, fn(&mut SimulationConfig)); 7] = [
            ("road.center_x", |cfg| cfg.road.center_x = f64::NAN),
            ("camera.viewport_height", |cfg| {
                cfg.camera.viewport_height = f64::NAN
            }),
            ("traffic.spacing", |cfg| cfg.traffic.spacing = f64::INFINITY),
            ("jitter", |cfg| cfg.traffic.spacing_jitter_min = f64::NAN),
            ("origin_fraction", |cfg| cfg.sensor.origin_fraction = f64::NAN),
            ("warmup_ms", |cfg| cfg.stalling.warmup_ms = f64::NAN),
            ("idle windows", |cfg| cfg.stalling.idle_long_ms = f64::NAN),
        ];

        for (field, corrupt) in cases {
            let mut cfg = SimulationConfig::default();
            corrupt(&mut cfg);
            let err = validate_simulation_config(&cfg).expect_err("non-finite value accepted");
            assert!(err.contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn negative_enemy_count_fails_to_parse() {
        let raw = include_str!("../default.toml").replace("enemies_count = 5", "enemies_count = -1");
        assert!(simulation_config_from_toml_str(&raw).is_err());
    }
}
