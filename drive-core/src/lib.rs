use drive_config::{validate_simulation_config, SimulationConfig};
use drive_types::{
    BrainState, CarId, CarRole, CarView, FrameView, SensorView, SimEvent, SimPhase,
    StatusSnapshot, TickDelta,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

pub mod brain;
pub mod car;
pub mod geometry;
pub mod road;
pub mod sensor;
mod spawn;
pub mod store;
mod tick;

#[cfg(test)]
mod tests;

pub use car::{Car, CarBody, Pilot, Pose};
pub use road::{Road, LANE_COUNT};
pub use sensor::Sensor;
pub use spawn::derive_seed;
pub use store::{
    checkpoint_key, BrainStore, FileBrainStore, MemoryBrainStore, StoreError, BEST_BRAIN_KEY,
};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),
    #[error("controller topology mismatch: expected width {expected}, found {actual}")]
    TopologyMismatch { expected: usize, actual: usize },
    #[error("controller topology {0:?} needs at least two non-empty layers")]
    EmptyTopology(Vec<usize>),
    #[error("malformed brain: {0}")]
    MalformedBrain(String),
}

/// Per-agent overtake bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStats {
    pub overtaken: BTreeSet<CarId>,
    pub last_overtake_ms: f64,
}

#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    store: Box<dyn BrainStore>,
    rng: ChaCha8Rng,
    seed: String,
    phase: SimPhase,
    level: u32,
    attempt: u32,
    tick: u64,
    elapsed_ms: f64,
    next_car_id: u64,
    road: Road,
    cars: Vec<Car>,
    traffic: Vec<Car>,
    total_enemies: u32,
    stats: BTreeMap<CarId, AgentStats>,
    best_id: Option<CarId>,
    parent_id: Option<CarId>,
    carried_brain: Option<BrainState>,
    cleared_winner: Option<(CarId, BrainState)>,
    pending_events: Vec<SimEvent>,
}

impl Simulation {
    /// Validate `config` and build the first attempt. The engine starts `Idle`
    /// so a renderer can draw the initial frame before `start()`.
    pub fn new(config: SimulationConfig, store: Box<dyn BrainStore>) -> Result<Self, SimError> {
        validate_simulation_config(&config).map_err(SimError::InvalidConfig)?;

        let mut sim = Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            road: road::Road::from_config(&config.road),
            level: config.start_level,
            config,
            store,
            seed: String::new(),
            phase: SimPhase::Idle,
            attempt: 0,
            tick: 0,
            elapsed_ms: 0.0,
            next_car_id: 0,
            cars: Vec::new(),
            traffic: Vec::new(),
            total_enemies: 0,
            stats: BTreeMap::new(),
            best_id: None,
            parent_id: None,
            carried_brain: None,
            cleared_winner: None,
            pending_events: Vec::new(),
        };
        sim.initialize()?;
        Ok(sim)
    }

    pub fn with_memory_store(config: SimulationConfig) -> Result<Self, SimError> {
        Self::new(config, Box::new(MemoryBrainStore::new()))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Digit string steering traffic placement for the current attempt.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn road(&self) -> &Road {
        &self.road
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn traffic(&self) -> &[Car] {
        &self.traffic
    }

    pub fn total_enemies(&self) -> u32 {
        self.total_enemies
    }

    pub fn stats(&self, id: CarId) -> Option<&AgentStats> {
        self.stats.get(&id)
    }

    pub fn store(&self) -> &dyn BrainStore {
        self.store.as_ref()
    }

    /// Blend factor for offspring brains: shrinks with each level and grows
    /// slightly with every failed attempt inside a level.
    pub fn mutation_rate(&self) -> f64 {
        let evolution = &self.config.evolution;
        let rate = evolution.base_mutation_rate / f64::from(self.level.max(1))
            + f64::from(self.attempt) / evolution.attempt_scale;
        rate.clamp(0.0, 1.0)
    }

    pub fn best_car(&self) -> Option<&Car> {
        let id = self.best_id?;
        self.cars.iter().find(|car| car.id() == id)
    }

    pub fn parent_car(&self) -> Option<&Car> {
        let id = self.parent_id?;
        self.cars.iter().find(|car| car.id() == id)
    }

    pub fn alive_count(&self) -> usize {
        self.cars.iter().filter(|car| !car.damaged()).count()
    }

    pub fn enemies_left(&self) -> u32 {
        let overtaken = self
            .best_id
            .and_then(|id| self.stats.get(&id))
            .map_or(0, |stats| stats.overtaken.len());
        self.total_enemies
            .saturating_sub(u32::try_from(overtaken).unwrap_or(u32::MAX))
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            level: self.level,
            attempt: self.attempt,
            mutation_rate: self.mutation_rate(),
            best_speed: self.best_car().map_or(0.0, |car| car.speed().abs()),
            alive_count: self.alive_count() as u32,
            population_size: self.config.subjects_count,
            enemies_left: self.enemies_left(),
            total_enemies: self.total_enemies,
            fps: f64::from(self.config.ticks_per_second),
            elapsed_ms: self.elapsed_ms,
        }
    }

    pub fn frame(&self) -> FrameView<'_> {
        let best = self.best_car();
        let camera = &self.config.camera;
        let camera_y = best.map_or(0.0, |car| car.y()) - camera.viewport_height * camera.anchor;

        let traffic = self.traffic.iter().map(|car| CarView {
            id: car.id(),
            role: CarRole::Traffic,
            damaged: car.damaged(),
            polygon: car.polygon(),
        });
        let agents = self.cars.iter().map(|car| CarView {
            id: car.id(),
            role: self.role_of(car.id()),
            damaged: car.damaged(),
            polygon: car.polygon(),
        });

        FrameView {
            borders: self.road.borders(),
            camera_y,
            cars: traffic.chain(agents).collect(),
            best_sensor: best.and_then(Car::sensor).map(|sensor| SensorView {
                rays: sensor.rays(),
                readings: sensor.readings(),
            }),
            best_brain: best.and_then(Car::brain),
        }
    }

    fn role_of(&self, id: CarId) -> CarRole {
        if Some(id) == self.best_id {
            CarRole::Best
        } else if Some(id) == self.parent_id {
            CarRole::Parent
        } else {
            CarRole::Agent
        }
    }

    pub fn step_n(&mut self, count: u32) -> Vec<TickDelta> {
        let mut deltas = Vec::with_capacity(count as usize);
        for _ in 0..count {
            deltas.push(self.tick());
        }
        deltas
    }

    pub fn export_trace_jsonl(&mut self, ticks: u32) -> Result<Vec<String>, serde_json::Error> {
        let mut lines = Vec::with_capacity(ticks as usize + 1);
        lines.push(serde_json::to_string(&self.status())?);
        for _ in 0..ticks {
            let delta = self.tick();
            lines.push(serde_json::to_string(&delta)?);
        }
        Ok(lines)
    }

    pub fn start(&mut self) {
        if self.phase == SimPhase::Idle {
            self.phase = SimPhase::Running;
        }
    }

    /// Rebuild the current level as a new attempt.
    pub fn retry(&mut self) -> Result<(), SimError> {
        self.attempt = self.attempt.saturating_add(1);
        self.begin_attempt()
    }

    /// Back to level 1, attempt 0, reseeding the lineage from the store.
    pub fn restart(&mut self) -> Result<(), SimError> {
        self.level = 1;
        self.attempt = 0;
        self.carried_brain = None;
        self.begin_attempt()
    }

    /// Checkpoint the winning brain, carry it forward as the next parent and
    /// rebuild one level up.
    pub fn advance_level(&mut self) -> Result<(), SimError> {
        let winner = self.cleared_winner.take().or_else(|| {
            self.best_car()
                .and_then(|car| car.brain().map(|brain| (car.id(), brain.clone())))
        });

        if let Some((id, brain)) = winner {
            let key = checkpoint_key(id, &self.seed, self.level);
            self.persist_or_warn(&key, &brain);
            self.persist_or_warn(BEST_BRAIN_KEY, &brain);
            self.carried_brain = Some(brain);
        }

        self.level = self.level.saturating_add(1);
        self.attempt = 0;
        self.begin_attempt()
    }

    /// Persist the current best brain under [`BEST_BRAIN_KEY`].
    pub fn save(&mut self) -> Result<String, StoreError> {
        let Some(brain) = self.best_car().and_then(Car::brain).cloned() else {
            return Err(StoreError::NothingToSave);
        };
        self.persist(BEST_BRAIN_KEY, &brain)?;
        info!(level = self.level, "saved best brain");
        Ok(BEST_BRAIN_KEY.to_owned())
    }

    /// Discard the saved lineage. Later attempts start from random brains
    /// until a new one is saved or a level is cleared.
    pub fn delete_saved(&mut self) -> Result<(), StoreError> {
        self.store.delete(BEST_BRAIN_KEY)?;
        self.carried_brain = None;
        info!("discarded saved brain");
        Ok(())
    }

    fn persist(&mut self, key: &str, brain: &BrainState) -> Result<(), StoreError> {
        let raw = brain::encode_brain(brain).map_err(StoreError::Encode)?;
        self.store.put(key, &raw)
    }

    fn persist_or_warn(&mut self, key: &str, brain: &BrainState) {
        match self.persist(key, brain) {
            Ok(()) => {
                info!(key, "checkpoint saved");
                self.pending_events.push(SimEvent::CheckpointSaved {
                    key: key.to_owned(),
                });
            }
            Err(err) => {
                warn!("failed to persist brain {key}: {err}");
                self.pending_events.push(SimEvent::PersistenceWarning {
                    message: err.to_string(),
                });
            }
        }
    }

    fn destroy(&mut self) {
        self.phase = SimPhase::Idle;
        self.cars.clear();
        self.traffic.clear();
        self.stats.clear();
        self.best_id = None;
        self.parent_id = None;
        self.cleared_winner = None;
        self.elapsed_ms = 0.0;
    }

    fn begin_attempt(&mut self) -> Result<(), SimError> {
        self.destroy();
        self.initialize()?;
        self.start();
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), SimError> {
        self.phase = SimPhase::Idle;
        self.elapsed_ms = 0.0;
        self.road = Road::from_config(&self.config.road);
        self.total_enemies = self.config.enemies_count.saturating_mul(self.level);

        let seed_length = (self.config.seed_length as usize).max(self.total_enemies as usize + 1);
        self.seed = derive_seed(&self.config.seed_phrase, seed_length);

        self.spawn_population()?;
        self.refresh_best();
        let start_y = self.best_car().map_or(0.0, Car::y);
        self.spawn_traffic(start_y);

        info!(
            level = self.level,
            attempt = self.attempt,
            mutation_rate = self.mutation_rate(),
            "attempt started"
        );
        self.pending_events.push(SimEvent::AttemptStarted {
            level: self.level,
            attempt: self.attempt,
            mutation_rate: self.mutation_rate(),
        });
        Ok(())
    }

    /// Best car is the undamaged agent furthest up the road (smallest y);
    /// the previous pick is kept once every agent is damaged.
    fn refresh_best(&mut self) {
        let mut best: Option<&Car> = None;
        for car in self.cars.iter().filter(|car| !car.damaged()) {
            if best.map_or(true, |current| car.y() < current.y()) {
                best = Some(car);
            }
        }
        if let Some(car) = best {
            self.best_id = Some(car.id());
        }
    }
}
