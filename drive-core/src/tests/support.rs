use super::*;

pub(super) const FORWARD: Controls = Controls {
    forward: true,
    reverse: false,
    left: false,
    right: false,
};

pub(super) const IDLE: Controls = Controls {
    forward: false,
    reverse: false,
    left: false,
    right: false,
};

pub(super) fn test_config(subjects: u32, enemies: u32) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.subjects_count = subjects;
    config.enemies_count = enemies;
    config.rng_seed = 7;
    config
}

pub(super) fn new_sim(config: SimulationConfig) -> Simulation {
    Simulation::with_memory_store(config).expect("simulation should initialize")
}

/// A brain whose outputs ignore the sensor: zero weights everywhere, hidden
/// neurons never fire, and each output fires iff the matching control is set.
pub(super) fn constant_brain(topology: &[usize], controls: Controls) -> BrainState {
    let fire = [
        controls.forward,
        controls.reverse,
        controls.left,
        controls.right,
    ];
    let last = topology.len() - 2;
    let layers = topology
        .windows(2)
        .enumerate()
        .map(|(idx, pair)| {
            let biases = (0..pair[1])
                .map(|neuron| {
                    let fires = idx == last && fire.get(neuron).copied().unwrap_or(false);
                    if fires {
                        -1.0
                    } else {
                        1.0
                    }
                })
                .collect();
            LayerState {
                input_count: pair[0] as u32,
                biases,
                weights: vec![vec![0.0; pair[0]]; pair[1]],
            }
        })
        .collect();
    BrainState { layers }
}

pub(super) fn drive_agent(sim: &mut Simulation, idx: usize, controls: Controls) {
    let brain = constant_brain(&sim.config.brain_topology(), controls);
    sim.cars[idx]
        .set_brain(brain)
        .expect("constant brain must fit the sensor");
}

pub(super) fn traffic_car(sim: &mut Simulation, lane: i32, y: f64) -> Car {
    let id = sim.alloc_car_id();
    let x = sim.road.lane_center(lane);
    Car::scripted(id, x, y, CarBody::from(&sim.config.traffic), Controls::default())
}

/// Replace generated traffic with hand-placed cars.
pub(super) fn set_traffic(sim: &mut Simulation, cars: Vec<Car>) {
    sim.total_enemies = cars.len() as u32;
    sim.traffic = cars;
}

pub(super) fn agent_body() -> CarBody {
    CarBody::from(&SimulationConfig::default().agent)
}

pub(super) fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

pub(super) fn test_rng(seed: u64) -> rand_chacha::ChaCha8Rng {
    rand_chacha::ChaCha8Rng::seed_from_u64(seed)
}

#[derive(Debug, Default)]
pub(super) struct FailingStore;

impl BrainStore for FailingStore {
    fn put(&mut self, key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io {
            key: key.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io {
            key: key.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotConnected, "offline"),
        })
    }

    fn delete(&mut self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
