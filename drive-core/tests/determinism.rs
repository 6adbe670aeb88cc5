use drive_config::SimulationConfig;
use drive_core::{BrainStore, MemoryBrainStore, Simulation, BEST_BRAIN_KEY};
use drive_types::{SimEvent, SimPhase};

fn small_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.subjects_count = 20;
    config.enemies_count = 3;
    config.rng_seed = 42;
    config
}

fn trace(config: SimulationConfig, ticks: u32) -> Vec<String> {
    let mut sim = Simulation::with_memory_store(config).expect("simulation init");
    sim.start();
    sim.export_trace_jsonl(ticks).expect("trace serializes")
}

#[test]
fn same_config_replays_identically() {
    let a = trace(small_config(), 600);
    let b = trace(small_config(), 600);
    assert_eq!(a.len(), 601);
    assert_eq!(a, b);
}

#[test]
fn rng_seed_changes_brains_but_not_traffic() {
    let mut other = small_config();
    other.rng_seed = 43;

    let a = Simulation::with_memory_store(small_config()).expect("simulation init");
    let b = Simulation::with_memory_store(other).expect("simulation init");

    let positions = |sim: &Simulation| -> Vec<(f64, f64)> {
        sim.traffic().iter().map(|car| (car.x(), car.y())).collect()
    };
    assert_eq!(positions(&a), positions(&b));
    assert_ne!(a.cars()[0].brain(), b.cars()[0].brain());
}

#[test]
fn long_run_keeps_engine_invariants() {
    let mut sim = Simulation::with_memory_store(small_config()).expect("simulation init");
    sim.start();

    let mut levels_seen = vec![sim.level()];
    for delta in sim.step_n(3_000) {
        let status = &delta.status;
        assert!(status.alive_count <= status.population_size);
        assert!(status.enemies_left <= status.total_enemies);
        assert!((0.0..=1.0).contains(&status.mutation_rate));
        assert!(delta.phase != SimPhase::Idle);

        for event in &delta.events {
            if let SimEvent::AttemptStarted { level, .. } = event {
                levels_seen.push(*level);
            }
        }
    }

    assert!(levels_seen.windows(2).all(|pair| pair[1] >= pair[0]));
    assert!(sim.cars().iter().all(|car| car.polygon().len() == 4));
}

#[test]
fn saved_brain_survives_into_a_fresh_engine() {
    let mut first = Simulation::with_memory_store(small_config()).expect("simulation init");
    first.save().expect("save best brain");
    let raw = first
        .store()
        .get(BEST_BRAIN_KEY)
        .expect("memory get")
        .expect("saved brain");
    let saved = first.best_car().and_then(|car| car.brain()).cloned();

    let mut store = MemoryBrainStore::new();
    store.put(BEST_BRAIN_KEY, &raw).expect("memory put");
    let second = Simulation::new(small_config(), Box::new(store)).expect("simulation init");

    assert_eq!(second.cars()[0].brain().cloned(), saved);
}
