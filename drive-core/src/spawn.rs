use crate::brain::{decode_brain, mutate_brain, random_brain, validate_brain};
use crate::car::{Car, CarBody};
use crate::geometry::lerp;
use crate::road::{Road, LANE_COUNT};
use crate::sensor::Sensor;
use crate::store::BEST_BRAIN_KEY;
use crate::{AgentStats, SimError, Simulation};
use drive_config::TrafficConfig;
use drive_types::{BrainState, CarId, Controls};
use tracing::warn;

/// Repeat `phrase` to `length` UTF-16 units and map each unit to
/// `code % 10`. Pure: the same inputs always yield the same digits.
pub fn derive_seed(phrase: &str, length: usize) -> String {
    phrase
        .encode_utf16()
        .cycle()
        .take(length)
        .map(|unit| char::from(b'0' + (unit % 10) as u8))
        .collect()
}

/// Lane and y of the `index`-th traffic car (1-based), driven by one seed digit.
pub(crate) fn traffic_slot(
    digit: u32,
    index: usize,
    start_y: f64,
    road: &Road,
    config: &TrafficConfig,
) -> (f64, f64) {
    let lane = (digit % LANE_COUNT as u32) as i32;
    let jitter = lerp(
        config.spacing_jitter_min,
        config.spacing_jitter_max,
        f64::from(digit) / 10.0,
    );
    let y = start_y - config.spacing * index as f64 * jitter;
    (road.lane_center(lane), y)
}

impl Simulation {
    /// Agents start side by side in one lane. Car 0 is the lineage parent:
    /// it gets the carried brain untouched, every other car a mutated copy.
    /// Without a lineage brain every car starts from random weights.
    pub(crate) fn spawn_population(&mut self) -> Result<(), SimError> {
        let topology = self.config.brain_topology();
        let body = CarBody::from(&self.config.agent);
        let x = self.road.lane_center(self.config.agent.lane);
        let rate = self.mutation_rate();
        let lineage = self.lineage_brain();

        self.cars.clear();
        self.stats.clear();
        for idx in 0..self.config.subjects_count as usize {
            let brain = match &lineage {
                Some(parent) if idx == 0 => parent.clone(),
                Some(parent) => {
                    let mut child = parent.clone();
                    mutate_brain(&mut child, rate, &mut self.rng);
                    child
                }
                None => random_brain(&topology, &mut self.rng)?,
            };

            let id = self.alloc_car_id();
            let sensor = Sensor::new(&self.config.sensor);
            let car = Car::neural(id, x, 0.0, body, sensor, brain)?;
            self.stats.insert(id, AgentStats::default());
            self.cars.push(car);
        }

        self.parent_id = self.cars.first().map(Car::id);
        Ok(())
    }

    pub(crate) fn spawn_traffic(&mut self, start_y: f64) {
        let body = CarBody::from(&self.config.traffic);
        let digits: Vec<u32> = self
            .seed
            .chars()
            .filter_map(|c| c.to_digit(10))
            .collect();

        self.traffic.clear();
        for index in 1..=self.total_enemies as usize {
            let digit = digits.get(index).copied().unwrap_or(0);
            let (x, y) = traffic_slot(digit, index, start_y, &self.road, &self.config.traffic);
            let id = self.alloc_car_id();
            self.traffic
                .push(Car::scripted(id, x, y, body, Controls::default()));
        }
    }

    /// The brain to seed this attempt from: the one carried over from the
    /// previous level, else whatever the store holds. Unreadable or
    /// mismatched stored brains count as absent.
    fn lineage_brain(&mut self) -> Option<BrainState> {
        if let Some(brain) = &self.carried_brain {
            return Some(brain.clone());
        }

        let raw = match self.store.get(BEST_BRAIN_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("failed to read saved brain, starting fresh: {err}");
                return None;
            }
        };

        let brain = match decode_brain(&raw) {
            Ok(brain) => brain,
            Err(err) => {
                warn!("saved brain is not decodable, starting fresh: {err}");
                return None;
            }
        };

        let inputs = self.config.sensor.ray_count as usize;
        if let Err(err) = validate_brain(&brain, inputs, Controls::COUNT) {
            warn!("saved brain does not fit the sensor, starting fresh: {err}");
            return None;
        }

        self.carried_brain = Some(brain.clone());
        Some(brain)
    }

    pub(crate) fn alloc_car_id(&mut self) -> CarId {
        let id = CarId(self.next_car_id);
        self.next_car_id += 1;
        id
    }
}
