use crate::car::Car;
use crate::geometry::lerp;
use crate::Simulation;
use drive_types::{CarId, SimEvent, SimPhase, TickDelta};
use rayon::prelude::*;
use tracing::{error, info};

impl Simulation {
    /// Advance one frame. `Running` ticks update the world; terminal phases
    /// only run the clock until their scheduled retry or level advance.
    pub fn tick(&mut self) -> TickDelta {
        match self.phase {
            SimPhase::Idle => {}
            SimPhase::Running => {
                self.tick = self.tick.saturating_add(1);
                self.running_tick();
            }
            SimPhase::Extinct { resume_at_ms } => {
                self.tick = self.tick.saturating_add(1);
                self.elapsed_ms += self.config.tick_ms();
                if self.elapsed_ms >= resume_at_ms {
                    if let Err(err) = self.retry() {
                        error!("failed to rebuild attempt after extinction: {err}");
                        self.phase = SimPhase::Idle;
                    }
                }
            }
            SimPhase::LevelCleared { resume_at_ms } => {
                self.tick = self.tick.saturating_add(1);
                self.elapsed_ms += self.config.tick_ms();
                if self.elapsed_ms >= resume_at_ms {
                    if let Err(err) = self.advance_level() {
                        error!("failed to build next level: {err}");
                        self.phase = SimPhase::Idle;
                    }
                }
            }
        }

        TickDelta {
            tick: self.tick,
            phase: self.phase,
            events: std::mem::take(&mut self.pending_events),
            status: self.status(),
        }
    }

    fn running_tick(&mut self) {
        self.elapsed_ms += self.config.tick_ms();
        let now = self.elapsed_ms;

        self.refresh_best();
        self.update_traffic();
        self.update_agents();
        self.track_overtakes(now);
        if now > self.config.stalling.warmup_ms {
            self.penalize_stalling(now);
        }
        self.cull_offscreen();
        self.refresh_best();
        self.check_terminal(now);
    }

    /// Traffic is scripted: it never senses and only collides with borders.
    fn update_traffic(&mut self) {
        let borders = self.road.borders();
        for car in &mut self.traffic {
            car.update(borders, &[]);
        }
    }

    /// Agents are independent given a fixed traffic snapshot, so they update
    /// in parallel. Damaged agents stay put but keep sensing.
    fn update_agents(&mut self) {
        let borders = self.road.borders();
        let traffic: &[Car] = &self.traffic;
        let crashed: Vec<CarId> = self
            .cars
            .par_iter_mut()
            .filter_map(|car| {
                let was_damaged = car.damaged();
                car.update(borders, traffic);
                (!was_damaged && car.damaged()).then_some(car.id())
            })
            .collect();

        self.pending_events
            .extend(crashed.into_iter().map(|car| SimEvent::Crashed { car }));
    }

    /// An agent overtakes a traffic car once its rear edge is ahead of the
    /// traffic car's front edge. Each pair is recorded once.
    fn track_overtakes(&mut self, now: f64) {
        for car in self.cars.iter().filter(|car| !car.damaged()) {
            let Some(stats) = self.stats.get_mut(&car.id()) else {
                continue;
            };
            let rear = car.rear_y();
            for enemy in &self.traffic {
                if enemy.front_y() > rear && stats.overtaken.insert(enemy.id()) {
                    stats.last_overtake_ms = now;
                    self.pending_events.push(SimEvent::Overtake {
                        agent: car.id(),
                        enemy: enemy.id(),
                    });
                }
            }
        }
    }

    /// Agents that go too long without overtaking are wrecked. The idle
    /// budget shrinks from `idle_long_ms` at rest to `idle_short_ms` at full
    /// speed.
    fn penalize_stalling(&mut self, now: f64) {
        if self.traffic.is_empty() {
            return;
        }
        let stalling = &self.config.stalling;

        for car in self.cars.iter_mut().filter(|car| !car.damaged()) {
            let last_overtake = self
                .stats
                .get(&car.id())
                .map_or(0.0, |stats| stats.last_overtake_ms);
            let ratio = (car.speed().abs() / car.body().max_speed).clamp(0.0, 1.0);
            let budget = lerp(stalling.idle_long_ms, stalling.idle_short_ms, ratio);

            if now - last_overtake > budget {
                car.mark_damaged();
                self.pending_events.push(SimEvent::Stalled { car: car.id() });
            }
        }
    }

    /// Drop traffic and wrecked agents that have fallen below the bottom of
    /// the camera window.
    fn cull_offscreen(&mut self) {
        let Some(best_y) = self.best_car().map(Car::y) else {
            return;
        };
        let camera = &self.config.camera;
        let limit = best_y + camera.viewport_height * (1.0 - camera.anchor);

        self.traffic.retain(|car| car.front_y() <= limit);
        self.cars
            .retain(|car| !car.damaged() || car.front_y() <= limit);

        let cars = &self.cars;
        self.stats
            .retain(|id, _| cars.iter().any(|car| car.id() == *id));
    }

    fn check_terminal(&mut self, now: f64) {
        let resume_at_ms = now + self.config.transition_delay_ms;
        let alive = self.alive_count();

        if alive == 0 {
            info!(level = self.level, attempt = self.attempt, "population extinct");
            self.phase = SimPhase::Extinct { resume_at_ms };
            self.pending_events.push(SimEvent::Extinct);
        } else if self.enemies_left() == 0 {
            let survival_rate = alive as f64 / f64::from(self.config.subjects_count);
            info!(level = self.level, survival_rate, "level cleared");
            self.cleared_winner = self
                .best_car()
                .and_then(|car| car.brain().map(|brain| (car.id(), brain.clone())));
            self.phase = SimPhase::LevelCleared { resume_at_ms };
            self.pending_events.push(SimEvent::LevelCleared {
                level: self.level,
                survival_rate,
            });
        }
    }
}
