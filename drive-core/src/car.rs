use crate::brain::{controls_for, validate_brain};
use crate::geometry::{polygon_hits_segment, polygons_intersect};
use crate::sensor::Sensor;
use crate::SimError;
use drive_config::{AgentConfig, TrafficConfig};
use drive_types::{BrainState, CarId, Controls, Point, Segment};
use std::f64::consts::PI;

const TURN_RATE: f64 = 0.02;
const MIN_TURN_RATE: f64 = 0.005;
/// Below this fraction of max speed steering scales linearly with speed.
const LOW_SPEED_FRACTION: f64 = 0.4;
const REVERSE_SPEED_DIVISOR: f64 = 4.0;
const BRAKE_MULTIPLIER: f64 = 5.0;

/// Position and heading a sensor needs to cast its rays.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub height: f64,
}

/// Physical constants shared by every car of one kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarBody {
    pub width: f64,
    pub height: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub friction: f64,
    pub pivot_offset: f64,
}

impl From<&AgentConfig> for CarBody {
    fn from(config: &AgentConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            max_speed: config.max_speed,
            acceleration: config.acceleration,
            friction: config.friction,
            pivot_offset: config.pivot_offset,
        }
    }
}

impl From<&TrafficConfig> for CarBody {
    fn from(config: &TrafficConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            max_speed: config.max_speed,
            acceleration: config.acceleration,
            friction: config.friction,
            pivot_offset: config.pivot_offset,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Pilot {
    /// Fixed controls that never change after construction.
    Scripted,
    /// Sensor readings feed the brain, whose outputs become the next controls.
    Neural { sensor: Sensor, brain: BrainState },
}

#[derive(Debug, Clone)]
pub struct Car {
    id: CarId,
    x: f64,
    y: f64,
    angle: f64,
    speed: f64,
    body: CarBody,
    damaged: bool,
    polygon: [Point; 4],
    controls: Controls,
    pilot: Pilot,
}

impl Car {
    pub fn scripted(id: CarId, x: f64, y: f64, body: CarBody, controls: Controls) -> Self {
        let mut car = Self {
            id,
            x,
            y,
            angle: 0.0,
            speed: 0.0,
            body,
            damaged: false,
            polygon: [Point::default(); 4],
            controls,
            pilot: Pilot::Scripted,
        };
        car.polygon = car.build_polygon();
        car
    }

    pub fn neural(
        id: CarId,
        x: f64,
        y: f64,
        body: CarBody,
        sensor: Sensor,
        brain: BrainState,
    ) -> Result<Self, SimError> {
        validate_brain(&brain, sensor.ray_count(), Controls::COUNT)?;
        let mut car = Self::scripted(id, x, y, body, Controls::default());
        car.pilot = Pilot::Neural { sensor, brain };
        Ok(car)
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn id(&self) -> CarId {
        self.id
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn body(&self) -> &CarBody {
        &self.body
    }

    pub fn max_reverse_speed(&self) -> f64 {
        self.body.max_speed / REVERSE_SPEED_DIVISOR
    }

    pub fn damaged(&self) -> bool {
        self.damaged
    }

    /// Damage is permanent.
    pub fn mark_damaged(&mut self) {
        self.damaged = true;
    }

    pub fn polygon(&self) -> &[Point] {
        &self.polygon
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn pilot(&self) -> &Pilot {
        &self.pilot
    }

    pub fn sensor(&self) -> Option<&Sensor> {
        match &self.pilot {
            Pilot::Neural { sensor, .. } => Some(sensor),
            Pilot::Scripted => None,
        }
    }

    pub fn brain(&self) -> Option<&BrainState> {
        match &self.pilot {
            Pilot::Neural { brain, .. } => Some(brain),
            Pilot::Scripted => None,
        }
    }

    /// Swap in a new brain; it must fit this car's sensor and control outputs.
    pub fn set_brain(&mut self, new_brain: BrainState) -> Result<(), SimError> {
        match &mut self.pilot {
            Pilot::Neural { sensor, brain } => {
                validate_brain(&new_brain, sensor.ray_count(), Controls::COUNT)?;
                *brain = new_brain;
                Ok(())
            }
            Pilot::Scripted => Err(SimError::InvalidConfig(format!(
                "car {} is scripted and carries no brain",
                self.id.0
            ))),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            x: self.x,
            y: self.y,
            angle: self.angle,
            height: self.body.height,
        }
    }

    /// Smallest y of the footprint (the leading edge when driving up).
    pub fn front_y(&self) -> f64 {
        self.polygon
            .iter()
            .map(|p| p.y)
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest y of the footprint.
    pub fn rear_y(&self) -> f64 {
        self.polygon
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Damaged cars no longer move or take controller output, but their
    /// sensor still reads the current world.
    pub fn update(&mut self, borders: &[Segment], traffic: &[Car]) {
        if !self.damaged {
            self.step_kinematics();
            self.polygon = self.build_polygon();
            if self.assess_damage(borders, traffic) {
                self.damaged = true;
            }
        }

        let pose = self.pose();
        if let Pilot::Neural { sensor, brain } = &mut self.pilot {
            sensor.update(&pose, borders, traffic);
            if !self.damaged {
                self.controls = controls_for(brain, &sensor.inputs());
            }
        }
    }

    fn assess_damage(&self, borders: &[Segment], traffic: &[Car]) -> bool {
        borders
            .iter()
            .any(|border| polygon_hits_segment(&self.polygon, border))
            || traffic
                .iter()
                .filter(|other| other.id != self.id)
                .any(|other| polygons_intersect(&self.polygon, other.polygon()))
    }

    fn step_kinematics(&mut self) {
        let acceleration = self.body.acceleration;
        let friction = self.body.friction;

        if self.controls.forward {
            self.speed += acceleration;
        }
        if self.controls.reverse {
            let brake = if self.speed > 0.0 {
                BRAKE_MULTIPLIER * acceleration
            } else {
                0.0
            };
            self.speed -= acceleration + brake;
        }

        if self.speed > 0.0 {
            self.speed -= friction;
        }
        if self.speed < 0.0 {
            self.speed += friction;
        }

        self.speed = self
            .speed
            .clamp(-self.max_reverse_speed(), self.body.max_speed);
        if self.speed.abs() < friction {
            self.speed = 0.0;
        }

        if self.speed != 0.0 {
            let turn = turn_rate(self.speed, self.body.max_speed);
            let flip = self.speed.signum();
            if self.controls.left {
                self.angle += turn * flip;
            }
            if self.controls.right {
                self.angle -= turn * flip;
            }
        }

        self.x -= self.angle.sin() * self.speed;
        self.y -= self.angle.cos() * self.speed;
    }

    /// Corners in order: front right, front left, rear left, rear right.
    /// The pivot sits `pivot_offset * height / 2` behind the geometric center.
    fn build_polygon(&self) -> [Point; 4] {
        let CarBody {
            width,
            height,
            pivot_offset,
            ..
        } = self.body;

        let front_len = height + height * pivot_offset;
        let rear_len = height - height * pivot_offset;
        let front_rad = width.hypot(front_len) / 2.0;
        let rear_rad = width.hypot(rear_len) / 2.0;
        let front_alpha = width.atan2(front_len);
        let rear_alpha = width.atan2(rear_len);

        let corner = |angle: f64, radius: f64| {
            Point::new(
                self.x - angle.sin() * radius,
                self.y - angle.cos() * radius,
            )
        };

        [
            corner(self.angle - front_alpha, front_rad),
            corner(self.angle + front_alpha, front_rad),
            corner(PI + self.angle - rear_alpha, rear_rad),
            corner(PI + self.angle + rear_alpha, rear_rad),
        ]
    }
}

fn turn_rate(speed: f64, max_speed: f64) -> f64 {
    let fraction = (speed / max_speed).abs();
    if fraction < LOW_SPEED_FRACTION {
        fraction * TURN_RATE
    } else {
        ((1.0 - fraction) * TURN_RATE).max(MIN_TURN_RATE)
    }
}
