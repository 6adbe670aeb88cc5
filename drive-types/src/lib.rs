use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub u64);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A wall or a polygon edge, from `start` to `end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// Nearest hit along a ray. `offset` is the fraction of the ray length
/// travelled before the hit: 0 at the origin, 1 at the far end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Touch {
    pub point: Point,
    pub offset: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Controls {
    pub forward: bool,
    pub reverse: bool,
    pub left: bool,
    pub right: bool,
}

impl Controls {
    /// Number of controller outputs; outputs map to fields in declaration order.
    pub const COUNT: usize = 4;

    pub fn from_outputs(outputs: &[f64]) -> Self {
        let fired = |idx: usize| outputs.get(idx).is_some_and(|value| *value > 0.0);
        Self {
            forward: fired(0),
            reverse: fired(1),
            left: fired(2),
            right: fired(3),
        }
    }
}

/// One fully connected layer. `weights[o][i]` connects input `i` to output `o`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerState {
    pub input_count: u32,
    pub biases: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
}

impl LayerState {
    pub fn output_count(&self) -> usize {
        self.biases.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrainState {
    pub layers: Vec<LayerState>,
}

impl BrainState {
    /// Layer sizes `[n0, n1, ..., nk]` as passed at construction.
    pub fn topology(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.layers.len() + 1);
        if let Some(first) = self.layers.first() {
            sizes.push(first.input_count as usize);
        }
        sizes.extend(self.layers.iter().map(LayerState::output_count));
        sizes
    }

    pub fn input_count(&self) -> usize {
        self.layers
            .first()
            .map_or(0, |layer| layer.input_count as usize)
    }

    pub fn output_count(&self) -> usize {
        self.layers.last().map_or(0, LayerState::output_count)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CarRole {
    Parent,
    Best,
    Agent,
    Traffic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase")]
pub enum SimPhase {
    Idle,
    Running,
    Extinct { resume_at_ms: f64 },
    LevelCleared { resume_at_ms: f64 },
}

impl SimPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SimPhase::Extinct { .. } | SimPhase::LevelCleared { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SimEvent {
    AttemptStarted {
        level: u32,
        attempt: u32,
        mutation_rate: f64,
    },
    Overtake {
        agent: CarId,
        enemy: CarId,
    },
    Crashed {
        car: CarId,
    },
    Stalled {
        car: CarId,
    },
    Extinct,
    LevelCleared {
        level: u32,
        survival_rate: f64,
    },
    CheckpointSaved {
        key: String,
    },
    PersistenceWarning {
        message: String,
    },
}

/// Scalar telemetry consumed once per rendered frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatusSnapshot {
    pub level: u32,
    pub attempt: u32,
    pub mutation_rate: f64,
    pub best_speed: f64,
    pub alive_count: u32,
    pub population_size: u32,
    pub enemies_left: u32,
    pub total_enemies: u32,
    pub fps: f64,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickDelta {
    pub tick: u64,
    pub phase: SimPhase,
    pub events: Vec<SimEvent>,
    pub status: StatusSnapshot,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CarView<'a> {
    pub id: CarId,
    pub role: CarRole,
    pub damaged: bool,
    pub polygon: &'a [Point],
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SensorView<'a> {
    pub rays: &'a [Segment],
    pub readings: &'a [Option<Touch>],
}

/// Everything a renderer needs for one frame, borrowed from the engine.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameView<'a> {
    pub borders: &'a [Segment],
    pub camera_y: f64,
    pub cars: Vec<CarView<'a>>,
    pub best_sensor: Option<SensorView<'a>>,
    pub best_brain: Option<&'a BrainState>,
}
