use drive_config::RoadConfig;
use drive_types::{Point, Segment};

pub const LANE_COUNT: usize = 3;

/// Straight vertical corridor with two fixed borders.
#[derive(Debug, Clone)]
pub struct Road {
    center_x: f64,
    width: f64,
    left: f64,
    right: f64,
    borders: [Segment; 2],
}

impl Road {
    pub fn new(center_x: f64, width: f64, border_extent: f64) -> Self {
        let left = center_x - width / 2.0;
        let right = center_x + width / 2.0;
        let top = -border_extent;
        let bottom = border_extent;

        let borders = [
            Segment::new(Point::new(left, top), Point::new(left, bottom)),
            Segment::new(Point::new(right, top), Point::new(right, bottom)),
        ];

        Self {
            center_x,
            width,
            left,
            right,
            borders,
        }
    }

    pub fn from_config(config: &RoadConfig) -> Self {
        Self::new(config.center_x, config.width, config.border_extent)
    }

    pub fn center_x(&self) -> f64 {
        self.center_x
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn lane_width(&self) -> f64 {
        self.width / LANE_COUNT as f64
    }

    /// Out-of-range lanes clamp to the nearest edge lane.
    pub fn lane_center(&self, lane: i32) -> f64 {
        let lane = lane.clamp(0, LANE_COUNT as i32 - 1) as f64;
        self.left + self.lane_width() / 2.0 + lane * self.lane_width()
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn borders(&self) -> &[Segment] {
        &self.borders
    }
}
