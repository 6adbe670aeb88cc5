use crate::car::{Car, Pose};
use crate::geometry::{lerp, polygon_edges, segment_touch};
use drive_config::SensorConfig;
use drive_types::{Point, Segment, Touch};

/// Fan of range-finder rays cast from a car's nose each tick.
#[derive(Debug, Clone)]
pub struct Sensor {
    ray_count: usize,
    ray_length: f64,
    ray_spread: f64,
    origin_fraction: f64,
    rays: Vec<Segment>,
    readings: Vec<Option<Touch>>,
}

impl Sensor {
    pub fn new(config: &SensorConfig) -> Self {
        let ray_count = config.ray_count as usize;
        Self {
            ray_count,
            ray_length: config.ray_length,
            ray_spread: config.ray_spread,
            origin_fraction: config.origin_fraction,
            rays: Vec::with_capacity(ray_count),
            readings: vec![None; ray_count],
        }
    }

    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn rays(&self) -> &[Segment] {
        &self.rays
    }

    pub fn readings(&self) -> &[Option<Touch>] {
        &self.readings
    }

    /// Controller inputs, one per ray: `1 - offset` for a hit, 0 for none.
    /// Closer obstacles give stronger signals.
    pub fn inputs(&self) -> Vec<f64> {
        self.readings
            .iter()
            .map(|reading| reading.map_or(0.0, |touch| 1.0 - touch.offset))
            .collect()
    }

    pub fn update(&mut self, pose: &Pose, borders: &[Segment], traffic: &[Car]) {
        self.cast_rays(pose);

        self.readings.clear();
        for ray in &self.rays {
            self.readings.push(nearest_touch(ray, borders, traffic));
        }
    }

    /// Rays sweep from `+spread/2` (left of heading) to `-spread/2`.
    pub fn cast_rays(&mut self, pose: &Pose) {
        self.rays.clear();

        // Distance from the pivot to the ray origin along the heading.
        let lead = lerp(
            pose.height * -0.25,
            pose.height * 0.75,
            1.0 - self.origin_fraction,
        );
        let origin = Point::new(
            pose.x - pose.angle.sin() * lead,
            pose.y - pose.angle.cos() * lead,
        );

        for i in 0..self.ray_count {
            let t = if self.ray_count == 1 {
                0.5
            } else {
                i as f64 / (self.ray_count - 1) as f64
            };
            let angle = lerp(self.ray_spread / 2.0, -self.ray_spread / 2.0, t) + pose.angle;
            let end = Point::new(
                origin.x - angle.sin() * self.ray_length,
                origin.y - angle.cos() * self.ray_length,
            );
            self.rays.push(Segment::new(origin, end));
        }
    }
}

fn nearest_touch(ray: &Segment, borders: &[Segment], traffic: &[Car]) -> Option<Touch> {
    let border_touches = borders.iter().filter_map(|border| segment_touch(ray, border));
    let traffic_touches = traffic.iter().flat_map(|car| {
        polygon_edges(car.polygon()).filter_map(|edge| segment_touch(ray, &edge))
    });

    border_touches
        .chain(traffic_touches)
        .min_by(|a, b| a.offset.total_cmp(&b.offset))
}
