use drive_types::{Point, Segment, Touch};

/// Determinants smaller than this are treated as parallel lines.
const PARALLEL_EPSILON: f64 = 1e-10;

/// Linear interpolation; `t` is not clamped so callers may extrapolate.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Intersection of segment `a -> b` with segment `c -> d`.
///
/// The returned offset is the fraction along the first segment. Parallel and
/// collinear pairs report no intersection.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Touch> {
    let t_top = (d.x - c.x) * (a.y - c.y) - (d.y - c.y) * (a.x - c.x);
    let u_top = (c.y - a.y) * (a.x - b.x) - (c.x - a.x) * (a.y - b.y);
    let bottom = (d.y - c.y) * (b.x - a.x) - (d.x - c.x) * (b.y - a.y);

    if bottom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = t_top / bottom;
    let u = u_top / bottom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some(Touch {
        point: Point::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t)),
        offset: t,
    })
}

pub fn segment_touch(ray: &Segment, wall: &Segment) -> Option<Touch> {
    segment_intersection(ray.start, ray.end, wall.start, wall.end)
}

/// Closed-loop edges of a polygon: edge `i` joins point `i` to point `(i + 1) % n`.
pub fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| Segment::new(polygon[i], polygon[(i + 1) % n]))
}

pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    polygon_edges(a).any(|edge_a| {
        polygon_edges(b).any(|edge_b| segment_touch(&edge_a, &edge_b).is_some())
    })
}

pub fn polygon_hits_segment(polygon: &[Point], segment: &Segment) -> bool {
    polygon_edges(polygon).any(|edge| segment_touch(&edge, segment).is_some())
}
