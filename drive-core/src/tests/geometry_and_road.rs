use super::support::approx;
use super::*;

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn square(x: f64, y: f64, half: f64) -> Vec<Point> {
    vec![
        p(x - half, y - half),
        p(x + half, y - half),
        p(x + half, y + half),
        p(x - half, y + half),
    ]
}

#[test]
fn crossing_segments_report_offset_along_first() {
    let touch = segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(4.0, -5.0), p(4.0, 5.0))
        .expect("segments cross");
    assert!(approx(touch.offset, 0.4));
    assert!(approx(touch.point.x, 4.0));
    assert!(approx(touch.point.y, 0.0));
}

#[test]
fn intersection_point_is_order_independent() {
    let (a, b, c, d) = (p(0.0, 0.0), p(8.0, 8.0), p(0.0, 8.0), p(8.0, 0.0));
    let forward = segment_intersection(a, b, c, d).expect("diagonals cross");
    let swapped = segment_intersection(c, d, a, b).expect("diagonals cross");
    assert!(approx(forward.point.x, swapped.point.x));
    assert!(approx(forward.point.y, swapped.point.y));
    assert!(approx(forward.offset, 0.5));
}

#[test]
fn lines_crossing_outside_either_segment_do_not_touch() {
    // Infinite lines meet at (12, 0), beyond the first segment's end.
    assert!(segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(12.0, -1.0), p(12.0, 1.0)).is_none());
    // Meets the first segment's line at x=4 but above the second segment.
    assert!(segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(4.0, 1.0), p(4.0, 5.0)).is_none());
}

#[test]
fn parallel_and_collinear_segments_never_touch() {
    assert!(segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(0.0, 1.0), p(10.0, 1.0)).is_none());
    assert!(segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(5.0, 0.0), p(15.0, 0.0)).is_none());
}

#[test]
fn touching_endpoints_count_as_contact() {
    let touch = segment_intersection(p(0.0, 0.0), p(10.0, 0.0), p(10.0, -1.0), p(10.0, 1.0))
        .expect("endpoint contact");
    assert!(approx(touch.offset, 1.0));
}

#[test]
fn overlapping_polygons_intersect_and_disjoint_ones_do_not() {
    let a = square(0.0, 0.0, 5.0);
    let overlapping = square(6.0, 0.0, 5.0);
    let far = square(30.0, 0.0, 5.0);

    assert!(polygons_intersect(&a, &overlapping));
    assert!(polygons_intersect(&overlapping, &a));
    assert!(!polygons_intersect(&a, &far));
}

#[test]
fn closing_edge_participates_in_polygon_tests() {
    // Only the closing edge (last point back to first) crosses the wall.
    let polygon = vec![p(0.0, 0.0), p(0.0, 10.0), p(-10.0, 10.0)];
    let wall = Segment::new(p(-5.0, 2.0), p(-5.0, 8.0));
    assert!(crate::geometry::polygon_hits_segment(&polygon, &wall));
}

#[test]
fn lerp_extrapolates_outside_unit_range() {
    assert!(approx(lerp(2.0, 4.0, 0.5), 3.0));
    assert!(approx(lerp(2.0, 4.0, 1.5), 5.0));
    assert!(approx(lerp(2.0, 4.0, -1.0), 0.0));
}

#[test]
fn lane_centers_split_road_evenly() {
    let road = Road::new(130.0, 210.0, 1e6);
    assert!(approx(road.left(), 25.0));
    assert!(approx(road.right(), 235.0));
    assert!(approx(road.lane_width(), 70.0));
    assert!(approx(road.lane_center(0), 60.0));
    assert!(approx(road.lane_center(1), 130.0));
    assert!(approx(road.lane_center(2), 200.0));
}

#[test]
fn out_of_range_lanes_clamp_to_edges() {
    let road = Road::new(130.0, 210.0, 1e6);
    assert!(approx(road.lane_center(-3), road.lane_center(0)));
    assert!(approx(road.lane_center(9), road.lane_center(2)));
}

#[test]
fn borders_are_vertical_at_road_edges() {
    let road = Road::new(0.0, 100.0, 500.0);
    let borders = road.borders();
    assert_eq!(borders.len(), 2);
    for (border, x) in borders.iter().zip([-50.0, 50.0]) {
        assert!(approx(border.start.x, x));
        assert!(approx(border.end.x, x));
        assert!(approx(border.start.y, -500.0));
        assert!(approx(border.end.y, 500.0));
    }
}
