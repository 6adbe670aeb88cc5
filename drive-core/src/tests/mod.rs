pub(super) use super::*;
pub(super) use crate::brain::{
    decode_brain, encode_brain, feed_forward, mutate_brain, random_brain, validate_brain,
};
pub(super) use crate::geometry::{lerp, polygons_intersect, segment_intersection};
pub(super) use drive_config::SimulationConfig;
pub(super) use drive_types::{Controls, LayerState, Point, Segment};
pub(super) use rand::SeedableRng;

mod geometry_and_road;
mod persistence;
mod support;
