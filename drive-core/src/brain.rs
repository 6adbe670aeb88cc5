use crate::geometry::lerp;
use crate::SimError;
use drive_types::{BrainState, Controls, LayerState};
use rand::Rng;

const WEIGHT_MAX: f64 = 1.0;

/// Build a fully connected network for layer sizes `[n0, n1, ..., nk]` with
/// every weight and bias drawn uniformly from [-1, 1].
pub fn random_brain<R: Rng + ?Sized>(
    layer_sizes: &[usize],
    rng: &mut R,
) -> Result<BrainState, SimError> {
    if layer_sizes.len() < 2 || layer_sizes.contains(&0) {
        return Err(SimError::EmptyTopology(layer_sizes.to_vec()));
    }

    let layers = layer_sizes
        .windows(2)
        .map(|pair| random_layer(pair[0], pair[1], rng))
        .collect();

    Ok(BrainState { layers })
}

fn random_layer<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> LayerState {
    let biases = (0..outputs).map(|_| random_value(rng)).collect();
    let weights = (0..outputs)
        .map(|_| (0..inputs).map(|_| random_value(rng)).collect())
        .collect();

    LayerState {
        input_count: inputs as u32,
        biases,
        weights,
    }
}

fn random_value<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random_range(-WEIGHT_MAX..=WEIGHT_MAX)
}

/// Evaluate the network. Every neuron is a step perceptron: it fires (1.0)
/// when the weighted sum of its inputs exceeds its bias, otherwise 0.0.
///
/// `inputs` must match the first layer's width; cars guarantee this at
/// construction by checking the brain against their sensor. The result for
/// any other length is unspecified: surplus inputs are ignored and missing
/// ones contribute nothing. Call [`validate_brain`] first when the widths
/// are not already known to agree.
pub fn feed_forward(brain: &BrainState, inputs: &[f64]) -> Vec<f64> {
    debug_assert_eq!(inputs.len(), brain.input_count());

    let mut activations = inputs.to_vec();
    for layer in &brain.layers {
        activations = layer
            .weights
            .iter()
            .zip(&layer.biases)
            .map(|(row, bias)| {
                let sum: f64 = row.iter().zip(&activations).map(|(w, a)| w * a).sum();
                if sum > *bias {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
    }
    activations
}

pub fn controls_for(brain: &BrainState, inputs: &[f64]) -> Controls {
    Controls::from_outputs(&feed_forward(brain, inputs))
}

/// Blend every weight and bias toward a fresh uniform sample by `rate`.
/// A rate of 0 leaves values untouched; 1 replaces them outright.
pub fn mutate_brain<R: Rng + ?Sized>(brain: &mut BrainState, rate: f64, rng: &mut R) {
    for layer in &mut brain.layers {
        for bias in &mut layer.biases {
            *bias = blend(*bias, rate, rng);
        }
        for row in &mut layer.weights {
            for weight in row {
                *weight = blend(*weight, rate, rng);
            }
        }
    }
}

fn blend<R: Rng + ?Sized>(value: f64, rate: f64, rng: &mut R) -> f64 {
    let target = random_value(rng);
    if rate >= 1.0 {
        target
    } else {
        lerp(value, target, rate)
    }
}

/// Check that `brain` is a well-formed chain of layers with the expected
/// input and output widths.
pub fn validate_brain(brain: &BrainState, inputs: usize, outputs: usize) -> Result<(), SimError> {
    if brain.layers.is_empty() {
        return Err(SimError::EmptyTopology(Vec::new()));
    }
    if brain.input_count() != inputs {
        return Err(SimError::TopologyMismatch {
            expected: inputs,
            actual: brain.input_count(),
        });
    }
    if brain.output_count() != outputs {
        return Err(SimError::TopologyMismatch {
            expected: outputs,
            actual: brain.output_count(),
        });
    }

    let mut width = inputs;
    for layer in &brain.layers {
        if layer.input_count as usize != width {
            return Err(SimError::TopologyMismatch {
                expected: width,
                actual: layer.input_count as usize,
            });
        }
        if layer.weights.len() != layer.biases.len()
            || layer.weights.iter().any(|row| row.len() != width)
        {
            return Err(SimError::MalformedBrain(
                "weight rows must match layer widths".to_owned(),
            ));
        }
        width = layer.output_count();
    }
    Ok(())
}

pub fn encode_brain(brain: &BrainState) -> Result<String, serde_json::Error> {
    serde_json::to_string(brain)
}

pub fn decode_brain(raw: &str) -> Result<BrainState, serde_json::Error> {
    serde_json::from_str(raw)
}
