use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;

/// How fresh layer parameters are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitScheme {
    /// Weights and biases from N(mean, std_dev).
    Normal { mean: f64, std_dev: f64 },
    /// Weights from U(±sqrt(6 / fan_in)), biases zero.
    HeUniform,
}

impl Default for InitScheme {
    fn default() -> Self {
        InitScheme::Normal { mean: 0.0, std_dev: 0.5 }
    }
}

impl InitScheme {
    /// Returns `(weights, biases)` for a layer mapping `input_size` to `size`.
    pub fn sample<R: Rng + ?Sized>(&self, input_size: usize, size: usize, rng: &mut R) -> (Matrix, Matrix) {
        match *self {
            InitScheme::Normal { mean, std_dev } => (
                Matrix::normal(input_size, size, mean, std_dev, rng),
                Matrix::normal(1, size, mean, std_dev, rng),
            ),
            InitScheme::HeUniform => (
                Matrix::he_uniform(input_size, size, rng),
                Matrix::zeros(1, size),
            ),
        }
    }
}
