use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    math::matrix::{hadamard, Matrix},
    network::init::InitScheme,
};

/// Fully connected layer: `a = f(x · W + b)`.
///
/// `weights` has shape `[input_size, size]`, `biases` has shape `[1, size]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer{
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        init: &InitScheme,
        rng: &mut R,
    ) -> Layer {
        let (weights, biases) = init.sample(input_size, size, rng);

        Layer {
            weights,
            biases,
            activator: activation
        }
    }

    /// Wraps existing parameter arrays. A bias stored as a flat vector of
    /// length `size` is accepted alongside the `[1, size]` row form.
    pub fn from_parameters(weights: Matrix, biases: Matrix, activation: ActivationFunction) -> Result<Layer> {
        let biases = if biases.cols == 1 && biases.rows == weights.cols && weights.cols != 1 {
            biases.transpose()
        } else {
            biases
        };
        if biases.rows != 1 {
            return Err(Error::mismatch("bias rows", biases.rows, 1));
        }
        if biases.cols != weights.cols {
            return Err(Error::mismatch("bias length", biases.cols, weights.cols));
        }
        Ok(Layer { weights, biases, activator: activation })
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn size(&self) -> usize {
        self.weights.cols
    }

    /// Pre-activation values `z = x · W + b` for a batch of row samples.
    pub fn pre_activation(&self, input: &Matrix) -> Matrix {
        input.matmul(&self.weights).add_row(&self.biases)
    }

    /// Returns `(z, a)`; `z` is kept by the caller for the backward pass.
    pub fn feed_from(&self, input: &Matrix) -> (Matrix, Matrix) {
        let z = self.pre_activation(input);
        let a = z.map(|x| self.activator.function(x));
        (z, a)
    }

    /// Computes gradient adjustments. Returns `(weights_grad, biases_grad, delta)`.
    ///
    /// `activation_grad` is ∂L/∂a for this layer and `pre_activation` the `z`
    /// stored by `feed_from`. `delta` is ∂L/∂z, which `backpropagate` turns
    /// into ∂L/∂a of the previous layer. Gradients are summed over the batch
    /// rows; any averaging is already folded into `activation_grad`.
    pub fn compute_gradients(
        &self,
        activation_grad: &Matrix,
        pre_activation: &Matrix,
        inputs: &Matrix,
    ) -> (Matrix, Matrix, Matrix) {
        let act_derivative = pre_activation.map(|x| self.activator.derivative(x));
        // δ = error ⊙ σ'(z)
        let delta = hadamard(activation_grad, &act_derivative);

        let weights_grad = inputs.transpose().matmul(&delta);
        let biases_grad = delta.column_sums();

        (weights_grad, biases_grad, delta)
    }

    /// Propagates δ_i through the weights to get ∂L/∂a_{i-1}.
    pub fn backpropagate(&self, delta: &Matrix) -> Matrix {
        delta.matmul(&self.weights.transpose())
    }
}
