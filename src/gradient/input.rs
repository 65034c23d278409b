//! Derivatives of network outputs with respect to the normalized inputs.
//!
//! These are not needed for supervised training. They back physics
//! consistency checks such as monotonicity or curvature of a fitted
//! thermodynamic quantity.

use crate::{
    error::{Error, Result},
    gradient::backprop::GradientComputer,
    math::matrix::{hadamard, Matrix},
    network::network::Network,
};

/// Output values with first and second input derivatives of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondOrderDerivatives {
    /// Full network output, `[n_samples, n_out]`.
    pub outputs: Matrix,
    /// `∂y/∂x`, `[n_samples, n_in]`.
    pub first: Matrix,
    /// `∂/∂x (∂y/∂x_j)`, `[n_samples, n_in]`.
    pub second: Matrix,
}

impl GradientComputer {
    /// `∂y_out/∂x` for every sample, by back-propagating a unit seed on the
    /// chosen output channel down to the input layer.
    pub fn input_gradients(&self, network: &Network, inputs: &Matrix, output_index: usize) -> Result<Matrix> {
        check_index("output index", output_index, network.output_dim())?;
        let cache = network.forward_cached(inputs)?;

        let mut seed = Matrix::zeros(inputs.rows, network.output_dim());
        for row in seed.data.iter_mut() {
            row[output_index] = 1.0;
        }

        let mut activation_grad = seed;
        for (layer, z) in network.layers().iter().zip(&cache.pre_activations).rev() {
            let delta = hadamard(&activation_grad, &z.map(|v| layer.activator.derivative(v)));
            activation_grad = layer.backpropagate(&delta);
        }
        Ok(activation_grad)
    }

    /// Second derivatives `∂²y_out / ∂x_j ∂x_k` for all `k`, with
    /// `j = input_index`.
    ///
    /// Tangents of first and second order are carried forward through the
    /// same layers as the forward pass. Row `k` of the tangent matrices holds
    /// the derivative with respect to input `k`.
    pub fn input_second_derivative(
        &self,
        network: &Network,
        inputs: &Matrix,
        output_index: usize,
        input_index: usize,
    ) -> Result<SecondOrderDerivatives> {
        check_index("output index", output_index, network.output_dim())?;
        check_index("input index", input_index, network.input_dim())?;
        let outputs = network.forward(inputs)?;

        let n_in = network.input_dim();
        let mut first = Matrix::zeros(inputs.rows, n_in);
        let mut second = Matrix::zeros(inputs.rows, n_in);

        for s in 0..inputs.rows {
            let mut a = Matrix::row_vector(inputs.row(s).to_vec());
            let mut jac = Matrix::identity(n_in);
            let mut hess = Matrix::zeros(n_in, n_in);

            for layer in network.layers() {
                let z = layer.pre_activation(&a);
                let jz = jac.matmul(&layer.weights);
                let hz = hess.matmul(&layer.weights);

                let mut next_jac = Matrix::zeros(n_in, layer.size());
                let mut next_hess = Matrix::zeros(n_in, layer.size());
                for m in 0..layer.size() {
                    let d1 = layer.activator.derivative(z.data[0][m]);
                    let d2 = layer.activator.second_derivative(z.data[0][m]);
                    let jz_j = jz.data[input_index][m];
                    for k in 0..n_in {
                        next_jac.data[k][m] = d1 * jz.data[k][m];
                        next_hess.data[k][m] = d2 * jz_j * jz.data[k][m] + d1 * hz.data[k][m];
                    }
                }

                a = z.map(|v| layer.activator.function(v));
                jac = next_jac;
                hess = next_hess;
            }

            for k in 0..n_in {
                first.data[s][k] = jac.data[k][output_index];
                second.data[s][k] = hess.data[k][output_index];
            }
        }

        Ok(SecondOrderDerivatives { outputs, first, second })
    }
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(Error::mismatch(what, index, len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{activation::ActivationFunction, network::InitScheme};
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn network(act: ActivationFunction) -> Network {
        let mut rng = StdRng::seed_from_u64(21);
        Network::initialize(3, &[6, 5], 2, act, &InitScheme::default(), &mut rng).unwrap()
    }

    fn samples() -> Matrix {
        Matrix::from_data(vec![vec![0.1, 0.5, 0.9], vec![0.7, 0.2, 0.4]])
    }

    fn shifted(x: &Matrix, k: usize, h: f64) -> Matrix {
        let mut out = x.clone();
        for row in out.data.iter_mut() {
            row[k] += h;
        }
        out
    }

    #[test]
    fn first_derivative_matches_finite_differences() {
        let gc = GradientComputer::default();
        for act in [ActivationFunction::Tanh, ActivationFunction::Elu] {
            let net = network(act);
            let x = samples();
            let grad = gc.input_gradients(&net, &x, 1).unwrap();
            let h = 1e-6;
            for k in 0..3 {
                let plus = net.forward(&shifted(&x, k, h)).unwrap();
                let minus = net.forward(&shifted(&x, k, -h)).unwrap();
                for s in 0..x.rows {
                    let numeric = (plus.data[s][1] - minus.data[s][1]) / (2.0 * h);
                    assert_abs_diff_eq!(grad.data[s][k], numeric, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn second_derivative_matches_finite_differences_of_first() {
        let gc = GradientComputer::default();
        for act in [ActivationFunction::Tanh, ActivationFunction::Exponential] {
            let net = network(act);
            let x = samples();
            let j = 2;
            let d = gc.input_second_derivative(&net, &x, 0, j).unwrap();

            let reverse = gc.input_gradients(&net, &x, 0).unwrap();
            for s in 0..x.rows {
                for k in 0..3 {
                    assert_abs_diff_eq!(d.first.data[s][k], reverse.data[s][k], epsilon = 1e-10);
                }
            }

            let h = 1e-5;
            for k in 0..3 {
                let plus = gc.input_gradients(&net, &shifted(&x, k, h), 0).unwrap();
                let minus = gc.input_gradients(&net, &shifted(&x, k, -h), 0).unwrap();
                for s in 0..x.rows {
                    let numeric = (plus.data[s][j] - minus.data[s][j]) / (2.0 * h);
                    assert_abs_diff_eq!(d.second.data[s][k], numeric, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let gc = GradientComputer::default();
        let net = network(ActivationFunction::Tanh);
        assert!(gc.input_gradients(&net, &samples(), 2).is_err());
        assert!(gc.input_second_derivative(&net, &samples(), 0, 3).is_err());
    }
}
