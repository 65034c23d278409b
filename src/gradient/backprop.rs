use crate::{
    error::Result,
    loss::{mse::MseLoss, reduction::LossReduction},
    math::matrix::Matrix,
    network::network::Network,
};

/// Gradients of the reduced loss, one matrix per registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub params: Vec<Matrix>,
}

impl Gradients {
    pub fn zeros_like(network: &Network) -> Gradients {
        Gradients {
            params: network
                .registry()
                .iter()
                .map(|p| Matrix::zeros(p.shape.0, p.shape.1))
                .collect(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.params.iter().all(Matrix::is_finite)
    }
}

/// Loss evaluation and differentiation on top of a `Network`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradientComputer {
    pub reduction: LossReduction,
}

impl GradientComputer {
    pub fn new(reduction: LossReduction) -> GradientComputer {
        GradientComputer { reduction }
    }

    /// Per-output-channel MSE of a prediction.
    pub fn loss(&self, predicted: &Matrix, expected: &Matrix) -> Result<Vec<f64>> {
        MseLoss::loss(predicted, expected)
    }

    /// Evaluates `network` on `inputs` and returns the per-channel MSE.
    pub fn evaluate(&self, network: &Network, inputs: &Matrix, expected: &Matrix) -> Result<Vec<f64>> {
        let predicted = network.forward(inputs)?;
        self.loss(&predicted, expected)
    }

    /// Reverse-mode gradients of the reduced loss with respect to every
    /// weight and bias. Returns the per-channel loss alongside.
    pub fn param_gradients(
        &self,
        network: &Network,
        inputs: &Matrix,
        expected: &Matrix,
    ) -> Result<(Vec<f64>, Gradients)> {
        let cache = network.forward_cached(inputs)?;
        let losses = MseLoss::loss(cache.output(), expected)?;

        // ∂L/∂a_output
        let mut activation_grad = MseLoss::derivative(cache.output(), expected, self.reduction)?;
        let mut params = vec![Matrix::default(); 2 * network.num_layers()];

        for i in (0..network.num_layers()).rev() {
            let layer = network.layer(i);
            let (w_grad, b_grad, delta) = layer.compute_gradients(
                &activation_grad,
                &cache.pre_activations[i],
                cache.layer_input(i),
            );

            if i > 0 {
                activation_grad = layer.backpropagate(&delta);
            }

            params[2 * i] = w_grad;
            params[2 * i + 1] = b_grad;
        }

        Ok((losses, Gradients { params }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{activation::ActivationFunction, network::InitScheme};
    use rand::{rngs::StdRng, SeedableRng};

    fn reduced_loss(gc: &GradientComputer, net: &Network, x: &Matrix, y: &Matrix) -> f64 {
        gc.reduction.reduce(&gc.evaluate(net, x, y).unwrap())
    }

    #[test]
    fn gradients_match_finite_differences() {
        for act in [ActivationFunction::Elu, ActivationFunction::Tanh, ActivationFunction::Exponential] {
            let mut rng = StdRng::seed_from_u64(5);
            let net = Network::initialize(2, &[4, 3], 2, act, &InitScheme::default(), &mut rng).unwrap();
            let x = Matrix::from_data(vec![vec![0.1, 0.7], vec![0.9, 0.3], vec![0.4, 0.4]]);
            let y = Matrix::from_data(vec![vec![0.2, 0.5], vec![0.8, 0.1], vec![0.5, 0.5]]);
            let gc = GradientComputer::default();

            let (_, grads) = gc.param_gradients(&net, &x, &y).unwrap();
            let h = 1e-6;
            for (p, spec) in net.registry().iter().enumerate() {
                for r in 0..spec.shape.0 {
                    for c in 0..spec.shape.1 {
                        let mut plus = net.clone();
                        plus.parameters_mut()[p].data[r][c] += h;
                        let mut minus = net.clone();
                        minus.parameters_mut()[p].data[r][c] -= h;
                        let numeric = (reduced_loss(&gc, &plus, &x, &y) - reduced_loss(&gc, &minus, &x, &y)) / (2.0 * h);
                        let analytic = grads.params[p].data[r][c];
                        assert!(
                            (numeric - analytic).abs() < 1e-6,
                            "{act} {}[{r}][{c}]: numeric {numeric} analytic {analytic}",
                            spec.id
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn gradient_list_is_parallel_to_registry() {
        let mut rng = StdRng::seed_from_u64(9);
        let net = Network::initialize(3, &[5], 2, ActivationFunction::Relu, &InitScheme::HeUniform, &mut rng).unwrap();
        let x = Matrix::zeros(4, 3);
        let y = Matrix::zeros(4, 2);
        let (losses, grads) = GradientComputer::default().param_gradients(&net, &x, &y).unwrap();
        assert_eq!(losses.len(), 2);
        assert_eq!(grads.params.len(), net.registry().len());
        for (g, spec) in grads.params.iter().zip(net.registry()) {
            assert_eq!(g.shape(), spec.shape);
        }
    }
}
