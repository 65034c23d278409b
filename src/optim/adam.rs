use crate::{
    gradient::backprop::Gradients,
    math::matrix::Matrix,
    network::network::Network,
};

pub const BETA1: f64 = 0.9;
pub const BETA2: f64 = 0.999;
pub const EPSILON: f64 = 1e-8;

/// Adam with bias-corrected first and second moments.
///
/// Moments are stored parallel to the network's parameter registry. The
/// learning rate is passed per step so a schedule can drive it.
#[derive(Debug, Clone)]
pub struct Adam {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    step: u64,
    m: Vec<Matrix>,
    v: Vec<Matrix>,
}

impl Adam {
    pub fn new(network: &Network) -> Adam {
        let zeros = |network: &Network| -> Vec<Matrix> {
            network
                .registry()
                .iter()
                .map(|p| Matrix::zeros(p.shape.0, p.shape.1))
                .collect()
        };
        Adam {
            beta1: BETA1,
            beta2: BETA2,
            eps: EPSILON,
            step: 0,
            m: zeros(network),
            v: zeros(network),
        }
    }

    /// Number of updates applied so far.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Applies one update to every registered parameter.
    pub fn step(&mut self, network: &mut Network, grads: &Gradients, lr: f64) {
        self.step += 1;
        let t = self.step as i32;
        let corr1 = 1.0 - self.beta1.powi(t);
        let corr2 = 1.0 - self.beta2.powi(t);
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.eps);

        let params = network.parameters_mut();
        assert_eq!(params.len(), grads.params.len(), "gradient count does not match the registry");

        for (((param, g), m), v) in params
            .into_iter()
            .zip(&grads.params)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            for r in 0..param.rows {
                for c in 0..param.cols {
                    let gi = g.data[r][c];
                    let mi = &mut m.data[r][c];
                    let vi = &mut v.data[r][c];
                    *mi = beta1 * *mi + (1.0 - beta1) * gi;
                    *vi = beta2 * *vi + (1.0 - beta2) * gi * gi;

                    let m_hat = *mi / corr1;
                    let v_hat = *vi / corr2;
                    param.data[r][c] -= lr * m_hat / (v_hat.sqrt() + eps);
                }
            }
        }
    }
}
