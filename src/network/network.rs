use rand::Rng;

use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    layers::dense::Layer,
    math::matrix::Matrix,
    network::init::InitScheme,
    network::registry::ParamSpec,
};

/// Intermediate values of one forward pass, kept for differentiation.
#[derive(Debug, Clone)]
pub struct ForwardCache {
    pub inputs: Matrix,
    /// `z_i` per layer.
    pub pre_activations: Vec<Matrix>,
    /// `a_i` per layer; the last entry is the network output.
    pub activations: Vec<Matrix>,
}

impl ForwardCache {
    pub fn output(&self) -> &Matrix {
        self.activations.last().unwrap_or(&self.inputs)
    }

    /// Input fed to layer `i`.
    pub fn layer_input(&self, i: usize) -> &Matrix {
        if i == 0 { &self.inputs } else { &self.activations[i - 1] }
    }
}

/// Multilayer perceptron: hidden layers share one activation, the output
/// layer is linear and the input pseudo-layer is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<Layer>,
    registry: Vec<ParamSpec>,
}

impl Network {
    /// Builds `hidden_widths.len() + 1` freshly initialized layers.
    pub fn initialize<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_widths: &[usize],
        output_dim: usize,
        activation: ActivationFunction,
        init: &InitScheme,
        rng: &mut R,
    ) -> Result<Network> {
        if input_dim == 0 || output_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "network needs at least one input and one output, got {input_dim} and {output_dim}"
            )));
        }
        if let Some((index, &width)) = hidden_widths.iter().enumerate().find(|&(_, &w)| w == 0) {
            return Err(Error::InvalidHiddenWidth { index, width });
        }

        let mut sizes = Vec::with_capacity(hidden_widths.len() + 2);
        sizes.push(input_dim);
        sizes.extend_from_slice(hidden_widths);
        sizes.push(output_dim);

        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let act = if i == last { ActivationFunction::Linear } else { activation };
                Layer::new(pair[1], pair[0], act, init, rng)
            })
            .collect();

        Network::from_layers(layers)
    }

    /// Rebuilds a network from raw per-layer arrays, e.g. a checkpoint.
    pub fn from_parameters(
        weights: Vec<Matrix>,
        biases: Vec<Matrix>,
        activation: ActivationFunction,
    ) -> Result<Network> {
        if weights.len() != biases.len() {
            return Err(Error::mismatch("bias array count", biases.len(), weights.len()));
        }

        let last = weights.len().saturating_sub(1);
        let layers = weights
            .into_iter()
            .zip(biases)
            .enumerate()
            .map(|(i, (w, b))| {
                let act = if i == last { ActivationFunction::Linear } else { activation };
                Layer::from_parameters(w, b, act)
            })
            .collect::<Result<Vec<_>>>()?;

        Network::from_layers(layers)
    }

    /// Assembles layers whose activations are already assigned, checking
    /// that consecutive shapes chain.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Network> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig("network needs at least one layer".to_owned()));
        }
        for pair in layers.windows(2) {
            if pair[1].input_size() != pair[0].size() {
                return Err(Error::mismatch("weight rows", pair[1].input_size(), pair[0].size()));
            }
        }

        let registry = layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                [
                    ParamSpec::weight(i, layer.weights.shape()),
                    ParamSpec::bias(i, layer.biases.shape()),
                ]
            })
            .collect();
        Ok(Network { layers, registry })
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].size()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, i: usize) -> &Layer {
        &self.layers[i]
    }

    /// Number of weight matrices (L).
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Neuron count of every boundary layer, `n_0..=n_L`.
    pub fn layer_sizes(&self) -> Vec<usize> {
        std::iter::once(self.input_dim())
            .chain(self.layers.iter().map(Layer::size))
            .collect()
    }

    pub fn hidden_widths(&self) -> Vec<usize> {
        self.layers[..self.layers.len() - 1].iter().map(Layer::size).collect()
    }

    /// Activation per boundary layer; the input entry is always linear.
    pub fn activations(&self) -> Vec<ActivationFunction> {
        std::iter::once(ActivationFunction::Linear)
            .chain(self.layers.iter().map(|l| l.activator))
            .collect()
    }

    /// Activation shared by the hidden layers, or linear when there are none.
    pub fn hidden_activation(&self) -> ActivationFunction {
        if self.layers.len() > 1 {
            self.layers[0].activator
        } else {
            ActivationFunction::Linear
        }
    }

    pub fn registry(&self) -> &[ParamSpec] {
        &self.registry
    }

    /// Parameters in registry order.
    pub fn parameters(&self) -> Vec<&Matrix> {
        self.layers
            .iter()
            .flat_map(|l| [&l.weights, &l.biases])
            .collect()
    }

    /// Mutable parameters in registry order. Crate-only so shapes stay in
    /// step with the registry.
    pub(crate) fn parameters_mut(&mut self) -> Vec<&mut Matrix> {
        self.layers
            .iter_mut()
            .flat_map(|l| [&mut l.weights, &mut l.biases])
            .collect()
    }

    pub fn weights(&self) -> Vec<&Matrix> {
        self.layers.iter().map(|l| &l.weights).collect()
    }

    pub fn biases(&self) -> Vec<&Matrix> {
        self.layers.iter().map(|l| &l.biases).collect()
    }

    /// Evaluation cost parameter: total number of weight entries.
    pub fn cost_parameter(&self) -> usize {
        self.layers.iter().map(|l| l.weights.len()).sum()
    }

    pub fn hidden_neuron_count(&self) -> usize {
        self.hidden_widths().iter().sum()
    }

    fn check_input(&self, input: &Matrix) -> Result<()> {
        if input.cols != self.input_dim() {
            return Err(Error::mismatch("input columns", input.cols, self.input_dim()));
        }
        Ok(())
    }

    /// Evaluates the network on a batch of normalized row samples.
    pub fn forward(&self, input: &Matrix) -> Result<Matrix> {
        self.check_input(input)?;
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.feed_from(&current).1;
        }
        Ok(current)
    }

    /// Forward pass that keeps every `z_i` and `a_i`.
    pub fn forward_cached(&self, input: &Matrix) -> Result<ForwardCache> {
        self.check_input(input)?;
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut activations: Vec<Matrix> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (z, a) = layer.feed_from(activations.last().unwrap_or(input));
            pre_activations.push(z);
            activations.push(a);
        }
        Ok(ForwardCache {
            inputs: input.clone(),
            pre_activations,
            activations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::registry::ParamRole;
    use rand::{rngs::StdRng, SeedableRng};

    fn build(hidden: &[usize]) -> Network {
        let mut rng = StdRng::seed_from_u64(42);
        Network::initialize(2, hidden, 3, ActivationFunction::Elu, &InitScheme::default(), &mut rng)
            .unwrap()
    }

    #[test]
    fn weight_shapes_chain() {
        for hidden in [vec![], vec![4], vec![20, 20], vec![7, 1, 9]] {
            let net = build(&hidden);
            assert_eq!(net.num_layers(), hidden.len() + 1);
            let sizes = net.layer_sizes();
            for (i, layer) in net.layers().iter().enumerate() {
                assert_eq!(layer.weights.shape(), (sizes[i], sizes[i + 1]));
                assert_eq!(layer.biases.shape(), (1, sizes[i + 1]));
            }
            assert_eq!(net.activations().len(), sizes.len());
        }
    }

    #[test]
    fn activations_are_linear_at_the_boundaries() {
        let net = build(&[5, 5]);
        assert_eq!(
            net.activations(),
            vec![
                ActivationFunction::Linear,
                ActivationFunction::Elu,
                ActivationFunction::Elu,
                ActivationFunction::Linear,
            ]
        );
    }

    #[test]
    fn registry_lists_weights_and_biases_in_order() {
        let net = build(&[4]);
        let ids: Vec<&str> = net.registry().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["W_0", "b_0", "W_1", "b_1"]);
        assert_eq!(net.registry()[2].shape, (4, 3));
        assert_eq!(net.registry()[3].role, ParamRole::Bias);
        for (spec, param) in net.registry().iter().zip(net.parameters()) {
            assert_eq!(spec.shape, param.shape());
        }
    }

    #[test]
    fn zero_width_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = Network::initialize(2, &[3, 0], 1, ActivationFunction::Relu, &InitScheme::HeUniform, &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHiddenWidth { index: 1, width: 0 }));
    }

    #[test]
    fn forward_is_deterministic() {
        let net = build(&[6, 6]);
        let x = Matrix::from_data(vec![vec![0.1, 0.9], vec![0.5, 0.5]]);
        assert_eq!(net.forward(&x).unwrap(), net.forward(&x).unwrap());
    }

    #[test]
    fn forward_rejects_wrong_column_count() {
        let net = build(&[4]);
        let x = Matrix::zeros(2, 3);
        let err = net.forward(&x).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { got: 3, expected: 2, .. }));
    }

    #[test]
    fn cached_output_matches_plain_forward() {
        let net = build(&[3]);
        let x = Matrix::from_data(vec![vec![0.2, 0.4]]);
        let cache = net.forward_cached(&x).unwrap();
        assert_eq!(cache.output(), &net.forward(&x).unwrap());
        assert_eq!(cache.pre_activations.len(), 2);
    }

    #[test]
    fn from_parameters_rejects_broken_chain() {
        let err = Network::from_parameters(
            vec![Matrix::zeros(2, 3), Matrix::zeros(4, 1)],
            vec![Matrix::zeros(1, 3), Matrix::zeros(1, 1)],
            ActivationFunction::Tanh,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { got: 4, expected: 3, .. }));
    }

    #[test]
    fn from_layers_builds_the_registry() {
        let mut rng = StdRng::seed_from_u64(5);
        let layers = build(&[4, 2]).layers().to_vec();
        let net = Network::from_layers(layers.clone()).unwrap();
        assert_eq!(net.registry(), build(&[4, 2]).registry());
        assert_eq!(net.registry().len(), 2 * layers.len());

        let stray = Layer::new(5, 7, ActivationFunction::Linear, &InitScheme::HeUniform, &mut rng);
        let mut broken = layers;
        broken.push(stray);
        let err = Network::from_layers(broken).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { got: 7, expected: 3, .. }));
        assert!(Network::from_layers(Vec::new()).is_err());
    }

    #[test]
    fn zero_input_weight_still_propagates_nan() {
        let net = Network::from_parameters(
            vec![Matrix::from_data(vec![vec![f64::NAN], vec![1.0]])],
            vec![Matrix::row_vector(vec![0.0])],
            ActivationFunction::Linear,
        )
        .unwrap();
        let out = net.forward(&Matrix::from_data(vec![vec![0.0, 1.0]])).unwrap();
        assert!(out.data[0][0].is_nan());
        assert!(!out.is_finite());
    }

    #[test]
    fn cost_parameter_counts_weight_entries() {
        let net = build(&[20, 20]);
        assert_eq!(net.cost_parameter(), 2 * 20 + 20 * 20 + 20 * 3);
        assert_eq!(net.hidden_neuron_count(), 40);
    }
}
