use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamRole {
    Weight,
    Bias,
}

/// One trainable array of a network.
///
/// The registry is built once when the network is constructed. Gradients and
/// optimizer moments are stored as lists parallel to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// `W_<layer>` or `b_<layer>`.
    pub id: String,
    pub layer: usize,
    pub shape: (usize, usize),
    pub role: ParamRole,
}

impl ParamSpec {
    pub fn weight(layer: usize, shape: (usize, usize)) -> ParamSpec {
        ParamSpec { id: format!("W_{layer}"), layer, shape, role: ParamRole::Weight }
    }

    pub fn bias(layer: usize, shape: (usize, usize)) -> ParamSpec {
        ParamSpec { id: format!("b_{layer}"), layer, shape, role: ParamRole::Bias }
    }
}
