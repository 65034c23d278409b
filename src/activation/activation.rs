use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Activation functions understood by the `.mlp` reader.
///
/// The declaration order is significant: `index()` is written to the
/// performance report as the activation function index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ActivationFunction {
    Linear,
    #[default]
    Elu,
    Relu,
    Tanh,
    Exponential,
}

impl ActivationFunction {
    pub const ALL: [ActivationFunction; 5] = [
        ActivationFunction::Linear,
        ActivationFunction::Elu,
        ActivationFunction::Relu,
        ActivationFunction::Tanh,
        ActivationFunction::Exponential,
    ];

    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Linear => x,
            ActivationFunction::Elu => if x > 0.0 { x } else { x.exp_m1() },
            ActivationFunction::Relu => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Exponential => x.exp(),
        }
    }

    /// Element-wise first derivative, evaluated at the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Linear => 1.0,
            ActivationFunction::Elu => if x > 0.0 { 1.0 } else { x.exp() },
            ActivationFunction::Relu => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Exponential => x.exp(),
        }
    }

    /// Element-wise second derivative, evaluated at the pre-activation `x`.
    /// Piecewise-linear functions report zero at their kink.
    pub fn second_derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Linear | ActivationFunction::Relu => 0.0,
            ActivationFunction::Elu => if x > 0.0 { 0.0 } else { x.exp() },
            ActivationFunction::Tanh => {
                let t = x.tanh();
                -2.0 * t * (1.0 - t * t)
            }
            ActivationFunction::Exponential => x.exp(),
        }
    }

    /// Name as written in the `[activation function]` block.
    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Linear => "linear",
            ActivationFunction::Elu => "elu",
            ActivationFunction::Relu => "relu",
            ActivationFunction::Tanh => "tanh",
            ActivationFunction::Exponential => "exponential",
        }
    }

    pub fn index(&self) -> usize {
        ActivationFunction::ALL
            .iter()
            .position(|a| a == self)
            .unwrap_or_default()
    }
}

impl FromStr for ActivationFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivationFunction::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::UnknownActivation(s.to_owned()))
    }
}

impl TryFrom<String> for ActivationFunction {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
