use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default decay step count for `DecaySteps::Fixed`.
pub const DEFAULT_DECAY_STEPS: f64 = 10_000.0;

/// Decay step factor applied to the training-set size by the custom trainer.
pub const DATASET_DECAY_FACTOR: f64 = 0.01157;

/// Where the decay step count of the learning-rate schedule comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecaySteps {
    Fixed(f64),
    /// `factor * number of training samples`.
    FromDatasetSize(f64),
}

impl Default for DecaySteps {
    fn default() -> Self {
        DecaySteps::Fixed(DEFAULT_DECAY_STEPS)
    }
}

impl DecaySteps {
    pub fn resolve(&self, n_train: usize) -> Result<f64> {
        let steps = match *self {
            DecaySteps::Fixed(n) => n,
            DecaySteps::FromDatasetSize(factor) => factor * n_train as f64,
        };
        if !(steps.is_finite() && steps > 0.0) {
            return Err(Error::InvalidDecaySteps(steps));
        }
        Ok(steps)
    }
}

/// `lr(step) = 10^alpha_expo * decay_rate^(step / decay_steps)`, not staircased.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    pub initial_rate: f64,
    pub decay_rate: f64,
    pub decay_steps: f64,
}

impl ExponentialDecay {
    pub fn new(alpha_expo: f64, decay_rate: f64, decay_steps: f64) -> ExponentialDecay {
        ExponentialDecay {
            initial_rate: 10f64.powf(alpha_expo),
            decay_rate,
            decay_steps,
        }
    }

    pub fn learning_rate(&self, step: u64) -> f64 {
        self.initial_rate * self.decay_rate.powf(step as f64 / self.decay_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rate_starts_at_ten_to_alpha() {
        let s = ExponentialDecay::new(-3.0, 0.9, 100.0);
        assert_relative_eq!(s.learning_rate(0), 1e-3);
    }

    #[test]
    fn rate_decays_by_factor_every_decay_steps() {
        let s = ExponentialDecay::new(-2.0, 0.5, 100.0);
        assert_relative_eq!(s.learning_rate(100), 0.005, max_relative = 1e-12);
        assert_relative_eq!(s.learning_rate(50), 0.01 * 0.5f64.sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn decay_steps_resolve_both_conventions() {
        assert_eq!(DecaySteps::Fixed(250.0).resolve(1).unwrap(), 250.0);
        assert_relative_eq!(
            DecaySteps::FromDatasetSize(DATASET_DECAY_FACTOR).resolve(100_000).unwrap(),
            1157.0,
            max_relative = 1e-12
        );
        assert!(DecaySteps::FromDatasetSize(0.01).resolve(0).is_err());
        assert!(DecaySteps::Fixed(-1.0).resolve(10).is_err());
    }

    #[test]
    fn decay_steps_serialize_as_tagged_values() {
        let json = serde_json::to_string(&DecaySteps::FromDatasetSize(0.5)).unwrap();
        assert_eq!(json, r#"{"from_dataset_size":0.5}"#);
        let back: DecaySteps = serde_json::from_str(r#"{"fixed":100.0}"#).unwrap();
        assert_eq!(back, DecaySteps::Fixed(100.0));
    }
}
