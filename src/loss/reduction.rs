use serde::{Serialize, Deserialize};

/// How the per-channel loss vector is collapsed into the scalar that is
/// differentiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReduction {
    /// Mean over output channels.
    #[default]
    Mean,
    /// Sum over output channels.
    Sum,
}

impl LossReduction {
    pub fn reduce(&self, losses: &[f64]) -> f64 {
        let sum: f64 = losses.iter().sum();
        sum * self.channel_weight(losses.len())
    }

    /// Factor applied to each channel's contribution.
    pub fn channel_weight(&self, channels: usize) -> f64 {
        match self {
            LossReduction::Mean => 1.0 / channels.max(1) as f64,
            LossReduction::Sum => 1.0,
        }
    }
}
