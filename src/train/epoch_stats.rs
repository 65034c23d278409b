use serde::{Serialize, Deserialize};

/// Per-epoch training statistics, logged at debug level by the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Epoch budget of this run.
    pub total_epochs: usize,
    /// Mean of the reduced batch losses over this epoch.
    pub train_loss: f64,
    /// Validation MSE per output channel.
    pub val_loss: Vec<f64>,
    /// Largest entry of `val_loss`, the value early stopping watches.
    pub worst_error: f64,
    /// Learning rate after the last optimizer step of the epoch.
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

impl EpochStats {
    /// One line of `TrainingHistory.csv`.
    pub fn csv_row(&self) -> String {
        let val: Vec<String> = self.val_loss.iter().map(|v| format!("{v:e}")).collect();
        format!(
            "{},{:e},{},{:e},{:e}",
            self.epoch,
            self.train_loss,
            val.join(","),
            self.worst_error,
            self.learning_rate
        )
    }
}
