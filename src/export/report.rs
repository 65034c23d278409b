use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{
    error::Result,
    export::mlp_format::format_sci,
    network::network::Network,
    train::{epoch_stats::EpochStats, train_config::TrainConfig, trainer::TrainOutcome},
};

/// Summary written next to the exported network as `MLP_performance.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceReport {
    pub train_time_minutes: f64,
    /// Mean test-set MSE at termination.
    pub validation_score: f64,
    pub total_neuron_count: usize,
    pub test_time_seconds: f64,
    pub cost_parameter: usize,
    pub alpha_expo: f64,
    pub lr_decay: f64,
    pub batch_expo: i32,
    pub activation_index: usize,
    pub hidden_layers: Vec<usize>,
}

impl PerformanceReport {
    pub fn from_run(config: &TrainConfig, network: &Network, outcome: &TrainOutcome) -> PerformanceReport {
        PerformanceReport {
            train_time_minutes: outcome.train_time_minutes,
            validation_score: outcome.test_score,
            total_neuron_count: network.hidden_neuron_count(),
            test_time_seconds: outcome.test_time_seconds,
            cost_parameter: network.cost_parameter(),
            alpha_expo: config.alpha_expo,
            lr_decay: config.lr_decay,
            batch_expo: config.batch_expo,
            activation_index: network.hidden_activation().index(),
            hidden_layers: network.hidden_widths(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training time[minutes]: {}", format_sci(self.train_time_minutes, 3))?;
        writeln!(f, "Validation score: {}", format_sci(self.validation_score, 16))?;
        writeln!(f, "Total neuron count:  {}", self.total_neuron_count)?;
        writeln!(f, "Evaluation time[seconds]: {}", format_sci(self.test_time_seconds, 3))?;
        writeln!(f, "Evaluation cost parameter: {}", format_sci(self.cost_parameter as f64, 3))?;
        writeln!(f, "Alpha exponent: {}", format_sci(self.alpha_expo, 4))?;
        writeln!(f, "Learning rate decay: {}", format_sci(self.lr_decay, 4))?;
        writeln!(f, "Batch size exponent: {}", self.batch_expo)?;
        writeln!(f, "Activation function index: {}", self.activation_index)?;
        writeln!(f, "Number of hidden layers: {}", self.hidden_layers.len())?;
        let arch: Vec<String> = self.hidden_layers.iter().map(usize::to_string).collect();
        writeln!(f, "Architecture: {}", arch.join(" "))
    }
}

/// Writes the per-epoch history as CSV, one validation column per output.
pub fn write_history(path: &Path, trained_vars: &[String], history: &[EpochStats]) -> Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    let val_columns: Vec<String> = trained_vars.iter().map(|v| format!("validation_loss_{v}")).collect();
    writeln!(out, "epoch,loss,{},worst_error,learning_rate", val_columns.join(","))?;
    for stats in history {
        writeln!(out, "{}", stats.csv_row())?;
    }
    out.flush()?;
    Ok(())
}
