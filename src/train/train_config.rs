use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    loss::reduction::LossReduction,
    network::init::InitScheme,
    optim::schedule::DecaySteps,
};

pub const DEFAULT_EPOCHS: usize = 1000;
pub const DEFAULT_ALPHA_EXPO: f64 = -2.6;
pub const DEFAULT_LR_DECAY: f64 = 0.9985;
pub const DEFAULT_BATCH_EXPO: i32 = 6;
pub const DEFAULT_HIDDEN: usize = 30;

/// Largest accepted mini-batch exponent; keeps `2^b` representable.
const MAX_BATCH_EXPO: i32 = 31;

/// Hardware the caller asked for. Training always runs on the CPU; the
/// value is kept so that reports and configs round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    #[default]
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "GPU")]
    Gpu,
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CPU" => Ok(DeviceKind::Cpu),
            "GPU" => Ok(DeviceKind::Gpu),
            other => Err(Error::UnknownDevice(other.to_owned())),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("CPU"),
            DeviceKind::Gpu => f.write_str("GPU"),
        }
    }
}

/// Hyperparameters and I/O settings of one training job.
///
/// Every instance owns its lists; setters validate and fail before any
/// training work starts. Configs read from JSON are checked with
/// `validate()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Network inputs, in column order.
    pub controlling_vars: Vec<String>,
    /// Network outputs, in column order.
    pub trained_vars: Vec<String>,
    /// Dataset path prefix; `_full.csv`, `_train.csv`, `_val.csv` and
    /// `_test.csv` are appended.
    pub data_template: String,
    pub save_dir: PathBuf,
    pub model_index: usize,
    /// Distinguishes the files of several networks saved in one model folder.
    pub train_name: String,

    pub epochs: usize,
    /// Initial learning rate is `10^alpha_expo`.
    pub alpha_expo: f64,
    pub lr_decay: f64,
    /// Mini-batch size is `2^batch_expo`.
    pub batch_expo: i32,
    pub hidden_layers: Vec<usize>,
    pub activation: ActivationFunction,
    pub init_scheme: InitScheme,
    pub decay_steps: DecaySteps,
    pub loss_reduction: LossReduction,

    pub stagnation_tolerance: f64,
    pub stagnation_patience: usize,
    /// Observer and checkpoint cadence, in epochs.
    pub callback_every: usize,
    /// Stop as converged once the worst validation loss reaches this value.
    pub target_error: Option<f64>,

    pub seed: Option<u64>,
    /// Resume from the checkpoint in the model folder instead of
    /// initializing fresh parameters.
    pub restart: bool,

    pub device_kind: DeviceKind,
    pub device_index: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            controlling_vars: vec!["Density".to_owned(), "Energy".to_owned()],
            trained_vars: Vec::new(),
            data_template: String::new(),
            save_dir: PathBuf::from("."),
            model_index: 0,
            train_name: String::new(),
            epochs: DEFAULT_EPOCHS,
            alpha_expo: DEFAULT_ALPHA_EXPO,
            lr_decay: DEFAULT_LR_DECAY,
            batch_expo: DEFAULT_BATCH_EXPO,
            hidden_layers: vec![DEFAULT_HIDDEN],
            activation: ActivationFunction::Elu,
            init_scheme: InitScheme::default(),
            decay_steps: DecaySteps::default(),
            loss_reduction: LossReduction::Mean,
            stagnation_tolerance: 1e-11,
            stagnation_patience: 1000,
            callback_every: 20,
            target_error: None,
            seed: None,
            restart: false,
            device_kind: DeviceKind::Cpu,
            device_index: 0,
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_epochs(&mut self, epochs: usize) -> Result<()> {
        check_epochs(epochs)?;
        self.epochs = epochs;
        Ok(())
    }

    pub fn set_alpha_expo(&mut self, alpha_expo: f64) -> Result<()> {
        check_alpha_expo(alpha_expo)?;
        self.alpha_expo = alpha_expo;
        Ok(())
    }

    pub fn set_lr_decay(&mut self, lr_decay: f64) -> Result<()> {
        check_lr_decay(lr_decay)?;
        self.lr_decay = lr_decay;
        Ok(())
    }

    pub fn set_batch_expo(&mut self, batch_expo: i32) -> Result<()> {
        check_batch_expo(batch_expo)?;
        self.batch_expo = batch_expo;
        Ok(())
    }

    pub fn set_hidden_layers(&mut self, widths: &[usize]) -> Result<()> {
        check_hidden_layers(widths)?;
        self.hidden_layers = widths.to_vec();
        Ok(())
    }

    pub fn set_activation(&mut self, name: &str) -> Result<()> {
        self.activation = name.parse()?;
        Ok(())
    }

    pub fn set_device_kind(&mut self, kind: &str) -> Result<()> {
        self.device_kind = kind.parse()?;
        Ok(())
    }

    pub fn set_device_index(&mut self, index: usize) {
        self.device_index = index;
    }

    pub fn set_save_dir(&mut self, dir: impl Into<PathBuf>) {
        self.save_dir = dir.into();
    }

    pub fn set_model_index(&mut self, index: usize) {
        self.model_index = index;
    }

    pub fn set_controlling_vars(&mut self, names: &[&str]) -> Result<()> {
        check_names("controlling", names.len())?;
        self.controlling_vars = names.iter().map(|s| s.to_string()).collect();
        Ok(())
    }

    pub fn set_trained_vars(&mut self, names: &[&str]) -> Result<()> {
        check_names("trained", names.len())?;
        self.trained_vars = names.iter().map(|s| s.to_string()).collect();
        Ok(())
    }

    pub fn set_stagnation(&mut self, tolerance: f64, patience: usize) -> Result<()> {
        check_tolerance(tolerance)?;
        self.stagnation_tolerance = tolerance;
        self.stagnation_patience = patience;
        Ok(())
    }

    pub fn set_callback_every(&mut self, epochs: usize) -> Result<()> {
        if epochs == 0 {
            return Err(Error::InvalidConfig("callback cadence should be at least one epoch".into()));
        }
        self.callback_every = epochs;
        Ok(())
    }

    pub fn set_decay_steps(&mut self, decay_steps: DecaySteps) -> Result<()> {
        // A dataset size of one is enough to reject non-positive factors.
        decay_steps.resolve(1)?;
        self.decay_steps = decay_steps;
        Ok(())
    }

    /// Loads parameters from the checkpoint on the next run.
    pub fn restart_training(&mut self) {
        self.restart = true;
    }

    /// Re-checks every field; used after deserializing.
    pub fn validate(&self) -> Result<()> {
        check_epochs(self.epochs)?;
        check_alpha_expo(self.alpha_expo)?;
        check_lr_decay(self.lr_decay)?;
        check_batch_expo(self.batch_expo)?;
        check_hidden_layers(&self.hidden_layers)?;
        check_names("controlling", self.controlling_vars.len())?;
        check_names("trained", self.trained_vars.len())?;
        check_tolerance(self.stagnation_tolerance)?;
        if self.callback_every == 0 {
            return Err(Error::InvalidConfig("callback cadence should be at least one epoch".into()));
        }
        self.decay_steps.resolve(1)?;
        if let Some(target) = self.target_error {
            if !(target.is_finite() && target >= 0.0) {
                return Err(Error::InvalidConfig(format!("target error should be finite and non-negative, got {target}")));
            }
        }
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        1usize << self.batch_expo.clamp(0, MAX_BATCH_EXPO)
    }

    /// `<save_dir>/Model_<model_index>`.
    pub fn model_dir(&self) -> PathBuf {
        self.save_dir.join(format!("Model_{}", self.model_index))
    }

    /// File stem of the exported `.mlp` file.
    pub fn mlp_file_stem(&self) -> String {
        if self.train_name.is_empty() {
            "MLP".to_owned()
        } else {
            format!("MLP_{}", self.train_name)
        }
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a config previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

fn check_epochs(epochs: usize) -> Result<()> {
    if epochs == 0 {
        return Err(Error::InvalidEpochCount(epochs));
    }
    Ok(())
}

fn check_alpha_expo(alpha_expo: f64) -> Result<()> {
    if !(alpha_expo.is_finite() && alpha_expo <= 0.0) {
        return Err(Error::InvalidLearningRateExponent(alpha_expo));
    }
    Ok(())
}

fn check_lr_decay(lr_decay: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&lr_decay) {
        return Err(Error::InvalidDecayFactor(lr_decay));
    }
    Ok(())
}

fn check_batch_expo(batch_expo: i32) -> Result<()> {
    if !(0..=MAX_BATCH_EXPO).contains(&batch_expo) {
        return Err(Error::InvalidBatchExponent(batch_expo));
    }
    Ok(())
}

fn check_hidden_layers(widths: &[usize]) -> Result<()> {
    if let Some((index, &width)) = widths.iter().enumerate().find(|&(_, &w)| w == 0) {
        return Err(Error::InvalidHiddenWidth { index, width });
    }
    Ok(())
}

fn check_tolerance(tolerance: f64) -> Result<()> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(Error::InvalidStagnation(format!(
            "tolerance should be finite and higher than zero, got {tolerance}"
        )));
    }
    Ok(())
}

fn check_names(kind: &str, count: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidConfig(format!("at least one {kind} variable is required")));
    }
    Ok(())
}
