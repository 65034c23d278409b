use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    data::dataset::Dataset,
    error::{Error, Result},
    export::{
        checkpoint::{load_checkpoint, save_checkpoint},
        mlp_format::MlpModel,
        report::{write_history, PerformanceReport},
    },
    network::network::Network,
    train::{
        train_config::{DeviceKind, TrainConfig},
        trainer::{TrainOutcome, Trainer},
    },
};

pub const PERFORMANCE_FILE: &str = "MLP_performance.txt";
pub const HISTORY_FILE: &str = "TrainingHistory.csv";

/// Files produced by one training session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: TrainOutcome,
    pub model_dir: PathBuf,
    pub mlp_path: PathBuf,
    pub performance_path: PathBuf,
    pub history_path: PathBuf,
}

fn check_variables(config: &TrainConfig, data: &Dataset) -> Result<()> {
    if config.controlling_vars != data.controlling_vars {
        return Err(Error::InvalidConfig(format!(
            "controlling variables {:?} do not match the dataset's {:?}",
            config.controlling_vars, data.controlling_vars
        )));
    }
    if config.trained_vars != data.trained_vars {
        return Err(Error::InvalidConfig(format!(
            "trained variables {:?} do not match the dataset's {:?}",
            config.trained_vars, data.trained_vars
        )));
    }
    Ok(())
}

fn mlp_file(config: &TrainConfig) -> PathBuf {
    config.model_dir().join(format!("{}.mlp", config.mlp_file_stem()))
}

fn restore(config: &TrainConfig, dir: &Path) -> Result<Network> {
    let network = load_checkpoint(dir, &config.train_name, config.hidden_layers.len() + 1, config.activation)?;
    if network.hidden_widths() != config.hidden_layers {
        return Err(Error::InvalidConfig(format!(
            "checkpoint architecture {:?} differs from the configured {:?}",
            network.hidden_widths(),
            config.hidden_layers
        )));
    }
    Ok(network)
}

/// Fresh network, or the checkpoint in the model folder when restarting.
pub fn build_network(config: &TrainConfig) -> Result<Network> {
    let dir = config.model_dir();
    if config.restart {
        info!("restarting from checkpoint in {}", dir.display());
        return restore(config, &dir);
    }
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Network::initialize(
        config.controlling_vars.len(),
        &config.hidden_layers,
        config.trained_vars.len(),
        config.activation,
        &config.init_scheme,
        &mut rng,
    )
}

/// Trains a network on `data` and writes the checkpoint, the `.mlp` file,
/// the performance report and the training history into the model folder.
pub fn run(config: &TrainConfig, data: &Dataset) -> Result<SessionReport> {
    config.validate()?;
    check_variables(config, data)?;
    if config.device_kind == DeviceKind::Gpu {
        warn!("GPU {} requested, training runs on the CPU", config.device_index);
    }

    let model_dir = config.model_dir();
    std::fs::create_dir_all(&model_dir)?;

    let network = build_network(config)?;
    let mut trainer = Trainer::new(config.clone(), network).with_checkpoints(model_dir.clone(), config.train_name.clone());
    let outcome = trainer.fit(data)?;

    let history_path = model_dir.join(HISTORY_FILE);
    write_history(&history_path, &config.trained_vars, &trainer.state().history)?;

    let network = trainer.into_network();
    save_checkpoint(&model_dir, &config.train_name, &network)?;

    let performance_path = model_dir.join(PERFORMANCE_FILE);
    PerformanceReport::from_run(config, &network, &outcome).write(&performance_path)?;

    let mlp_path = mlp_file(config);
    MlpModel::from_dataset(network, data)?.write_mlp(&mlp_path)?;
    info!("network written to {}", mlp_path.display());

    Ok(SessionReport { outcome, model_dir, mlp_path, performance_path, history_path })
}

/// Rewrites the `.mlp` file from the checkpoint in the model folder.
pub fn export_from_checkpoint(config: &TrainConfig, data: &Dataset) -> Result<PathBuf> {
    config.validate()?;
    check_variables(config, data)?;
    let network = restore(config, &config.model_dir())?;
    let path = mlp_file(config);
    MlpModel::from_dataset(network, data)?.write_mlp(&path)?;
    info!("network written to {}", path.display());
    Ok(path)
}
