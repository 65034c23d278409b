use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use flamelet_mlp::{
    data::csv::read_columns,
    export::mlp_format::format_sci,
    train::session,
    Dataset, MlpModel, TrainConfig,
};

#[derive(Parser, Debug)]
#[command(name = "flamelet-mlp", version, about = "Train and export .mlp networks for tabulated flamelet data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a network from a JSON config and export it
    Train(TrainArgs),
    /// Evaluate an exported .mlp file on a CSV table
    Evaluate(EvaluateArgs),
    /// Rewrite the .mlp file from the checkpoint in the model folder
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Path to the JSON training config
    #[arg(short, long)]
    config: PathBuf,

    #[arg(long)]
    epochs: Option<usize>,

    /// Initial learning rate exponent
    #[arg(long, allow_hyphen_values = true)]
    alpha_expo: Option<f64>,

    #[arg(long)]
    lr_decay: Option<f64>,

    /// Mini-batch size exponent
    #[arg(long, allow_hyphen_values = true)]
    batch_expo: Option<i32>,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',')]
    hidden: Option<Vec<usize>>,

    #[arg(long)]
    activation: Option<String>,

    /// "CPU" or "GPU"
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    device_index: Option<usize>,

    #[arg(long)]
    save_dir: Option<PathBuf>,

    #[arg(long)]
    model_index: Option<usize>,

    /// Continue from the checkpoint in the model folder
    #[arg(long)]
    restart: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long)]
    mlp: PathBuf,

    /// CSV table holding the network's input columns
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(short, long)]
    config: PathBuf,
}

fn load_config(path: &Path) -> Result<TrainConfig> {
    TrainConfig::load_json(path).with_context(|| format!("loading config {}", path.display()))
}

fn apply_overrides(config: &mut TrainConfig, args: &TrainArgs) -> Result<()> {
    if let Some(epochs) = args.epochs {
        config.set_epochs(epochs)?;
    }
    if let Some(alpha) = args.alpha_expo {
        config.set_alpha_expo(alpha)?;
    }
    if let Some(decay) = args.lr_decay {
        config.set_lr_decay(decay)?;
    }
    if let Some(expo) = args.batch_expo {
        config.set_batch_expo(expo)?;
    }
    if let Some(hidden) = &args.hidden {
        config.set_hidden_layers(hidden)?;
    }
    if let Some(name) = &args.activation {
        config.set_activation(name)?;
    }
    if let Some(device) = &args.device {
        config.set_device_kind(device)?;
    }
    if let Some(index) = args.device_index {
        config.set_device_index(index);
    }
    if let Some(dir) = &args.save_dir {
        config.set_save_dir(dir.clone());
    }
    if let Some(index) = args.model_index {
        config.set_model_index(index);
    }
    if args.restart {
        config.restart_training();
    }
    Ok(())
}

fn load_dataset(config: &TrainConfig) -> Result<Dataset> {
    Dataset::load(&config.data_template, &config.controlling_vars, &config.trained_vars)
        .with_context(|| format!("loading dataset {}_*.csv", config.data_template))
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args).context("invalid command line override")?;

    let data = load_dataset(&config)?;
    let report = session::run(&config, &data).context("training failed")?;
    info!(
        "{:?} after {} epochs, test score {}",
        report.outcome.status,
        report.outcome.epochs_run,
        format_sci(report.outcome.test_score, 6)
    );
    info!("performance report written to {}", report.performance_path.display());
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let model = MlpModel::read_mlp(&args.mlp).with_context(|| format!("reading {}", args.mlp.display()))?;
    let (inputs, _) = read_columns(&args.input, &model.input_names, &[])
        .with_context(|| format!("reading {}", args.input.display()))?;
    let outputs = model.predict(&inputs)?;

    println!("{}", model.output_names.join(","));
    for row in &outputs.data {
        let cells: Vec<String> = row.iter().map(|v| format_sci(*v, 16)).collect();
        println!("{}", cells.join(","));
    }
    Ok(())
}

fn export(args: ExportArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let data = load_dataset(&config)?;
    session::export_from_checkpoint(&config, &data).context("export failed")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Export(args) => export(args),
    }
}
