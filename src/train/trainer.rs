use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    data::dataset::Dataset,
    error::{Error, Result},
    export::checkpoint::save_checkpoint,
    gradient::backprop::GradientComputer,
    network::network::Network,
    optim::{adam::Adam, schedule::ExponentialDecay},
    train::{
        batches::{batch_count, shuffled_batches},
        early_stopping::{worst_error, EarlyStopping, StopDecision},
        epoch_stats::EpochStats,
        observer::EpochObserver,
        train_config::TrainConfig,
    },
};

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Initializing,
    Running,
    /// The worst validation error reached the configured target.
    Converged,
    /// Early stopping fired.
    Stopped,
    /// The epoch budget ran out.
    Completed,
    /// A non-finite loss appeared; parameters were rolled back.
    Diverged,
}

impl TrainingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrainingStatus::Initializing | TrainingStatus::Running)
    }
}

/// Progress of the current or last `fit` call.
#[derive(Debug, Clone)]
pub struct TrainingState {
    pub epoch: usize,
    pub history: Vec<EpochStats>,
    pub best_error: f64,
    pub stagnation: usize,
    pub keep_training: bool,
    pub status: TrainingStatus,
}

impl Default for TrainingState {
    fn default() -> Self {
        TrainingState {
            epoch: 0,
            history: Vec::new(),
            best_error: f64::INFINITY,
            stagnation: 0,
            keep_training: false,
            status: TrainingStatus::Initializing,
        }
    }
}

impl TrainingState {
    /// Validation loss vectors, one per completed epoch.
    pub fn val_loss_history(&self) -> Vec<&[f64]> {
        self.history.iter().map(|s| s.val_loss.as_slice()).collect()
    }
}

/// Summary of a finished run, evaluated on the test split.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub status: TrainingStatus,
    pub epochs_run: usize,
    pub test_loss: Vec<f64>,
    /// Mean of `test_loss`.
    pub test_score: f64,
    pub train_time_minutes: f64,
    pub test_time_seconds: f64,
}

/// Mini-batch Adam driver for one network.
pub struct Trainer {
    config: TrainConfig,
    network: Network,
    state: TrainingState,
    checkpoints: Option<(PathBuf, String)>,
    observers: Vec<Box<dyn EpochObserver>>,
}

impl Trainer {
    pub fn new(config: TrainConfig, network: Network) -> Trainer {
        Trainer {
            config,
            network,
            state: TrainingState::default(),
            checkpoints: None,
            observers: Vec::new(),
        }
    }

    /// Writes the parameters to `dir` every `callback_every` epochs.
    pub fn with_checkpoints(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Trainer {
        self.checkpoints = Some((dir.into(), prefix.into()));
        self
    }

    pub fn add_observer(&mut self, observer: impl EpochObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    fn check_dataset(&self, data: &Dataset) -> Result<()> {
        let (n_in, n_out) = (self.network.input_dim(), self.network.output_dim());
        for part in [&data.train, &data.val, &data.test] {
            if part.inputs.cols != n_in {
                return Err(Error::mismatch("dataset input columns", part.inputs.cols, n_in));
            }
            if part.targets.cols != n_out {
                return Err(Error::mismatch("dataset target columns", part.targets.cols, n_out));
            }
        }
        if data.train.is_empty() || data.val.is_empty() || data.test.is_empty() {
            return Err(Error::Dataset("train, validation and test splits must all hold samples".into()));
        }
        Ok(())
    }

    /// Runs the training loop until early stopping, convergence or the end
    /// of the epoch budget, then scores the network on the test split.
    ///
    /// A non-finite loss rolls the network back to the parameters of the
    /// last epoch that finished cleanly and returns
    /// [`Error::DivergedTraining`].
    pub fn fit(&mut self, data: &Dataset) -> Result<TrainOutcome> {
        self.config.validate()?;
        self.check_dataset(data)?;

        let config = &self.config;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let computer = GradientComputer::new(config.loss_reduction);
        let mut optimizer = Adam::new(&self.network);
        let n_train = data.train.len();
        let schedule = ExponentialDecay::new(config.alpha_expo, config.lr_decay, config.decay_steps.resolve(n_train)?);
        let mut early_stopping =
            EarlyStopping::new(config.stagnation_tolerance, config.stagnation_patience).with_target_error(config.target_error);
        let batch_size = config.batch_size();
        let epochs = config.epochs;
        let callback_every = config.callback_every;

        self.state = TrainingState {
            keep_training: true,
            status: TrainingStatus::Running,
            ..TrainingState::default()
        };
        info!(
            "training {:?} network on {} samples, {} batches of {} per epoch",
            self.network.layer_sizes(),
            n_train,
            batch_count(n_train, batch_size),
            batch_size
        );

        let mut stable = self.network.clone();
        let t_start = Instant::now();

        for epoch in 1..=epochs {
            let t_epoch = Instant::now();
            let mut train_loss = 0.0;
            let batches = shuffled_batches(n_train, batch_size, &mut rng);
            let n_batches = batches.len();

            for indices in batches {
                let x = data.train.inputs.select_rows(&indices);
                let y = data.train.targets.select_rows(&indices);
                let (losses, grads) = computer.param_gradients(&self.network, &x, &y)?;
                let batch_loss = computer.reduction.reduce(&losses);
                if !batch_loss.is_finite() || !grads.is_finite() {
                    return Err(self.diverge(epoch, stable, format!("non-finite training loss {batch_loss}")));
                }
                let lr = schedule.learning_rate(optimizer.step_count());
                optimizer.step(&mut self.network, &grads, lr);
                train_loss += batch_loss;
            }

            let val_loss = computer.evaluate(&self.network, &data.val.inputs, &data.val.targets)?;
            if val_loss.iter().any(|v| !v.is_finite()) {
                return Err(self.diverge(epoch, stable, format!("non-finite validation loss {val_loss:?}")));
            }
            stable.clone_from(&self.network);

            let decision = early_stopping.update(&val_loss);
            let stats = EpochStats {
                epoch,
                total_epochs: epochs,
                train_loss: train_loss / n_batches.max(1) as f64,
                worst_error: worst_error(&val_loss),
                val_loss,
                learning_rate: schedule.learning_rate(optimizer.step_count()),
                elapsed_ms: t_epoch.elapsed().as_millis() as u64,
            };
            debug!(
                "epoch {}/{}: train loss {:.6e}, worst validation error {:.6e}, lr {:.3e}, {} ms",
                stats.epoch, stats.total_epochs, stats.train_loss, stats.worst_error, stats.learning_rate, stats.elapsed_ms
            );

            self.state.epoch = epoch;
            self.state.best_error = early_stopping.best_error();
            self.state.stagnation = early_stopping.stagnation();
            self.state.history.push(stats);

            if epoch % callback_every == 0 {
                self.periodic(epoch)?;
            }

            match decision {
                StopDecision::Continue => {}
                StopDecision::Converged => {
                    info!("target error reached at epoch {epoch}");
                    self.state.status = TrainingStatus::Converged;
                    break;
                }
                StopDecision::Stop => {
                    warn!(
                        "early stopping at epoch {epoch}: no improvement larger than {:e} for {} epochs",
                        self.config.stagnation_tolerance, self.state.stagnation
                    );
                    self.state.status = TrainingStatus::Stopped;
                    break;
                }
            }
        }

        if self.state.status == TrainingStatus::Running {
            self.state.status = TrainingStatus::Completed;
        }
        // Off-cadence final epoch still reaches observers and the checkpoint.
        if self.state.epoch % callback_every != 0 {
            self.periodic(self.state.epoch)?;
        }
        self.state.keep_training = false;
        let train_time_minutes = t_start.elapsed().as_secs_f64() / 60.0;

        let t_test = Instant::now();
        let test_loss = computer.evaluate(&self.network, &data.test.inputs, &data.test.targets)?;
        let test_time_seconds = t_test.elapsed().as_secs_f64();
        let test_score = test_loss.iter().sum::<f64>() / test_loss.len() as f64;

        info!(
            "training finished as {:?} after {} epochs, test score {:.6e}",
            self.state.status, self.state.epoch, test_score
        );

        Ok(TrainOutcome {
            status: self.state.status,
            epochs_run: self.state.epoch,
            test_loss,
            test_score,
            train_time_minutes,
            test_time_seconds,
        })
    }

    fn periodic(&mut self, epoch: usize) -> Result<()> {
        let Some(stats) = self.state.history.last() else {
            return Ok(());
        };
        for observer in &mut self.observers {
            observer.on_epoch_end(epoch, &stats.val_loss);
        }
        if let Some((dir, prefix)) = &self.checkpoints {
            save_checkpoint(dir, prefix, &self.network)?;
        }
        Ok(())
    }

    fn diverge(&mut self, epoch: usize, stable: Network, cause: String) -> Error {
        warn!("training diverged at epoch {epoch} ({cause}), restoring last stable parameters");
        self.network = stable;
        self.state.status = TrainingStatus::Diverged;
        self.state.keep_training = false;
        Error::DivergedTraining { epoch, cause }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activation::ActivationFunction,
        data::dataset::Partition,
        export::checkpoint::load_checkpoint,
        math::matrix::Matrix,
        network::init::InitScheme,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn toy_dataset() -> Dataset {
        let xs: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 39.0, (i % 7) as f64]).collect();
        let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![2.0 * x[0] + 0.1 * x[1]]).collect();
        let full = Partition::new(Matrix::from_data(xs.clone()), Matrix::from_data(ys.clone())).unwrap();
        let split = |range: std::ops::Range<usize>| {
            Partition::new(
                Matrix::from_data(xs[range.clone()].to_vec()),
                Matrix::from_data(ys[range].to_vec()),
            )
            .unwrap()
        };
        Dataset::from_raw(
            vec!["Density".into(), "Energy".into()],
            vec!["T".into()],
            &full,
            &split(0..30),
            &split(30..35),
            &split(35..40),
        )
        .unwrap()
    }

    fn config() -> TrainConfig {
        let mut cfg = TrainConfig::new();
        cfg.set_trained_vars(&["T"]).unwrap();
        cfg.set_hidden_layers(&[8]).unwrap();
        cfg.set_batch_expo(3).unwrap();
        cfg.set_alpha_expo(-2.0).unwrap();
        cfg.seed = Some(17);
        cfg
    }

    fn network(cfg: &TrainConfig) -> Network {
        let mut rng = StdRng::seed_from_u64(3);
        Network::initialize(2, &cfg.hidden_layers, 1, cfg.activation, &cfg.init_scheme, &mut rng).unwrap()
    }

    #[test]
    fn training_reduces_validation_loss() {
        let mut cfg = config();
        cfg.set_epochs(200).unwrap();
        let data = toy_dataset();
        let before = GradientComputer::new(cfg.loss_reduction)
            .evaluate(&network(&cfg), &data.val.inputs, &data.val.targets)
            .unwrap()[0];

        let mut trainer = Trainer::new(cfg.clone(), network(&cfg));
        let outcome = trainer.fit(&data).unwrap();
        let after = trainer.state().history.last().unwrap().val_loss[0];

        assert!(after < before, "{after} should be below {before}");
        assert_eq!(outcome.test_loss.len(), 1);
        assert!(outcome.status.is_terminal());
        assert!(!trainer.state().keep_training);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut cfg = config();
        cfg.set_epochs(5).unwrap();
        let data = toy_dataset();
        let mut a = Trainer::new(cfg.clone(), network(&cfg));
        let mut b = Trainer::new(cfg.clone(), network(&cfg));
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a.network(), b.network());
    }

    #[test]
    fn budget_exhaustion_completes() {
        let mut cfg = config();
        cfg.set_epochs(3).unwrap();
        let mut trainer = Trainer::new(cfg.clone(), network(&cfg));
        let outcome = trainer.fit(&toy_dataset()).unwrap();
        assert_eq!(outcome.status, TrainingStatus::Completed);
        assert_eq!(outcome.epochs_run, 3);
        assert_eq!(trainer.state().val_loss_history().len(), 3);
    }

    #[test]
    fn target_error_converges() {
        let mut cfg = config();
        cfg.target_error = Some(1e3);
        let mut trainer = Trainer::new(cfg.clone(), network(&cfg));
        let outcome = trainer.fit(&toy_dataset()).unwrap();
        assert_eq!(outcome.status, TrainingStatus::Converged);
        assert_eq!(outcome.epochs_run, 1);
    }

    #[test]
    fn observers_fire_on_cadence() {
        let mut cfg = config();
        cfg.set_epochs(10).unwrap();
        cfg.set_callback_every(4).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut trainer = Trainer::new(cfg.clone(), network(&cfg));
        trainer.add_observer(move |epoch: usize, val: &[f64]| sink.borrow_mut().push((epoch, val.len())));
        trainer.fit(&toy_dataset()).unwrap();

        assert_eq!(*seen.borrow(), vec![(4, 1), (8, 1), (10, 1)]);
    }

    #[test]
    fn early_termination_off_cadence_notifies_once_more() {
        let mut cfg = config();
        cfg.target_error = Some(1e3);
        cfg.set_callback_every(4).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let dir = tempfile::tempdir().unwrap();

        let mut trainer = Trainer::new(cfg.clone(), network(&cfg)).with_checkpoints(dir.path(), "T");
        trainer.add_observer(move |epoch: usize, _: &[f64]| sink.borrow_mut().push(epoch));
        let outcome = trainer.fit(&toy_dataset()).unwrap();

        assert_eq!(outcome.status, TrainingStatus::Converged);
        assert_eq!(*seen.borrow(), vec![1]);
        let saved = load_checkpoint(dir.path(), "T", 2, cfg.activation).unwrap();
        assert_eq!(&saved, trainer.network());
    }

    #[test]
    fn divergence_leaves_earlier_checkpoint_untouched() {
        let mut cfg = config();
        cfg.set_epochs(3).unwrap();
        cfg.set_callback_every(1).unwrap();
        cfg.set_activation("exponential").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut trainer = Trainer::new(cfg.clone(), network(&cfg)).with_checkpoints(dir.path(), "T");
        trainer.fit(&toy_dataset()).unwrap();
        let checkpointed = load_checkpoint(dir.path(), "T", 2, ActivationFunction::Exponential).unwrap();
        assert_eq!(&checkpointed, trainer.network());

        // Continuing on inputs that overflow the exponential diverges on the first batch.
        let mut data = toy_dataset();
        data.train.inputs = data.train.inputs.map(|v| v * 1e6);
        let err = trainer.fit(&data).unwrap_err();

        assert!(matches!(err, Error::DivergedTraining { epoch: 1, .. }));
        let on_disk = load_checkpoint(dir.path(), "T", 2, ActivationFunction::Exponential).unwrap();
        assert_eq!(on_disk, checkpointed);
        assert_eq!(trainer.network(), &checkpointed);
        assert!(!dir.path().join("W_T_0.json.tmp").exists());
    }

    #[test]
    fn divergence_restores_stable_parameters() {
        let mut cfg = config();
        cfg.set_epochs(50).unwrap();
        cfg.set_activation("exponential").unwrap();
        cfg.set_alpha_expo(0.0).unwrap();
        cfg.set_lr_decay(1.0).unwrap();

        let mut data = toy_dataset();
        // Huge inputs overflow the exponential activation on the first batch.
        data.train.inputs = data.train.inputs.map(|v| v * 1e6);

        let initial = network(&cfg);
        let mut trainer = Trainer::new(cfg, initial.clone());
        let err = trainer.fit(&data).unwrap_err();

        assert!(matches!(err, Error::DivergedTraining { epoch: 1, .. }));
        assert_eq!(trainer.state().status, TrainingStatus::Diverged);
        assert_eq!(trainer.network(), &initial);
    }

    #[test]
    fn mismatched_dataset_is_rejected_before_training() {
        let cfg = config();
        let mut rng = StdRng::seed_from_u64(0);
        let net = Network::initialize(3, &[4], 1, ActivationFunction::Elu, &InitScheme::default(), &mut rng).unwrap();
        let mut trainer = Trainer::new(cfg, net);
        let err = trainer.fit(&toy_dataset()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(trainer.state().status, TrainingStatus::Initializing);
    }
}
