pub mod batches;
pub mod early_stopping;
pub mod epoch_stats;
pub mod observer;
pub mod session;
pub mod train_config;
pub mod trainer;

pub use early_stopping::{EarlyStopping, StopDecision};
pub use epoch_stats::EpochStats;
pub use observer::EpochObserver;
pub use session::{export_from_checkpoint, run, SessionReport};
pub use train_config::{DeviceKind, TrainConfig};
pub use trainer::{Trainer, TrainingState, TrainingStatus, TrainOutcome};
