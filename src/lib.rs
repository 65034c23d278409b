pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod gradient;
pub mod optim;
pub mod data;
pub mod train;
pub mod export;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{InitScheme, Network};
pub use loss::{LossReduction, MseLoss};
pub use gradient::{GradientComputer, Gradients, SecondOrderDerivatives};
pub use optim::{Adam, DecaySteps, ExponentialDecay};
pub use data::{Dataset, NormBounds, Partition};
pub use train::{EpochObserver, TrainConfig, Trainer, TrainingStatus, TrainOutcome};
pub use export::{MlpModel, PerformanceReport};
