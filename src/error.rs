use thiserror::Error;

/// Errors raised while configuring, training or exporting a network.
#[derive(Debug, Error)]
pub enum Error {
    #[error("epoch count should be higher than zero, got {0}")]
    InvalidEpochCount(usize),

    #[error("initial learning rate exponent should be zero or below, got {0}")]
    InvalidLearningRateExponent(f64),

    #[error("learning rate decay factor should be between zero and one, got {0}")]
    InvalidDecayFactor(f64),

    #[error("mini-batch exponent should be zero or higher, got {0}")]
    InvalidBatchExponent(i32),

    #[error("neuron count in hidden layer {index} should be higher than zero, got {width}")]
    InvalidHiddenWidth { index: usize, width: usize },

    #[error("unknown activation function '{0}', expected one of linear, elu, relu, tanh, exponential")]
    UnknownActivation(String),

    #[error("device should be \"CPU\" or \"GPU\", got '{0}'")]
    UnknownDevice(String),

    #[error("invalid stagnation settings: {0}")]
    InvalidStagnation(String),

    #[error("learning rate decay steps should be finite and higher than zero, got {0}")]
    InvalidDecaySteps(f64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("dimension mismatch for {what}: got {got}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("training diverged at epoch {epoch}: {cause}")]
    DivergedTraining { epoch: usize, cause: String },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("malformed .mlp file at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn mismatch(what: &'static str, got: usize, expected: usize) -> Error {
        Error::DimensionMismatch { what, got, expected }
    }
}
