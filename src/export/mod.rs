pub mod checkpoint;
pub mod mlp_format;
pub mod report;

pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use mlp_format::{format_sci, MlpModel};
pub use report::{write_history, PerformanceReport};
