pub mod mse;
pub mod reduction;

pub use mse::MseLoss;
pub use reduction::LossReduction;
