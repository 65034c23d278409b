pub mod backprop;
pub mod input;

pub use backprop::{GradientComputer, Gradients};
pub use input::SecondOrderDerivatives;
