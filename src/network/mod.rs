pub mod init;
pub mod network;
pub mod registry;

pub use init::InitScheme;
pub use network::{ForwardCache, Network};
pub use registry::{ParamRole, ParamSpec};
