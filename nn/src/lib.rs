pub mod arch;
pub mod checkpoint;
pub mod device;
pub mod error;
pub mod init;
pub mod params;
pub mod tensor;

pub use arch::{Layer, Module, Sequential};
pub use checkpoint::StateDict;
pub use device::Device;
pub use error::{NnErr, Result};
pub use params::{Param, ParamKind};
pub use tensor::{Feature, Tensor};
