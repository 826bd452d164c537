mod act_fn;
mod selu;
mod sigmoid;

pub use act_fn::ActFn;
pub use selu::selu;
pub use sigmoid::{hard_sigmoid, sigmoid};
