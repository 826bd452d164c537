pub mod activations;
pub mod layers;
mod module;
mod sequential;

pub use layers::Layer;
pub use module::Module;
pub use sequential::Sequential;
