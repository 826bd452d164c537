pub mod adapter;
pub mod catalog;
pub mod error;
pub mod families;
pub mod graph;
pub mod head;
pub mod preprocess;
pub mod spec;

pub use adapter::Adapter;
pub use catalog::{Family, HeadShape, Weights, WeightsEntry};
pub use error::{AdaptErr, Result};
pub use graph::{ClassificationGraph, InferenceGraph, Outputs};
pub use head::HeadConfig;
pub use preprocess::{Interpolation, PreprocessSpec};
pub use spec::{ArchitectureSpec, HeadActivation, HeadStyle, TrainMode};
