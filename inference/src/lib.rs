pub mod decision;
pub mod error;
pub mod pipeline;
pub mod preprocess;

pub use decision::{Labels, MAX_CONFIDENCE, PredictionResult, decide, decide_probability};
pub use error::{InferErr, Result};
pub use pipeline::Pipeline;
pub use preprocess::Preprocessor;
