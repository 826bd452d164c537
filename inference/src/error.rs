use std::{
    error::Error,
    fmt::{self, Display},
};

use image::ImageError;
use nn::NnErr;

/// The result type used in the entire inference module.
pub type Result<T> = std::result::Result<T, InferErr>;

/// The inference module's error type.
#[derive(Debug)]
pub enum InferErr {
    ImageLoad(ImageError),
    Forward(NnErr),
    NonFiniteOutput(f32),
    InvalidPreprocess(&'static str),
}

impl Display for InferErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InferErr::ImageLoad(e) => format!("failed to load image: {e}"),
            InferErr::Forward(e) => format!("forward pass failed: {e}"),
            InferErr::NonFiniteOutput(v) => format!("the graph produced a non finite output: {v}"),
            InferErr::InvalidPreprocess(reason) => format!("invalid preprocessing: {reason}"),
        };

        write!(f, "{s}")
    }
}

impl Error for InferErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InferErr::ImageLoad(e) => Some(e),
            InferErr::Forward(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ImageError> for InferErr {
    fn from(value: ImageError) -> Self {
        Self::ImageLoad(value)
    }
}

impl From<NnErr> for InferErr {
    fn from(value: NnErr) -> Self {
        Self::Forward(value)
    }
}
