use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use safetensors::SafeTensorError;

use crate::{device::Device, init::InitErr};

/// The result type used in the entire neural network module.
pub type Result<T> = std::result::Result<T, NnErr>;

/// The neural network module's error type.
#[derive(Debug)]
pub enum NnErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    ParamShapeMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    MissingParam(String),
    UnexpectedParam(String),
    UnsupportedDtype {
        name: String,
        dtype: String,
    },
    UnsupportedDevice(String),
    DeviceMismatch {
        expected: Device,
        got: Device,
    },
    Checkpoint(SafeTensorError),
    Init(InitErr),
    Io(io::Error),
}

impl Display for NnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NnErr::SizeMismatch {
                what,
                got,
                expected,
            } => format!("size mismatch on {what}: got {got}, expected {expected}"),
            NnErr::Shape(e) => format!("invalid tensor shape: {e}"),
            NnErr::ParamShapeMismatch {
                name,
                got,
                expected,
            } => format!("parameter {name} has shape {got:?}, expected {expected:?}"),
            NnErr::MissingParam(name) => format!("parameter {name} is missing from the checkpoint"),
            NnErr::UnexpectedParam(name) => {
                format!("checkpoint entry {name} does not match any parameter")
            }
            NnErr::UnsupportedDtype { name, dtype } => {
                format!("checkpoint entry {name} has dtype {dtype}, only F32 is supported")
            }
            NnErr::UnsupportedDevice(device) => {
                format!("device {device} is not available on this backend")
            }
            NnErr::DeviceMismatch { expected, got } => {
                format!("tensor lives on {got} but the graph is bound to {expected}")
            }
            NnErr::Checkpoint(e) => format!("malformed checkpoint: {e}"),
            NnErr::Init(e) => format!("failed to initialize parameters: {e}"),
            NnErr::Io(e) => format!("io error: {e}"),
        };

        write!(f, "{s}")
    }
}

impl Error for NnErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NnErr::Shape(e) => Some(e),
            NnErr::Checkpoint(e) => Some(e),
            NnErr::Init(e) => Some(e),
            NnErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for NnErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<SafeTensorError> for NnErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(value)
    }
}

impl From<InitErr> for NnErr {
    fn from(value: InitErr) -> Self {
        Self::Init(value)
    }
}

impl From<io::Error> for NnErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
