use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// The distribution an initialization scheme asked for could not be built.
#[derive(Debug)]
pub enum InitErr {
    Normal(NormalError),
    Uniform(UniformError),
}

impl Display for InitErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(e) => write!(f, "invalid normal distribution: {e}"),
            Self::Uniform(e) => write!(f, "invalid uniform distribution: {e}"),
        }
    }
}

impl Error for InitErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Normal(e) => Some(e),
            Self::Uniform(e) => Some(e),
        }
    }
}

impl From<NormalError> for InitErr {
    fn from(value: NormalError) -> Self {
        Self::Normal(value)
    }
}

impl From<UniformError> for InitErr {
    fn from(value: UniformError) -> Self {
        Self::Uniform(value)
    }
}
