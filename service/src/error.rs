use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use architectures::AdaptErr;
use inference::InferErr;

/// The service module's result type.
pub type Result<T> = std::result::Result<T, ServiceErr>;

/// Failures of the classification service.
#[derive(Debug)]
pub enum ServiceErr {
    /// The configuration could not be read or describes an infeasible setup.
    Config(String),
    /// The graph could not be built or its checkpoint could not be loaded.
    Startup(AdaptErr),
    Prediction(InferErr),
    FileTypeNotAllowed(String),
    FileNotFound(String),
    Storage(io::Error),
    /// A prediction record was refused by the store.
    Persistence(String),
    InvalidPage {
        page: usize,
        limit: usize,
    },
}

impl ServiceErr {
    /// Whether the error happened while starting up, in which case the service must not serve.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Startup(_))
    }
}

impl Display for ServiceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(reason) => write!(f, "invalid configuration: {reason}"),
            Self::Startup(e) => write!(f, "startup failed: {e}"),
            Self::Prediction(e) => write!(f, "prediction failed: {e}"),
            Self::FileTypeNotAllowed(name) => write!(f, "file type not allowed: {name}"),
            Self::FileNotFound(reference) => write!(f, "file not found: {reference}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Persistence(reason) => write!(f, "could not persist prediction: {reason}"),
            Self::InvalidPage { page, limit } => {
                write!(f, "invalid page {page} with limit {limit}")
            }
        }
    }
}

impl Error for ServiceErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Startup(e) => Some(e),
            Self::Prediction(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AdaptErr> for ServiceErr {
    fn from(value: AdaptErr) -> Self {
        Self::Startup(value)
    }
}

impl From<InferErr> for ServiceErr {
    fn from(value: InferErr) -> Self {
        Self::Prediction(value)
    }
}

impl From<io::Error> for ServiceErr {
    fn from(value: io::Error) -> Self {
        Self::Storage(value)
    }
}

impl From<serde_json::Error> for ServiceErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_failures_are_fatal() {
        assert!(ServiceErr::Config("no checkpoint".into()).is_fatal());
        assert!(ServiceErr::Startup(AdaptErr::UnsupportedArchitecture("vgg".into())).is_fatal());

        assert!(!ServiceErr::FileNotFound("a.png".into()).is_fatal());
        assert!(!ServiceErr::InvalidPage { page: 0, limit: 10 }.is_fatal());
        assert!(!ServiceErr::Prediction(InferErr::NonFiniteOutput(f32::NAN)).is_fatal());
    }
}
