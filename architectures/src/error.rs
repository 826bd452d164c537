use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};

use nn::NnErr;

/// The result type used in the entire architectures module.
pub type Result<T> = std::result::Result<T, AdaptErr>;

/// The architectures module's error type.
#[derive(Debug)]
pub enum AdaptErr {
    UnsupportedArchitecture(String),
    UnsupportedWeights {
        architecture: &'static str,
        weights: String,
    },
    UnsupportedHeadShape {
        architecture: &'static str,
        reason: &'static str,
    },
    CheckpointShapeMismatch(NnErr),
    UnsupportedDevice(String),
    PretrainedUnavailable(PathBuf),
    Nn(NnErr),
}

impl AdaptErr {
    /// Classifies a failed strict load, structural disagreements are reported as
    /// `CheckpointShapeMismatch` and everything else (io, malformed files) as `Nn`.
    pub(crate) fn from_load(err: NnErr) -> Self {
        match err {
            NnErr::ParamShapeMismatch { .. }
            | NnErr::MissingParam(_)
            | NnErr::UnexpectedParam(_) => Self::CheckpointShapeMismatch(err),
            err => Self::Nn(err),
        }
    }
}

impl Display for AdaptErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdaptErr::UnsupportedArchitecture(name) => {
                format!("architecture {name} is not in the catalog")
            }
            AdaptErr::UnsupportedWeights {
                architecture,
                weights,
            } => format!("weights {weights} are not registered for {architecture}"),
            AdaptErr::UnsupportedHeadShape {
                architecture,
                reason,
            } => format!("{architecture} does not have the registered head shape: {reason}"),
            AdaptErr::CheckpointShapeMismatch(e) => {
                format!("checkpoint does not fit the adapted graph: {e}")
            }
            AdaptErr::UnsupportedDevice(device) => {
                format!("device {device} is not available on this backend")
            }
            AdaptErr::PretrainedUnavailable(path) => {
                format!("pretrained parameters not found at {}", path.display())
            }
            AdaptErr::Nn(e) => e.to_string(),
        };

        write!(f, "{s}")
    }
}

impl Error for AdaptErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AdaptErr::CheckpointShapeMismatch(e) | AdaptErr::Nn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NnErr> for AdaptErr {
    fn from(value: NnErr) -> Self {
        match value {
            NnErr::UnsupportedDevice(device) => Self::UnsupportedDevice(device),
            value => Self::Nn(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_failures_are_classified() {
        let err = AdaptErr::from_load(NnErr::MissingParam("fc.weight".into()));
        assert!(matches!(err, AdaptErr::CheckpointShapeMismatch(_)));

        let err = AdaptErr::from_load(NnErr::Io(std::io::ErrorKind::NotFound.into()));
        assert!(matches!(err, AdaptErr::Nn(NnErr::Io(_))));
    }

    #[test]
    fn device_errors_keep_their_kind() {
        let err = AdaptErr::from(NnErr::UnsupportedDevice("cuda:0".into()));
        assert!(matches!(err, AdaptErr::UnsupportedDevice(d) if d == "cuda:0"));
    }
}
