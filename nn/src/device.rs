use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::{NnErr, Result};

/// The compute device a graph and its inputs are bound to.
///
/// Only `Cpu` is executable on this backend; accelerator devices are accepted by the parser so
/// that asking for one fails loudly instead of silently running somewhere else.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl Device {
    /// Checks this device can execute forward passes.
    ///
    /// # Returns
    /// The device itself or `NnErr::UnsupportedDevice`.
    pub fn ensure_available(self) -> Result<Self> {
        match self {
            Device::Cpu => Ok(self),
            Device::Cuda(_) => Err(NnErr::UnsupportedDevice(self.to_string())),
        }
    }

    /// Checks that a tensor living on `other` can be fed to something bound to `self`.
    ///
    /// # Arguments
    /// * `other` - The device of the incoming tensor.
    pub fn check(self, other: Device) -> Result<()> {
        if self != other {
            return Err(NnErr::DeviceMismatch {
                expected: self,
                got: other,
            });
        }

        Ok(())
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = NnErr;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();

        match s.split_once(':') {
            None if s == "cpu" => Ok(Device::Cpu),
            None if s == "cuda" => Ok(Device::Cuda(0)),
            Some(("cuda", ordinal)) => ordinal
                .parse()
                .map(Device::Cuda)
                .map_err(|_| NnErr::UnsupportedDevice(s.clone())),
            _ => Err(NnErr::UnsupportedDevice(s.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_devices() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn accelerators_fail_fast() {
        assert!(Device::Cpu.ensure_available().is_ok());
        assert!(matches!(
            Device::Cuda(0).ensure_available(),
            Err(NnErr::UnsupportedDevice(_))
        ));
    }

    #[test]
    fn mismatch_is_reported() {
        let err = Device::Cpu.check(Device::Cuda(1)).unwrap_err();
        assert!(matches!(
            err,
            NnErr::DeviceMismatch {
                expected: Device::Cpu,
                got: Device::Cuda(1)
            }
        ));
    }
}
