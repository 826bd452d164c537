mod error;
mod scheme;

use std::cell::RefCell;

use rand::{SeedableRng, rngs::StdRng};

pub use error::InitErr;
pub use scheme::Scheme;

use crate::{Param, Result};

/// Fills freshly built layers with their initial values.
///
/// Every layer kind picks its own scheme: convolutions use Kaiming normal over their fan out,
/// fully connected layers draw uniformly from `±1/sqrt(fan_in)` and normalization layers start
/// as the identity. Parameters are drawn one after the other from a single rng, so a seeded
/// initializer reproduces a whole graph.
pub struct Initializer {
    rng: RefCell<StdRng>,
}

impl Initializer {
    /// Creates a new `Initializer`.
    ///
    /// # Arguments
    /// * `seed` - An optional seed for the rng, entropy from the os is used otherwise.
    ///
    /// # Returns
    /// A new `Initializer` instance.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            rng: RefCell::new(rng),
        }
    }

    pub fn kaiming(&self, param: &mut Param, fan_out: usize) -> Result<()> {
        self.fill(param, Scheme::KaimingNormal { fan_out })
    }

    pub fn fan_in_uniform(&self, param: &mut Param, fan_in: usize) -> Result<()> {
        self.fill(param, Scheme::FanInUniform { fan_in })
    }

    pub fn constant(&self, param: &mut Param, value: f32) -> Result<()> {
        self.fill(param, Scheme::Constant(value))
    }

    /// Overwrites `param` with values drawn from `scheme`.
    pub fn fill(&self, param: &mut Param, scheme: Scheme) -> Result<()> {
        let values = scheme.sample(&mut *self.rng.borrow_mut(), param.len())?;
        param.fill(values)
    }
}
