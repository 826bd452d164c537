use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::InitErr;

/// How the initial values of a parameter are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scheme {
    /// Zero mean normal with a standard deviation of `sqrt(2 / fan_out)`.
    KaimingNormal { fan_out: usize },
    /// Uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    FanInUniform { fan_in: usize },
    Constant(f32),
}

impl Scheme {
    /// Draws `n` values.
    ///
    /// # Arguments
    /// * `rng` - The source of randomness, untouched by `Constant`.
    /// * `n` - How many values to draw.
    ///
    /// # Returns
    /// The values or an error if the scheme's distribution is degenerate.
    pub fn sample<R: Rng + ?Sized>(self, rng: &mut R, n: usize) -> Result<Vec<f32>, InitErr> {
        match self {
            Self::KaimingNormal { fan_out } => {
                let std_dev = (2. / fan_out.max(1) as f32).sqrt();
                Ok(draw(rng, Normal::new(0., std_dev)?, n))
            }
            Self::FanInUniform { fan_in } => {
                let bound = 1. / (fan_in.max(1) as f32).sqrt();
                Ok(draw(rng, Uniform::new(-bound, bound)?, n))
            }
            Self::Constant(value) => Ok(vec![value; n]),
        }
    }
}

fn draw<R, D>(rng: &mut R, distribution: D, n: usize) -> Vec<f32>
where
    R: Rng + ?Sized,
    D: Distribution<f32>,
{
    (0..n).map(|_| distribution.sample(rng)).collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn fan_in_bounds() {
        let sample = Scheme::FanInUniform { fan_in: 16 }
            .sample(&mut rng(), 100)
            .unwrap();

        assert_eq!(sample.len(), 100);
        assert!(sample.iter().all(|v| v.abs() <= 0.25));
    }

    #[test]
    fn kaiming_spread_follows_fan_out() {
        let sample = Scheme::KaimingNormal { fan_out: 8 }
            .sample(&mut rng(), 4096)
            .unwrap();

        let var = sample.iter().map(|v| v * v).sum::<f32>() / sample.len() as f32;
        assert!((var - 0.25).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn zero_fans_do_not_divide_by_zero() {
        let sample = Scheme::FanInUniform { fan_in: 0 }
            .sample(&mut rng(), 8)
            .unwrap();
        assert!(sample.iter().all(|v| v.abs() <= 1.));
    }

    #[test]
    fn same_seed_same_sample() {
        let scheme = Scheme::KaimingNormal { fan_out: 4 };
        assert_eq!(
            scheme.sample(&mut rng(), 8).unwrap(),
            scheme.sample(&mut rng(), 8).unwrap()
        );
    }
}
