const ALPHA: f32 = 1.673_263_2;
const SCALE: f32 = 1.050_701;

/// Scaled exponential linear unit.
pub fn selu(z: f32) -> f32 {
    if z > 0. {
        SCALE * z
    } else {
        SCALE * ALPHA * z.exp_m1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selu_values() {
        assert_eq!(selu(0.), 0.);
        assert!((selu(1.) - SCALE).abs() < 1e-6);
        assert!((selu(-100.) + SCALE * ALPHA).abs() < 1e-4);
    }
}
