/// The logistic function, evaluated without overflowing `exp` for large magnitudes.
pub fn sigmoid(z: f32) -> f32 {
    if z >= 0. {
        1. / (1. + (-z).exp())
    } else {
        let e = z.exp();
        e / (1. + e)
    }
}

/// Piecewise linear approximation of the logistic function, `relu6(z + 3) / 6`.
pub fn hard_sigmoid(z: f32) -> f32 {
    ((z + 3.).clamp(0., 6.)) / 6.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_and_tails() {
        assert_eq!(sigmoid(0.), 0.5);
        assert!(sigmoid(-200.) >= 0.);
        assert!(sigmoid(200.) <= 1.);
        assert!((sigmoid(2.) + sigmoid(-2.) - 1.).abs() < 1e-6);
    }

    #[test]
    fn hard_sigmoid_saturates() {
        assert_eq!(hard_sigmoid(-4.), 0.);
        assert_eq!(hard_sigmoid(0.), 0.5);
        assert_eq!(hard_sigmoid(4.), 1.);
    }
}
