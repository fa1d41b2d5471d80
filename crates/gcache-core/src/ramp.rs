//! Per-call probabilistic tier participation ("ramp").

use rand::Rng;

/// Decides whether a layer participates in this call.
///
/// `ramp` is an integer percentage in `0..=100`. `0` always declines,
/// `100` always participates; intermediate values draw a uniform integer
/// in `[1, 100]` and participate iff the draw is `<= ramp`.
pub fn participates(ramp: u8) -> bool {
    match ramp {
        0 => false,
        100 => true,
        _ => rand::rng().random_range(1..=100) <= ramp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_never_participates() {
        for _ in 0..1000 {
            assert!(!participates(0));
        }
    }

    #[test]
    fn hundred_always_participates() {
        for _ in 0..1000 {
            assert!(participates(100));
        }
    }

    #[test]
    fn intermediate_ramp_is_within_tolerance() {
        let trials = 10_000;
        let hits = (0..trials).filter(|_| participates(50)).count();
        let rate = hits as f64 / trials as f64;
        assert!((0.47..=0.53).contains(&rate), "observed rate {rate}");
    }
}
