//! Random variate samplers: Beta (efficacy), Triangular (recovery time), Bernoulli (events).
//!
//! Every sampler validates its parameters and fails fast with [`SimError::Domain`]; clamping is
//! the adjustment layer's job, never the sampler's. The generator is borrowed mutably and
//! advancing it is the only side effect.
//!
//! The `*_distribution` constructors validate once so the trial engine can build its
//! distributions before the first trial and reuse them for the whole batch.

use rand::Rng;
use rand_distr::{Bernoulli, Beta, Distribution, Triangular};

use crate::SimError;

/// Validated Beta(alpha, beta).
pub fn beta_distribution(alpha: f64, beta: f64) -> Result<Beta<f64>, SimError> {
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(SimError::domain("Beta", "alpha", alpha, "must be finite and > 0"));
    }
    if !(beta.is_finite() && beta > 0.0) {
        return Err(SimError::domain("Beta", "beta", beta, "must be finite and > 0"));
    }
    Beta::new(alpha, beta)
        .map_err(|_| SimError::domain("Beta", "alpha", alpha, "rejected by sampler"))
}

/// Validated Triangular(a, b, c) with `a <= b <= c` (optimistic, likely, pessimistic).
pub fn triangular_distribution(a: f64, b: f64, c: f64) -> Result<Triangular<f64>, SimError> {
    for (name, v) in [("a", a), ("b", b), ("c", c)] {
        if !v.is_finite() {
            return Err(SimError::domain("Triangular", name, v, "must be finite"));
        }
    }
    if a > b {
        return Err(SimError::domain("Triangular", "b", b, "mode must be >= lower bound"));
    }
    if b > c {
        return Err(SimError::domain("Triangular", "c", c, "upper bound must be >= mode"));
    }
    // rand_distr takes (min, max, mode).
    Triangular::new(a, c, b)
        .map_err(|_| SimError::domain("Triangular", "b", b, "rejected by sampler"))
}

/// Validated Bernoulli(p) with `p` in `[0, 1]`.
pub fn bernoulli_distribution(p: f64) -> Result<Bernoulli, SimError> {
    if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
        return Err(SimError::domain("Bernoulli", "p", p, "must lie in [0, 1]"));
    }
    Bernoulli::new(p).map_err(|_| SimError::domain("Bernoulli", "p", p, "rejected by sampler"))
}

/// One draw from Beta(alpha, beta), in `[0, 1]`.
pub fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> Result<f64, SimError> {
    Ok(beta_distribution(alpha, beta)?.sample(rng))
}

/// One draw from Triangular(a, b, c), in `[a, c]`.
pub fn sample_triangular<R: Rng + ?Sized>(
    rng: &mut R,
    a: f64,
    b: f64,
    c: f64,
) -> Result<f64, SimError> {
    Ok(triangular_distribution(a, b, c)?.sample(rng))
}

/// One Bernoulli(p) trial.
pub fn sample_bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> Result<bool, SimError> {
    Ok(bernoulli_distribution(p)?.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn beta_sample_mean_matches_alpha_over_alpha_plus_beta() {
        for &(a, b) in &[(8.0, 3.0), (0.5, 0.5), (2.0, 5.0), (65.0, 35.0)] {
            let mut rng = StdRng::seed_from_u64(11);
            let d = beta_distribution(a, b).unwrap();
            let n = 100_000;
            let mean = (0..n).map(|_| d.sample(&mut rng)).sum::<f64>() / n as f64;
            let expected = a / (a + b);
            assert!(
                (mean - expected).abs() < 0.005,
                "Beta({a},{b}) mean={mean} expected={expected}"
            );
        }
    }

    #[test]
    fn triangular_empirical_mode_converges_to_b() {
        let (a, b, c) = (20.0, 30.0, 45.0);
        let mut rng = StdRng::seed_from_u64(3);
        let d = triangular_distribution(a, b, c).unwrap();
        let bins = 25usize;
        let width = (c - a) / bins as f64;
        let mut hist = vec![0u64; bins];
        for _ in 0..200_000 {
            let x = d.sample(&mut rng);
            assert!((a..=c).contains(&x));
            let i = (((x - a) / width) as usize).min(bins - 1);
            hist[i] += 1;
        }
        let peak = hist
            .iter()
            .enumerate()
            .max_by_key(|(_, &n)| n)
            .map(|(i, _)| i)
            .unwrap();
        let peak_center = a + (peak as f64 + 0.5) * width;
        assert!(
            (peak_center - b).abs() <= 1.5 * width,
            "peak at {peak_center}, mode {b}"
        );
    }

    #[test]
    fn degenerate_triangular_returns_the_point() {
        let mut rng = StdRng::seed_from_u64(0);
        let x = sample_triangular(&mut rng, 10.0, 10.0, 10.0).unwrap();
        assert_eq!(x, 10.0);
    }

    #[test]
    fn bernoulli_edges_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            assert!(!sample_bernoulli(&mut rng, 0.0).unwrap());
            assert!(sample_bernoulli(&mut rng, 1.0).unwrap());
        }
    }

    #[test]
    fn domain_violations_fail_fast() {
        assert!(beta_distribution(0.0, 1.0).unwrap_err().is_domain());
        assert!(beta_distribution(1.0, -2.0).unwrap_err().is_domain());
        assert!(beta_distribution(f64::NAN, 1.0).unwrap_err().is_domain());
        assert!(triangular_distribution(5.0, 4.0, 6.0).unwrap_err().is_domain());
        assert!(triangular_distribution(1.0, 4.0, 3.0).unwrap_err().is_domain());
        assert!(triangular_distribution(1.0, f64::INFINITY, 3.0).unwrap_err().is_domain());
        assert!(bernoulli_distribution(1.01).unwrap_err().is_domain());
        assert!(bernoulli_distribution(-0.1).unwrap_err().is_domain());
    }

    #[test]
    fn failed_validation_does_not_advance_the_generator() {
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        assert!(sample_beta(&mut a, 0.0, 1.0).is_err());
        let x = sample_beta(&mut a, 2.0, 2.0).unwrap();
        let y = sample_beta(&mut b, 2.0, 2.0).unwrap();
        assert_eq!(x, y);
    }

    proptest! {
        #[test]
        fn beta_draws_stay_in_unit_interval(
            alpha in 0.05f64..50.0,
            beta in 0.05f64..50.0,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..64 {
                let x = sample_beta(&mut rng, alpha, beta).unwrap();
                prop_assert!((0.0..=1.0).contains(&x), "x={}", x);
            }
        }

        #[test]
        fn triangular_draws_stay_in_support(
            a in 0.0f64..100.0,
            d1 in 0.0f64..50.0,
            d2 in 0.0f64..50.0,
            seed in any::<u64>(),
        ) {
            let (b, c) = (a + d1, a + d1 + d2);
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..64 {
                let x = sample_triangular(&mut rng, a, b, c).unwrap();
                prop_assert!(x >= a && x <= c, "x={} not in [{}, {}]", x, a, c);
            }
        }
    }
}
