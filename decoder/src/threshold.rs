//! The per-iteration bit-flip threshold, derived from a binomial model of
//! syndrome bit probabilities.
//!
//! `compute_threshold(s, t)` takes the current syndrome weight `s` and a
//! remaining-error estimate `t`, and returns the counter value at which a
//! position is worth flipping. The derivation (`ln_binomial`, `euh_log`,
//! `expected_odd_weight`, `prob_zero`/`prob_one`) mirrors the probabilistic
//! threshold oracle of the reference decoder, expressed with `statrs`'s
//! log-gamma instead of hand-rolled `lgamma`.

use statrs::function::gamma::ln_gamma;
use thiserror::Error;

use crate::parameters::{BLOCK_LENGTH, BLOCK_WEIGHT, INDEX};

#[derive(Copy, Clone, Debug, Error)]
pub enum ThresholdError {
    #[error("syndrome weight ({0}) cannot be greater than block length ({1})")]
    WeightError(usize, usize),
    #[error("remaining error estimate must be positive")]
    ZeroRemainingError,
}

/// `ln C(n, k)`, the log of the binomial coefficient, via log-gamma.
fn ln_binomial(n: usize, k: usize) -> f64 {
    if k == 0 || k == n {
        0.0
    } else {
        ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
    }
}

fn xlny(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

fn ln_binomial_pmf(n: usize, k: usize, p: f64, q: f64) -> f64 {
    ln_binomial(n, k) + xlny(k as f64, p) + xlny((n - k) as f64, q)
}

/// `ln Pr[exactly `i` of the `t` true errors land in a fixed weight-`INDEX*BLOCK_WEIGHT`
/// set of positions, out of `INDEX*BLOCK_LENGTH` total]`.
fn euh_log(t: usize, i: usize) -> f64 {
    let ww = INDEX * BLOCK_WEIGHT;
    let l = INDEX * BLOCK_LENGTH;
    ln_binomial(ww, i) + ln_binomial(l - ww, t - i) - ln_binomial(l, t)
}

/// `X(t) = E[sum((l - 1) * Pr[l errors overlap], l odd)]`, truncated at the
/// first 10 odd terms since `euh_log` decays fast in `i`.
fn expected_odd_weight(t: usize) -> f64 {
    let mut numer = 0.0;
    let mut denom = 0.0;
    let mut i = 1;
    while i < 10 && i < t {
        let w = euh_log(t, i).exp();
        numer += (i - 1) as f64 * w;
        denom += w;
        i += 2;
    }
    if denom == 0.0 {
        0.0
    } else {
        numer / denom
    }
}

/// Probability a syndrome-zero position's counter is incremented by chance.
fn prob_zero(s: usize, t: usize, x: f64) -> f64 {
    let ww = INDEX * BLOCK_WEIGHT;
    let l = INDEX * BLOCK_LENGTH;
    ((ww - 1) as f64 * s as f64 - x) / ((l - t) as f64 * BLOCK_WEIGHT as f64)
}

/// Probability a true-error position's counter is incremented.
fn prob_one(s: usize, t: usize, x: f64) -> f64 {
    (s as f64 + x) / (t as f64 * BLOCK_WEIGHT as f64)
}

/// Returns the minimum counter value at which a position should be flipped,
/// given the current syndrome weight `s` and remaining-error estimate `t`
/// (both callers clamp `t` to at least 1 before calling).
pub fn compute_threshold(s: usize, t: usize) -> Result<u8, ThresholdError> {
    if s > BLOCK_LENGTH {
        return Err(ThresholdError::WeightError(s, BLOCK_LENGTH));
    }
    if t == 0 {
        return Err(ThresholdError::ZeroRemainingError);
    }
    let x = expected_odd_weight(t) * s as f64;
    let p = prob_zero(s, t, x);
    let q = prob_one(s, t, x);

    let floor = bf_threshold_min();
    let w = BLOCK_WEIGHT;
    let l = INDEX * BLOCK_LENGTH;

    let threshold = if p >= 1.0 || p > q {
        w
    } else if q >= 1.0 {
        let mut threshold = w + 1;
        loop {
            threshold -= 1;
            let diff = -ln_binomial_pmf(w, threshold, p, 1.0 - p).exp() * (l - t) as f64 + 1.0;
            if !(diff >= 0.0 && threshold > floor) {
                break;
            }
        }
        if threshold < w {
            threshold + 1
        } else {
            w
        }
    } else {
        let mut threshold = w + 1;
        loop {
            threshold -= 1;
            let diff = -ln_binomial_pmf(w, threshold, p, 1.0 - p).exp() * (l - t) as f64
                + ln_binomial_pmf(w, threshold, q, 1.0 - q).exp() * t as f64;
            if !(diff >= 0.0 && threshold > floor) {
                break;
            }
        }
        if threshold < w {
            threshold + 1
        } else {
            w
        }
    };
    Ok(threshold as u8)
}

/// `(BLOCK_WEIGHT + 1) / 2`, the minimum threshold the oracle ever returns.
pub const fn bf_threshold_min() -> usize {
    (BLOCK_WEIGHT + 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_bounds() {
        for s in [0usize, 1, 7, BLOCK_LENGTH / 2, BLOCK_LENGTH] {
            for t in [1usize, 5, BLOCK_WEIGHT] {
                let thresh = compute_threshold(s, t).unwrap();
                assert!((bf_threshold_min() as u8..=BLOCK_WEIGHT as u8).contains(&thresh));
            }
        }
    }

    #[test]
    fn zero_syndrome_weight_gives_max_threshold() {
        assert_eq!(compute_threshold(0, 5).unwrap(), BLOCK_WEIGHT as u8);
    }

    #[test]
    fn rejects_out_of_range_syndrome_weight() {
        assert!(matches!(
            compute_threshold(BLOCK_LENGTH + 1, 5),
            Err(ThresholdError::WeightError(_, _))
        ));
    }

    #[test]
    fn rejects_zero_remaining_error() {
        assert!(matches!(
            compute_threshold(3, 0),
            Err(ThresholdError::ZeroRemainingError)
        ));
    }
}
