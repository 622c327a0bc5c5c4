//! The iterative bit-flipping decoder with TTL-based flip revocation.

use crate::flip_list::FlipList;
use crate::keys::{CyclicBlock, Key};
use crate::parameters::*;
use crate::sparse;
use crate::threshold::{self, ThresholdError};
use crate::vectors::{DenseVector, SparseVector};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type SparseErrorVector = SparseVector<ERROR_WEIGHT, ROW_LENGTH>;
/// The Ouroboros side-syndrome: a set of `SYNDROME_STOP` positions XORed
/// directly into the initial syndrome, rather than multiplied through H.
pub type OuroborosVector = SparseVector<SYNDROME_STOP, BLOCK_LENGTH>;
pub type Syndrome = DenseVector<DOUBLE_SIZE_AVX>;

/// Outcome of a single trial: the sampled key and error vector, together with
/// whether [`Decoder::decode`] converged on them and how many iterations it
/// took. Used by the harness to tally statistics and to retain enough
/// information to replay a decoding failure.
#[derive(Clone, Debug, Getters, CopyGetters, Serialize, Deserialize)]
pub struct DecodingResult {
    #[getset(get = "pub")]
    key: Key,
    #[getset(get = "pub")]
    e_supp: SparseErrorVector,
    #[getset(get_copy = "pub")]
    success: bool,
    #[getset(get_copy = "pub")]
    iterations: usize,
}

impl DecodingResult {
    pub fn new(key: Key, e_supp: SparseErrorVector, success: bool, iterations: usize) -> Self {
        Self {
            key,
            e_supp,
            success,
            iterations,
        }
    }

    /// Samples a key and error vector via `rng` (or uses `fixed_key` if
    /// given), decodes it with `dec`, and packages the outcome. `dec` is
    /// reused across calls by the caller, matching the decoder's contract
    /// that it owns its scratch buffers across trials.
    pub fn from_trial<R>(
        dec: &mut Decoder,
        fixed_key: Option<&Key>,
        max_iter: usize,
        rng: &mut R,
    ) -> Result<Self, ThresholdError>
    where
        R: rand::Rng + ?Sized,
    {
        let key = fixed_key.cloned().unwrap_or_else(|| Key::random(rng));
        let e_supp = SparseErrorVector::random(rng);
        dec.init(&key, &e_supp, None);
        let success = dec.decode(max_iter)?;
        Ok(Self::new(key, e_supp, success, dec.iter()))
    }

    #[inline]
    pub fn take_key_vector(self) -> (Key, SparseErrorVector) {
        (self.key, self.e_supp)
    }
}

/// A [`DecodingResult`] that failed to converge, with enough information
/// (`key`, `e_supp`) to replay the trial.
#[derive(Clone, Debug, Getters, CopyGetters, Serialize, Deserialize)]
pub struct DecodingFailure {
    #[getset(get = "pub")]
    key: Key,
    #[getset(get = "pub")]
    e_supp: SparseErrorVector,
    #[getset(get_copy = "pub")]
    iterations: usize,
    pub thread: Option<usize>,
}

#[derive(Clone, Copy, Debug, Error)]
#[error("not a decoding failure, so can't convert to DecodingFailure")]
pub struct NotFailureError;

impl TryFrom<DecodingResult> for DecodingFailure {
    type Error = NotFailureError;

    fn try_from(result: DecodingResult) -> Result<Self, NotFailureError> {
        if result.success {
            Err(NotFailureError)
        } else {
            Ok(Self {
                key: result.key.sorted(),
                e_supp: result.e_supp,
                iterations: result.iterations,
                thread: None,
            })
        }
    }
}

/// Owns every buffer the decode loop touches, so a worker thread allocates
/// one `Decoder` and reuses it across many trials via [`Decoder::init`].
#[derive(Clone, Debug)]
pub struct Decoder {
    hrows: Option<(CyclicBlock, CyclicBlock)>,
    /// Sorted copies of the key's column supports. `single_counter` /
    /// `single_flip` walk a column in ascending order and break out of their
    /// first loop as soon as an entry wraps past `block_length`; an unsorted
    /// column makes that break fire before every entry is visited, so a later
    /// entry falls through to the second loop and underflows `position +
    /// column[l] - block_length`. Sorting once here, rather than trusting the
    /// caller's `Key` ordering, is what `Key::rows()` already does for the
    /// row side.
    cols: Option<(CyclicBlock, CyclicBlock)>,
    bits: (DenseVector<BLOCK_LENGTH>, DenseVector<BLOCK_LENGTH>),
    syndrome: Syndrome,
    counters: (DenseVector<BLOCK_LENGTH>, DenseVector<BLOCK_LENGTH>),
    fl: FlipList,
    syndrome_weight: usize,
    iter: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            hrows: None,
            cols: None,
            bits: (DenseVector::zero(), DenseVector::zero()),
            syndrome: Syndrome::zero(),
            counters: (DenseVector::zero(), DenseVector::zero()),
            fl: FlipList::new(INDEX * BLOCK_LENGTH),
            syndrome_weight: 0,
            iter: 0,
        }
    }

    pub fn syndrome_weight(&self) -> usize {
        self.syndrome_weight
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn flip_list_len(&self) -> usize {
        self.fl.len()
    }

    fn reset(&mut self) {
        self.syndrome.set_all_zero();
        self.bits.0.set_all_zero();
        self.bits.1.set_all_zero();
        self.fl.clear();
    }

    /// Installs a fresh key and error vector, deriving the row supports and
    /// the initial syndrome `H . e`. Must be called before [`Decoder::decode`].
    pub fn init(&mut self, key: &Key, e: &SparseErrorVector, e2: Option<&OuroborosVector>) {
        self.reset();
        self.hrows = Some(key.rows());
        self.cols = Some((key.h0().clone().sorted(), key.h1().clone().sorted()));

        let mut e0 = DenseVector::<BLOCK_LENGTH>::zero();
        let mut e1 = DenseVector::<BLOCK_LENGTH>::zero();
        for &pos in e.support() {
            let pos = pos as usize;
            if pos < BLOCK_LENGTH {
                e0.set_one(pos);
            } else {
                e1.set_one(pos - BLOCK_LENGTH);
            }
        }

        {
            let syn = &mut self.syndrome.contents_mut()[..BLOCK_LENGTH];
            sparse::multiply_mod2(key.h0().support(), e0.contents(), syn, BLOCK_LENGTH);
            sparse::multiply_mod2(key.h1().support(), e1.contents(), syn, BLOCK_LENGTH);
            if let Some(e2) = e2 {
                for &pos in e2.support() {
                    syn[pos as usize] ^= 1;
                }
            }
        }
        self.syndrome_weight = self.syndrome.contents()[..BLOCK_LENGTH]
            .iter()
            .filter(|&&b| b != 0)
            .count();
    }

    /// Runs the bit-flipping loop until the syndrome reaches its stopping
    /// weight or `max_iter` iterations elapse. Returns whether it converged.
    pub fn decode(&mut self, max_iter: usize) -> Result<bool, ThresholdError> {
        let (rows0, rows1) = self
            .hrows
            .clone()
            .expect("decoder must be initialized via Decoder::init before decode");
        let (cols0, cols1) = self
            .cols
            .clone()
            .expect("decoder must be initialized via Decoder::init before decode");

        self.iter = 0;
        let mut threshold: u8 = 0;
        let mut recompute_threshold = true;

        while self.iter < max_iter && self.syndrome_weight != SYNDROME_STOP {
            self.iter += 1;

            self.counters.0.set_all_zero();
            self.counters.1.set_all_zero();
            {
                let syn = &self.syndrome.contents()[..BLOCK_LENGTH];
                sparse::multiply(rows0.support(), syn, self.counters.0.contents_mut(), BLOCK_LENGTH);
                sparse::multiply(rows1.support(), syn, self.counters.1.contents_mut(), BLOCK_LENGTH);
            }

            if recompute_threshold {
                let t = remaining_error_estimate(self.fl.len());
                threshold = threshold::compute_threshold(self.syndrome_weight, t)?;
                recompute_threshold = false;
            }

            for k in 0..INDEX {
                let column = if k == 0 { &cols0 } else { &cols1 };
                for j in 0..BLOCK_LENGTH {
                    let counter = if k == 0 {
                        self.counters.0.get(j)
                    } else {
                        self.counters.1.get(j)
                    };
                    if counter < threshold {
                        continue;
                    }
                    recompute_threshold = true;
                    let already_flipped = if k == 0 {
                        self.bits.0.get(j)
                    } else {
                        self.bits.1.get(j)
                    } != 0;
                    let pos = k * BLOCK_LENGTH + j;
                    if already_flipped {
                        self.fl.remove(pos);
                    } else {
                        let ttl = compute_ttl(counter as i32 - threshold as i32);
                        let tod = ((self.iter + ttl as usize) % (TTL_SATURATE + 1)) as u8;
                        self.fl.add(pos, tod);
                    }
                    self.apply_flip(column, k, j);
                }
            }

            if self.syndrome_weight != SYNDROME_STOP && !self.fl.is_empty() {
                let current = (self.iter % (TTL_SATURATE + 1)) as u8;
                let due: Vec<usize> = self
                    .fl
                    .iter()
                    .filter(|&pos| self.fl.tod(pos) == current)
                    .collect();
                for pos in due {
                    let (k, j) = if pos >= BLOCK_LENGTH {
                        (1, pos - BLOCK_LENGTH)
                    } else {
                        (0, pos)
                    };
                    let column = if k == 0 { &cols0 } else { &cols1 };
                    self.apply_flip(column, k, j);
                    self.fl.remove(pos);
                    recompute_threshold = true;
                }
            }
        }

        Ok(self.syndrome_weight == SYNDROME_STOP)
    }

    fn apply_flip(&mut self, column: &CyclicBlock, block: usize, j: usize) {
        let c = {
            let syn = &mut self.syndrome.contents_mut()[..BLOCK_LENGTH];
            let c = sparse::single_counter(column.support(), j, syn, BLOCK_LENGTH);
            sparse::single_flip(column.support(), j, syn, BLOCK_LENGTH);
            c
        };
        let bits = if block == 0 {
            &mut self.bits.0
        } else {
            &mut self.bits.1
        };
        bits.flip(j);
        self.syndrome_weight =
            (self.syndrome_weight as i64 + BLOCK_WEIGHT as i64 - 2 * c as i64) as usize;
    }
}

fn remaining_error_estimate(flip_list_len: usize) -> usize {
    let t = ERROR_WEIGHT as i64 - flip_list_len as i64;
    if t > 0 {
        t as usize
    } else {
        1
    }
}

fn compute_ttl(diff: i32) -> u8 {
    let ttl = (diff as f64 * TTL_COEFF0 + TTL_COEFF1) as i32;
    ttl.clamp(1, TTL_SATURATE as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::Index;

    #[test]
    fn zero_error_converges_immediately() {
        let mut rng = rand::thread_rng();
        let key = Key::random(&mut rng);
        let e = SparseErrorVector::from_support(std::array::from_fn(|i| i as Index)).unwrap();
        // weight-ERROR_WEIGHT support but we want an all-zero error: build a
        // dense vector instead and synthesize a trivially-empty effect by
        // initializing, then immediately zeroing the syndrome to emulate e=0.
        let mut dec = Decoder::new();
        dec.init(&key, &e, None);
        dec.syndrome.set_all_zero();
        dec.syndrome_weight = 0;
        let success = dec.decode(100).unwrap();
        assert!(success);
        assert_eq!(dec.iter(), 0);
    }

    #[test]
    fn single_bit_error_converges_in_one_iteration() {
        // Scenario B: a true weight-1 error can't be expressed by
        // SparseErrorVector (fixed at ERROR_WEIGHT), so init against an
        // arbitrary error to populate hrows/cols, then overwrite the
        // installed syndrome to the one a single flipped bit at block-0
        // position 0 would produce (weight exactly BLOCK_WEIGHT, per
        // `single_flipped_input_bit_yields_full_column_weight_syndrome` in
        // decoding-tests.rs) — the same post-init override
        // `zero_error_converges_immediately` uses for weight 0.
        let mut rng = rand::thread_rng();
        let key = Key::random(&mut rng);
        let e = SparseErrorVector::random(&mut rng);
        let mut dec = Decoder::new();
        dec.init(&key, &e, None);

        let mut e0 = DenseVector::<BLOCK_LENGTH>::zero();
        e0.set_one(0);
        let syn = &mut dec.syndrome.contents_mut()[..BLOCK_LENGTH];
        syn.fill(0);
        sparse::multiply_mod2(key.h0().support(), e0.contents(), syn, BLOCK_LENGTH);
        dec.syndrome_weight = BLOCK_WEIGHT;

        let success = dec.decode(100).unwrap();
        assert!(success);
        assert_eq!(dec.iter(), 1);
    }

    #[test]
    fn apply_flip_is_its_own_inverse_on_syndrome_weight() {
        let mut rng = rand::thread_rng();
        let key = Key::random(&mut rng);
        let e = SparseErrorVector::random(&mut rng);
        let mut dec = Decoder::new();
        dec.init(&key, &e, None);
        let before = dec.syndrome.clone();
        let before_weight = dec.syndrome_weight;
        let column = key.h0().clone().sorted();
        dec.apply_flip(&column, 0, 3);
        dec.apply_flip(&column, 0, 3);
        assert_eq!(dec.syndrome, before);
        assert_eq!(dec.syndrome_weight, before_weight);
    }

    #[test]
    fn decoding_result_converts_to_failure_only_when_unsuccessful() {
        let mut rng = rand::thread_rng();
        let mut dec = Decoder::new();
        for _ in 0..50 {
            let result = DecodingResult::from_trial(&mut dec, None, NB_ITER, &mut rng).unwrap();
            let success = result.success();
            let converted = DecodingFailure::try_from(result);
            assert_eq!(converted.is_err(), success);
        }
    }

    #[test]
    fn decoding_failure_serde_round_trips() {
        let mut rng = rand::thread_rng();
        let key = Key::random(&mut rng);
        let e = SparseErrorVector::random(&mut rng);
        let result = DecodingResult::new(key, e, false, NB_ITER);
        let df = DecodingFailure::try_from(result).expect("success=false must convert");
        let json = serde_json::to_string(&df).unwrap();
        let back: DecodingFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(df.key(), back.key());
        assert_eq!(df.e_supp(), back.e_supp());
    }
}
