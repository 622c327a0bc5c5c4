//! Fixed-size sparse and dense bit/byte vectors over one circulant block.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use serde_with::serde_as;
use std::fmt;
use thiserror::Error;

pub type Index = u32;

#[derive(Copy, Clone, Debug, Error)]
pub enum InvalidSupport {
    #[error("support indices must be in range 0..{0}")]
    OutOfBounds(usize),
    #[error("support indices must all be distinct")]
    RepeatedIndex,
    #[error("support must be of length {0}")]
    WrongLength(usize),
}

/// Ascending-or-not ordered list of `WEIGHT` set-bit positions in `0..LENGTH`.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SparseVector<const WEIGHT: usize, const LENGTH: usize>(
    #[serde_as(as = "[_; WEIGHT]")] [Index; WEIGHT],
);

impl<const WEIGHT: usize, const LENGTH: usize> TryFrom<&[Index]> for SparseVector<WEIGHT, LENGTH> {
    type Error = InvalidSupport;
    fn try_from(supp: &[Index]) -> Result<Self, Self::Error> {
        let supp =
            <[Index; WEIGHT]>::try_from(supp).map_err(|_| InvalidSupport::WrongLength(WEIGHT))?;
        Self::from_support(supp)
    }
}

impl<const WEIGHT: usize, const LENGTH: usize> SparseVector<WEIGHT, LENGTH> {
    pub fn from_support(supp: [Index; WEIGHT]) -> Result<Self, InvalidSupport> {
        let v = Self(supp);
        v.validate()?;
        Ok(v)
    }

    pub fn validate(&self) -> Result<(), InvalidSupport> {
        for idx in self.0 {
            if idx >= self.length() {
                return Err(InvalidSupport::OutOfBounds(LENGTH));
            }
        }
        for i in 0..WEIGHT {
            for j in (i + 1)..WEIGHT {
                if self.get(i) == self.get(j) {
                    return Err(InvalidSupport::RepeatedIndex);
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn sort(&mut self) {
        self.0.sort_unstable()
    }

    #[inline]
    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    #[inline]
    pub fn weight(&self) -> usize {
        WEIGHT
    }

    #[inline]
    pub fn length(&self) -> Index {
        LENGTH as Index
    }

    #[inline]
    pub fn get(&self, i: usize) -> Index {
        self.0[i]
    }

    #[inline]
    pub fn support(&self) -> &[Index; WEIGHT] {
        &self.0
    }

    #[inline]
    pub fn contains(&self, index: &Index) -> bool {
        self.0.contains(index)
    }

    pub fn random<R>(rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut supp = [0 as Index; WEIGHT];
        let mut ctr = 0;
        let dist = Uniform::new(0, LENGTH as Index);
        'outer: while ctr < WEIGHT {
            supp[ctr] = dist.sample(rng);
            for i in 0..ctr {
                if supp[i] == supp[ctr] {
                    continue 'outer;
                }
            }
            ctr += 1;
        }
        Self(supp)
    }

    pub fn dense(&self) -> DenseVector<LENGTH> {
        let mut v = DenseVector::zero();
        for &i in self.support() {
            v.set_one(i as usize);
        }
        v
    }
}

impl<const W: usize, const L: usize> Serialize for SparseVector<W, L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.clone().sorted().0.serialize(serializer)
    }
}

impl<const W: usize, const L: usize> PartialEq for SparseVector<W, L> {
    fn eq(&self, other: &Self) -> bool {
        self.clone().sorted().0 == other.clone().sorted().0
    }
}

impl<const W: usize, const L: usize> Eq for SparseVector<W, L> {}

impl<const W: usize, const L: usize> fmt::Display for SparseVector<W, L> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let str_supp = self
            .support()
            .iter()
            .map(|idx| idx.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{str_supp}]")
    }
}

/// Dense vector of fixed length, one byte per logical entry: a 0/1 bit for
/// syndromes, error vectors and flip masks, or a small accumulated count
/// (at most `BLOCK_WEIGHT`) for per-position counters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct DenseVector<const LENGTH: usize>([u8; LENGTH]);

impl<const LENGTH: usize> Default for DenseVector<LENGTH> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const LENGTH: usize> DenseVector<LENGTH> {
    pub fn zero() -> Self {
        Self([0u8; LENGTH])
    }

    pub fn new(list: [u8; LENGTH]) -> Self {
        Self(list)
    }

    #[inline]
    pub fn get(&self, i: usize) -> u8 {
        self.0[i]
    }

    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    #[inline]
    pub fn flip(&mut self, i: usize) {
        self.0[i] ^= 1;
    }

    #[inline]
    pub fn set_zero(&mut self, i: usize) {
        self.0[i] = 0;
    }

    #[inline]
    pub fn set_one(&mut self, i: usize) {
        self.0[i] = 1;
    }

    #[inline]
    pub fn set_all_zero(&mut self) {
        self.0.iter_mut().for_each(|entry| *entry = 0);
    }

    pub fn support(&self) -> Vec<Index> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(idx, &bit)| (bit != 0).then_some(idx as Index))
            .collect()
    }

    pub fn hamming_weight(&self) -> u32 {
        self.0.iter().filter(|&&b| b != 0).count() as u32
    }

    /// Copies `self[0..length]` into `self[length..2*length]`, so a later
    /// linear scan over a shifted window never needs to wrap modulo `length`.
    pub fn duplicate_up_to(&mut self, length: usize) {
        let (left, right) = self.0.split_at_mut(length);
        right[..length].copy_from_slice(left);
    }
}
