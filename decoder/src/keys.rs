use crate::parameters::*;
use crate::vectors::{Index, InvalidSupport, SparseVector};
use getset::Getters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CyclicBlock = SparseVector<BLOCK_WEIGHT, BLOCK_LENGTH>;

/// A random quasi-cyclic parity-check matrix, stored as its two column
/// supports `h0`, `h1`. Row supports (`Hrows` in the reference decoder) are
/// derived on demand via [`Key::columns_to_rows`].
#[derive(Clone, Debug, Deserialize, Eq, Getters, PartialEq, Serialize)]
#[getset(get = "pub")]
pub struct Key {
    h0: CyclicBlock,
    h1: CyclicBlock,
}

impl Key {
    #[inline]
    pub fn new(h0: CyclicBlock, h1: CyclicBlock) -> Self {
        Self { h0, h1 }
    }

    pub fn from_support(
        h0_supp: [Index; BLOCK_WEIGHT],
        h1_supp: [Index; BLOCK_WEIGHT],
    ) -> Result<Self, InvalidSupport> {
        Ok(Self {
            h0: CyclicBlock::from_support(h0_supp)?,
            h1: CyclicBlock::from_support(h1_supp)?,
        })
    }

    #[inline]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            h0: CyclicBlock::random(rng),
            h1: CyclicBlock::random(rng),
        }
    }

    #[inline]
    pub fn take_blocks(self) -> (CyclicBlock, CyclicBlock) {
        (self.h0, self.h1)
    }

    pub fn validate(&self) -> Result<(), InvalidSupport> {
        self.h0.validate()?;
        self.h1.validate()?;
        Ok(())
    }

    #[inline]
    pub fn sort(&mut self) {
        self.h0.sort();
        self.h1.sort();
    }

    #[inline]
    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    /// Derives the row support of each circulant block from its column
    /// support, by cyclic reflection: row `k` holds `(BLOCK_LENGTH - column)
    /// mod BLOCK_LENGTH` for each column entry, with `0` fixed. `columns_to_rows`
    /// relies on ascending input (it locates the zero entry, if any, at index
    /// 0), so the column support is sorted here regardless of the key's own
    /// ordering.
    pub fn rows(&self) -> (CyclicBlock, CyclicBlock) {
        let h0_sorted = self.h0.clone().sorted();
        let h1_sorted = self.h1.clone().sorted();
        (
            columns_to_rows(h0_sorted.support()),
            columns_to_rows(h1_sorted.support()),
        )
    }
}

fn columns_to_rows(columns: &[Index; BLOCK_WEIGHT]) -> CyclicBlock {
    let n = BLOCK_LENGTH as Index;
    let mut rows = [0 as Index; BLOCK_WEIGHT];
    let l = if columns[0] == 0 {
        rows[0] = 0;
        1
    } else {
        rows[0] = n - columns[BLOCK_WEIGHT - 1];
        0
    };
    for k in 1..BLOCK_WEIGHT {
        rows[k] = n - columns[BLOCK_WEIGHT + l - 1 - k];
    }
    CyclicBlock::from_support(rows).expect("reflection of a valid column support is valid")
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{h0: {}, h1: {}}}", self.h0(), self.h1())
    }
}
