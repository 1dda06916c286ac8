use bitvec::vec::BitVec;
use std::fmt;

use crate::pattern::PatternId;

/// A packed set of pattern ids. Cells of the wave and rows of the rule table
/// are both sets over the same dense id space, so they share this type.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    bits: BitVec,
}

impl PatternSet {
    pub fn empty(num_patterns: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, num_patterns),
        }
    }

    pub fn full(num_patterns: usize) -> Self {
        Self {
            bits: BitVec::repeat(true, num_patterns),
        }
    }

    /// Width of the set, not its cardinality.
    pub fn num_patterns(&self) -> usize {
        self.bits.len()
    }

    pub fn contains(&self, pattern_id: PatternId) -> bool {
        self.bits[pattern_id as usize]
    }

    pub fn insert(&mut self, pattern_id: PatternId) {
        self.bits.set(pattern_id as usize, true);
    }

    /// Returns whether the bit was set.
    pub fn remove(&mut self, pattern_id: PatternId) -> bool {
        let was_set = self.bits[pattern_id as usize];
        self.bits.set(pattern_id as usize, false);
        was_set
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn union_with(&mut self, other: &PatternSet) {
        self.bits |= other.bits.as_bitslice();
    }

    pub fn intersect_with(&mut self, other: &PatternSet) {
        self.bits &= other.bits.as_bitslice();
    }

    pub fn iter(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.bits.iter_ones().map(|index| index as PatternId)
    }

    /// The sole member, if there is exactly one.
    pub fn singleton(&self) -> Option<PatternId> {
        if self.count() == 1 {
            self.iter().next()
        } else {
            None
        }
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
