//! Branch statistics for adaptive probabilities.
//!
//! Coefficient statistics pack, per tree node, the number of coded branches
//! (upper 16 bits) and the number of one branches (lower 16 bits). Motion
//! vector statistics count the component values of every coded vector.

#![allow(clippy::needless_range_loop)]

use alloc::vec;
use alloc::vec::Vec;

use crate::common::types::{
    TokenProbTables, MVP_BITS, MVP_IS_SHORT, MVP_SHORT, MVP_SIGN, MV_LONG_BITS, MV_MAX,
    MV_NUM_SHORT, MV_PROB_COUNT, NUM_BANDS, NUM_CTX, NUM_PROBAS, NUM_TYPES,
};
use crate::common::types::{MotionVector, TokenKind};

use super::super::tokenize::{BlockType, TokenBlock};
use super::super::tree::{cost_branch, cost_one, cost_zero, for_each_branch, DCT_TOKENS, SMALL_MV};

/// Token statistics for computing optimal probabilities.
#[derive(Clone)]
pub(crate) struct ProbaStats {
    /// `[type][band][context][node]`
    stats: [[[[u32; NUM_PROBAS]; NUM_CTX]; NUM_BANDS]; NUM_TYPES],
}

impl Default for ProbaStats {
    fn default() -> Self {
        Self {
            stats: [[[[0; NUM_PROBAS]; NUM_CTX]; NUM_BANDS]; NUM_TYPES],
        }
    }
}

impl ProbaStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one branch decision at a node.
    #[inline]
    pub(crate) fn record(&mut self, t: usize, b: usize, c: usize, p: usize, bit: bool) {
        let stats = &mut self.stats[t][b][c][p];
        if *stats >= 0xfffe_0000 {
            // Halve both counts before the total overflows.
            *stats = ((*stats + 1) >> 1) & 0x7fff_7fff;
        }
        *stats += 0x0001_0000 + u32::from(bit);
    }

    /// Records every branch of a token block as [`write_tokens`] codes it.
    ///
    /// The EOB node is only visited when the previous token was not ZERO.
    ///
    /// [`write_tokens`]: super::super::tokenize::write_tokens
    pub(crate) fn record_block(&mut self, btype: BlockType, block: &TokenBlock) {
        let t = btype as usize;
        let mut after_zero = false;
        for token in block.tokens() {
            let (b, c) = (usize::from(token.band), usize::from(token.ctx));
            let start = if after_zero { 2 } else { 0 };
            for_each_branch(&DCT_TOKENS, token.kind as i8, start, |node, bit| {
                self.record(t, b, c, node, bit);
            });
            after_zero = token.kind == TokenKind::Zero;
        }
    }

    /// (ones, total) at a node.
    #[inline]
    fn counts(&self, t: usize, b: usize, c: usize, p: usize) -> (u32, u32) {
        let stats = self.stats[t][b][c][p];
        (stats & 0xffff, stats >> 16)
    }

    /// Probability of a zero branch that best fits the counts, or 255 without data.
    pub(crate) fn calc_proba(&self, t: usize, b: usize, c: usize, p: usize) -> u8 {
        let (nb, total) = self.counts(t, b, c, p);
        if total == 0 {
            return 255;
        }
        (255 - nb * 255 / total) as u8
    }

    /// Decides whether replacing `old_proba` pays for its signalling.
    ///
    /// Returns `(should_update, new_prob, savings)`; savings are in 1/256 bit.
    pub(crate) fn should_update(
        &self,
        t: usize,
        b: usize,
        c: usize,
        p: usize,
        old_proba: u8,
        update_proba: u8,
    ) -> (bool, u8, i64) {
        let (nb, total) = self.counts(t, b, c, p);
        if total == 0 {
            return (false, old_proba, 0);
        }
        // Never adopt p = 0, which the format cannot express.
        let new_p = self.calc_proba(t, b, c, p).max(1);

        let old_cost = branch_cost(nb, total, old_proba) + i64::from(cost_zero(update_proba));
        let new_cost =
            branch_cost(nb, total, new_p) + i64::from(cost_one(update_proba)) + 8 * 256;

        let savings = old_cost - new_cost;
        (savings > 0, new_p, savings)
    }

    /// Applies every profitable update to `probs`, in place.
    ///
    /// Returns the number of updated entries.
    pub(crate) fn apply_updates(
        &self,
        probs: &mut TokenProbTables,
        update_probs: &TokenProbTables,
    ) -> usize {
        let mut updated = 0;
        for t in 0..NUM_TYPES {
            for b in 0..NUM_BANDS {
                for c in 0..NUM_CTX {
                    for p in 0..NUM_PROBAS {
                        let (update, new_p, _) =
                            self.should_update(t, b, c, p, probs[t][b][c][p], update_probs[t][b][c][p]);
                        if update {
                            probs[t][b][c][p] = new_p;
                            updated += 1;
                        }
                    }
                }
            }
        }
        updated
    }
}

/// Cost of `nb` ones out of `total` branches at probability `proba`.
#[inline]
fn branch_cost(nb: u32, total: u32, proba: u8) -> i64 {
    cost_branch(total - nb, nb, proba) as i64
}

/// Counts of one motion vector component's coded values.
#[derive(Clone)]
pub(crate) struct MvComponentStats {
    /// Occurrences of each value, indexed by `value + MV_MAX`.
    events: Vec<u32>,
}

impl Default for MvComponentStats {
    fn default() -> Self {
        Self {
            events: vec![0; 2 * MV_MAX as usize + 1],
        }
    }
}

/// Branch counts `[zeros, ones]` per probability of one component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MvBranchCounts {
    pub(crate) counts: [[u32; 2]; MV_PROB_COUNT],
}

impl MvComponentStats {
    #[inline]
    pub(crate) fn record(&mut self, value: i16) {
        let v = value.clamp(-MV_MAX, MV_MAX);
        self.events[(v + MV_MAX) as usize] += 1;
    }

    /// Branch counts for every probability of the component.
    ///
    /// Long values count all ten magnitude bits, including bit 3 when it is
    /// implied.
    pub(crate) fn branch_counts(&self) -> MvBranchCounts {
        let mut out = MvBranchCounts::default();
        let mut short_ct = [0u32; MV_NUM_SHORT as usize];
        let zero = MV_MAX as usize;
        out.counts[MVP_IS_SHORT][0] += self.events[zero];
        short_ct[0] += self.events[zero];
        for j in 1..=MV_MAX as usize {
            let positive = self.events[zero + j];
            let negative = self.events[zero - j];
            let c = positive + negative;
            out.counts[MVP_SIGN][0] += positive;
            out.counts[MVP_SIGN][1] += negative;
            if j < usize::from(MV_NUM_SHORT) {
                out.counts[MVP_IS_SHORT][0] += c;
                short_ct[j] += c;
            } else {
                out.counts[MVP_IS_SHORT][1] += c;
                for k in 0..MV_LONG_BITS {
                    out.counts[MVP_BITS + k][(j >> k) & 1] += c;
                }
            }
        }
        for (value, &c) in short_ct.iter().enumerate() {
            if c == 0 {
                continue;
            }
            for_each_branch(&SMALL_MV, value as i8, 0, |node, bit| {
                out.counts[MVP_SHORT + node][usize::from(bit)] += c;
            });
        }
        out
    }
}

/// Motion vector statistics of one frame, row component first.
#[derive(Clone, Default)]
pub(crate) struct MvStats {
    pub(crate) components: [MvComponentStats; 2],
}

impl MvStats {
    /// Records a coded vector difference.
    pub(crate) fn record(&mut self, diff: MotionVector) {
        self.components[0].record(diff.row);
        self.components[1].record(diff.col);
    }
}

/// Even probability for `[zeros, ones]`, or `None` without data.
pub(crate) fn calc_mv_prob(ct: [u32; 2]) -> Option<u8> {
    let total = u64::from(ct[0]) + u64::from(ct[1]);
    if total == 0 {
        return None;
    }
    let x = ((u64::from(ct[0]) * 255 / total) as u8) & !1;
    Some(if x == 0 { 1 } else { x })
}

/// Whether moving a motion vector probability from `cur` to `new` is worth its cost.
pub(crate) fn mv_update_pays(ct: [u32; 2], cur: u8, new: u8, update_prob: u8) -> bool {
    let branch = |p: u8| (cost_branch(ct[0], ct[1], p) >> 8) as i64;
    let signal = 6 + ((i64::from(cost_one(update_prob)) - i64::from(cost_zero(update_prob)) + 128) >> 8);
    branch(cur) - branch(new) > signal
}
