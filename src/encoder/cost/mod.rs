//! Rate estimation for mode decision.
//!
//! Encoding cost depends on:
//! 1. Mode signalling cost (tree-coded, from the frame's mode probabilities)
//! 2. Motion vector cost (from the persisted MV probabilities)
//! 3. Coefficient cost (from the persisted token probabilities and contexts)
//!
//! [`RdCostTables`] precomputes all three once per frame; scores then follow
//! `rate * lambda + 256 * sse` (see [`lambda`]).
//!
//! ## Module organization
//!
//! - [`distortion`]: SSE/SAD/variance over strided blocks
//! - [`lambda`]: lambda and per-bit weights from the quantizer
//! - [`stats`]: branch statistics for probability adaptation

#![allow(clippy::needless_range_loop)]

pub(crate) mod distortion;
pub(crate) mod lambda;
pub(crate) mod stats;

use alloc::vec;
use alloc::vec::Vec;

use crate::common::types::{
    TokenKind, TokenProbTables, BMODE_PROBS, DCT_CAT_BITS, KEYFRAME_BPRED_MODE_PROBS,
    KEYFRAME_UV_MODE_PROBS, KEYFRAME_YMODE_PROBS, MB_SPLIT_PROBS, MVP_BITS, MVP_IS_SHORT,
    MVP_SHORT, MVP_SIGN, MV_LONG_BITS, MV_MAX, MV_NUM_SHORT, MV_PROB_COUNT, NUM_BANDS, NUM_CTX,
    NUM_DCT_TOKENS, NUM_TYPES, PROB_DCT_CAT, SUB_MV_REF_PROBS, UV_MODE_PROBS, YMODE_PROBS,
};
use crate::common::types::{InterMode, MotionVector};

use super::tokenize::{BlockType, TokenBlock};
use super::tree::{
    cost, cost_bit, cost_one, cost_tokens, cost_tokens_from, cost_zero, BMODE, DCT_TOKENS,
    KEYFRAME_YMODE, MB_SPLIT, MV_REF, SMALL_MV, SUB_MV_REF, UV_MODE, YMODE,
};

pub(crate) use lambda::{error_per_bit, mv_penalty, rd_lambda, rd_score, sad_per_bit};

/// Token costs `[type][band][ctx][after_zero][token]`.
type TokenCosts = [[[[[u32; NUM_DCT_TOKENS]; 2]; NUM_CTX]; NUM_BANDS]; NUM_TYPES];

/// Per-frame rate tables in 1/256 bit.
#[derive(Clone)]
pub(crate) struct RdCostTables {
    tokens: TokenCosts,
    /// Per component, indexed by `value + MV_MAX`.
    mv: [Vec<u32>; 2],
    /// Keyframe luma modes, indexed by `LumaMode`.
    pub(crate) kf_ymode: [u32; 5],
    /// Inter-frame luma modes.
    pub(crate) ymode: [u32; 5],
    pub(crate) kf_uv: [u32; 4],
    pub(crate) uv: [u32; 4],
    /// Keyframe sub-block modes `[above][left][mode]`.
    pub(crate) kf_bmode: [[[u32; 10]; 10]; 10],
    /// Inter-frame sub-block modes.
    pub(crate) bmode: [u32; 10],
    pub(crate) split_shape: [u32; 4],
    /// Sub-MV references by left/above context.
    pub(crate) sub_mv_ref: [[u32; 4]; 5],
}

impl RdCostTables {
    /// Builds the tables for the frame's coefficient and MV probabilities.
    pub(crate) fn new(coeffs: &TokenProbTables, mv_probs: &[[u8; MV_PROB_COUNT]; 2]) -> Self {
        let mut t = Self {
            tokens: [[[[[0; NUM_DCT_TOKENS]; 2]; NUM_CTX]; NUM_BANDS]; NUM_TYPES],
            mv: [vec![0; 2 * MV_MAX as usize + 1], vec![0; 2 * MV_MAX as usize + 1]],
            kf_ymode: [0; 5],
            ymode: [0; 5],
            kf_uv: [0; 4],
            uv: [0; 4],
            kf_bmode: [[[0; 10]; 10]; 10],
            bmode: [0; 10],
            split_shape: [0; 4],
            sub_mv_ref: [[0; 4]; 5],
        };
        t.update_tokens(coeffs);
        t.update_mv(mv_probs);

        cost_tokens(&KEYFRAME_YMODE, &KEYFRAME_YMODE_PROBS, &mut t.kf_ymode);
        cost_tokens(&YMODE, &YMODE_PROBS, &mut t.ymode);
        cost_tokens(&UV_MODE, &KEYFRAME_UV_MODE_PROBS, &mut t.kf_uv);
        cost_tokens(&UV_MODE, &UV_MODE_PROBS, &mut t.uv);
        for above in 0..10 {
            for left in 0..10 {
                cost_tokens(
                    &BMODE,
                    &KEYFRAME_BPRED_MODE_PROBS[above][left],
                    &mut t.kf_bmode[above][left],
                );
            }
        }
        cost_tokens(&BMODE, &BMODE_PROBS, &mut t.bmode);
        cost_tokens(&MB_SPLIT, &MB_SPLIT_PROBS, &mut t.split_shape);
        for (costs, probs) in t.sub_mv_ref.iter_mut().zip(SUB_MV_REF_PROBS.iter()) {
            cost_tokens(&SUB_MV_REF, probs, costs);
        }
        t
    }

    /// Recomputes the token costs.
    fn update_tokens(&mut self, coeffs: &TokenProbTables) {
        for t in 0..NUM_TYPES {
            for b in 0..NUM_BANDS {
                for c in 0..NUM_CTX {
                    let probs = &coeffs[t][b][c];
                    let entry = &mut self.tokens[t][b][c];
                    cost_tokens(&DCT_TOKENS, probs, &mut entry[0]);
                    cost_tokens_from(&DCT_TOKENS, probs, 2, &mut entry[1]);
                }
            }
        }
    }

    /// Recomputes the motion vector component costs.
    fn update_mv(&mut self, mv_probs: &[[u8; MV_PROB_COUNT]; 2]) {
        for (table, p) in self.mv.iter_mut().zip(mv_probs.iter()) {
            let mut short = [0u32; MV_NUM_SHORT as usize];
            cost_tokens(&SMALL_MV, &p[MVP_SHORT..MVP_BITS], &mut short);
            let zero = MV_MAX as usize;
            table[zero] = cost_zero(p[MVP_IS_SHORT]) + short[0];
            for v in 1..=MV_MAX as usize {
                let magnitude = if v < usize::from(MV_NUM_SHORT) {
                    cost_zero(p[MVP_IS_SHORT]) + short[v]
                } else {
                    long_magnitude_cost(v, p)
                };
                table[zero + v] = magnitude + cost_zero(p[MVP_SIGN]);
                table[zero - v] = magnitude + cost_one(p[MVP_SIGN]);
            }
        }
    }

    /// Cost of a motion vector difference (quarter pixels), row component first.
    #[inline]
    pub(crate) fn mv_cost(&self, diff: MotionVector) -> u32 {
        let at = |table: &Vec<u32>, v: i16| {
            let v = i32::from(v).clamp(-i32::from(MV_MAX), i32::from(MV_MAX));
            table[(v + i32::from(MV_MAX)) as usize]
        };
        at(&self.mv[0], diff.row) + at(&self.mv[1], diff.col)
    }

    /// Cost of one token, given whether the EOB branch is skipped.
    #[inline]
    fn token_cost(&self, btype: BlockType, band: u8, ctx: u8, after_zero: bool, kind: TokenKind) -> u32 {
        let entry = &self.tokens[btype as usize][usize::from(band)][usize::from(ctx)];
        entry[usize::from(after_zero)][kind as usize]
    }

    /// Cost of a tokenized block, including extra bits and signs.
    pub(crate) fn block_cost(&self, btype: BlockType, block: &TokenBlock) -> u32 {
        let mut total = 0;
        let mut after_zero = false;
        for token in block.tokens() {
            total += self.token_cost(btype, token.band, token.ctx, after_zero, token.kind);
            if let Some(cat) = token.kind.category() {
                total += extra_bits_cost(cat, token.extra);
            }
            if token.kind != TokenKind::Eob && token.kind != TokenKind::Zero {
                total += 256;
            }
            after_zero = token.kind == TokenKind::Zero;
        }
        total
    }

    /// Cost of an inter mode under the neighbour-count probabilities `probs`.
    #[inline]
    pub(crate) fn inter_mode_cost(probs: &[u8; 4], mode: InterMode) -> u32 {
        cost(&MV_REF, probs, mode as i8)
    }
}

fn extra_bits_cost(cat: usize, extra: u16) -> u32 {
    let bits = usize::from(DCT_CAT_BITS[cat]);
    PROB_DCT_CAT[cat]
        .iter()
        .take(bits)
        .enumerate()
        .map(|(k, &p)| cost_bit((extra >> (bits - 1 - k)) & 1 != 0, p))
        .sum()
}

/// Magnitude cost of a long-form value: bits 0..3, then 9 down to 4, then
/// bit 3 unless the value is below 16.
fn long_magnitude_cost(v: usize, p: &[u8; MV_PROB_COUNT]) -> u32 {
    let bit = |k: usize| cost_bit((v >> k) & 1 != 0, p[MVP_BITS + k]);
    let mut c = cost_one(p[MVP_IS_SHORT]);
    for k in 0..3 {
        c += bit(k);
    }
    for k in (4..MV_LONG_BITS).rev() {
        c += bit(k);
    }
    if v & 0xfff0 != 0 {
        c += bit(3);
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{COEFF_PROBS, DEFAULT_MV_PROBS, MODE_CONTEXTS};
    use crate::encoder::tokenize::tokenize;

    fn tables() -> RdCostTables {
        RdCostTables::new(&COEFF_PROBS, &DEFAULT_MV_PROBS)
    }

    #[test]
    fn empty_block_costs_one_eob() {
        let t = tables();
        let block = tokenize(&[0; 16], 0, 0);
        let p = COEFF_PROBS[3][0][0][0];
        assert_eq!(t.block_cost(BlockType::YWithDc, &block), cost_zero(p));
    }

    #[test]
    fn larger_levels_cost_more() {
        let t = tables();
        let mut small = [0i16; 16];
        small[0] = 1;
        let mut large = [0i16; 16];
        large[0] = 200;
        let c_small = t.block_cost(BlockType::Chroma, &tokenize(&small, 0, 0));
        let c_large = t.block_cost(BlockType::Chroma, &tokenize(&large, 0, 0));
        assert!(c_large > c_small);
    }

    #[test]
    fn mv_costs_are_symmetric_in_magnitude_order() {
        let t = tables();
        let zero = t.mv_cost(MotionVector::ZERO);
        let small = t.mv_cost(MotionVector::new(0, 2));
        let large = t.mv_cost(MotionVector::new(0, 400));
        assert!(zero < small && small < large);
        // Out-of-range differences price like the largest codable one.
        assert_eq!(
            t.mv_cost(MotionVector::new(0, 5000)),
            t.mv_cost(MotionVector::new(0, MV_MAX))
        );
    }

    #[test]
    fn long_form_omits_bit_three_below_sixteen() {
        let p = &DEFAULT_MV_PROBS[0];
        let with = long_magnitude_cost(24, p);
        let without = long_magnitude_cost(8, p);
        // 8 and 24 differ only in bit 4, and 8 also drops bit 3.
        let expected = with - cost_bit(true, p[MVP_BITS + 4]) + cost_bit(false, p[MVP_BITS + 4])
            - cost_bit(true, p[MVP_BITS + 3]);
        assert_eq!(without, expected);
    }

    #[test]
    fn zero_mode_is_cheap_among_zero_neighbours() {
        let probs = &MODE_CONTEXTS[5];
        assert!(
            RdCostTables::inter_mode_cost(probs, InterMode::Zero)
                < RdCostTables::inter_mode_cost(probs, InterMode::New)
        );
    }
}
