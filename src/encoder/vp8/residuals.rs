//! Residual coding of one macroblock: forward transform, quantization,
//! local reconstruction and token context bookkeeping.
//!
//! Every coding path reconstructs with the decoder's inverse transforms, so
//! the pixels kept for prediction are exactly what a decoder produces.

use crate::common::prediction::add_residue;
use crate::common::transform::{idct4x4, idct4x4_dc, iwht4x4, ForwardTransform};

use crate::encoder::cost::distortion::sse;
use crate::encoder::cost::RdCostTables;
use crate::encoder::quantize::{QuantMatrix, SegmentQuant};
use crate::encoder::tokenize::{tokenize, BlockType, TokenBlock};

/// Nonzero flags of the blocks bordering a macroblock, per 13.3 of the RFC.
///
/// Kept per column above the current row and for the left neighbour.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(super) struct Complexity {
    pub(super) y2: u8,
    pub(super) y: [u8; 4],
    pub(super) u: [u8; 2],
    pub(super) v: [u8; 2],
}

impl Complexity {
    /// Context reset of a skipped macroblock.
    pub(super) fn clear(&mut self, include_y2: bool) {
        self.y = [0; 4];
        self.u = [0; 2];
        self.v = [0; 2];
        if include_y2 {
            self.y2 = 0;
        }
    }
}

/// Quantized zigzag levels of a macroblock, kept until the token partitions
/// are written.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub(super) struct QuantizedMb {
    pub(super) y2: [i16; 16],
    pub(super) y: [[i16; 16]; 16],
    pub(super) u: [[i16; 16]; 4],
    pub(super) v: [[i16; 16]; 4],
}

impl QuantizedMb {
    pub(super) fn from_parts(luma: &LumaResidual, chroma: &ChromaResidual) -> Self {
        Self {
            y2: luma.y2,
            y: luma.y,
            u: chroma.u,
            v: chroma.v,
        }
    }

    /// No nonzero level anywhere: the macroblock codes as skipped.
    pub(super) fn is_zero(&self) -> bool {
        all_zero(&self.y2)
            && self.y.iter().all(all_zero)
            && self.u.iter().all(all_zero)
            && self.v.iter().all(all_zero)
    }
}

fn all_zero(levels: &[i16; 16]) -> bool {
    levels.iter().all(|&l| l == 0)
}

/// Coded luma of one candidate.
pub(super) struct LumaResidual {
    pub(super) y2: [i16; 16],
    pub(super) y: [[i16; 16]; 16],
    /// Reconstruction, stride 16.
    pub(super) recon: [u8; 256],
    pub(super) sse: u64,
}

impl LumaResidual {
    pub(super) fn is_zero(&self) -> bool {
        all_zero(&self.y2) && self.y.iter().all(all_zero)
    }
}

/// Coded chroma of one candidate.
pub(super) struct ChromaResidual {
    pub(super) u: [[i16; 16]; 4],
    pub(super) v: [[i16; 16]; 4],
    /// Reconstructions, stride 8.
    pub(super) recon_u: [u8; 64],
    pub(super) recon_v: [u8; 64],
    pub(super) sse: u64,
}

#[cfg(test)]
impl ChromaResidual {
    pub(super) fn is_zero(&self) -> bool {
        self.u.iter().all(all_zero) && self.v.iter().all(all_zero)
    }
}

/// Dead-zone widening of a mode boost, in `q >> 7` units of the matrix's AC step.
#[inline]
pub(super) fn extra_zbin(matrix: &QuantMatrix, boost: u32) -> u32 {
    (u32::from(matrix.ac()) * boost) >> 7
}

/// Forward DCT of the 4×4 difference between `src` and `pred`, each read
/// from the start of its slice.
#[inline]
pub(super) fn forward(
    transform: &dyn ForwardTransform,
    src: &[u8],
    src_stride: usize,
    pred: &[u8],
    pred_stride: usize,
) -> [i32; 16] {
    let mut block = [0i32; 16];
    for y in 0..4 {
        for x in 0..4 {
            block[y * 4 + x] =
                i32::from(src[y * src_stride + x]) - i32::from(pred[y * pred_stride + x]);
        }
    }
    transform.dct4x4(&mut block);
    block
}

/// Adds the dequantized residual of `levels` onto the prediction held in
/// `recon`. `dc` replaces the DC coefficient of a block coded through Y2.
#[inline]
pub(super) fn reconstruct(
    matrix: &QuantMatrix,
    levels: &[i16; 16],
    dc: Option<i32>,
    recon: &mut [u8],
    stride: usize,
) {
    let mut block = [0i32; 16];
    matrix.dequantize(levels, &mut block);
    if let Some(dc) = dc {
        block[0] = dc;
    }
    if block[1..].iter().all(|&c| c == 0) {
        if block[0] == 0 {
            return;
        }
        idct4x4_dc(&mut block);
    } else {
        idct4x4(&mut block);
    }
    add_residue(recon, &block, 0, 0, stride);
}

/// Codes a 16×16 luma block against `pred` (stride 16).
///
/// With `with_y2` the DC coefficients go through the Walsh-Hadamard block and
/// the luma blocks start at position 1.
#[allow(clippy::too_many_arguments)]
pub(super) fn code_luma(
    transform: &dyn ForwardTransform,
    quant: &SegmentQuant,
    src: &[u8; 256],
    pred: &[u8; 256],
    with_y2: bool,
    boost: u32,
    zrun: bool,
) -> LumaResidual {
    let mut coeffs = [[0i32; 16]; 16];
    for (b, c) in coeffs.iter_mut().enumerate() {
        let at = (b / 4) * 64 + (b % 4) * 4;
        *c = forward(transform, &src[at..], 16, &pred[at..], 16);
    }

    let mut out = LumaResidual {
        y2: [0; 16],
        y: [[0; 16]; 16],
        recon: *pred,
        sse: 0,
    };

    let mut dc = [0i32; 16];
    if with_y2 {
        let mut y2 = [0i32; 16];
        for (d, c) in y2.iter_mut().zip(&coeffs) {
            *d = c[0];
        }
        transform.wht4x4(&mut y2);
        quant
            .y2
            .quantize(&y2, 0, extra_zbin(&quant.y2, boost), zrun, &mut out.y2);
        quant.y2.dequantize(&out.y2, &mut dc);
        iwht4x4(&mut dc);
    }

    let first = usize::from(with_y2);
    let zbin = extra_zbin(&quant.y1, boost);
    for (b, c) in coeffs.iter().enumerate() {
        quant.y1.quantize(c, first, zbin, zrun, &mut out.y[b]);
        let at = (b / 4) * 64 + (b % 4) * 4;
        reconstruct(
            &quant.y1,
            &out.y[b],
            with_y2.then_some(dc[b]),
            &mut out.recon[at..],
            16,
        );
    }
    out.sse = sse(src, 16, &out.recon, 16, 16, 16);
    out
}

/// Codes both 8×8 chroma blocks against their predictions (stride 8).
#[allow(clippy::too_many_arguments)]
pub(super) fn code_chroma(
    transform: &dyn ForwardTransform,
    quant: &SegmentQuant,
    src_u: &[u8; 64],
    src_v: &[u8; 64],
    pred_u: &[u8; 64],
    pred_v: &[u8; 64],
    boost: u32,
    zrun: bool,
) -> ChromaResidual {
    let zbin = extra_zbin(&quant.uv, boost);
    let mut out = ChromaResidual {
        u: [[0; 16]; 4],
        v: [[0; 16]; 4],
        recon_u: *pred_u,
        recon_v: *pred_v,
        sse: 0,
    };
    for (src, recon, levels) in [
        (src_u, &mut out.recon_u, &mut out.u),
        (src_v, &mut out.recon_v, &mut out.v),
    ] {
        for (b, l) in levels.iter_mut().enumerate() {
            let at = (b / 2) * 32 + (b % 2) * 4;
            let c = forward(transform, &src[at..], 8, &recon[at..], 8);
            quant.uv.quantize(&c, 0, zbin, zrun, l);
            reconstruct(&quant.uv, l, None, &mut recon[at..], 8);
        }
    }
    out.sse = sse(src_u, 8, &out.recon_u, 8, 8, 8) + sse(src_v, 8, &out.recon_v, 8, 8, 8);
    out
}

#[inline]
fn nonzero(levels: &[i16; 16], first: usize) -> u8 {
    u8::from(levels[first..].iter().any(|&l| l != 0))
}

/// Visits the luma blocks in bitstream order (Y2 first when present),
/// tokenizing each under, and updating, the neighbour contexts.
pub(super) fn walk_luma(
    y2: &[i16; 16],
    y: &[[i16; 16]; 16],
    with_y2: bool,
    top: &mut Complexity,
    left: &mut Complexity,
    f: &mut impl FnMut(BlockType, &TokenBlock),
) {
    let btype = if with_y2 {
        let block = tokenize(y2, 0, top.y2 + left.y2);
        f(BlockType::Y2, &block);
        let nz = nonzero(y2, 0);
        top.y2 = nz;
        left.y2 = nz;
        BlockType::YAfterY2
    } else {
        BlockType::YWithDc
    };
    let first = btype.first();
    for by in 0..4 {
        for bx in 0..4 {
            let levels = &y[by * 4 + bx];
            let block = tokenize(levels, first, top.y[bx] + left.y[by]);
            f(btype, &block);
            let nz = nonzero(levels, first);
            top.y[bx] = nz;
            left.y[by] = nz;
        }
    }
}

/// Chroma counterpart of [`walk_luma`]: U blocks, then V blocks.
pub(super) fn walk_chroma(
    u: &[[i16; 16]; 4],
    v: &[[i16; 16]; 4],
    top: &mut Complexity,
    left: &mut Complexity,
    f: &mut impl FnMut(BlockType, &TokenBlock),
) {
    for (levels, top, left) in [(u, &mut top.u, &mut left.u), (v, &mut top.v, &mut left.v)] {
        for by in 0..2 {
            for bx in 0..2 {
                let l = &levels[by * 2 + bx];
                let block = tokenize(l, 0, top[bx] + left[by]);
                f(BlockType::Chroma, &block);
                let nz = nonzero(l, 0);
                top[bx] = nz;
                left[by] = nz;
            }
        }
    }
}

/// Walks every coded block of a committed macroblock; skipped macroblocks
/// only reset their contexts.
pub(super) fn visit_blocks(
    mb: &QuantizedMb,
    skip: bool,
    with_y2: bool,
    top: &mut Complexity,
    left: &mut Complexity,
    f: &mut impl FnMut(BlockType, &TokenBlock),
) {
    if skip {
        top.clear(with_y2);
        left.clear(with_y2);
        return;
    }
    walk_luma(&mb.y2, &mb.y, with_y2, top, left, f);
    walk_chroma(&mb.u, &mb.v, top, left, f);
}

/// Token rate of the luma blocks under copies of the contexts.
pub(super) fn luma_rate(
    costs: &RdCostTables,
    luma: &LumaResidual,
    with_y2: bool,
    top: &Complexity,
    left: &Complexity,
) -> u32 {
    let (mut top, mut left) = (*top, *left);
    let mut rate = 0;
    walk_luma(&luma.y2, &luma.y, with_y2, &mut top, &mut left, &mut |t, b| {
        rate += costs.block_cost(t, b);
    });
    rate
}

/// Token rate of the chroma blocks under copies of the contexts.
pub(super) fn chroma_rate(
    costs: &RdCostTables,
    chroma: &ChromaResidual,
    top: &Complexity,
    left: &Complexity,
) -> u32 {
    let (mut top, mut left) = (*top, *left);
    let mut rate = 0;
    walk_chroma(&chroma.u, &chroma.v, &mut top, &mut left, &mut |t, b| {
        rate += costs.block_cost(t, b);
    });
    rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::transform::ScalarTransform;
    use crate::common::types::COEFF_PROBS;
    use crate::common::types::DEFAULT_MV_PROBS;
    use crate::encoder::config::QuantizerDeltas;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn quant(q: u8) -> SegmentQuant {
        SegmentQuant::new(q, &QuantizerDeltas::default())
    }

    #[test]
    fn perfect_prediction_codes_nothing() {
        let src = [77u8; 256];
        let luma = code_luma(&ScalarTransform, &quant(40), &src, &src, true, 0, true);
        assert!(luma.is_zero());
        assert_eq!(luma.sse, 0);
        assert_eq!(luma.recon, src);

        let c = [10u8; 64];
        let chroma = code_chroma(&ScalarTransform, &quant(40), &c, &c, &c, &c, 0, true);
        assert!(chroma.is_zero());
        assert_eq!(chroma.recon_u, c);
    }

    #[test]
    fn flat_offset_goes_through_y2() {
        let src = [140u8; 256];
        let pred = [100u8; 256];
        let luma = code_luma(&ScalarTransform, &quant(10), &src, &pred, true, 0, false);
        assert_ne!(luma.y2[0], 0);
        assert!(luma.y.iter().all(|b| b.iter().all(|&l| l == 0)));
        // A flat offset reconstructs almost exactly at a fine quantizer.
        assert!(luma.sse <= 256);
    }

    #[test]
    fn finer_quantizer_reconstructs_closer() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut src = [0u8; 256];
        rng.fill(&mut src[..]);
        let pred = [128u8; 256];
        let fine = code_luma(&ScalarTransform, &quant(4), &src, &pred, false, 0, false);
        let coarse = code_luma(&ScalarTransform, &quant(100), &src, &pred, false, 0, false);
        assert!(fine.sse < coarse.sse);
    }

    #[test]
    fn walks_update_contexts_like_a_decoder() {
        let mut mb = QuantizedMb::default();
        mb.y[13][3] = 2;
        mb.u[3][0] = -1;
        let (mut top, mut left) = (Complexity::default(), Complexity::default());
        let mut seen = alloc::vec::Vec::new();
        visit_blocks(&mb, false, true, &mut top, &mut left, &mut |t, _| seen.push(t));
        assert_eq!(seen.len(), 25);
        assert_eq!(seen[0], BlockType::Y2);
        assert_eq!(seen[1], BlockType::YAfterY2);
        assert_eq!(seen[24], BlockType::Chroma);
        // Block 13 sits in the bottom row, column 1; U block 3 in row 1, column 1.
        assert_eq!(top.y, [0, 1, 0, 0]);
        assert_eq!(left.y, [0, 0, 0, 0]);
        assert_eq!((top.u, left.u), ([0, 1], [0, 1]));
        assert_eq!(top.y2, 0);

        top.y2 = 1;
        let mut visited = false;
        visit_blocks(&mb, true, false, &mut top, &mut left, &mut |_, _| visited = true);
        assert!(!visited);
        assert_eq!(top, Complexity { y2: 1, ..Complexity::default() });
    }

    #[test]
    fn empty_residual_rates_count_end_of_block_only() {
        let costs = RdCostTables::new(&COEFF_PROBS, &DEFAULT_MV_PROBS);
        let src = [90u8; 256];
        let luma = code_luma(&ScalarTransform, &quant(40), &src, &src, false, 0, false);
        let ctx = Complexity::default();
        let rate = luma_rate(&costs, &luma, false, &ctx, &ctx);
        let eob = costs.block_cost(BlockType::YWithDc, &tokenize(&[0; 16], 0, 0));
        assert_eq!(rate, 16 * eob);
    }

    #[test]
    fn boost_widens_the_dead_zone() {
        let q = quant(60);
        assert_eq!(extra_zbin(&q.y1, 0), 0);
        assert!(extra_zbin(&q.y1, 12) > extra_zbin(&q.y1, 4));
    }
}
