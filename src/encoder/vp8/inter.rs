//! Inter prediction mode selection.
//!
//! For each usable reference, ZEROMV, NEARESTMV, NEARMV, NEWMV and SPLITMV
//! are coded and scored like the intra candidates. NEWMV runs the integer
//! search followed by sub-pixel refinement; SPLITMV picks each partition's
//! vector from its left/above neighbours, zero or a fresh search, and keeps
//! the cheapest partition shape.

use crate::common::types::{InterMode, MotionVector, RefFrame, SplitShape, SubMvRef};
use crate::encoder::cost::distortion::sse;
use crate::encoder::cost::lambda::zero_residual_threshold;
use crate::encoder::cost::{error_per_bit, rd_score, RdCostTables};
use crate::encoder::frame::Frame;
use crate::encoder::motion::{
    chroma_mv, find_near_mvs, predict_chroma_block, predict_luma_block, split_chroma_mv,
    MotionSearch, MvBounds, NearMvs, Neighbor,
};
use crate::encoder::tree::cost_bit;

use super::residuals::{code_chroma, code_luma};
use super::{Candidate, FramePass, InterChoice, MacroblockInfo, MbContext, SplitInfo};

/// Context of a split partition's sub-MV reference from its left and above vectors.
pub(super) fn sub_mv_context(left: MotionVector, above: MotionVector) -> usize {
    let lez = left.is_zero();
    let aez = above.is_zero();
    let lea = left == above;
    match (lea, lez, aez) {
        (true, true, _) => 4,
        (true, false, _) => 3,
        (false, _, true) => 2,
        (false, true, false) => 1,
        (false, false, false) => 0,
    }
}

/// Left and above vectors of the first 4×4 block `k` of a split partition.
///
/// Neighbours outside the frame count as zero vectors.
pub(super) fn split_neighbors(
    k: usize,
    mvs: &[MotionVector; 16],
    left_mb: Option<&[MotionVector; 16]>,
    above_mb: Option<&[MotionVector; 16]>,
) -> (MotionVector, MotionVector) {
    let left = if k & 3 != 0 {
        mvs[k - 1]
    } else {
        left_mb.map_or(MotionVector::ZERO, |m| m[k + 3])
    };
    let above = if k >= 4 {
        mvs[k - 4]
    } else {
        above_mb.map_or(MotionVector::ZERO, |m| m[k + 12])
    };
    (left, above)
}

/// Partition size of a split shape, in pixels.
fn partition_size(shape: SplitShape) -> (usize, usize) {
    match shape {
        SplitShape::TopBottom => (16, 8),
        SplitShape::LeftRight => (8, 16),
        SplitShape::Quarters => (8, 8),
        SplitShape::Sixteenths => (4, 4),
    }
}

/// Best split found for one macroblock, before residual coding.
struct SplitPlan {
    info: SplitInfo,
    block_mvs: [MotionVector; 16],
    /// Shape and partition signalling.
    rate: u32,
}

impl FramePass<'_> {
    /// Frame behind `reference`, if the configuration allows it and it is not
    /// the same frame as an earlier reference.
    fn usable_reference(&self, reference: RefFrame) -> Option<&Frame> {
        let allowed = match reference {
            RefFrame::Intra => false,
            RefFrame::Last => true,
            RefFrame::Golden => self.config.references.golden,
            RefFrame::AltRef => self.config.references.altref,
        };
        let frame = self.refs[reference.slot()].filter(|_| allowed)?;
        let duplicate = self.refs[..reference.slot()]
            .iter()
            .flatten()
            .any(|earlier| core::ptr::eq(*earlier, frame));
        (!duplicate).then_some(frame)
    }

    /// Rate of the intra/inter flag and the reference selection.
    fn reference_rate(&self, reference: RefFrame) -> u32 {
        let e = self.entropy;
        cost_bit(true, e.prob_intra)
            + match reference {
                RefFrame::Intra => 0,
                RefFrame::Last => cost_bit(false, e.prob_last),
                RefFrame::Golden => cost_bit(true, e.prob_last) + cost_bit(false, e.prob_gf),
                RefFrame::AltRef => cost_bit(true, e.prob_last) + cost_bit(true, e.prob_gf),
            }
    }

    /// Dead-zone boost of a mode, in `q >> 7` units.
    fn mode_boost(&self, mode: InterMode, reference: RefFrame) -> u32 {
        if !self.config.zbin_boost {
            return 0;
        }
        match mode {
            InterMode::Zero if reference == RefFrame::Last => 6,
            InterMode::Zero => 12,
            InterMode::Split => 0,
            _ => 4,
        }
    }

    fn neighbors(&self, mbx: usize, mby: usize) -> [Option<Neighbor>; 3] {
        let idx = mby * self.mb_width + mbx;
        let at = |i: usize| Some(self.mbs[i].neighbor());
        let above = if mby > 0 { at(idx - self.mb_width) } else { None };
        let left = if mbx > 0 { at(idx - 1) } else { None };
        let above_left = if mbx > 0 && mby > 0 {
            at(idx - self.mb_width - 1)
        } else {
            None
        };
        [above, left, above_left]
    }

    /// Best inter coding of the macroblock, if any beats `best_score`.
    pub(super) fn pick_inter(&self, ctx: &MbContext, mut best_score: u64) -> Option<Candidate> {
        let bounds = MvBounds::for_macroblock(ctx.mbx, ctx.mby, self.mb_width, self.mb_height);
        let [above, left, above_left] = self.neighbors(ctx.mbx, ctx.mby);
        let zero_threshold = zero_residual_threshold(self.quant(ctx).y1.ac());

        let mut best: Option<Candidate> = None;
        for reference in RefFrame::INTER {
            let Some(frame) = self.usable_reference(reference) else {
                continue;
            };
            let near = find_near_mvs(
                above,
                left,
                above_left,
                reference,
                &self.state.sign_bias,
                &bounds,
            );
            let ref_rate = self.reference_rate(reference);

            for mode in InterMode::ORDER {
                let candidate = match mode {
                    InterMode::Zero => {
                        self.whole_mb(ctx, frame, reference, mode, MotionVector::ZERO, &near, ref_rate)
                    }
                    InterMode::Nearest => {
                        self.whole_mb(ctx, frame, reference, mode, near.nearest, &near, ref_rate)
                    }
                    InterMode::Near => {
                        self.whole_mb(ctx, frame, reference, mode, near.near, &near, ref_rate)
                    }
                    InterMode::New => {
                        let mv = self.search(ctx, frame, (0, 0), (16, 16), near.best, &bounds);
                        self.whole_mb(ctx, frame, reference, mode, mv, &near, ref_rate)
                    }
                    InterMode::Split => {
                        match self.split_mb(ctx, frame, reference, &near, &bounds, ref_rate) {
                            Some(candidate) => candidate,
                            None => continue,
                        }
                    }
                };

                let score = candidate.score;
                let exact = mode == InterMode::Zero
                    && candidate.coeffs.is_zero()
                    && candidate.sse < zero_threshold;
                if score < best_score {
                    best_score = score;
                    best = Some(candidate);
                }
                if exact {
                    break;
                }
                if let Some(pct) = self.config.early_exit {
                    if u128::from(score) * 100 > u128::from(best_score) * u128::from(pct) {
                        break;
                    }
                }
            }
        }
        best
    }

    /// Motion search for the `size` block at `offset` inside the macroblock.
    fn search(
        &self,
        ctx: &MbContext,
        frame: &Frame,
        offset: (usize, usize),
        size: (usize, usize),
        base: MotionVector,
        bounds: &MvBounds,
    ) -> MotionVector {
        let (x, y) = offset;
        let plane = &frame.y;
        let search = MotionSearch {
            src: &ctx.src_y,
            src_stride: 16,
            src_pos: y * 16 + x,
            reference: plane.data(),
            ref_stride: plane.stride,
            ref_origin: plane.index(ctx.mbx * 16 + x, ctx.mby * 16 + y),
            width: size.0,
            height: size.1,
            costs: &self.costs,
            base,
            bounds: bounds.codable_from(base),
            sad_per_bit: self.state.sad_per_bit[ctx.segment],
            error_per_bit: error_per_bit(self.lambda(ctx)),
        };
        let (full, _) = search.integer(self.config.search, base, self.config.search_range);
        search.subpel(self.config.subpel, full).0
    }

    /// Codes the macroblock with one vector for the whole of it.
    #[allow(clippy::too_many_arguments)]
    fn whole_mb(
        &self,
        ctx: &MbContext,
        frame: &Frame,
        reference: RefFrame,
        mode: InterMode,
        mv: MotionVector,
        near: &NearMvs,
        ref_rate: u32,
    ) -> Candidate {
        let (mbx, mby) = (ctx.mbx, ctx.mby);
        let quant = self.quant(ctx);
        let boost = self.mode_boost(mode, reference);

        let mut pred_y = [0u8; 256];
        predict_luma_block(
            frame.y.data(),
            frame.y.stride,
            frame.y.index(mbx * 16, mby * 16),
            mv,
            16,
            16,
            &mut pred_y,
            16,
        );
        let cmv = chroma_mv(mv);
        let mut pred_c = [[0u8; 64]; 2];
        for (pred, plane) in pred_c.iter_mut().zip([&frame.u, &frame.v]) {
            predict_chroma_block(
                plane.data(),
                plane.stride,
                plane.index(mbx * 8, mby * 8),
                cmv,
                8,
                8,
                pred,
                8,
            );
        }

        let zrun = self.config.zbin_boost;
        let luma = code_luma(self.transform, quant, &ctx.src_y, &pred_y, true, boost, zrun);
        let chroma = code_chroma(
            self.transform,
            quant,
            &ctx.src_u,
            &ctx.src_v,
            &pred_c[0],
            &pred_c[1],
            boost,
            zrun,
        );

        let mut rate = ref_rate + RdCostTables::inter_mode_cost(&near.probs, mode);
        if mode == InterMode::New {
            rate += self.costs.mv_cost(mv - near.best);
        }
        let info = MacroblockInfo {
            reference,
            inter: Some(InterChoice {
                mode,
                mv,
                best_mv: near.best,
                mode_probs: near.probs,
                split: None,
                block_mvs: [mv; 16],
            }),
            ..MacroblockInfo::default()
        };
        self.candidate(ctx, info, luma, chroma, rate)
    }

    /// Prediction SSE of a luma block at `offset` displaced by `mv`.
    fn partition_sse(
        &self,
        ctx: &MbContext,
        frame: &Frame,
        offset: (usize, usize),
        size: (usize, usize),
        mv: MotionVector,
    ) -> u64 {
        let (x, y) = offset;
        let mut pred = [0u8; 256];
        predict_luma_block(
            frame.y.data(),
            frame.y.stride,
            frame.y.index(ctx.mbx * 16 + x, ctx.mby * 16 + y),
            mv,
            size.0,
            size.1,
            &mut pred,
            16,
        );
        sse(&ctx.src_y[y * 16 + x..], 16, &pred, 16, size.0, size.1)
    }

    /// Picks the vectors of every partition of `shape`, in partition order.
    fn plan_split(
        &self,
        ctx: &MbContext,
        frame: &Frame,
        shape: SplitShape,
        near: &NearMvs,
        bounds: &MvBounds,
    ) -> (SplitPlan, u64) {
        let idx = ctx.mby * self.mb_width + ctx.mbx;
        let left_mb = (ctx.mbx > 0).then(|| self.mbs[idx - 1].block_mvs());
        let above_mb = (ctx.mby > 0).then(|| self.mbs[idx - self.mb_width].block_mvs());
        let lambda = self.lambda(ctx);
        let labels = shape.labels();
        let size = partition_size(shape);

        let mut mvs = [MotionVector::ZERO; 16];
        let mut partitions = [(SubMvRef::Zero, MotionVector::ZERO); 16];
        let mut rate = self.costs.split_shape[shape as usize];
        let mut distortion = 0u64;

        for (j, partition) in partitions.iter_mut().enumerate().take(shape.count()) {
            let Some(k) = labels.iter().position(|&l| usize::from(l) == j) else {
                continue;
            };
            let (left, above) = split_neighbors(k, &mvs, left_mb.as_ref(), above_mb.as_ref());
            let context = sub_mv_context(left, above);
            let offset = ((k % 4) * 4, (k / 4) * 4);
            let fresh = self.search(ctx, frame, offset, size, near.best, bounds);

            // (score, ref, mv, rate, sse); ZERO is always in bounds.
            let mut choice = (u64::MAX, SubMvRef::Zero, MotionVector::ZERO, 0u32, 0u64);
            for sub in SubMvRef::ALL {
                let mv = match sub {
                    SubMvRef::Left => left,
                    SubMvRef::Above => above,
                    SubMvRef::Zero => MotionVector::ZERO,
                    SubMvRef::New => fresh,
                };
                if !bounds.contains(mv) {
                    continue;
                }
                let mut r = self.costs.sub_mv_ref[context][sub as usize];
                if sub == SubMvRef::New {
                    r += self.costs.mv_cost(mv - near.best);
                }
                let d = self.partition_sse(ctx, frame, offset, size, mv);
                let s = rd_score(r, d, lambda);
                if s < choice.0 {
                    choice = (s, sub, mv, r, d);
                }
            }

            let (_, sub, mv, r, d) = choice;
            for (b, &label) in labels.iter().enumerate() {
                if usize::from(label) == j {
                    mvs[b] = mv;
                }
            }
            *partition = (sub, mv);
            rate += r;
            distortion += d;
        }

        let score = rd_score(rate, distortion, lambda);
        (
            SplitPlan {
                info: SplitInfo { shape, partitions },
                block_mvs: mvs,
                rate,
            },
            score,
        )
    }

    /// Codes the macroblock with the best partition shape.
    fn split_mb(
        &self,
        ctx: &MbContext,
        frame: &Frame,
        reference: RefFrame,
        near: &NearMvs,
        bounds: &MvBounds,
        ref_rate: u32,
    ) -> Option<Candidate> {
        let (plan, _) = SplitShape::ALL
            .into_iter()
            .map(|shape| self.plan_split(ctx, frame, shape, near, bounds))
            .min_by_key(|(_, score)| *score)?;
        let mvs = plan.block_mvs;
        let (mbx, mby) = (ctx.mbx, ctx.mby);

        let mut pred_y = [0u8; 256];
        for (b, &mv) in mvs.iter().enumerate() {
            let (x, y) = ((b % 4) * 4, (b / 4) * 4);
            predict_luma_block(
                frame.y.data(),
                frame.y.stride,
                frame.y.index(mbx * 16 + x, mby * 16 + y),
                mv,
                4,
                4,
                &mut pred_y[y * 16 + x..],
                16,
            );
        }
        let mut pred_c = [[0u8; 64]; 2];
        for cy in 0..2 {
            for cx in 0..2 {
                let b0 = cy * 8 + cx * 2;
                let cmv = split_chroma_mv([mvs[b0], mvs[b0 + 1], mvs[b0 + 4], mvs[b0 + 5]]);
                let (x, y) = (cx * 4, cy * 4);
                for (pred, plane) in pred_c.iter_mut().zip([&frame.u, &frame.v]) {
                    predict_chroma_block(
                        plane.data(),
                        plane.stride,
                        plane.index(mbx * 8 + x, mby * 8 + y),
                        cmv,
                        4,
                        4,
                        &mut pred[y * 8 + x..],
                        8,
                    );
                }
            }
        }

        let quant = self.quant(ctx);
        let zrun = self.config.zbin_boost;
        let luma = code_luma(self.transform, quant, &ctx.src_y, &pred_y, false, 0, zrun);
        let chroma = code_chroma(
            self.transform,
            quant,
            &ctx.src_u,
            &ctx.src_v,
            &pred_c[0],
            &pred_c[1],
            0,
            zrun,
        );

        let rate = ref_rate + RdCostTables::inter_mode_cost(&near.probs, InterMode::Split) + plan.rate;
        let info = MacroblockInfo {
            reference,
            inter: Some(InterChoice {
                mode: InterMode::Split,
                mv: mvs[15],
                best_mv: near.best,
                mode_probs: near.probs,
                split: Some(plan.info),
                block_mvs: mvs,
            }),
            ..MacroblockInfo::default()
        };
        Some(self.candidate(ctx, info, luma, chroma, rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_mv_contexts() {
        let z = MotionVector::ZERO;
        let a = MotionVector::new(4, -8);
        let b = MotionVector::new(0, 2);
        assert_eq!(sub_mv_context(z, z), 4);
        assert_eq!(sub_mv_context(a, a), 3);
        assert_eq!(sub_mv_context(a, z), 2);
        assert_eq!(sub_mv_context(z, a), 1);
        assert_eq!(sub_mv_context(a, b), 0);
    }

    #[test]
    fn split_neighbors_cross_macroblock_edges() {
        let mut mvs = [MotionVector::ZERO; 16];
        mvs[4] = MotionVector::new(1, 1);
        let left_mb: [MotionVector; 16] = core::array::from_fn(|i| MotionVector::new(i as i16, 0));
        let above_mb: [MotionVector; 16] = core::array::from_fn(|i| MotionVector::new(0, i as i16));

        // Block 8: left from the left macroblock's block 11, above from block 4.
        assert_eq!(
            split_neighbors(8, &mvs, Some(&left_mb), Some(&above_mb)),
            (MotionVector::new(11, 0), MotionVector::new(1, 1))
        );
        // Block 2: above from the above macroblock's block 14.
        assert_eq!(
            split_neighbors(2, &mvs, None, Some(&above_mb)),
            (MotionVector::ZERO, MotionVector::new(0, 14))
        );
        assert_eq!(
            split_neighbors(0, &mvs, None, None),
            (MotionVector::ZERO, MotionVector::ZERO)
        );
    }

    #[test]
    fn partition_sizes_tile_the_macroblock() {
        for shape in SplitShape::ALL {
            let (w, h) = partition_size(shape);
            assert_eq!(w * h * shape.count(), 256);
        }
    }
}
