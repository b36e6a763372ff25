//! Intra prediction mode selection for macroblocks.
//!
//! Picks the 16×16 luma mode, the 4×4 sub-block modes of B_PRED and the
//! chroma mode by full rate-distortion cost: every mode is predicted,
//! transformed, quantized and reconstructed, and scored on the SSE of the
//! reconstruction plus the rate of its mode and tokens.

use crate::common::prediction::{
    predict_chroma, predict_luma, predict_subblock, update_border_chroma, update_border_luma,
    CHROMA_BLOCK_SIZE, CHROMA_STRIDE, LUMA_BLOCK_SIZE, LUMA_STRIDE,
};
use crate::common::types::{ChromaMode, IntraMode, LumaMode, RefFrame};
use crate::encoder::cost::distortion::sse;
use crate::encoder::cost::rd_score;
use crate::encoder::tokenize::{tokenize, BlockType};
use crate::encoder::tree::cost_bit;

use super::residuals::{
    chroma_rate, code_chroma, code_luma, forward, luma_rate, reconstruct, ChromaResidual,
    LumaResidual,
};
use super::{Candidate, FramePass, MacroblockInfo, MbContext};

/// Best luma option of a macroblock.
struct LumaChoice {
    mode: LumaMode,
    bmodes: [IntraMode; 16],
    residual: LumaResidual,
    /// Mode signalling only.
    mode_rate: u32,
    score: u64,
}

/// Copies the 16×16 block out of a luma workspace.
fn luma_block(ws: &[u8; LUMA_BLOCK_SIZE]) -> [u8; 256] {
    let mut out = [0u8; 256];
    for (y, row) in out.chunks_exact_mut(16).enumerate() {
        row.copy_from_slice(&ws[(y + 1) * LUMA_STRIDE + 1..][..16]);
    }
    out
}

fn chroma_block(cb: &[u8; CHROMA_BLOCK_SIZE]) -> [u8; 64] {
    let mut out = [0u8; 64];
    for (y, row) in out.chunks_exact_mut(8).enumerate() {
        row.copy_from_slice(&cb[(y + 1) * CHROMA_STRIDE + 1..][..8]);
    }
    out
}

impl FramePass<'_> {
    /// Luma workspace bordered by the reconstructed (unfiltered) neighbours.
    fn luma_workspace(&self, mbx: usize, mby: usize) -> [u8; LUMA_BLOCK_SIZE] {
        let y = &self.recon.y;
        let mut ws = [0u8; LUMA_BLOCK_SIZE];
        let top: &[u8] = if mby > 0 { y.row(mby * 16 - 1) } else { &[] };
        let mut left = [0u8; 17];
        if mbx > 0 {
            let (x, y0) = (mbx as isize * 16 - 1, mby as isize * 16 - 1);
            for (i, l) in left.iter_mut().enumerate() {
                *l = y.data()[y.offset(x, y0 + i as isize)];
            }
        }
        update_border_luma(&mut ws, mbx, mby, self.mb_width, top, &left);
        ws
    }

    fn chroma_workspaces(
        &self,
        mbx: usize,
        mby: usize,
    ) -> ([u8; CHROMA_BLOCK_SIZE], [u8; CHROMA_BLOCK_SIZE]) {
        let mut out = [[0u8; CHROMA_BLOCK_SIZE]; 2];
        for (cb, plane) in out.iter_mut().zip([&self.recon.u, &self.recon.v]) {
            let top: &[u8] = if mby > 0 { plane.row(mby * 8 - 1) } else { &[] };
            let mut left = [0u8; 9];
            if mbx > 0 {
                let (x, y0) = (mbx as isize * 8 - 1, mby as isize * 8 - 1);
                for (i, l) in left.iter_mut().enumerate() {
                    *l = plane.data()[plane.offset(x, y0 + i as isize)];
                }
            }
            update_border_chroma(cb, mbx, mby, top, &left);
        }
        let [u, v] = out;
        (u, v)
    }

    /// Best intra coding of the macroblock.
    ///
    /// Inter frames add the cost of the intra reference flag and use the
    /// inter-frame mode probabilities.
    pub(super) fn pick_intra(&self, ctx: &MbContext) -> Candidate {
        let luma = self.pick_luma(ctx);
        let (chroma_mode, chroma, uv_rate) = self.pick_chroma(ctx);
        let ref_rate = if self.state.keyframe {
            0
        } else {
            cost_bit(false, self.entropy.prob_intra)
        };
        let info = MacroblockInfo {
            reference: RefFrame::Intra,
            luma: luma.mode,
            bmodes: luma.bmodes,
            chroma: chroma_mode,
            ..MacroblockInfo::default()
        };
        self.candidate(
            ctx,
            info,
            luma.residual,
            chroma,
            ref_rate + luma.mode_rate + uv_rate,
        )
    }

    /// Evaluates the four 16×16 modes, then B_PRED unless DC already codes
    /// no residual.
    fn pick_luma(&self, ctx: &MbContext) -> LumaChoice {
        let ws = self.luma_workspace(ctx.mbx, ctx.mby);
        let quant = self.quant(ctx);
        let lambda = self.lambda(ctx);
        let mode_costs = if self.state.keyframe {
            &self.costs.kf_ymode
        } else {
            &self.costs.ymode
        };

        let evaluate = |mode: LumaMode| {
            let mut pred = ws;
            predict_luma(&mut pred, mode, ctx.mbx, ctx.mby);
            let residual = code_luma(
                self.transform,
                quant,
                &ctx.src_y,
                &luma_block(&pred),
                true,
                0,
                self.config.zbin_boost,
            );
            let mode_rate = mode_costs[mode as usize];
            let rate = mode_rate + luma_rate(&self.costs, &residual, true, &ctx.top, &ctx.left);
            LumaChoice {
                mode,
                bmodes: [mode.into_intra(); 16],
                score: rd_score(rate, residual.sse, lambda),
                residual,
                mode_rate,
            }
        };

        let mut best = evaluate(LumaMode::DC);
        let dc_is_exact = best.residual.is_zero();
        for &mode in &LumaMode::WHOLE[1..] {
            let choice = evaluate(mode);
            if choice.score < best.score {
                best = choice;
            }
        }
        if !dc_is_exact {
            if let Some(choice) = self.pick_bpred(ctx, &ws, best.score) {
                if choice.score < best.score {
                    best = choice;
                }
            }
        }
        best
    }

    /// Chooses the ten sub-block modes greedily in raster order, each against
    /// the reconstruction of the blocks before it.
    ///
    /// Gives up once the running score reaches `limit`.
    fn pick_bpred(
        &self,
        ctx: &MbContext,
        ws: &[u8; LUMA_BLOCK_SIZE],
        limit: u64,
    ) -> Option<LumaChoice> {
        let quant = self.quant(ctx);
        let lambda = self.lambda(ctx);
        let zrun = self.config.zbin_boost;
        let mut ws = *ws;

        let mut top_nz = ctx.top.y;
        let mut left_nz = ctx.left.y;
        let mut above = ctx.above_bmodes;
        let mut left = ctx.left_bmodes;

        let mut bmodes = [IntraMode::DC; 16];
        let mut levels = [[0i16; 16]; 16];
        let mut mode_rate = if self.state.keyframe {
            self.costs.kf_ymode[LumaMode::B as usize]
        } else {
            self.costs.ymode[LumaMode::B as usize]
        };
        let mut score = rd_score(mode_rate, 0, lambda);
        let mut total_sse = 0u64;

        for by in 0..4 {
            for bx in 0..4 {
                let (x0, y0) = (1 + bx * 4, 1 + by * 4);
                let pos = y0 * LUMA_STRIDE + x0;
                let src = &ctx.src_y[by * 64 + bx * 4..];
                let ctx_nz = top_nz[bx] + left_nz[by];

                // (score, mode, levels, recon, mode cost, sse)
                let mut best: Option<(u64, IntraMode, [i16; 16], [u8; 16], u32, u64)> = None;
                for mode in IntraMode::ALL {
                    predict_subblock(&mut ws, mode, x0, y0, LUMA_STRIDE);
                    let coeffs = forward(self.transform, src, 16, &ws[pos..], LUMA_STRIDE);
                    let mut lv = [0i16; 16];
                    quant.y1.quantize(&coeffs, 0, 0, zrun, &mut lv);

                    let mut recon = [0u8; 16];
                    for (r, row) in recon.chunks_exact_mut(4).enumerate() {
                        row.copy_from_slice(&ws[pos + r * LUMA_STRIDE..][..4]);
                    }
                    reconstruct(&quant.y1, &lv, None, &mut recon, 4);
                    let d = sse(src, 16, &recon, 4, 4, 4);

                    let mode_cost = if self.state.keyframe {
                        self.costs.kf_bmode[above[bx] as usize][left[by] as usize][mode as usize]
                    } else {
                        self.costs.bmode[mode as usize]
                    };
                    let rate = mode_cost
                        + self
                            .costs
                            .block_cost(BlockType::YWithDc, &tokenize(&lv, 0, ctx_nz));
                    let s = rd_score(rate, d, lambda);
                    if best.as_ref().map_or(true, |b| s < b.0) {
                        best = Some((s, mode, lv, recon, mode_cost, d));
                    }
                }
                let (s, mode, lv, recon, mode_cost, d) = best?;

                for (r, row) in recon.chunks_exact(4).enumerate() {
                    ws[pos + r * LUMA_STRIDE..][..4].copy_from_slice(row);
                }
                let b = by * 4 + bx;
                bmodes[b] = mode;
                levels[b] = lv;
                let nz = u8::from(lv.iter().any(|&l| l != 0));
                top_nz[bx] = nz;
                left_nz[by] = nz;
                above[bx] = mode;
                left[by] = mode;
                mode_rate += mode_cost;
                total_sse += d;
                score += s;
                if score >= limit {
                    return None;
                }
            }
        }

        Some(LumaChoice {
            mode: LumaMode::B,
            bmodes,
            residual: LumaResidual {
                y2: [0; 16],
                y: levels,
                recon: luma_block(&ws),
                sse: total_sse,
            },
            mode_rate,
            score,
        })
    }

    /// Best chroma mode, chosen independently of luma.
    fn pick_chroma(&self, ctx: &MbContext) -> (ChromaMode, ChromaResidual, u32) {
        let (wu, wv) = self.chroma_workspaces(ctx.mbx, ctx.mby);
        let quant = self.quant(ctx);
        let lambda = self.lambda(ctx);
        let mode_costs = if self.state.keyframe {
            &self.costs.kf_uv
        } else {
            &self.costs.uv
        };

        let evaluate = |mode: ChromaMode| {
            let (mut pu, mut pv) = (wu, wv);
            predict_chroma(&mut pu, mode, ctx.mbx, ctx.mby);
            predict_chroma(&mut pv, mode, ctx.mbx, ctx.mby);
            let residual = code_chroma(
                self.transform,
                quant,
                &ctx.src_u,
                &ctx.src_v,
                &chroma_block(&pu),
                &chroma_block(&pv),
                0,
                self.config.zbin_boost,
            );
            let mode_rate = mode_costs[mode as usize];
            let rate = mode_rate + chroma_rate(&self.costs, &residual, &ctx.top, &ctx.left);
            (rd_score(rate, residual.sse, lambda), mode, residual, mode_rate)
        };

        let mut best = evaluate(ChromaMode::DC);
        for &mode in &ChromaMode::ALL[1..] {
            let choice = evaluate(mode);
            if choice.0 < best.0 {
                best = choice;
            }
        }
        (best.1, best.2, best.3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_blocks_skip_the_border() {
        let mut ws = [0u8; LUMA_BLOCK_SIZE];
        for (i, p) in ws.iter_mut().enumerate() {
            *p = (i % 251) as u8;
        }
        let block = luma_block(&ws);
        assert_eq!(block[0], ws[LUMA_STRIDE + 1]);
        assert_eq!(block[255], ws[16 * LUMA_STRIDE + 16]);

        let mut cb = [0u8; CHROMA_BLOCK_SIZE];
        cb[CHROMA_STRIDE + 1] = 7;
        cb[8 * CHROMA_STRIDE + 8] = 9;
        let block = chroma_block(&cb);
        assert_eq!((block[0], block[63]), (7, 9));
    }
}
