//! VP8 bitstream header encoding.
//!
//! Writes the first partition (frame header plus per-macroblock modes and
//! vectors), the DCT token partitions, and the uncompressed frame prefix
//! that ties them together (RFC 6386 §9, §19).

use alloc::vec;
use alloc::vec::Vec;

use crate::common::types::{
    InterMode, IntraMode, LumaMode, MotionVector, RefFrame, SubMvRef, TokenProbTables,
    BMODE_PROBS, COEFF_UPDATE_PROBS, KEYFRAME_BPRED_MODE_PROBS, KEYFRAME_UV_MODE_PROBS,
    KEYFRAME_YMODE_PROBS, MB_SPLIT_PROBS, MVP_BITS, MVP_IS_SHORT, MVP_SHORT, MVP_SIGN,
    MV_LONG_BITS, MV_NUM_SHORT, MV_PROB_COUNT, MV_UPDATE_PROBS, SUB_MV_REF_PROBS, UV_MODE_PROBS,
    YMODE_PROBS,
};
use crate::encoder::api::EncodeError;
use crate::encoder::arithmetic::BoolEncoder;
use crate::encoder::config::{AltRefUpdate, GoldenUpdate, Partitions, QuantizerDeltas};
use crate::encoder::tokenize::write_tokens;
use crate::encoder::tree::{
    write_token, BMODE, KEYFRAME_YMODE, MB_SPLIT, MV_REF, SEGMENT_ID, SMALL_MV, SUB_MV_REF,
    UV_MODE, YMODE,
};
use crate::encoder::vec_writer::VecWriter;

use super::filter::{FilterParams, MODE_LF_DELTAS, REF_LF_DELTAS};
use super::inter::{split_neighbors, sub_mv_context};
use super::probability::FrameProbs;
use super::residuals::{visit_blocks, Complexity};
use super::segment::SegmentPlan;
use super::{CodedFrame, EntropyState, FrameState, MacroblockInfo};

/// The frame tag stores the first partition size in 19 bits.
const MAX_FIRST_PARTITION: usize = (1 << 19) - 1;
/// Partition sizes are stored in 24 bits.
const MAX_PARTITION: usize = (1 << 24) - 1;

const KEYFRAME_START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

/// Writes the first partition of a frame.
pub(super) fn write_first_partition(
    state: &FrameState,
    filter: &FilterParams,
    base: &EntropyState,
    probs: &FrameProbs,
    coded: &CodedFrame,
    available: usize,
) -> Result<Vec<u8>, EncodeError> {
    let mut enc = BoolEncoder::start(available.min(MAX_FIRST_PARTITION));

    if state.keyframe {
        // color space, clamping type
        enc.encode_literal(0, 1);
        enc.encode_literal(0, 1);
    }
    write_segmentation(&mut enc, &state.segments);
    write_filter_header(&mut enc, filter, state.keyframe);
    enc.encode_literal(u32::from(state.partitions.log2()), 2);
    write_quant_indices(&mut enc, state.quantizer, &state.deltas);
    write_refresh_flags(&mut enc, state);
    write_coeff_updates(&mut enc, &base.coeff_probs, &probs.coeff);

    // mb_no_coeff_skip
    enc.encode_flag(true);
    enc.encode_literal(u32::from(probs.prob_skip), 8);

    if !state.keyframe {
        enc.encode_literal(u32::from(probs.prob_intra), 8);
        enc.encode_literal(u32::from(probs.prob_last), 8);
        enc.encode_literal(u32::from(probs.prob_gf), 8);
        // intra_16x16_prob_update_flag, intra_chroma_prob_update_flag
        enc.encode_flag(false);
        enc.encode_flag(false);
        write_mv_updates(&mut enc, &base.mv_probs, &probs.mv);
    }

    write_modes(&mut enc, state, probs, coded);
    enc.stop()
}

fn write_segmentation(enc: &mut BoolEncoder, segments: &SegmentPlan) {
    enc.encode_flag(segments.enabled());
    if !segments.enabled() {
        return;
    }
    // update_mb_segmentation_map, update_segment_feature_data
    enc.encode_flag(true);
    enc.encode_flag(true);
    // segment_feature_mode: deltas
    enc.encode_flag(false);
    for &delta in &segments.deltas {
        enc.encode_optional_signed(7, (delta != 0).then_some(delta));
    }
    // no loop filter level per segment
    for _ in 0..segments.deltas.len() {
        enc.encode_flag(false);
    }
    for &prob in &segments.tree_probs {
        enc.encode_flag(prob != 255);
        if prob != 255 {
            enc.encode_literal(u32::from(prob), 8);
        }
    }
}

/// Deltas are sent on keyframes; the decoder keeps them until the next one.
fn write_filter_header(enc: &mut BoolEncoder, filter: &FilterParams, keyframe: bool) {
    enc.encode_flag(filter.simple);
    enc.encode_literal(u32::from(filter.level), 6);
    enc.encode_literal(u32::from(filter.sharpness), 3);
    enc.encode_flag(filter.deltas);
    if filter.deltas {
        // mode_ref_lf_delta_update
        enc.encode_flag(keyframe);
        if keyframe {
            for delta in REF_LF_DELTAS.into_iter().chain(MODE_LF_DELTAS) {
                enc.encode_optional_signed(6, Some(delta));
            }
        }
    }
}

fn write_quant_indices(enc: &mut BoolEncoder, quantizer: u8, deltas: &QuantizerDeltas) {
    enc.encode_literal(u32::from(quantizer), 7);
    for delta in [
        deltas.y1_dc,
        deltas.y2_dc,
        deltas.y2_ac,
        deltas.uv_dc,
        deltas.uv_ac,
    ] {
        enc.encode_optional_signed(4, delta.filter(|&d| d != 0));
    }
}

fn write_refresh_flags(enc: &mut BoolEncoder, state: &FrameState) {
    if state.keyframe {
        enc.encode_flag(state.refresh_entropy);
        return;
    }
    let plan = &state.refresh;
    let refresh_golden = plan.golden == GoldenUpdate::Refresh;
    let refresh_altref = plan.altref == AltRefUpdate::Refresh;
    enc.encode_flag(refresh_golden);
    enc.encode_flag(refresh_altref);
    if !refresh_golden {
        let copy = match plan.golden {
            GoldenUpdate::CopyLast => 1,
            GoldenUpdate::CopyAltRef => 2,
            GoldenUpdate::Keep | GoldenUpdate::Refresh => 0,
        };
        enc.encode_literal(copy, 2);
    }
    if !refresh_altref {
        let copy = match plan.altref {
            AltRefUpdate::CopyLast => 1,
            AltRefUpdate::CopyGolden => 2,
            AltRefUpdate::Keep | AltRefUpdate::Refresh => 0,
        };
        enc.encode_literal(copy, 2);
    }
    enc.encode_flag(state.sign_bias[RefFrame::Golden as usize]);
    enc.encode_flag(state.sign_bias[RefFrame::AltRef as usize]);
    enc.encode_flag(state.refresh_entropy);
    enc.encode_flag(plan.refresh_last);
}

/// Signals every coefficient probability that differs from the decoder's
/// current table.
fn write_coeff_updates(enc: &mut BoolEncoder, old: &TokenProbTables, new: &TokenProbTables) {
    for (t, is) in COEFF_UPDATE_PROBS.iter().enumerate() {
        for (b, js) in is.iter().enumerate() {
            for (c, ks) in js.iter().enumerate() {
                for (p, &update_prob) in ks.iter().enumerate() {
                    let new_p = new[t][b][c][p];
                    let update = new_p != old[t][b][c][p];
                    enc.encode_bool(update, update_prob);
                    if update {
                        enc.encode_literal(u32::from(new_p), 8);
                    }
                }
            }
        }
    }
}

fn write_mv_updates(
    enc: &mut BoolEncoder,
    old: &[[u8; MV_PROB_COUNT]; 2],
    new: &[[u8; MV_PROB_COUNT]; 2],
) {
    for c in 0..2 {
        for i in 0..MV_PROB_COUNT {
            let update = new[c][i] != old[c][i];
            enc.encode_bool(update, MV_UPDATE_PROBS[c][i]);
            if update {
                enc.encode_literal(u32::from(new[c][i] >> 1), 7);
            }
        }
    }
}

/// Writes one motion vector component (quarter pixels).
fn write_mv_component(enc: &mut BoolEncoder, value: i16, p: &[u8; MV_PROB_COUNT]) {
    let x = value.unsigned_abs();
    if x < MV_NUM_SHORT {
        enc.encode_bool(false, p[MVP_IS_SHORT]);
        write_token(enc, &SMALL_MV, &p[MVP_SHORT..MVP_BITS], x as i8);
        if x == 0 {
            return;
        }
    } else {
        enc.encode_bool(true, p[MVP_IS_SHORT]);
        for i in 0..3 {
            enc.encode_bool((x >> i) & 1 != 0, p[MVP_BITS + i]);
        }
        for i in (4..MV_LONG_BITS).rev() {
            enc.encode_bool((x >> i) & 1 != 0, p[MVP_BITS + i]);
        }
        if x & 0xfff0 != 0 {
            enc.encode_bool((x >> 3) & 1 != 0, p[MVP_BITS + 3]);
        }
    }
    enc.encode_bool(value < 0, p[MVP_SIGN]);
}

/// Writes a vector difference, row first.
fn write_mv(enc: &mut BoolEncoder, diff: MotionVector, probs: &[[u8; MV_PROB_COUNT]; 2]) {
    write_mv_component(enc, diff.row, &probs[0]);
    write_mv_component(enc, diff.col, &probs[1]);
}

/// Per-macroblock headers in raster order.
fn write_modes(enc: &mut BoolEncoder, state: &FrameState, probs: &FrameProbs, coded: &CodedFrame) {
    let mbw = coded.mb_width;
    let mut top_bmodes = vec![IntraMode::DC; mbw * 4];

    for (mby, row) in coded.mbs.chunks(mbw).enumerate() {
        let mut left_bmodes = [IntraMode::DC; 4];
        for (mbx, info) in row.iter().enumerate() {
            if state.segments.enabled() {
                write_token(
                    enc,
                    &SEGMENT_ID,
                    &state.segments.tree_probs,
                    info.segment as i8,
                );
            }
            enc.encode_bool(info.skip, probs.prob_skip);

            if state.keyframe {
                write_token(enc, &KEYFRAME_YMODE, &KEYFRAME_YMODE_PROBS, info.luma as i8);
                let top = &mut top_bmodes[mbx * 4..][..4];
                if info.luma == LumaMode::B {
                    for y in 0..4 {
                        for x in 0..4 {
                            let mode = info.bmodes[y * 4 + x];
                            let p = &KEYFRAME_BPRED_MODE_PROBS[top[x] as usize]
                                [left_bmodes[y] as usize];
                            write_token(enc, &BMODE, p, mode as i8);
                            top[x] = mode;
                            left_bmodes[y] = mode;
                        }
                    }
                } else {
                    top.fill(info.luma.into_intra());
                    left_bmodes = [info.luma.into_intra(); 4];
                }
                write_token(enc, &UV_MODE, &KEYFRAME_UV_MODE_PROBS, info.chroma as i8);
                continue;
            }

            let idx = mby * mbw + mbx;
            write_inter_frame_mb(enc, probs, coded, idx, info);
        }
    }
}

fn write_inter_frame_mb(
    enc: &mut BoolEncoder,
    probs: &FrameProbs,
    coded: &CodedFrame,
    idx: usize,
    info: &MacroblockInfo,
) {
    let Some(choice) = &info.inter else {
        enc.encode_bool(false, probs.prob_intra);
        write_token(enc, &YMODE, &YMODE_PROBS, info.luma as i8);
        if info.luma == LumaMode::B {
            for &mode in &info.bmodes {
                write_token(enc, &BMODE, &BMODE_PROBS, mode as i8);
            }
        }
        write_token(enc, &UV_MODE, &UV_MODE_PROBS, info.chroma as i8);
        return;
    };

    enc.encode_bool(true, probs.prob_intra);
    enc.encode_bool(info.reference != RefFrame::Last, probs.prob_last);
    if info.reference != RefFrame::Last {
        enc.encode_bool(info.reference == RefFrame::AltRef, probs.prob_gf);
    }
    write_token(enc, &MV_REF, &choice.mode_probs, choice.mode as i8);

    match choice.mode {
        InterMode::New => write_mv(enc, choice.mv - choice.best_mv, &probs.mv),
        InterMode::Split => {
            let Some(split) = &choice.split else {
                return;
            };
            write_token(enc, &MB_SPLIT, &MB_SPLIT_PROBS, split.shape as i8);
            let mbw = coded.mb_width;
            let left_mb = (idx % mbw > 0).then(|| coded.mbs[idx - 1].block_mvs());
            let above_mb = (idx >= mbw).then(|| coded.mbs[idx - mbw].block_mvs());
            let labels = split.shape.labels();
            for (j, &(sub, mv)) in split.partitions.iter().enumerate().take(split.shape.count()) {
                let Some(k) = labels.iter().position(|&l| usize::from(l) == j) else {
                    continue;
                };
                let (left, above) =
                    split_neighbors(k, &choice.block_mvs, left_mb.as_ref(), above_mb.as_ref());
                let context = sub_mv_context(left, above);
                write_token(enc, &SUB_MV_REF, &SUB_MV_REF_PROBS[context], sub as i8);
                if sub == SubMvRef::New {
                    write_mv(enc, mv - choice.best_mv, &probs.mv);
                }
            }
        }
        InterMode::Zero | InterMode::Nearest | InterMode::Near => {}
    }
}

/// Writes the coefficient tokens, macroblock row `r` into partition
/// `r % count`.
pub(super) fn write_token_partitions(
    probs: &TokenProbTables,
    coded: &CodedFrame,
    partitions: Partitions,
    available: usize,
) -> Result<Vec<Vec<u8>>, EncodeError> {
    let count = partitions.count();
    let limit = available.min(MAX_PARTITION);
    let mut encoders: Vec<BoolEncoder> = (0..count).map(|_| BoolEncoder::start(limit)).collect();
    let mut top = vec![Complexity::default(); coded.mb_width];

    for (mby, row) in coded.mbs.chunks(coded.mb_width).enumerate() {
        let enc = &mut encoders[mby % count];
        let mut left = Complexity::default();
        for (mbx, info) in row.iter().enumerate() {
            let coeffs = &coded.coeffs[mby * coded.mb_width + mbx];
            visit_blocks(
                coeffs,
                info.skip,
                info.has_y2(),
                &mut top[mbx],
                &mut left,
                &mut |btype, block| write_tokens(enc, probs, btype, block),
            );
        }
    }
    encoders.into_iter().map(BoolEncoder::stop).collect()
}

/// Frame tag, keyframe start code and dimensions, then the partitions.
pub(super) fn assemble(
    keyframe: bool,
    show: bool,
    (width, height): (u16, u16),
    first: &[u8],
    parts: &[Vec<u8>],
    available: usize,
) -> Result<Vec<u8>, EncodeError> {
    if first.len() > MAX_FIRST_PARTITION {
        return Err(EncodeError::BufferExhausted {
            needed: first.len(),
            available: MAX_FIRST_PARTITION,
        });
    }
    let prefix = if keyframe { 10 } else { 3 };
    let needed = prefix
        + first.len()
        + 3 * parts.len().saturating_sub(1)
        + parts.iter().map(Vec::len).sum::<usize>();
    if needed > available {
        return Err(EncodeError::BufferExhausted { needed, available });
    }

    let mut out = Vec::with_capacity(needed);
    // version 0: six-tap filter, normal loop filter allowed
    let tag = ((first.len() as u32) << 5) | (u32::from(show) << 4) | u32::from(!keyframe);
    out.write_u24_le(tag);
    if keyframe {
        out.write_all(&KEYFRAME_START_CODE);
        out.write_u16_le(width);
        out.write_u16_le(height);
    }
    out.write_all(first);
    if let Some((_, sized)) = parts.split_last() {
        for part in sized {
            out.write_u24_le(part.len() as u32);
        }
    }
    for part in parts {
        out.write_all(part);
    }
    Ok(out)
}
