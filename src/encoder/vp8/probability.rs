//! Per-frame probability adaptation.
//!
//! After mode decision every coded token, skip flag, reference choice and
//! motion vector of the frame is counted. Coefficient and motion vector
//! probabilities move to the counted statistics wherever the saving pays for
//! the update signalling; the skip and reference probabilities are sent in
//! full every frame.

use alloc::vec;

use crate::common::types::{
    InterMode, RefFrame, SubMvRef, TokenProbTables, COEFF_UPDATE_PROBS, MV_PROB_COUNT,
    MV_UPDATE_PROBS,
};
use crate::encoder::cost::stats::{calc_mv_prob, mv_update_pays, MvStats, ProbaStats};

use super::residuals::{visit_blocks, Complexity};
use super::{CodedFrame, EntropyState, FrameState};

/// Probabilities a frame is written with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct FrameProbs {
    pub(super) coeff: TokenProbTables,
    pub(super) mv: [[u8; MV_PROB_COUNT]; 2],
    /// Probability of a macroblock having coefficients.
    pub(super) prob_skip: u8,
    /// Probability of an intra macroblock on inter frames.
    pub(super) prob_intra: u8,
    pub(super) prob_last: u8,
    pub(super) prob_gf: u8,
}

/// `count / total` in 8 bits, rounded, or `None` without samples.
fn ratio(count: usize, total: usize) -> Option<u8> {
    (total > 0).then(|| ((255 * count + total / 2) / total).min(255) as u8)
}

/// Counts the frame's statistics and derives the probabilities to code it with.
pub(super) fn adapt(state: &FrameState, base: &EntropyState, coded: &CodedFrame) -> FrameProbs {
    let mut coeff = base.coeff_probs;
    let stats = token_stats(coded);
    let updated = stats.apply_updates(&mut coeff, &COEFF_UPDATE_PROBS);

    let total = coded.mbs.len();
    let coded_mbs = coded.mbs.iter().filter(|mb| !mb.skip).count();
    let prob_skip = ratio(coded_mbs, total).map_or(base.prob_skip, |p| p.clamp(1, 254));

    let mut probs = FrameProbs {
        coeff,
        mv: base.mv_probs,
        prob_skip,
        prob_intra: base.prob_intra,
        prob_last: base.prob_last,
        prob_gf: base.prob_gf,
    };
    if state.keyframe {
        log::trace!("keyframe: {updated} coefficient updates, prob_skip={prob_skip}");
        return probs;
    }

    let count = |r: RefFrame| coded.mbs.iter().filter(|mb| mb.reference == r).count();
    let (intra, last) = (count(RefFrame::Intra), count(RefFrame::Last));
    let (golden, altref) = (count(RefFrame::Golden), count(RefFrame::AltRef));
    let at_least_one = |p: u8| p.max(1);
    probs.prob_intra = ratio(intra, total).map_or(probs.prob_intra, at_least_one);
    probs.prob_last = ratio(last, total - intra).map_or(128, at_least_one);
    probs.prob_gf = ratio(golden, golden + altref).map_or(128, at_least_one);

    let mv_updates = adapt_mv_probs(&mut probs.mv, &mv_stats(coded));
    log::trace!(
        "inter frame: {updated} coefficient updates, {mv_updates} mv updates, \
         prob_skip={} prob_intra={} prob_last={} prob_gf={}",
        probs.prob_skip,
        probs.prob_intra,
        probs.prob_last,
        probs.prob_gf
    );
    probs
}

/// Token statistics of every coded block, with the contexts the token
/// partitions see.
fn token_stats(coded: &CodedFrame) -> ProbaStats {
    let mut stats = ProbaStats::new();
    let mut top = vec![Complexity::default(); coded.mb_width];
    for (row, coeffs) in coded
        .mbs
        .chunks(coded.mb_width)
        .zip(coded.coeffs.chunks(coded.mb_width))
    {
        let mut left = Complexity::default();
        for ((info, mb), top) in row.iter().zip(coeffs).zip(top.iter_mut()) {
            visit_blocks(mb, info.skip, info.has_y2(), top, &mut left, &mut |btype, block| {
                stats.record_block(btype, block)
            });
        }
    }
    stats
}

/// Every vector difference the first partition codes.
fn mv_stats(coded: &CodedFrame) -> MvStats {
    let mut stats = MvStats::default();
    for choice in coded.mbs.iter().filter_map(|mb| mb.inter.as_ref()) {
        match (choice.mode, &choice.split) {
            (InterMode::New, _) => stats.record(choice.mv - choice.best_mv),
            (InterMode::Split, Some(split)) => {
                for &(sub, mv) in &split.partitions[..split.shape.count()] {
                    if sub == SubMvRef::New {
                        stats.record(mv - choice.best_mv);
                    }
                }
            }
            _ => {}
        }
    }
    stats
}

/// Moves each motion vector probability whose update saves bits. Returns the
/// number of updates.
fn adapt_mv_probs(probs: &mut [[u8; MV_PROB_COUNT]; 2], stats: &MvStats) -> usize {
    let mut updates = 0;
    for (c, component) in stats.components.iter().enumerate() {
        let counts = component.branch_counts().counts;
        for (i, &ct) in counts.iter().enumerate() {
            let cur = probs[c][i];
            let Some(new) = calc_mv_prob(ct) else {
                continue;
            };
            if new != cur && mv_update_pays(ct, cur, new, MV_UPDATE_PROBS[c][i]) {
                probs[c][i] = new;
                updates += 1;
            }
        }
    }
    updates
}

/// Entropy state after a frame.
///
/// Without `refresh_entropy` the decoder restores the coefficient and vector
/// probabilities it had before the frame. The skip and reference estimates
/// only steer the encoder's rate model and always follow the last frame.
pub(super) fn next_state(
    base: &EntropyState,
    probs: &FrameProbs,
    refresh_entropy: bool,
) -> EntropyState {
    let (coeff_probs, mv_probs) = if refresh_entropy {
        (probs.coeff, probs.mv)
    } else {
        (base.coeff_probs, base.mv_probs)
    };
    EntropyState {
        coeff_probs,
        mv_probs,
        prob_intra: probs.prob_intra,
        prob_last: probs.prob_last,
        prob_gf: probs.prob_gf,
        prob_skip: probs.prob_skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{MotionVector, SplitShape, DEFAULT_MV_PROBS, MVP_IS_SHORT};
    use crate::encoder::config::{EncoderConfig, FrameOptions};
    use crate::encoder::vp8::residuals::QuantizedMb;
    use crate::encoder::vp8::segment::SegmentPlan;
    use crate::encoder::vp8::{InterChoice, MacroblockInfo, SplitInfo};
    use alloc::vec::Vec;

    fn state(keyframe: bool) -> FrameState {
        let config = EncoderConfig::new(64, 16);
        FrameState::new(&config, &FrameOptions::default(), keyframe, 40, SegmentPlan::single(4))
    }

    fn frame(mbs: Vec<MacroblockInfo>) -> CodedFrame {
        let coeffs = mbs
            .iter()
            .map(|mb| {
                let mut q = QuantizedMb::default();
                if !mb.skip {
                    q.y2[0] = 3;
                    q.u[1][0] = -2;
                }
                q
            })
            .collect();
        CodedFrame {
            mb_width: mbs.len(),
            mbs,
            coeffs,
        }
    }

    fn inter(reference: RefFrame, mode: InterMode, mv: MotionVector) -> MacroblockInfo {
        MacroblockInfo {
            reference,
            inter: Some(InterChoice {
                mode,
                mv,
                best_mv: MotionVector::ZERO,
                mode_probs: [128; 4],
                split: None,
                block_mvs: [mv; 16],
            }),
            ..MacroblockInfo::default()
        }
    }

    #[test]
    fn skip_probability_follows_coded_macroblocks() {
        let skipped = MacroblockInfo {
            skip: true,
            ..MacroblockInfo::default()
        };
        let coded = frame(vec![skipped; 4]);
        let probs = adapt(&state(true), &EntropyState::new(), &coded);
        assert_eq!(probs.prob_skip, 1);
        // Nothing coded, nothing worth updating.
        assert_eq!(probs.coeff, EntropyState::new().coeff_probs);

        let coded = frame(vec![MacroblockInfo::default(); 4]);
        assert_eq!(adapt(&state(true), &EntropyState::new(), &coded).prob_skip, 254);
    }

    #[test]
    fn reference_probabilities_count_choices() {
        let mbs = vec![
            MacroblockInfo::default(),
            inter(RefFrame::Last, InterMode::Zero, MotionVector::ZERO),
            inter(RefFrame::Last, InterMode::Zero, MotionVector::ZERO),
            inter(RefFrame::Golden, InterMode::Zero, MotionVector::ZERO),
        ];
        let probs = adapt(&state(false), &EntropyState::new(), &frame(mbs));
        assert_eq!(probs.prob_intra, 64);
        assert_eq!(probs.prob_last, 170);
        assert_eq!(probs.prob_gf, 255);
    }

    #[test]
    fn no_inter_macroblocks_use_even_reference_probabilities() {
        let probs = adapt(
            &state(false),
            &EntropyState::new(),
            &frame(vec![MacroblockInfo::default(); 4]),
        );
        assert_eq!(probs.prob_intra, 255);
        assert_eq!((probs.prob_last, probs.prob_gf), (128, 128));
    }

    #[test]
    fn frequent_vectors_update_mv_probabilities() {
        let mv = MotionVector::new(24, -40);
        let mut mbs = vec![inter(RefFrame::Last, InterMode::New, mv); 4];
        let split = InterChoice {
            mode: InterMode::Split,
            split: Some(SplitInfo {
                shape: SplitShape::TopBottom,
                partitions: [(SubMvRef::New, mv); 16],
            }),
            ..mbs[0].inter.unwrap()
        };
        mbs[3].inter = Some(split);
        let mut coded = frame(mbs.clone());
        for _ in 0..15 {
            coded.mbs.extend_from_slice(&mbs);
            coded.coeffs.extend(frame(mbs.clone()).coeffs);
        }
        let stats = mv_stats(&coded);
        let row = stats.components[0].branch_counts().counts;
        // 48 whole-MB vectors and 32 split partitions, all long and positive.
        assert_eq!(row[MVP_IS_SHORT], [0, 80]);

        let probs = adapt(&state(false), &EntropyState::new(), &coded);
        assert_ne!(probs.mv, DEFAULT_MV_PROBS);
        assert_eq!(probs.mv[0][MVP_IS_SHORT], 1);
    }

    #[test]
    fn error_resilient_frames_keep_base_probabilities() {
        let base = EntropyState::new();
        let mut probs = adapt(&state(false), &base, &frame(vec![MacroblockInfo::default(); 4]));
        probs.coeff[0][0][0][0] = 7;
        probs.mv[0][0] = 9;

        let kept = next_state(&base, &probs, false);
        assert_eq!(kept.coeff_probs, base.coeff_probs);
        assert_eq!(kept.mv_probs, base.mv_probs);
        assert_eq!(kept.prob_intra, probs.prob_intra);

        let refreshed = next_state(&base, &probs, true);
        assert_eq!(refreshed.coeff_probs[0][0][0][0], 7);
        assert_eq!(refreshed.mv_probs[0][0], 9);
    }
}
