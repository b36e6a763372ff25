//! Loop filter level selection and in-loop filtering of the reconstruction.
//!
//! The filtered frame is what a decoder holds as reference, so the same
//! per-macroblock levels and edge rules apply here.

use crate::common::loop_filter::{filter_macroblock, EdgeParams};
use crate::common::types::{InterMode, LumaMode};
use crate::encoder::config::{EncoderConfig, FilterLevel, FilterType};
use crate::encoder::cost::distortion::sse;
use crate::encoder::cost::lambda::filter_level_guess;
use crate::encoder::frame::{Frame, Plane};

use super::{CodedFrame, FrameState, MacroblockInfo};

/// Level adjustment per reference: intra, last, golden, altref.
pub(super) const REF_LF_DELTAS: [i8; 4] = [2, 0, -2, -2];
/// Level adjustment per mode: B_PRED, ZEROMV, other MV modes, SPLITMV.
pub(super) const MODE_LF_DELTAS: [i8; 4] = [4, -2, 2, 4];

const MAX_LEVEL: u8 = 63;

/// Loop filter header fields of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct FilterParams {
    pub(super) simple: bool,
    pub(super) level: u8,
    pub(super) sharpness: u8,
    /// Reference and mode deltas enabled.
    pub(super) deltas: bool,
}

impl FilterParams {
    /// Picks the frame's filter level.
    ///
    /// `FilterLevel::Auto` starts from a quantizer-based guess and walks
    /// toward lower luma error against `source`, halving the step whenever
    /// neither neighbour improves.
    pub(super) fn choose(
        config: &EncoderConfig,
        state: &FrameState,
        coded: &CodedFrame,
        recon: &Frame,
        source: &Frame,
    ) -> Self {
        let lf = &config.loop_filter;
        let mut params = Self {
            simple: lf.filter_type == FilterType::Simple,
            level: 0,
            sharpness: lf.sharpness,
            deltas: lf.deltas,
        };
        match lf.level {
            FilterLevel::Fixed(level) => params.level = level.min(MAX_LEVEL),
            FilterLevel::Auto => {
                let (width, height) = (usize::from(config.width), usize::from(config.height));
                let error = |level: u8| {
                    let trial = Self { level, ..params };
                    let mut y = recon.y.clone();
                    trial.filter_plane(&mut y, 16, state.keyframe, coded);
                    sse(
                        &y.data()[y.index(0, 0)..],
                        y.stride,
                        &source.y.data()[source.y.index(0, 0)..],
                        source.y.stride,
                        width,
                        height,
                    )
                };

                let mut best = filter_level_guess(state.quantizer);
                let mut best_error = error(best);
                let mut step = 4u8;
                while step > 0 {
                    let mut moved = false;
                    for level in [best.saturating_sub(step), (best + step).min(MAX_LEVEL)] {
                        if level == best {
                            continue;
                        }
                        let e = error(level);
                        if e < best_error {
                            best = level;
                            best_error = e;
                            moved = true;
                        }
                    }
                    if !moved {
                        step /= 2;
                    }
                }
                log::trace!("loop filter level {best} (sse {best_error})");
                params.level = best;
            }
        }
        params
    }

    /// Level of one macroblock after reference and mode deltas.
    pub(super) fn mb_level(&self, info: &MacroblockInfo) -> u8 {
        if !self.deltas {
            return self.level;
        }
        let mut level = i32::from(self.level) + i32::from(REF_LF_DELTAS[info.reference as usize]);
        let mode_delta = match &info.inter {
            None if info.luma == LumaMode::B => Some(MODE_LF_DELTAS[0]),
            None => None,
            Some(choice) => Some(match choice.mode {
                InterMode::Zero => MODE_LF_DELTAS[1],
                InterMode::Split => MODE_LF_DELTAS[3],
                InterMode::Nearest | InterMode::Near | InterMode::New => MODE_LF_DELTAS[2],
            }),
        };
        if let Some(delta) = mode_delta {
            level += i32::from(delta);
        }
        level.clamp(0, i32::from(MAX_LEVEL)) as u8
    }

    /// Filters the reconstruction in place, macroblock by macroblock in
    /// raster order.
    pub(super) fn apply(&self, recon: &mut Frame, keyframe: bool, coded: &CodedFrame) {
        if self.level == 0 {
            return;
        }
        self.filter_plane(&mut recon.y, 16, keyframe, coded);
        if !self.simple {
            self.filter_plane(&mut recon.u, 8, keyframe, coded);
            self.filter_plane(&mut recon.v, 8, keyframe, coded);
        }
    }

    fn filter_plane(&self, plane: &mut Plane, size: usize, keyframe: bool, coded: &CodedFrame) {
        if self.level == 0 {
            return;
        }
        let stride = plane.stride;
        for (i, info) in coded.mbs.iter().enumerate() {
            let level = self.mb_level(info);
            if level == 0 {
                continue;
            }
            let (mbx, mby) = (i % coded.mb_width, i / coded.mb_width);
            let params = EdgeParams::new(level, self.sharpness, keyframe);
            let pos = plane.index(mbx * size, mby * size);
            let inner = !(info.skip && info.has_y2());
            filter_macroblock(
                plane.data_mut(),
                stride,
                pos % stride,
                pos / stride,
                size,
                &params,
                self.simple,
                mbx > 0,
                mby > 0,
                inner,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{MotionVector, RefFrame};
    use crate::encoder::config::{FrameOptions, LoopFilterConfig};
    use crate::encoder::vp8::residuals::QuantizedMb;
    use crate::encoder::vp8::segment::SegmentPlan;
    use crate::encoder::vp8::InterChoice;
    use alloc::vec;

    fn params(level: u8, simple: bool) -> FilterParams {
        FilterParams {
            simple,
            level,
            sharpness: 0,
            deltas: true,
        }
    }

    fn two_mbs() -> CodedFrame {
        CodedFrame {
            mbs: vec![MacroblockInfo::default(); 2],
            coeffs: vec![QuantizedMb::default(); 2],
            mb_width: 2,
        }
    }

    /// Left macroblock at `left`, right one at `right`, all planes.
    fn step_frame(left: u8, right: u8) -> Frame {
        let mut frame = Frame::new(2, 1);
        for (plane, size) in [(&mut frame.y, 16), (&mut frame.u, 8), (&mut frame.v, 8)] {
            for y in 0..size {
                let row = plane.row_mut(y);
                row[..size].fill(left);
                row[size..].fill(right);
            }
        }
        frame
    }

    fn inter(mode: InterMode, reference: RefFrame) -> MacroblockInfo {
        MacroblockInfo {
            reference,
            inter: Some(InterChoice {
                mode,
                mv: MotionVector::ZERO,
                best_mv: MotionVector::ZERO,
                mode_probs: [128; 4],
                split: None,
                block_mvs: [MotionVector::ZERO; 16],
            }),
            ..MacroblockInfo::default()
        }
    }

    #[test]
    fn levels_follow_reference_and_mode_deltas() {
        let p = params(30, false);
        assert_eq!(p.mb_level(&MacroblockInfo::default()), 32);
        let bpred = MacroblockInfo {
            luma: LumaMode::B,
            ..MacroblockInfo::default()
        };
        assert_eq!(p.mb_level(&bpred), 36);
        assert_eq!(p.mb_level(&inter(InterMode::Zero, RefFrame::Last)), 28);
        assert_eq!(p.mb_level(&inter(InterMode::New, RefFrame::Golden)), 30);
        assert_eq!(p.mb_level(&inter(InterMode::Split, RefFrame::AltRef)), 32);
        assert_eq!(params(62, false).mb_level(&bpred), 63);
        assert_eq!(params(1, false).mb_level(&inter(InterMode::Zero, RefFrame::Golden)), 0);

        let flat = FilterParams {
            deltas: false,
            ..p
        };
        assert_eq!(flat.mb_level(&bpred), 30);
    }

    #[test]
    fn level_zero_leaves_the_frame_alone() {
        let mut frame = step_frame(100, 110);
        params(0, false).apply(&mut frame, true, &two_mbs());
        assert_eq!(frame.y.row(0)[15], 100);
        assert_eq!(frame.y.row(0)[16], 110);
    }

    #[test]
    fn normal_filter_smooths_macroblock_edges() {
        let mut frame = step_frame(100, 110);
        params(20, false).apply(&mut frame, true, &two_mbs());
        for y in 0..16 {
            let row = frame.y.row(y);
            assert!(row[15] > 100 && row[16] < 110, "row {y}: {:?}", &row[12..20]);
            assert_eq!(row[0], 100);
            assert_eq!(row[31], 110);
        }
        assert!(frame.u.row(0)[7] > 100);
    }

    #[test]
    fn simple_filter_skips_chroma() {
        let mut frame = step_frame(100, 110);
        params(20, true).apply(&mut frame, true, &two_mbs());
        assert!(frame.y.row(3)[15] > 100);
        assert_eq!(frame.u.row(3)[7], 100);
        assert_eq!(frame.v.row(3)[8], 110);
    }

    #[test]
    fn choose_honours_fixed_levels_and_guesses_on_flat_frames() {
        let config = EncoderConfig::new(32, 16).with_loop_filter(LoopFilterConfig {
            level: FilterLevel::Fixed(17),
            ..LoopFilterConfig::default()
        });
        let options = FrameOptions::default();
        let state = FrameState::new(&config, &options, true, 60, SegmentPlan::single(2));
        let frame = step_frame(90, 90);
        let chosen = FilterParams::choose(&config, &state, &two_mbs(), &frame, &frame);
        assert_eq!(chosen.level, 17);
        assert!(!chosen.simple);

        // Every level is error-free on a flat frame; the guess stands.
        let config = EncoderConfig::new(32, 16);
        let chosen = FilterParams::choose(&config, &state, &two_mbs(), &frame, &frame);
        assert_eq!(chosen.level, filter_level_guess(60));
    }

    #[test]
    fn choose_turns_the_filter_down_when_edges_are_real() {
        let config = EncoderConfig::new(32, 16);
        let options = FrameOptions::default();
        let state = FrameState::new(&config, &options, true, 100, SegmentPlan::single(2));
        // The step exists in the source too, so filtering only adds error.
        let frame = step_frame(100, 116);
        let chosen = FilterParams::choose(&config, &state, &two_mbs(), &frame, &frame);
        assert!(chosen.level < filter_level_guess(100));
    }
}
