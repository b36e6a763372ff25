//! VP8 frame encoder: keyframes and inter frames.
//!
//! ## Module organization
//!
//! - [`mode_selection`]: intra mode decision (16×16, 4×4 sub-blocks, chroma)
//! - [`inter`]: inter mode decision and motion search per reference
//! - [`residuals`]: transform, quantization and token contexts of a macroblock
//! - [`segment`]: segment map and per-segment quantizer deltas
//! - [`filter`]: loop filter level choice and in-loop filtering
//! - [`probability`]: per-frame probability adaptation
//! - [`header`]: frame header, token partitions and frame assembly
//!
//! ## Encoding pipeline
//!
//! 1. **Frame type**: keyframe on the first frame, on request, or at the interval
//! 2. **Segmentation**: k-means over macroblock activity assigns 1-4 segments
//! 3. **Mode decision**: each macroblock, in raster order, takes the candidate
//!    with the lowest `rate * lambda + 256 * sse`; its reconstruction is
//!    committed before the next macroblock is decided
//! 4. **Loop filter**: level chosen per frame, applied to the reconstruction
//! 5. **Entropy coding**: probabilities adapted to the frame, then the first
//!    partition and the token partitions are written
//! 6. **Commit**: references and entropy state advance only on success

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, warn};

use super::api::{
    ConfigError, EncodeError, EncodedFrame, FrameStats, FrameType, PlaneView, YuvFrame,
};
use super::config::{
    validate_quantizer, AltRefUpdate, EncoderConfig, FrameOptions, GoldenUpdate, Partitions,
    QuantizerDeltas, TransformKind,
};
use super::cost::distortion::{psnr, sse};
use super::cost::{rd_lambda, rd_score, sad_per_bit, RdCostTables};
use super::frame::{Frame, Plane, ReferencePool, RefreshPlan};
use super::motion::Neighbor;
use super::quantize::SegmentQuant;
use super::tree::cost_bit;
#[cfg(feature = "simd")]
use crate::common::transform::SimdTransform;
use crate::common::transform::{ForwardTransform, ScalarTransform};
use crate::common::types::{
    ChromaMode, IntraMode, InterMode, LumaMode, MotionVector, RefFrame, SplitShape, SubMvRef,
    TokenProbTables, COEFF_PROBS, DEFAULT_MV_PROBS, MAX_SEGMENTS, MV_PROB_COUNT,
};

mod filter;
mod header;
mod inter;
mod mode_selection;
mod probability;
mod residuals;
mod segment;

use filter::FilterParams;
use residuals::{chroma_rate, luma_rate, visit_blocks, ChromaResidual, Complexity, LumaResidual, QuantizedMb};
use segment::SegmentPlan;

//------------------------------------------------------------------------------
// Persistent and per-frame state

/// Probabilities carried from frame to frame.
#[derive(Clone, Debug, PartialEq, Eq)]
struct EntropyState {
    coeff_probs: TokenProbTables,
    mv_probs: [[u8; MV_PROB_COUNT]; 2],
    /// Last frame's intra probability, the rate estimate for this one.
    prob_intra: u8,
    prob_last: u8,
    prob_gf: u8,
    prob_skip: u8,
}

impl EntropyState {
    fn new() -> Self {
        Self {
            coeff_probs: COEFF_PROBS,
            mv_probs: DEFAULT_MV_PROBS,
            prob_intra: 63,
            prob_last: 128,
            prob_gf: 128,
            prob_skip: 128,
        }
    }

    /// Keyframes reset the coefficient and motion vector probabilities.
    fn for_keyframe(&self) -> Self {
        Self {
            coeff_probs: COEFF_PROBS,
            mv_probs: DEFAULT_MV_PROBS,
            ..self.clone()
        }
    }
}

/// Everything about the current frame decided before mode decision.
struct FrameState {
    keyframe: bool,
    show: bool,
    quantizer: u8,
    deltas: QuantizerDeltas,
    partitions: Partitions,
    /// Whether the decoder keeps this frame's probabilities.
    refresh_entropy: bool,
    /// Indexed by `RefFrame`.
    sign_bias: [bool; 4],
    refresh: RefreshPlan,
    segments: SegmentPlan,
    quant: [SegmentQuant; MAX_SEGMENTS],
    lambda: [u64; MAX_SEGMENTS],
    sad_per_bit: [u32; MAX_SEGMENTS],
}

impl FrameState {
    fn new(
        config: &EncoderConfig,
        options: &FrameOptions,
        keyframe: bool,
        quantizer: u8,
        segments: SegmentPlan,
    ) -> Self {
        let refresh = if keyframe {
            RefreshPlan {
                keyframe: true,
                refresh_last: true,
                golden: GoldenUpdate::Refresh,
                altref: AltRefUpdate::Refresh,
            }
        } else {
            RefreshPlan {
                keyframe: false,
                refresh_last: options.refresh_last,
                golden: options.golden,
                altref: options.altref,
            }
        };
        let sign_bias = if keyframe {
            [false; 4]
        } else {
            [false, false, options.sign_bias_golden, options.sign_bias_altref]
        };
        let quant: [SegmentQuant; MAX_SEGMENTS] = core::array::from_fn(|s| {
            SegmentQuant::new(segments.quantizer(s, quantizer), &config.quantizer_deltas)
        });
        let lambda = core::array::from_fn(|s| rd_lambda(quant[s].y1.dc()));
        let sad_per_bit = core::array::from_fn(|s| {
            config
                .motion_lambda
                .unwrap_or_else(|| sad_per_bit(quant[s].index))
        });
        Self {
            keyframe,
            show: options.show_frame,
            quantizer,
            deltas: config.quantizer_deltas,
            partitions: config.partitions,
            refresh_entropy: !config.error_resilient,
            sign_bias,
            refresh,
            segments,
            quant,
            lambda,
            sad_per_bit,
        }
    }
}

//------------------------------------------------------------------------------
// Macroblock decisions

/// Whole-MB inter decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InterChoice {
    mode: InterMode,
    /// The vector neighbours see; block 15's for SPLITMV.
    mv: MotionVector,
    /// Vector NEWMV and split NEW vectors are coded against.
    best_mv: MotionVector,
    /// Mode probabilities from the neighbour vector survey.
    mode_probs: [u8; 4],
    split: Option<SplitInfo>,
    block_mvs: [MotionVector; 16],
}

/// Partitioning of a SPLITMV macroblock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SplitInfo {
    shape: SplitShape,
    /// How each partition's vector is coded, for the first `shape.count()` entries.
    partitions: [(SubMvRef, MotionVector); 16],
}

/// Everything the first partition records about one macroblock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct MacroblockInfo {
    reference: RefFrame,
    luma: LumaMode,
    bmodes: [IntraMode; 16],
    chroma: ChromaMode,
    inter: Option<InterChoice>,
    segment: u8,
    skip: bool,
}

impl MacroblockInfo {
    /// Whether the luma DC goes through the Y2 block.
    fn has_y2(&self) -> bool {
        match &self.inter {
            Some(choice) => choice.mode != InterMode::Split,
            None => self.luma != LumaMode::B,
        }
    }

    fn neighbor(&self) -> Neighbor {
        match &self.inter {
            Some(choice) => Neighbor {
                reference: self.reference,
                mv: choice.mv,
                split: choice.mode == InterMode::Split,
            },
            None => Neighbor::default(),
        }
    }

    /// Per-4×4 vectors; zero for intra macroblocks.
    fn block_mvs(&self) -> [MotionVector; 16] {
        self.inter
            .as_ref()
            .map_or([MotionVector::ZERO; 16], |choice| choice.block_mvs)
    }
}

/// Source samples and neighbour state of the macroblock being decided.
struct MbContext {
    mbx: usize,
    mby: usize,
    segment: usize,
    src_y: [u8; 256],
    src_u: [u8; 64],
    src_v: [u8; 64],
    top: Complexity,
    left: Complexity,
    /// Sub-block modes bordering the macroblock, for keyframe mode costs.
    above_bmodes: [IntraMode; 4],
    left_bmodes: [IntraMode; 4],
}

/// A fully coded option for one macroblock.
struct Candidate {
    info: MacroblockInfo,
    coeffs: QuantizedMb,
    recon_y: [u8; 256],
    recon_u: [u8; 64],
    recon_v: [u8; 64],
    sse: u64,
    score: u64,
}

/// The decisions of a finished mode decision pass.
struct CodedFrame {
    mbs: Vec<MacroblockInfo>,
    coeffs: Vec<QuantizedMb>,
    mb_width: usize,
}

fn copy_block<const N: usize>(plane: &Plane, x: usize, y: usize, size: usize) -> [u8; N] {
    let mut out = [0u8; N];
    for (r, row) in out.chunks_exact_mut(size).enumerate() {
        row.copy_from_slice(&plane.row(y + r)[x..x + size]);
    }
    out
}

fn visible(plane: &Plane, width: usize, height: usize) -> PlaneView<'_> {
    PlaneView::new(&plane.data()[plane.index(0, 0)..], plane.stride, width, height)
}

fn store_block(plane: &mut Plane, x: usize, y: usize, size: usize, block: &[u8]) {
    for (r, row) in block.chunks_exact(size).enumerate() {
        plane.row_mut(y + r)[x..x + size].copy_from_slice(row);
    }
}

/// Mode decision over one frame.
struct FramePass<'a> {
    config: &'a EncoderConfig,
    transform: &'a dyn ForwardTransform,
    state: &'a FrameState,
    entropy: &'a EntropyState,
    costs: RdCostTables,
    source: &'a Frame,
    recon: &'a mut Frame,
    /// LAST, GOLDEN, ALTREF; all `None` on keyframes.
    refs: [Option<&'a Frame>; 3],
    mb_width: usize,
    mb_height: usize,
    mbs: Vec<MacroblockInfo>,
    coeffs: Vec<QuantizedMb>,
    top_ctx: Vec<Complexity>,
    left_ctx: Complexity,
    /// Bottom-row sub-block modes, four per macroblock column.
    top_bmodes: Vec<IntraMode>,
    left_bmodes: [IntraMode; 4],
}

impl<'a> FramePass<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: &'a EncoderConfig,
        transform: &'a dyn ForwardTransform,
        state: &'a FrameState,
        entropy: &'a EntropyState,
        source: &'a Frame,
        recon: &'a mut Frame,
        refs: [Option<&'a Frame>; 3],
    ) -> Self {
        let (mb_width, mb_height) = (config.mb_width(), config.mb_height());
        Self {
            config,
            transform,
            state,
            entropy,
            costs: RdCostTables::new(&entropy.coeff_probs, &entropy.mv_probs),
            source,
            recon,
            refs,
            mb_width,
            mb_height,
            mbs: Vec::with_capacity(mb_width * mb_height),
            coeffs: Vec::with_capacity(mb_width * mb_height),
            top_ctx: vec![Complexity::default(); mb_width],
            left_ctx: Complexity::default(),
            top_bmodes: vec![IntraMode::DC; mb_width * 4],
            left_bmodes: [IntraMode::DC; 4],
        }
    }

    fn run(mut self) -> CodedFrame {
        for mby in 0..self.mb_height {
            self.left_ctx = Complexity::default();
            self.left_bmodes = [IntraMode::DC; 4];
            for mbx in 0..self.mb_width {
                let ctx = self.context(mbx, mby);
                let mut best = self.pick_intra(&ctx);
                if !self.state.keyframe {
                    if let Some(inter) = self.pick_inter(&ctx, best.score) {
                        if inter.score < best.score {
                            best = inter;
                        }
                    }
                }
                self.commit(&ctx, best);
            }
        }
        CodedFrame {
            mbs: self.mbs,
            coeffs: self.coeffs,
            mb_width: self.mb_width,
        }
    }

    fn context(&self, mbx: usize, mby: usize) -> MbContext {
        let mut above_bmodes = [IntraMode::DC; 4];
        above_bmodes.copy_from_slice(&self.top_bmodes[mbx * 4..][..4]);
        MbContext {
            mbx,
            mby,
            segment: usize::from(self.state.segments.map[mby * self.mb_width + mbx]),
            src_y: copy_block(&self.source.y, mbx * 16, mby * 16, 16),
            src_u: copy_block(&self.source.u, mbx * 8, mby * 8, 8),
            src_v: copy_block(&self.source.v, mbx * 8, mby * 8, 8),
            top: self.top_ctx[mbx],
            left: self.left_ctx,
            above_bmodes,
            left_bmodes: self.left_bmodes,
        }
    }

    fn quant(&self, ctx: &MbContext) -> &SegmentQuant {
        &self.state.quant[ctx.segment]
    }

    fn lambda(&self, ctx: &MbContext) -> u64 {
        self.state.lambda[ctx.segment]
    }

    /// Scores a coded option. `header_rate` covers everything but the skip
    /// flag and the tokens.
    fn candidate(
        &self,
        ctx: &MbContext,
        info: MacroblockInfo,
        luma: LumaResidual,
        chroma: ChromaResidual,
        header_rate: u32,
    ) -> Candidate {
        let coeffs = QuantizedMb::from_parts(&luma, &chroma);
        let skip = coeffs.is_zero();
        let token_rate = if skip {
            0
        } else {
            luma_rate(&self.costs, &luma, info.has_y2(), &ctx.top, &ctx.left)
                + chroma_rate(&self.costs, &chroma, &ctx.top, &ctx.left)
        };
        let rate = header_rate + token_rate + cost_bit(skip, self.entropy.prob_skip);
        let sse = luma.sse + chroma.sse;
        Candidate {
            info,
            coeffs,
            recon_y: luma.recon,
            recon_u: chroma.recon_u,
            recon_v: chroma.recon_v,
            sse,
            score: rd_score(rate, sse, self.lambda(ctx)),
        }
    }

    /// Writes the winner's reconstruction and advances the neighbour contexts.
    fn commit(&mut self, ctx: &MbContext, candidate: Candidate) {
        let Candidate {
            mut info,
            coeffs,
            recon_y,
            recon_u,
            recon_v,
            ..
        } = candidate;
        let (mbx, mby) = (ctx.mbx, ctx.mby);
        store_block(&mut self.recon.y, mbx * 16, mby * 16, 16, &recon_y);
        store_block(&mut self.recon.u, mbx * 8, mby * 8, 8, &recon_u);
        store_block(&mut self.recon.v, mbx * 8, mby * 8, 8, &recon_v);

        info.segment = ctx.segment as u8;
        info.skip = coeffs.is_zero();
        visit_blocks(
            &coeffs,
            info.skip,
            info.has_y2(),
            &mut self.top_ctx[mbx],
            &mut self.left_ctx,
            &mut |_, _| {},
        );

        let (bottom, right) = match (info.inter, info.luma) {
            (None, LumaMode::B) => (
                core::array::from_fn(|i| info.bmodes[12 + i]),
                core::array::from_fn(|i| info.bmodes[i * 4 + 3]),
            ),
            (None, luma) => ([luma.into_intra(); 4], [luma.into_intra(); 4]),
            (Some(_), _) => ([IntraMode::DC; 4], [IntraMode::DC; 4]),
        };
        self.top_bmodes[mbx * 4..][..4].copy_from_slice(&bottom);
        self.left_bmodes = right;

        self.mbs.push(info);
        self.coeffs.push(coeffs);
    }
}

//------------------------------------------------------------------------------
// Encoder

fn select_transform(kind: TransformKind) -> &'static dyn ForwardTransform {
    match kind {
        TransformKind::Reference => &ScalarTransform,
        #[cfg(feature = "simd")]
        TransformKind::Simd => &SimdTransform,
        #[cfg(not(feature = "simd"))]
        TransformKind::Simd => &ScalarTransform,
    }
}

/// A compressed frame whose effects on the encoder are not applied yet.
struct PendingCommit {
    slot: usize,
    plan: RefreshPlan,
    entropy: EntropyState,
    #[cfg(test)]
    coded: CodedFrame,
}

/// Stateful VP8 encoder producing one compressed frame per call.
///
/// Holds the reference frames and the entropy state between calls. A call
/// that fails leaves both untouched.
pub struct Vp8Encoder {
    config: EncoderConfig,
    transform: &'static dyn ForwardTransform,
    pool: ReferencePool,
    /// The current input, padded to whole macroblocks.
    source: Frame,
    entropy: EntropyState,
    frames: u64,
    since_keyframe: u32,
}

impl core::fmt::Debug for Vp8Encoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vp8Encoder")
            .field("config", &self.config)
            .field("frames", &self.frames)
            .field("since_keyframe", &self.since_keyframe)
            .finish_non_exhaustive()
    }
}

impl Vp8Encoder {
    /// Creates an encoder after validating `config`.
    pub fn new(config: EncoderConfig) -> Result<Self, EncodeError> {
        config.validate()?;
        let (mbw, mbh) = (config.mb_width(), config.mb_height());
        debug!(
            "vp8 encoder {}x{} ({}x{} macroblocks), q={}",
            config.width, config.height, mbw, mbh, config.quantizer
        );
        Ok(Self {
            transform: select_transform(config.transform),
            pool: ReferencePool::new(mbw, mbh),
            source: Frame::new(mbw, mbh),
            entropy: EntropyState::new(),
            frames: 0,
            since_keyframe: 0,
            config,
        })
    }

    /// The configuration the encoder was created with.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Drops all references and entropy state; the next frame is a keyframe.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.entropy = EntropyState::new();
        self.since_keyframe = 0;
    }

    /// Compresses one frame.
    pub fn encode(
        &mut self,
        frame: &YuvFrame<'_>,
        options: &FrameOptions,
    ) -> Result<EncodedFrame, EncodeError> {
        let (encoded, pending) = self.compress(frame, options, usize::MAX)?;
        self.finish(pending);
        Ok(encoded)
    }

    /// Compresses one frame into `out` and returns the number of bytes written.
    ///
    /// Fails with [`EncodeError::BufferExhausted`] when the frame does not fit,
    /// in which case the encoder state is unchanged.
    pub fn encode_into(
        &mut self,
        frame: &YuvFrame<'_>,
        options: &FrameOptions,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let (encoded, pending) = self.compress(frame, options, out.len())?;
        out[..encoded.len()].copy_from_slice(&encoded.data);
        self.finish(pending);
        Ok(encoded.len())
    }

    /// Visible area of a reference frame as the decoder reconstructs it.
    pub fn reconstruction(&self, reference: RefFrame) -> Option<YuvFrame<'_>> {
        let frame = self.pool.get(reference)?;
        let (w, h) = (usize::from(self.config.width), usize::from(self.config.height));
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        Some(YuvFrame::new(
            visible(&frame.y, w, h),
            visible(&frame.u, cw, ch),
            visible(&frame.v, cw, ch),
        ))
    }

    fn wants_keyframe(&self, options: &FrameOptions) -> bool {
        let interval = self.config.keyframe_interval;
        options.force_keyframe
            || !self.pool.has(RefFrame::Last)
            || (interval > 0 && self.since_keyframe >= interval)
    }

    fn compress(
        &mut self,
        frame: &YuvFrame<'_>,
        options: &FrameOptions,
        available: usize,
    ) -> Result<(EncodedFrame, PendingCommit), EncodeError> {
        let (width, height) = (usize::from(self.config.width), usize::from(self.config.height));
        frame.validate(width, height)?;
        let quantizer = options.quantizer.unwrap_or(self.config.quantizer);
        validate_quantizer(quantizer)?;

        let keyframe = self.wants_keyframe(options);
        if keyframe
            && !options.force_keyframe
            && (options.golden != GoldenUpdate::Keep
                || options.altref != AltRefUpdate::Keep
                || !options.refresh_last)
        {
            warn!("frame {} coded as keyframe; reference updates ignored", self.frames);
        }

        self.source.y.load(&frame.y);
        self.source.u.load(&frame.u);
        self.source.v.load(&frame.v);

        let base = if keyframe {
            self.entropy.for_keyframe()
        } else {
            self.entropy.clone()
        };
        let (mbw, mbh) = (self.config.mb_width(), self.config.mb_height());
        let segments = if self.config.segments > 1 {
            SegmentPlan::analyze(&self.source, mbw, mbh, usize::from(self.config.segments), quantizer)
        } else {
            SegmentPlan::single(mbw * mbh)
        };
        let state = FrameState::new(&self.config, options, keyframe, quantizer, segments);

        let slot = self.pool.free_slot();
        let (recon, refs) = self.pool.split(slot);
        let refs = if keyframe { [None; 3] } else { refs };
        if !keyframe && refs[0].is_none() {
            return Err(ConfigError::NoInterReference.into());
        }

        let coded = FramePass::new(
            &self.config,
            self.transform,
            &state,
            &base,
            &self.source,
            &mut *recon,
            refs,
        )
        .run();

        let filter = FilterParams::choose(&self.config, &state, &coded, recon, &self.source);
        filter.apply(recon, keyframe, &coded);
        recon.extend_borders();

        let probs = probability::adapt(&state, &base, &coded);
        let first = header::write_first_partition(&state, &filter, &base, &probs, &coded, available)?;
        let parts = header::write_token_partitions(&probs.coeff, &coded, state.partitions, available)?;
        let data = header::assemble(
            keyframe,
            state.show,
            (self.config.width, self.config.height),
            &first,
            &parts,
            available,
        )?;

        let mut stats = FrameStats {
            filter_level: filter.level,
            ..FrameStats::default()
        };
        for mb in &coded.mbs {
            if mb.inter.is_some() {
                stats.inter_mbs += 1;
            } else {
                stats.intra_mbs += 1;
            }
            stats.skipped_mbs += u32::from(mb.skip);
        }
        let luma_sse = sse(
            &recon.y.data()[recon.y.index(0, 0)..],
            recon.y.stride,
            &self.source.y.data()[self.source.y.index(0, 0)..],
            self.source.y.stride,
            width,
            height,
        );
        stats.psnr_y = psnr(luma_sse, width * height);

        debug!(
            "frame {}: {} q={} {} bytes (first partition {}), intra={} inter={} skip={} lf={} psnr={:.2}",
            self.frames,
            if keyframe { "key" } else { "inter" },
            quantizer,
            data.len(),
            first.len(),
            stats.intra_mbs,
            stats.inter_mbs,
            stats.skipped_mbs,
            stats.filter_level,
            stats.psnr_y,
        );

        let entropy = probability::next_state(&base, &probs, state.refresh_entropy);
        let encoded = EncodedFrame {
            data,
            frame_type: if keyframe { FrameType::Key } else { FrameType::Inter },
            shown: state.show,
            first_partition_size: first.len(),
            partition_sizes: parts.iter().map(Vec::len).collect(),
            quantizer,
            stats,
        };
        Ok((
            encoded,
            PendingCommit {
                slot,
                plan: state.refresh,
                entropy,
                #[cfg(test)]
                coded,
            },
        ))
    }

    fn finish(&mut self, pending: PendingCommit) {
        self.pool.commit(pending.slot, &pending.plan);
        self.entropy = pending.entropy;
        self.frames += 1;
        self.since_keyframe = if pending.plan.keyframe {
            1
        } else {
            self.since_keyframe.saturating_add(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize, shift: usize) -> Vec<u8> {
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
        let mut data = Vec::with_capacity(width * height + 2 * cw * ch);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) * 3 + y * 2) as u8);
            }
        }
        for y in 0..ch {
            for x in 0..cw {
                data.push((96 + x + y) as u8);
            }
        }
        for y in 0..ch {
            for x in 0..cw {
                data.push((160 - x + y) as u8);
            }
        }
        data
    }

    #[test]
    fn first_frame_is_a_keyframe() {
        let data = gradient(48, 32, 0);
        let frame = YuvFrame::from_i420(&data, 48, 32).unwrap();
        let mut encoder = Vp8Encoder::new(EncoderConfig::new(48, 32)).unwrap();
        let encoded = encoder.encode(&frame, &FrameOptions::default()).unwrap();
        assert_eq!(encoded.frame_type, FrameType::Key);
        assert_eq!(encoded.data[0] & 1, 0);
        assert_eq!(&encoded.data[3..6], &[0x9d, 0x01, 0x2a]);
        assert_eq!(encoded.stats.intra_mbs, 6);
        assert_eq!(encoder.frame_count(), 1);
    }

    #[test]
    fn repeated_frame_codes_as_cheap_inter_frame() {
        let data = gradient(64, 48, 0);
        let frame = YuvFrame::from_i420(&data, 64, 48).unwrap();
        let mut encoder = Vp8Encoder::new(EncoderConfig::new(64, 48)).unwrap();
        let key = encoder.encode(&frame, &FrameOptions::default()).unwrap();
        let inter = encoder.encode(&frame, &FrameOptions::default()).unwrap();
        assert_eq!(inter.frame_type, FrameType::Inter);
        assert_eq!(inter.data[0] & 1, 1);
        assert!(inter.len() < key.len());
        assert!(inter.stats.inter_mbs > inter.stats.intra_mbs);
    }

    #[test]
    fn short_buffer_leaves_state_untouched() {
        let data = gradient(32, 32, 0);
        let frame = YuvFrame::from_i420(&data, 32, 32).unwrap();
        let mut encoder = Vp8Encoder::new(EncoderConfig::new(32, 32)).unwrap();
        let mut tiny = [0u8; 8];
        let err = encoder
            .encode_into(&frame, &FrameOptions::default(), &mut tiny)
            .unwrap_err();
        assert!(matches!(err, EncodeError::BufferExhausted { .. }));
        assert_eq!(encoder.frame_count(), 0);
        assert!(encoder.reconstruction(RefFrame::Last).is_none());

        let mut out = vec![0u8; 4096];
        let n = encoder
            .encode_into(&frame, &FrameOptions::default(), &mut out)
            .unwrap();
        assert!(n > 10);
        assert_eq!(out[0] & 1, 0);
    }

    #[test]
    fn keyframe_interval_and_reset() {
        let data = gradient(16, 16, 0);
        let frame = YuvFrame::from_i420(&data, 16, 16).unwrap();
        let config = EncoderConfig::new(16, 16).with_keyframe_interval(3);
        let mut encoder = Vp8Encoder::new(config).unwrap();
        let types: Vec<bool> = (0..7)
            .map(|_| {
                encoder
                    .encode(&frame, &FrameOptions::default())
                    .unwrap()
                    .is_keyframe()
            })
            .collect();
        assert_eq!(types, [true, false, false, true, false, false, true]);

        encoder.reset();
        assert!(encoder
            .encode(&frame, &FrameOptions::default())
            .unwrap()
            .is_keyframe());
    }

    #[test]
    fn rejects_mismatched_input() {
        let data = gradient(16, 16, 0);
        let frame = YuvFrame::from_i420(&data, 16, 16).unwrap();
        let mut encoder = Vp8Encoder::new(EncoderConfig::new(32, 16)).unwrap();
        assert!(matches!(
            encoder.encode(&frame, &FrameOptions::default()),
            Err(EncodeError::InvalidInput(_))
        ));
        let bad_q = FrameOptions::default().with_quantizer(200);
        let data = gradient(32, 16, 0);
        let frame = YuvFrame::from_i420(&data, 32, 16).unwrap();
        assert!(matches!(
            encoder.encode(&frame, &bad_q),
            Err(EncodeError::Config(ConfigError::QuantizerOutOfRange(200)))
        ));
    }

    #[test]
    fn reconstruction_tracks_the_source() {
        let data = gradient(40, 24, 0);
        let frame = YuvFrame::from_i420(&data, 40, 24).unwrap();
        let mut encoder = Vp8Encoder::new(EncoderConfig::new(40, 24).with_quantizer(4)).unwrap();
        let encoded = encoder.encode(&frame, &FrameOptions::default()).unwrap();
        let recon = encoder.reconstruction(RefFrame::Golden).unwrap();
        assert_eq!((recon.y.width, recon.u.width), (40, 20));
        let max_err = (0..24)
            .flat_map(|y| (0..40).map(move |x| (x, y)))
            .map(|(x, y)| recon.y.row(y)[x].abs_diff(frame.y.row(y)[x]))
            .max()
            .unwrap();
        assert!(max_err <= 8, "max error {max_err}");
        assert!(encoded.stats.psnr_y > 35.0);
    }
}
