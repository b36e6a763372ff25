//! Encoder configuration and per-frame options.
//!
//! ```rust
//! use zenvp8::{EncoderConfig, FilterLevel, Partitions, SearchMethod};
//!
//! let config = EncoderConfig::new(352, 288)
//!     .with_quantizer(30)
//!     .with_partitions(Partitions::Four)
//!     .with_search(SearchMethod::Hex)
//!     .with_filter_level(FilterLevel::Fixed(20));
//! assert!(config.validate().is_ok());
//! ```

use super::api::ConfigError;

/// Largest width or height the frame header can carry.
pub const MAX_DIMENSION: u16 = 16383;

/// Number of DCT token partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Partitions {
    /// A single partition.
    #[default]
    One,
    /// Two partitions.
    Two,
    /// Four partitions.
    Four,
    /// Eight partitions.
    Eight,
}

impl Partitions {
    /// Partition count from a plain number.
    pub fn from_count(count: u8) -> Result<Self, ConfigError> {
        match count {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            _ => Err(ConfigError::InvalidPartitionCount(count)),
        }
    }

    /// Value written in the header's two-bit field.
    pub const fn log2(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Four => 2,
            Self::Eight => 3,
        }
    }

    /// Number of partitions.
    pub const fn count(self) -> usize {
        1 << self.log2()
    }
}

/// Integer-pel motion search pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    /// Four-point cross with halving step.
    Diamond,
    /// Six-point hexagon refined by a small cross.
    #[default]
    Hex,
    /// Exhaustive search over the whole range.
    Full,
}

/// Fractional-pel refinement after the integer search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubpelMethod {
    /// Half-pel then quarter-pel, iterating while a neighbour improves.
    #[default]
    Iterative,
    /// One pass over the half-pel then quarter-pel neighbours.
    Fast,
    /// Whole-pixel vectors only.
    Off,
}

/// Which of GOLDEN and ALTREF the mode decision may use. LAST is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSet {
    /// Allow GOLDEN.
    pub golden: bool,
    /// Allow ALTREF.
    pub altref: bool,
}

impl Default for ReferenceSet {
    fn default() -> Self {
        Self {
            golden: true,
            altref: true,
        }
    }
}

/// Forward transform implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    /// Plain integer code.
    Reference,
    /// `wide` lanes when the `simd` feature is on, the reference code otherwise.
    #[default]
    Simd,
}

/// Loop filter variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// Normal filter on luma and chroma.
    #[default]
    Normal,
    /// Simple filter, luma only.
    Simple,
}

/// Frame loop filter level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterLevel {
    /// Picked per frame from the quantizer and a reconstruction-error search.
    #[default]
    Auto,
    /// Fixed level, 0 (off) to 63.
    Fixed(u8),
}

/// Loop filter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopFilterConfig {
    /// Normal or simple.
    pub filter_type: FilterType,
    /// Level selection.
    pub level: FilterLevel,
    /// Sharpness 0..=7.
    pub sharpness: u8,
    /// Send and apply per-reference and per-mode level deltas.
    pub deltas: bool,
}

/// Optional quantizer index deltas, each in -15..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuantizerDeltas {
    /// Luma DC.
    pub y1_dc: Option<i8>,
    /// Y2 DC.
    pub y2_dc: Option<i8>,
    /// Y2 AC.
    pub y2_ac: Option<i8>,
    /// Chroma DC.
    pub uv_dc: Option<i8>,
    /// Chroma AC.
    pub uv_ac: Option<i8>,
}

impl QuantizerDeltas {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("y1_dc", self.y1_dc),
            ("y2_dc", self.y2_dc),
            ("y2_ac", self.y2_ac),
            ("uv_dc", self.uv_dc),
            ("uv_ac", self.uv_ac),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                if !(-15..=15).contains(&value) {
                    return Err(ConfigError::QuantizerDeltaOutOfRange { field, value });
                }
            }
        }
        Ok(())
    }
}

/// Configuration of a [`Vp8Encoder`](crate::Vp8Encoder).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct EncoderConfig {
    /// Frame width in pixels, 1..=16383.
    pub width: u16,
    /// Frame height in pixels, 1..=16383.
    pub height: u16,
    /// Base quantizer index 0..=127. Default: 40.
    pub quantizer: u8,
    /// Per-coefficient-kind quantizer deltas.
    pub quantizer_deltas: QuantizerDeltas,
    /// DCT token partitions. Default: one.
    pub partitions: Partitions,
    /// Integer-pel search pattern. Default: hex.
    pub search: SearchMethod,
    /// Search range in whole pixels, 1..=64. Default: 16.
    pub search_range: u8,
    /// Sub-pixel refinement. Default: iterative.
    pub subpel: SubpelMethod,
    /// Usable non-LAST references.
    pub references: ReferenceSet,
    /// Forward transform implementation.
    pub transform: TransformKind,
    /// Loop filter settings.
    pub loop_filter: LoopFilterConfig,
    /// Number of segments 1..=4. Default: 1.
    pub segments: u8,
    /// Widen the quantizer dead zone after zero runs and on cheap inter modes.
    pub zbin_boost: bool,
    /// Skip remaining candidates of a reference once one costs more than this
    /// percentage of the best so far.
    pub early_exit: Option<u32>,
    /// SAD-per-bit weight of motion vector cost; derived from the quantizer when `None`.
    pub motion_lambda: Option<u32>,
    /// Do not carry entropy state from one frame to the next.
    pub error_resilient: bool,
    /// Insert a keyframe every this many frames; 0 means only the first.
    pub keyframe_interval: u32,
}

impl EncoderConfig {
    /// Defaults for a `width`×`height` stream.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            quantizer: 40,
            quantizer_deltas: QuantizerDeltas::default(),
            partitions: Partitions::One,
            search: SearchMethod::Hex,
            search_range: 16,
            subpel: SubpelMethod::Iterative,
            references: ReferenceSet::default(),
            transform: TransformKind::Simd,
            loop_filter: LoopFilterConfig {
                deltas: true,
                ..LoopFilterConfig::default()
            },
            segments: 1,
            zbin_boost: true,
            early_exit: None,
            motion_lambda: None,
            error_resilient: false,
            keyframe_interval: 0,
        }
    }

    /// Set the base quantizer index.
    #[must_use]
    pub fn with_quantizer(mut self, quantizer: u8) -> Self {
        self.quantizer = quantizer;
        self
    }

    /// Set the quantizer deltas.
    #[must_use]
    pub fn with_quantizer_deltas(mut self, deltas: QuantizerDeltas) -> Self {
        self.quantizer_deltas = deltas;
        self
    }

    /// Set the number of DCT partitions.
    #[must_use]
    pub fn with_partitions(mut self, partitions: Partitions) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the integer-pel search pattern.
    #[must_use]
    pub fn with_search(mut self, search: SearchMethod) -> Self {
        self.search = search;
        self
    }

    /// Set the search range in pixels.
    #[must_use]
    pub fn with_search_range(mut self, range: u8) -> Self {
        self.search_range = range;
        self
    }

    /// Set the sub-pixel refinement.
    #[must_use]
    pub fn with_subpel(mut self, subpel: SubpelMethod) -> Self {
        self.subpel = subpel;
        self
    }

    /// Set the usable GOLDEN/ALTREF references.
    #[must_use]
    pub fn with_references(mut self, references: ReferenceSet) -> Self {
        self.references = references;
        self
    }

    /// Set the forward transform implementation.
    #[must_use]
    pub fn with_transform(mut self, transform: TransformKind) -> Self {
        self.transform = transform;
        self
    }

    /// Replace the loop filter settings.
    #[must_use]
    pub fn with_loop_filter(mut self, loop_filter: LoopFilterConfig) -> Self {
        self.loop_filter = loop_filter;
        self
    }

    /// Set the loop filter level.
    #[must_use]
    pub fn with_filter_level(mut self, level: FilterLevel) -> Self {
        self.loop_filter.level = level;
        self
    }

    /// Set the loop filter type.
    #[must_use]
    pub fn with_filter_type(mut self, filter_type: FilterType) -> Self {
        self.loop_filter.filter_type = filter_type;
        self
    }

    /// Set the loop filter sharpness.
    #[must_use]
    pub fn with_sharpness(mut self, sharpness: u8) -> Self {
        self.loop_filter.sharpness = sharpness;
        self
    }

    /// Set the number of segments.
    #[must_use]
    pub fn with_segments(mut self, segments: u8) -> Self {
        self.segments = segments;
        self
    }

    /// Enable or disable zero-run and mode dead-zone boosting.
    #[must_use]
    pub fn with_zbin_boost(mut self, enable: bool) -> Self {
        self.zbin_boost = enable;
        self
    }

    /// Set the early-exit cost multiple in percent.
    #[must_use]
    pub fn with_early_exit(mut self, percent: Option<u32>) -> Self {
        self.early_exit = percent;
        self
    }

    /// Override the motion search SAD-per-bit weight.
    #[must_use]
    pub fn with_motion_lambda(mut self, sad_per_bit: Option<u32>) -> Self {
        self.motion_lambda = sad_per_bit;
        self
    }

    /// Enable or disable error resilient mode.
    #[must_use]
    pub fn with_error_resilient(mut self, enable: bool) -> Self {
        self.error_resilient = enable;
        self
    }

    /// Set the automatic keyframe interval.
    #[must_use]
    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames;
        self
    }

    /// Checks every field against the ranges the bitstream can carry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_DIMENSION
            || self.height > MAX_DIMENSION
        {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        validate_quantizer(self.quantizer)?;
        self.quantizer_deltas.validate()?;
        if !(1..=64).contains(&self.search_range) {
            return Err(ConfigError::InvalidSearchRange(self.search_range));
        }
        if self.loop_filter.sharpness > 7 {
            return Err(ConfigError::InvalidSharpness(self.loop_filter.sharpness));
        }
        if let FilterLevel::Fixed(level) = self.loop_filter.level {
            if level > 63 {
                return Err(ConfigError::InvalidFilterLevel(level));
            }
        }
        if !(1..=4).contains(&self.segments) {
            return Err(ConfigError::InvalidSegmentCount(self.segments));
        }
        Ok(())
    }

    pub(crate) fn mb_width(&self) -> usize {
        usize::from(self.width).div_ceil(16)
    }

    pub(crate) fn mb_height(&self) -> usize {
        usize::from(self.height).div_ceil(16)
    }
}

pub(crate) fn validate_quantizer(quantizer: u8) -> Result<(), ConfigError> {
    if quantizer > 127 {
        return Err(ConfigError::QuantizerOutOfRange(quantizer));
    }
    Ok(())
}

/// What happens to the GOLDEN reference after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoldenUpdate {
    /// Leave it alone.
    #[default]
    Keep,
    /// Replace it with this frame's reconstruction.
    Refresh,
    /// Point it at the previous LAST frame.
    CopyLast,
    /// Point it at the previous ALTREF frame.
    CopyAltRef,
}

/// What happens to the ALTREF reference after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AltRefUpdate {
    /// Leave it alone.
    #[default]
    Keep,
    /// Replace it with this frame's reconstruction.
    Refresh,
    /// Point it at the previous LAST frame.
    CopyLast,
    /// Point it at the previous GOLDEN frame.
    CopyGolden,
}

/// Options for one call to [`Vp8Encoder::encode`](crate::Vp8Encoder::encode).
///
/// Keyframes ignore the reference fields: they always refresh every reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct FrameOptions {
    /// Encode a keyframe regardless of the keyframe interval.
    pub force_keyframe: bool,
    /// Make this frame the new LAST reference. Default: true.
    pub refresh_last: bool,
    /// GOLDEN update.
    pub golden: GoldenUpdate,
    /// ALTREF update.
    pub altref: AltRefUpdate,
    /// Invert motion vectors borrowed from GOLDEN-predicted neighbours.
    pub sign_bias_golden: bool,
    /// Invert motion vectors borrowed from ALTREF-predicted neighbours.
    pub sign_bias_altref: bool,
    /// Mark the frame for display. Default: true.
    pub show_frame: bool,
    /// Quantizer index for this frame only, as picked by an outer rate control.
    pub quantizer: Option<u8>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            force_keyframe: false,
            refresh_last: true,
            golden: GoldenUpdate::Keep,
            altref: AltRefUpdate::Keep,
            sign_bias_golden: false,
            sign_bias_altref: false,
            show_frame: true,
            quantizer: None,
        }
    }
}

impl FrameOptions {
    /// Options forcing a keyframe.
    #[must_use]
    pub fn keyframe() -> Self {
        Self {
            force_keyframe: true,
            ..Self::default()
        }
    }

    /// Set the GOLDEN update.
    #[must_use]
    pub fn with_golden(mut self, golden: GoldenUpdate) -> Self {
        self.golden = golden;
        self
    }

    /// Set the ALTREF update.
    #[must_use]
    pub fn with_altref(mut self, altref: AltRefUpdate) -> Self {
        self.altref = altref;
        self
    }

    /// Set whether this frame replaces LAST.
    #[must_use]
    pub fn with_refresh_last(mut self, refresh: bool) -> Self {
        self.refresh_last = refresh;
        self
    }

    /// Set the GOLDEN and ALTREF sign biases.
    #[must_use]
    pub fn with_sign_bias(mut self, golden: bool, altref: bool) -> Self {
        self.sign_bias_golden = golden;
        self.sign_bias_altref = altref;
        self
    }

    /// Set the show-frame flag.
    #[must_use]
    pub fn with_show_frame(mut self, show: bool) -> Self {
        self.show_frame = show;
        self
    }

    /// Override the quantizer for this frame.
    #[must_use]
    pub fn with_quantizer(mut self, quantizer: u8) -> Self {
        self.quantizer = Some(quantizer);
        self
    }
}
