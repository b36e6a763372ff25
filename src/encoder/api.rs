//! Public input/output types of the encoder.
//!
//! # API
//!
//! ```rust
//! use zenvp8::{EncoderConfig, FrameOptions, Vp8Encoder, YuvFrame};
//!
//! let (width, height) = (32, 32);
//! let i420 = vec![128u8; 32 * 32 * 3 / 2];
//! let mut encoder = Vp8Encoder::new(EncoderConfig::new(width, height))?;
//! let frame = YuvFrame::from_i420(&i420, usize::from(width), usize::from(height))?;
//! let encoded = encoder.encode(&frame, &FrameOptions::default())?;
//! assert!(encoded.is_keyframe());
//! # Ok::<(), zenvp8::EncodeError>(())
//! ```
use alloc::vec::Vec;
use thiserror::Error;

/// Error that can occur during encoding.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// The configuration or per-frame options are not encodable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The destination buffer cannot hold the compressed frame.
    #[error("buffer exhausted: needed {needed} bytes, {available} available")]
    BufferExhausted {
        /// Bytes the frame (or partition) required, at least.
        needed: usize,
        /// Bytes the destination could hold.
        available: usize,
    },

    /// The input planes do not match the configured frame size.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
}

/// Invalid encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Width or height is zero or larger than 16383.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Configured width.
        width: u16,
        /// Configured height.
        height: u16,
    },
    /// Quantizer index above 127.
    #[error("quantizer index {0} out of range 0..=127")]
    QuantizerOutOfRange(u8),
    /// A quantizer delta outside -15..=15.
    #[error("quantizer delta {field} = {value} out of range -15..=15")]
    QuantizerDeltaOutOfRange {
        /// Name of the delta field.
        field: &'static str,
        /// Offending value.
        value: i8,
    },
    /// DCT partition count other than 1, 2, 4 or 8.
    #[error("invalid partition count {0}")]
    InvalidPartitionCount(u8),
    /// Loop filter sharpness above 7.
    #[error("invalid loop filter sharpness {0}")]
    InvalidSharpness(u8),
    /// Fixed loop filter level above 63.
    #[error("invalid loop filter level {0}")]
    InvalidFilterLevel(u8),
    /// Segment count outside 1..=4.
    #[error("invalid segment count {0}")]
    InvalidSegmentCount(u8),
    /// Motion search range outside 1..=64 pixels.
    #[error("invalid search range {0}")]
    InvalidSearchRange(u8),
    /// An inter frame was requested with no reference frame available.
    #[error("inter frame requested but no reference frame is available")]
    NoInterReference,
}

/// Input planes that do not fit the configured frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum InputError {
    /// A plane has the wrong visible size.
    #[error("{plane} plane is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        /// Plane name (`"Y"`, `"U"` or `"V"`).
        plane: &'static str,
        /// Expected width.
        width: usize,
        /// Expected height.
        height: usize,
        /// Width of the supplied plane.
        actual_width: usize,
        /// Height of the supplied plane.
        actual_height: usize,
    },
    /// The stride is narrower than the plane.
    #[error("{plane} plane stride {stride} is smaller than its width {width}")]
    StrideTooSmall {
        /// Plane name.
        plane: &'static str,
        /// Supplied stride.
        stride: usize,
        /// Plane width.
        width: usize,
    },
    /// The sample buffer ends before the last row.
    #[error("{plane} plane needs {needed} bytes, got {available}")]
    PlaneTooSmall {
        /// Plane name.
        plane: &'static str,
        /// Bytes required by stride and height.
        needed: usize,
        /// Bytes supplied.
        available: usize,
    },
}

/// Borrowed view of one 8-bit sample plane.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    /// Samples, `stride` bytes per row.
    pub data: &'a [u8],
    /// Distance between rows in bytes.
    pub stride: usize,
    /// Visible width in samples.
    pub width: usize,
    /// Visible height in rows.
    pub height: usize,
}

impl<'a> PlaneView<'a> {
    /// Creates a view; see [`YuvFrame::validate`] for the checks applied at encode time.
    pub fn new(data: &'a [u8], stride: usize, width: usize, height: usize) -> Self {
        Self {
            data,
            stride,
            width,
            height,
        }
    }

    /// Visible samples of row `y`.
    pub fn row(&self, y: usize) -> &'a [u8] {
        &self.data[y * self.stride..][..self.width]
    }

    fn check(&self, plane: &'static str, width: usize, height: usize) -> Result<(), InputError> {
        if self.width != width || self.height != height {
            return Err(InputError::DimensionMismatch {
                plane,
                width,
                height,
                actual_width: self.width,
                actual_height: self.height,
            });
        }
        if self.stride < self.width {
            return Err(InputError::StrideTooSmall {
                plane,
                stride: self.stride,
                width: self.width,
            });
        }
        let needed = (self.height - 1) * self.stride + self.width;
        if self.data.len() < needed {
            return Err(InputError::PlaneTooSmall {
                plane,
                needed,
                available: self.data.len(),
            });
        }
        Ok(())
    }
}

/// A raw 4:2:0 frame: full-resolution luma and half-resolution chroma.
#[derive(Debug, Clone, Copy)]
pub struct YuvFrame<'a> {
    /// Luma plane.
    pub y: PlaneView<'a>,
    /// Blue-difference chroma plane.
    pub u: PlaneView<'a>,
    /// Red-difference chroma plane.
    pub v: PlaneView<'a>,
}

impl<'a> YuvFrame<'a> {
    /// Frame from three separate planes.
    pub fn new(y: PlaneView<'a>, u: PlaneView<'a>, v: PlaneView<'a>) -> Self {
        Self { y, u, v }
    }

    /// Frame from a packed I420 buffer (Y, then U, then V, no row padding).
    pub fn from_i420(data: &'a [u8], width: usize, height: usize) -> Result<Self, EncodeError> {
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
        let y_len = width * height;
        let c_len = cw * ch;
        let needed = y_len + 2 * c_len;
        if data.len() < needed {
            return Err(InputError::PlaneTooSmall {
                plane: "I420",
                needed,
                available: data.len(),
            }
            .into());
        }
        let (y, rest) = data.split_at(y_len);
        let (u, v) = rest.split_at(c_len);
        Ok(Self {
            y: PlaneView::new(y, width, width, height),
            u: PlaneView::new(u, cw, cw, ch),
            v: PlaneView::new(&v[..c_len], cw, cw, ch),
        })
    }

    /// Checks plane sizes, strides and buffer lengths against a `width`×`height` frame.
    pub fn validate(&self, width: usize, height: usize) -> Result<(), InputError> {
        let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
        self.y.check("Y", width, height)?;
        self.u.check("U", cw, ch)?;
        self.v.check("V", cw, ch)
    }
}

/// Kind of a compressed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Intra-only frame that resets all decoder state.
    Key,
    /// Frame predicted from reference frames.
    Inter,
}

/// Per-frame encoder statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Macroblocks coded with intra prediction.
    pub intra_mbs: u32,
    /// Macroblocks coded with inter prediction.
    pub inter_mbs: u32,
    /// Macroblocks without any nonzero coefficient.
    pub skipped_mbs: u32,
    /// Loop filter level written in the header.
    pub filter_level: u8,
    /// Luma PSNR of the reconstruction, in dB (capped at 99).
    pub psnr_y: f64,
}

/// One compressed VP8 frame.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Frame tag, keyframe header, partitions: a complete VP8 frame.
    pub data: Vec<u8>,
    /// Key or inter.
    pub frame_type: FrameType,
    /// Show-frame flag written in the tag.
    pub shown: bool,
    /// Size of the first (mode) partition.
    pub first_partition_size: usize,
    /// Sizes of the DCT token partitions, in order.
    pub partition_sizes: Vec<usize>,
    /// Base quantizer index of the frame.
    pub quantizer: u8,
    /// Mode decision and reconstruction statistics.
    pub stats: FrameStats,
}

impl EncodedFrame {
    /// Whether this is a keyframe.
    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FrameType::Key
    }

    /// Compressed size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame holds no bytes (never true for a successful encode).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
