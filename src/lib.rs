//! Lossy VP8 video frame encoder (RFC 6386)
//!
//! This crate compresses planar YUV 4:2:0 frames into VP8 frames: keyframes
//! that stand alone and inter frames predicted from up to three reference
//! frames (LAST, GOLDEN, ALTREF). Every frame is a complete VP8 frame as
//! carried by IVF, WebM or a WebP `VP8 ` chunk; container framing is left to
//! the caller.
//!
//! # Features
//!
//! - `std` (default): `std::error::Error` integration through `thiserror`.
//! - `simd` (default): vectorised forward DCT built on `wide`.
//!
//! # no_std Support
//!
//! The encoder only needs `alloc`:
//! ```toml
//! [dependencies]
//! zenvp8 = { version = "...", default-features = false }
//! ```
//!
//! # Encoding
//!
//! ```rust
//! use zenvp8::{EncoderConfig, FrameOptions, Vp8Encoder, YuvFrame};
//!
//! let (width, height) = (64u16, 48u16);
//! let i420 = vec![128u8; 64 * 48 * 3 / 2];
//! let frame = YuvFrame::from_i420(&i420, 64, 48)?;
//!
//! let config = EncoderConfig::new(width, height).with_quantizer(30);
//! let mut encoder = Vp8Encoder::new(config)?;
//!
//! let key = encoder.encode(&frame, &FrameOptions::default())?;
//! let inter = encoder.encode(&frame, &FrameOptions::default())?;
//! assert!(key.is_keyframe());
//! assert!(!inter.is_keyframe());
//! # Ok::<(), zenvp8::EncodeError>(())
//! ```
//!
//! [`Vp8Encoder::encode_into`] writes into a caller buffer instead and fails
//! with [`EncodeError::BufferExhausted`] when the frame does not fit; the
//! encoder state is left as it was before the call.
//!
//! # Logging
//!
//! Frame summaries go to `log::debug!`, probability and loop filter
//! decisions to `log::trace!`. Install any `log` backend to see them.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

mod common;
mod encoder;

pub use common::types::{MotionVector, RefFrame};
pub use encoder::{
    AltRefUpdate, ConfigError, EncodeError, EncodedFrame, EncoderConfig, FilterLevel, FilterType,
    FrameOptions, FrameStats, FrameType, GoldenUpdate, InputError, LoopFilterConfig, Partitions,
    PlaneView, QuantizerDeltas, ReferenceSet, SearchMethod, SubpelMethod, TransformKind,
    Vp8Encoder, YuvFrame, MAX_DIMENSION,
};
