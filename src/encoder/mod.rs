//! VP8 encoder implementation

mod api;
/// Boolean entropy encoder
pub(crate) mod arithmetic;
mod config;
/// Rate tables, distortion metrics and probability statistics
pub(crate) mod cost;
mod frame;
/// Motion vector prediction and motion search
pub(crate) mod motion;
/// Quantization matrices and coefficient quantization
pub(crate) mod quantize;
pub(crate) mod tokenize;
pub(crate) mod tree;
mod vec_writer;
/// Frame-level encoder
mod vp8;

// Re-export public API
pub use api::{
    ConfigError, EncodeError, EncodedFrame, FrameStats, FrameType, InputError, PlaneView, YuvFrame,
};
pub use config::{
    AltRefUpdate, EncoderConfig, FilterLevel, FilterType, FrameOptions, GoldenUpdate,
    LoopFilterConfig, Partitions, QuantizerDeltas, ReferenceSet, SearchMethod, SubpelMethod,
    TransformKind, MAX_DIMENSION,
};
pub use vp8::Vp8Encoder;

