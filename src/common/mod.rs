//! Codec parts shared by every stage of the encoder: constant tables,
//! transforms, predictors and the loop filter.

pub(crate) mod loop_filter;
pub(crate) mod prediction;
/// DCT/IDCT and WHT transforms
pub mod transform;
#[cfg(feature = "simd")]
mod transform_simd;
pub mod types;
