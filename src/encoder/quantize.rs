//! Dead-zone quantization and dequantization of 4×4 coefficient blocks.
//!
//! A [`QuantMatrix`] holds, per coefficient position, the dequantization step
//! `q`, its 16-bit reciprocal, a rounding offset and a zero-bin threshold.
//! Levels are produced in zigzag order, ready for the tokenizer.

#![allow(clippy::needless_range_loop)]

use crate::common::types::{AC_QUANT, DC_QUANT, ZIGZAG};

use super::config::QuantizerDeltas;

/// Largest level a CAT6 token can carry.
pub(crate) const MAX_LEVEL: i32 = 2048 + 66;

/// Zero-bin widening after a run of zeros, in `q >> 7` units, indexed by run length.
const ZRUN_ZBIN_BOOST: [u32; 16] = [0, 0, 8, 10, 12, 14, 16, 20, 24, 28, 32, 36, 40, 44, 44, 44];

/// Quantization matrix for one coefficient class at one quantizer index.
#[derive(Clone, Debug)]
pub(crate) struct QuantMatrix {
    /// Dequantization step per position.
    pub(crate) q: [u16; 16],
    /// `(1 << 16) / q`
    quant: [u32; 16],
    round: [u32; 16],
    zbin: [u32; 16],
    /// Extra zero bin by zero-run length.
    zrun_boost: [u32; 16],
}

impl QuantMatrix {
    /// Builds a matrix from DC and AC steps; `qindex` selects the zero-bin factor.
    pub(crate) fn new(q_dc: u16, q_ac: u16, qindex: u8) -> Self {
        let zbin_factor = if qindex < 48 { 84 } else { 80 };
        let mut m = Self {
            q: [q_ac; 16],
            quant: [0; 16],
            round: [0; 16],
            zbin: [0; 16],
            zrun_boost: [0; 16],
        };
        m.q[0] = q_dc;
        for i in 0..16 {
            let q = u32::from(m.q[i]);
            m.quant[i] = (1 << 16) / q;
            m.round[i] = (48 * q) >> 7;
            m.zbin[i] = (zbin_factor * q + 64) >> 7;
        }
        let q_ac = u32::from(q_ac);
        for (boost, &z) in m.zrun_boost.iter_mut().zip(ZRUN_ZBIN_BOOST.iter()) {
            *boost = (z * q_ac) >> 7;
        }
        m
    }

    /// DC step.
    pub(crate) fn dc(&self) -> u16 {
        self.q[0]
    }

    /// AC step.
    pub(crate) fn ac(&self) -> u16 {
        self.q[1]
    }

    /// Quantizes raster-order `coeffs` into zigzag-order `levels`, starting at
    /// zigzag position `first`.
    ///
    /// `extra_zbin` widens every zero bin (mode boost); `zrun` enables the
    /// zero-run boost. Returns the end-of-block index: one past the last
    /// nonzero level, or `first` when all are zero.
    pub(crate) fn quantize(
        &self,
        coeffs: &[i32; 16],
        first: usize,
        extra_zbin: u32,
        zrun: bool,
        levels: &mut [i16; 16],
    ) -> usize {
        *levels = [0; 16];
        let mut eob = first;
        let mut run = 0usize;
        for i in first..16 {
            let c = coeffs[usize::from(ZIGZAG[i])];
            let x = c.unsigned_abs();
            let mut zbin = self.zbin[i] + extra_zbin;
            if zrun {
                zbin += self.zrun_boost[run.min(15)];
            }
            run += 1;
            if x < zbin {
                continue;
            }
            let level = (((u64::from(x) + u64::from(self.round[i])) * u64::from(self.quant[i])) >> 16)
                .min(MAX_LEVEL as u64) as i32;
            if level != 0 {
                levels[i] = if c < 0 { -level } else { level } as i16;
                eob = i + 1;
                run = 0;
            }
        }
        eob
    }

    /// Dequantizes zigzag `levels` into raster-order coefficients.
    pub(crate) fn dequantize(&self, levels: &[i16; 16], coeffs: &mut [i32; 16]) {
        for i in 0..16 {
            coeffs[usize::from(ZIGZAG[i])] = i32::from(levels[i]) * i32::from(self.q[i]);
        }
    }
}

/// The three matrices of one segment, plus the index they derive from.
#[derive(Clone, Debug)]
pub(crate) struct SegmentQuant {
    pub(crate) index: u8,
    pub(crate) y1: QuantMatrix,
    pub(crate) y2: QuantMatrix,
    pub(crate) uv: QuantMatrix,
}

impl SegmentQuant {
    /// Dequantization factors of RFC 6386 §14.1 for base index `index`.
    pub(crate) fn new(index: u8, deltas: &QuantizerDeltas) -> Self {
        let at = |delta: Option<i8>| -> usize {
            (i32::from(index) + i32::from(delta.unwrap_or(0))).clamp(0, 127) as usize
        };

        let y1_dc = DC_QUANT[at(deltas.y1_dc)] as u16;
        let y1_ac = AC_QUANT[at(None)] as u16;

        let y2_dc = DC_QUANT[at(deltas.y2_dc)] as u16 * 2;
        let y2_ac = ((AC_QUANT[at(deltas.y2_ac)] as u32 * 155 / 100).max(8)) as u16;

        let uv_dc = (DC_QUANT[at(deltas.uv_dc)] as u16).min(132);
        let uv_ac = AC_QUANT[at(deltas.uv_ac)] as u16;

        Self {
            index,
            y1: QuantMatrix::new(y1_dc, y1_ac, index),
            y2: QuantMatrix::new(y2_dc, y2_ac, index),
            uv: QuantMatrix::new(uv_dc, uv_ac, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_zone_zeroes_small_coefficients() {
        let m = QuantMatrix::new(20, 20, 10);
        // zbin = (84 * 20 + 64) >> 7 = 13
        let mut coeffs = [0i32; 16];
        coeffs[0] = 12;
        coeffs[1] = -14;
        let mut levels = [0i16; 16];
        let eob = m.quantize(&coeffs, 0, 0, false, &mut levels);
        assert_eq!(levels[0], 0);
        assert_eq!(levels[1], -1);
        assert_eq!(eob, 2);
    }

    #[test]
    fn zero_run_boost_widens_later_bins() {
        let m = QuantMatrix::new(40, 40, 60);
        let mut coeffs = [0i32; 16];
        // Zigzag position 12 is raster 7; after twelve zeros the boost is (40 * 40) >> 7 = 12.
        coeffs[7] = 34;
        let mut levels = [0i16; 16];
        assert_eq!(m.quantize(&coeffs, 0, 0, false, &mut levels), 13);
        assert_eq!(levels[12], 1);
        assert_eq!(m.quantize(&coeffs, 0, 0, true, &mut levels), 0);
        assert!(levels.iter().all(|&l| l == 0));
    }

    #[test]
    fn first_skips_the_dc() {
        let m = QuantMatrix::new(8, 8, 0);
        let coeffs = [100i32; 16];
        let mut levels = [0i16; 16];
        let eob = m.quantize(&coeffs, 1, 0, false, &mut levels);
        assert_eq!(levels[0], 0);
        assert_eq!(eob, 16);
    }

    #[test]
    fn dequantize_restores_scale() {
        let m = QuantMatrix::new(10, 12, 0);
        let mut levels = [0i16; 16];
        levels[0] = 3;
        levels[2] = -2; // zigzag 2 is raster 4
        let mut coeffs = [0i32; 16];
        m.dequantize(&levels, &mut coeffs);
        assert_eq!(coeffs[0], 30);
        assert_eq!(coeffs[4], -24);
    }

    #[test]
    fn segment_factors_follow_the_rfc() {
        let s = SegmentQuant::new(127, &QuantizerDeltas::default());
        assert_eq!(s.y1.dc(), 157);
        assert_eq!(s.y2.dc(), 314);
        assert_eq!(s.y2.ac(), (284 * 155 / 100) as u16);
        assert_eq!(s.uv.dc(), 132);

        let s = SegmentQuant::new(0, &QuantizerDeltas::default());
        assert_eq!(s.y2.ac(), 8);
    }
}
