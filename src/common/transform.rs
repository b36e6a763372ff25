//! 4×4 DCT and Walsh-Hadamard transforms (RFC 6386 §14).
//!
//! The inverse transforms are normative: the encoder reconstructs with exactly
//! the arithmetic a decoder uses. The forward transforms follow libvpx.

/// 16 bit fixed point version of cos(PI/8) * sqrt(2) - 1
const CONST1: i64 = 20091;
/// 16 bit fixed point version of sin(PI/8) * sqrt(2)
const CONST2: i64 = 35468;

/// Forward transform strategy, selected once per encoder.
pub trait ForwardTransform: Sync {
    /// In-place forward DCT of a residual block.
    fn dct4x4(&self, block: &mut [i32; 16]);

    /// In-place forward WHT of the 16 luma DC coefficients.
    fn wht4x4(&self, block: &mut [i32; 16]) {
        wht4x4(block);
    }
}

/// Plain integer implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarTransform;

impl ForwardTransform for ScalarTransform {
    fn dct4x4(&self, block: &mut [i32; 16]) {
        dct4x4_scalar(block);
    }
}

/// Vectorised implementation; bit-identical to [`ScalarTransform`].
#[cfg(feature = "simd")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SimdTransform;

#[cfg(feature = "simd")]
impl ForwardTransform for SimdTransform {
    fn dct4x4(&self, block: &mut [i32; 16]) {
        super::transform_simd::dct4x4_simd(block);
    }
}

/// DC-only inverse transform: fills all 16 positions with (DC+4)>>3.
#[inline(always)]
pub(crate) fn idct4x4_dc(block: &mut [i32; 16]) {
    let dc = (block[0] + 4) >> 3;
    block.fill(dc);
}

/// Inverse DCT, as the decoder performs it.
pub(crate) fn idct4x4(block: &mut [i32; 16]) {
    // The intermediate results may overflow the types, so we stretch the type.
    fn fetch(block: &[i32], idx: usize) -> i64 {
        i64::from(block[idx])
    }

    for i in 0usize..4 {
        let a1 = fetch(block, i) + fetch(block, 8 + i);
        let b1 = fetch(block, i) - fetch(block, 8 + i);

        let t1 = (fetch(block, 4 + i) * CONST2) >> 16;
        let t2 = fetch(block, 12 + i) + ((fetch(block, 12 + i) * CONST1) >> 16);
        let c1 = t1 - t2;

        let t1 = fetch(block, 4 + i) + ((fetch(block, 4 + i) * CONST1) >> 16);
        let t2 = (fetch(block, 12 + i) * CONST2) >> 16;
        let d1 = t1 + t2;

        block[i] = (a1 + d1) as i32;
        block[4 + i] = (b1 + c1) as i32;
        block[4 * 3 + i] = (a1 - d1) as i32;
        block[4 * 2 + i] = (b1 - c1) as i32;
    }

    for i in 0usize..4 {
        let a1 = fetch(block, 4 * i) + fetch(block, 4 * i + 2);
        let b1 = fetch(block, 4 * i) - fetch(block, 4 * i + 2);

        let t1 = (fetch(block, 4 * i + 1) * CONST2) >> 16;
        let t2 = fetch(block, 4 * i + 3) + ((fetch(block, 4 * i + 3) * CONST1) >> 16);
        let c1 = t1 - t2;

        let t1 = fetch(block, 4 * i + 1) + ((fetch(block, 4 * i + 1) * CONST1) >> 16);
        let t2 = (fetch(block, 4 * i + 3) * CONST2) >> 16;
        let d1 = t1 + t2;

        block[4 * i] = ((a1 + d1 + 4) >> 3) as i32;
        block[4 * i + 3] = ((a1 - d1 + 4) >> 3) as i32;
        block[4 * i + 1] = ((b1 + c1 + 4) >> 3) as i32;
        block[4 * i + 2] = ((b1 - c1 + 4) >> 3) as i32;
    }
}

/// Inverse Walsh-Hadamard transform (§14.3).
pub(crate) fn iwht4x4(block: &mut [i32; 16]) {
    for i in 0usize..4 {
        let a1 = block[i] + block[12 + i];
        let b1 = block[4 + i] + block[8 + i];
        let c1 = block[4 + i] - block[8 + i];
        let d1 = block[i] - block[12 + i];

        block[i] = a1 + b1;
        block[4 + i] = c1 + d1;
        block[8 + i] = a1 - b1;
        block[12 + i] = d1 - c1;
    }

    for row in block.chunks_exact_mut(4) {
        let a1 = row[0] + row[3];
        let b1 = row[1] + row[2];
        let c1 = row[1] - row[2];
        let d1 = row[0] - row[3];

        let a2 = a1 + b1;
        let b2 = c1 + d1;
        let c2 = a1 - b1;
        let d2 = d1 - c1;

        row[0] = (a2 + 3) >> 3;
        row[1] = (b2 + 3) >> 3;
        row[2] = (c2 + 3) >> 3;
        row[3] = (d2 + 3) >> 3;
    }
}

/// Forward Walsh-Hadamard transform of the luma DC coefficients.
///
/// Same rounding as libvpx: the row pass scales by 4 and nudges a nonzero
/// DC sum up by one, the column pass rounds toward zero before `>> 3`.
pub(crate) fn wht4x4(block: &mut [i32; 16]) {
    for row in block.chunks_exact_mut(4) {
        let a1 = (row[0] + row[2]) * 4;
        let d1 = (row[1] + row[3]) * 4;
        let c1 = (row[1] - row[3]) * 4;
        let b1 = (row[0] - row[2]) * 4;

        row[0] = a1 + d1 + i32::from(a1 != 0);
        row[1] = b1 + c1;
        row[2] = b1 - c1;
        row[3] = a1 - d1;
    }

    for i in 0..4 {
        let a1 = block[i] + block[8 + i];
        let d1 = block[4 + i] + block[12 + i];
        let c1 = block[4 + i] - block[12 + i];
        let b1 = block[i] - block[8 + i];

        let out = [a1 + d1, b1 + c1, b1 - c1, a1 - d1];
        for (k, v) in out.into_iter().enumerate() {
            let v = v + i32::from(v < 0);
            block[4 * k + i] = (v + 3) >> 3;
        }
    }
}

/// Forward DCT: row pass then column pass with the 2217/5352 multipliers.
pub(crate) fn dct4x4_scalar(block: &mut [i32; 16]) {
    fn fetch(block: &[i32], idx: usize) -> i64 {
        i64::from(block[idx])
    }

    for i in 0..4 {
        let a = (fetch(block, i * 4) + fetch(block, i * 4 + 3)) * 8;
        let b = (fetch(block, i * 4 + 1) + fetch(block, i * 4 + 2)) * 8;
        let c = (fetch(block, i * 4 + 1) - fetch(block, i * 4 + 2)) * 8;
        let d = (fetch(block, i * 4) - fetch(block, i * 4 + 3)) * 8;

        block[i * 4] = (a + b) as i32;
        block[i * 4 + 2] = (a - b) as i32;
        block[i * 4 + 1] = ((c * 2217 + d * 5352 + 14500) >> 12) as i32;
        block[i * 4 + 3] = ((d * 2217 - c * 5352 + 7500) >> 12) as i32;
    }

    for i in 0..4 {
        let a = fetch(block, i) + fetch(block, i + 12);
        let b = fetch(block, i + 4) + fetch(block, i + 8);
        let c = fetch(block, i + 4) - fetch(block, i + 8);
        let d = fetch(block, i) - fetch(block, i + 12);

        block[i] = ((a + b + 7) >> 4) as i32;
        block[i + 8] = ((a - b + 7) >> 4) as i32;
        block[i + 4] = (((c * 2217 + d * 5352 + 12000) >> 16) + i64::from(d != 0)) as i32;
        block[i + 12] = ((d * 2217 - c * 5352 + 51000) >> 16) as i32;
    }
}
