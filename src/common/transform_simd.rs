//! Forward DCT on `wide` lanes.
//!
//! The column pass runs on all four columns at once with i32x4 lanes and
//! 64-bit widening multiplies; results are bit-identical to the scalar path.

use wide::{i32x4, i64x4};

/// SIMD forward DCT for a single 4x4 block using i32x4 operations.
pub(crate) fn dct4x4_simd(block: &mut [i32; 16]) {
    for i in 0..4 {
        let (out0, out1, out2, out3) = dct_row_pass1(
            block[i * 4],
            block[i * 4 + 1],
            block[i * 4 + 2],
            block[i * 4 + 3],
        );
        block[i * 4] = out0;
        block[i * 4 + 1] = out1;
        block[i * 4 + 2] = out2;
        block[i * 4 + 3] = out3;
    }

    let row0 = i32x4::new([block[0], block[1], block[2], block[3]]);
    let row1 = i32x4::new([block[4], block[5], block[6], block[7]]);
    let row2 = i32x4::new([block[8], block[9], block[10], block[11]]);
    let row3 = i32x4::new([block[12], block[13], block[14], block[15]]);

    let a = row0 + row3;
    let b = row1 + row2;
    let c = row1 - row2;
    let d = row0 - row3;

    let seven = i32x4::splat(7);
    let out0: i32x4 = (a + b + seven) >> 4;
    let out2: i32x4 = (a - b + seven) >> 4;

    // out1 = ((c*2217 + d*5352 + 12000) >> 16) + (d != 0)
    let sum1 = c.mul_widen(i32x4::splat(2217)) + d.mul_widen(i32x4::splat(5352)) + i64x4::splat(12000);
    let out1_base = narrow(sum1 >> 16);
    let d_arr = d.to_array();
    let nonzero = i32x4::new([
        i32::from(d_arr[0] != 0),
        i32::from(d_arr[1] != 0),
        i32::from(d_arr[2] != 0),
        i32::from(d_arr[3] != 0),
    ]);
    let out1 = out1_base + nonzero;

    // out3 = (d*2217 - c*5352 + 51000) >> 16
    let sum3 = d.mul_widen(i32x4::splat(2217)) - c.mul_widen(i32x4::splat(5352)) + i64x4::splat(51000);
    let out3 = narrow(sum3 >> 16);

    block[0..4].copy_from_slice(&out0.to_array());
    block[4..8].copy_from_slice(&out1.to_array());
    block[8..12].copy_from_slice(&out2.to_array());
    block[12..16].copy_from_slice(&out3.to_array());
}

#[inline(always)]
fn narrow(v: i64x4) -> i32x4 {
    let arr = v.to_array();
    i32x4::new([arr[0] as i32, arr[1] as i32, arr[2] as i32, arr[3] as i32])
}

/// Row transform (pass 1) - matches scalar version exactly
#[inline(always)]
fn dct_row_pass1(d0: i32, d1: i32, d2: i32, d3: i32) -> (i32, i32, i32, i32) {
    let a = (i64::from(d0) + i64::from(d3)) * 8;
    let b = (i64::from(d1) + i64::from(d2)) * 8;
    let c = (i64::from(d1) - i64::from(d2)) * 8;
    let d = (i64::from(d0) - i64::from(d3)) * 8;

    let out0 = (a + b) as i32;
    let out2 = (a - b) as i32;
    let out1 = ((c * 2217 + d * 5352 + 14500) >> 12) as i32;
    let out3 = ((d * 2217 - c * 5352 + 7500) >> 12) as i32;

    (out0, out1, out2, out3)
}
