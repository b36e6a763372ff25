//! Intra and inter predictors shared by the mode decision and reconstruction.
//!
//! Intra prediction works on a small bordered workspace: row 0 holds the
//! pixels above the block (plus four above-right pixels for luma), column 0
//! holds the pixels to the left. Inter prediction reads straight out of a
//! bordered reference plane.

/// Luma workspace stride: 1 border pixel + 16 luma pixels + 4 above-right, padded.
pub(crate) const LUMA_STRIDE: usize = 32;
/// Luma workspace size: 17 rows (1 border + 16) × stride.
pub(crate) const LUMA_BLOCK_SIZE: usize = LUMA_STRIDE * (1 + 16);

/// Chroma workspace stride.
pub(crate) const CHROMA_STRIDE: usize = 32;
/// Chroma workspace size: 9 rows (1 border + 8) × stride.
pub(crate) const CHROMA_BLOCK_SIZE: usize = CHROMA_STRIDE * (8 + 1);

/// Six-tap sub-pixel interpolation filters, indexed by eighth-pel position.
pub(crate) const SUBPEL_FILTERS: [[i32; 6]; 8] = [
    [0, 0, 128, 0, 0, 0],
    [0, -6, 123, 12, -1, 0],
    [2, -11, 108, 36, -8, 1],
    [0, -9, 93, 50, -6, 0],
    [3, -16, 77, 77, -16, 3],
    [0, -6, 50, 93, -9, 0],
    [1, -8, 36, 108, -11, 2],
    [0, -1, 12, 123, -6, 0],
];

/// Fills the border of a luma workspace.
///
/// `top` is the reconstructed row above the macroblock row (whole frame
/// width), `left` holds the top-left corner pixel followed by the 16 pixels
/// left of the macroblock.
#[inline(always)]
pub(crate) fn update_border_luma(
    ws: &mut [u8; LUMA_BLOCK_SIZE],
    mbx: usize,
    mby: usize,
    mbw: usize,
    top: &[u8],
    left: &[u8; 17],
) {
    let stride = LUMA_STRIDE;

    if mby == 0 {
        ws[1..stride].fill(127);
    } else {
        ws[1..][..16].copy_from_slice(&top[mbx * 16..][..16]);

        if mbx == mbw - 1 {
            let last = top[mbx * 16 + 15];
            ws[17..21].fill(last);
        } else {
            ws[17..21].copy_from_slice(&top[mbx * 16 + 16..][..4]);
        }
    }

    // Sub-blocks on the right column of rows 1..3 see the macroblock's above-right pixels.
    for i in 17usize..21 {
        ws[4 * stride + i] = ws[i];
        ws[8 * stride + i] = ws[i];
        ws[12 * stride + i] = ws[i];
    }

    if mbx == 0 {
        for i in 0usize..16 {
            ws[(i + 1) * stride] = 129;
        }
    } else {
        for (i, &l) in (0usize..16).zip(&left[1..]) {
            ws[(i + 1) * stride] = l;
        }
    }

    ws[0] = if mby == 0 {
        127
    } else if mbx == 0 {
        129
    } else {
        left[0]
    };
}

/// Fills the border of a chroma workspace; see [`update_border_luma`].
#[inline(always)]
pub(crate) fn update_border_chroma(
    cb: &mut [u8; CHROMA_BLOCK_SIZE],
    mbx: usize,
    mby: usize,
    top: &[u8],
    left: &[u8; 9],
) {
    let stride = CHROMA_STRIDE;

    if mby == 0 {
        cb[1..stride].fill(127);
    } else {
        cb[1..][..8].copy_from_slice(&top[mbx * 8..][..8]);
    }

    if mbx == 0 {
        for y in 0usize..8 {
            cb[(y + 1) * stride] = 129;
        }
    } else {
        for (y, &l) in (0usize..8).zip(&left[1..]) {
            cb[(y + 1) * stride] = l;
        }
    }

    cb[0] = if mby == 0 {
        127
    } else if mbx == 0 {
        129
    } else {
        left[0]
    };
}

/// Adds a 4×4 residual to the prediction at `(x0, y0)`, saturating to 0..=255.
// Clippy suggests the clamp method, but it seems to optimize worse as of rustc 1.82.0 nightly.
#[allow(clippy::manual_clamp)]
#[inline(always)]
pub(crate) fn add_residue(
    pblock: &mut [u8],
    rblock: &[i32; 16],
    y0: usize,
    x0: usize,
    stride: usize,
) {
    let mut pos = y0 * stride + x0;
    for row in rblock.chunks(4) {
        for (p, &a) in pblock[pos..][..4].iter_mut().zip(row.iter()) {
            *p = (a + i32::from(*p)).max(0).min(255) as u8;
        }
        pos += stride;
    }
}

fn avg3(left: u8, this: u8, right: u8) -> u8 {
    let avg = (u16::from(left) + 2 * u16::from(this) + u16::from(right) + 2) >> 2;
    avg as u8
}

fn avg2(this: u8, right: u8) -> u8 {
    let avg = (u16::from(this) + u16::from(right) + 1) >> 1;
    avg as u8
}

pub(crate) fn predict_vpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    // This pass copies the top row to the rows below it.
    let (above, curr) = a.split_at_mut(stride * y0);
    let above_slice = &above[(y0 - 1) * stride + x0..][..size];

    for curr_chunk in curr.chunks_exact_mut(stride).take(size) {
        curr_chunk[x0..][..size].copy_from_slice(above_slice);
    }
}

pub(crate) fn predict_hpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    // This pass copies the first value of a row to the values right of it.
    for chunk in a.chunks_exact_mut(stride).skip(y0).take(size) {
        let left = chunk[x0 - 1];
        chunk[x0..][..size].fill(left);
    }
}

/// Whole-block DC prediction; edges outside the frame are left out of the average.
#[inline(always)]
pub(crate) fn predict_dcpred(a: &mut [u8], size: usize, stride: usize, above: bool, left: bool) {
    let mut sum = 0u32;
    let mut shf = if size == 8 { 2u32 } else { 3u32 };

    if left {
        for y in 0usize..size {
            sum += u32::from(a[(y + 1) * stride]);
        }
        shf += 1;
    }

    if above {
        for x in 0usize..size {
            sum += u32::from(a[1 + x]);
        }
        shf += 1;
    }

    let dcval = if !left && !above {
        128u8
    } else {
        ((sum + (1 << (shf - 1))) >> shf) as u8
    };

    for y in 0usize..size {
        a[1 + stride * (y + 1)..][..size].fill(dcval);
    }
}

// Clippy suggests the clamp method, but it seems to optimize worse as of rustc 1.82.0 nightly.
#[allow(clippy::manual_clamp)]
pub(crate) fn predict_tmpred(a: &mut [u8], size: usize, x0: usize, y0: usize, stride: usize) {
    // X_ij = L_i + A_j - P, RFC 6386 p. 52.
    let (above, x_block) = a.split_at_mut(y0 * stride + (x0 - 1));
    let p = i32::from(above[(y0 - 1) * stride + x0 - 1]);
    let above_slice = &above[(y0 - 1) * stride + x0..];

    for y in 0usize..size {
        let left_minus_p = i32::from(x_block[y * stride]) - p;

        // Add 1 to skip over L0 byte
        x_block[y * stride + 1..][..size]
            .iter_mut()
            .zip(above_slice)
            .for_each(|(cur, &abv)| *cur = (left_minus_p + i32::from(abv)).max(0).min(255) as u8);
    }
}

pub(crate) fn predict_bdcpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let mut v = 4;

    a[(y0 - 1) * stride + x0..][..4]
        .iter()
        .for_each(|&a| v += u32::from(a));

    for i in 0usize..4 {
        v += u32::from(a[(y0 + i) * stride + x0 - 1]);
    }

    v >>= 3;
    for chunk in a.chunks_exact_mut(stride).skip(y0).take(4) {
        for ch in &mut chunk[x0..][..4] {
            *ch = v as u8;
        }
    }
}

fn topleft_pixel(a: &[u8], x0: usize, y0: usize, stride: usize) -> u8 {
    a[(y0 - 1) * stride + x0 - 1]
}

fn top_pixels(a: &[u8], x0: usize, y0: usize, stride: usize) -> (u8, u8, u8, u8, u8, u8, u8, u8) {
    let pos = (y0 - 1) * stride + x0;
    let a_slice = &a[pos..pos + 8];
    (
        a_slice[0], a_slice[1], a_slice[2], a_slice[3], a_slice[4], a_slice[5], a_slice[6],
        a_slice[7],
    )
}

fn left_pixels(a: &[u8], x0: usize, y0: usize, stride: usize) -> (u8, u8, u8, u8) {
    let l0 = a[y0 * stride + x0 - 1];
    let l1 = a[(y0 + 1) * stride + x0 - 1];
    let l2 = a[(y0 + 2) * stride + x0 - 1];
    let l3 = a[(y0 + 3) * stride + x0 - 1];

    (l0, l1, l2, l3)
}

/// Left column bottom-up, corner, then the four pixels above.
fn edge_pixels(
    a: &[u8],
    x0: usize,
    y0: usize,
    stride: usize,
) -> (u8, u8, u8, u8, u8, u8, u8, u8, u8) {
    let pos = (y0 - 1) * stride + x0 - 1;
    let a_slice = &a[pos..=pos + 4];
    let e0 = a[pos + 4 * stride];
    let e1 = a[pos + 3 * stride];
    let e2 = a[pos + 2 * stride];
    let e3 = a[pos + stride];

    (e0, e1, e2, e3, a_slice[0], a_slice[1], a_slice[2], a_slice[3], a_slice[4])
}

pub(crate) fn predict_bvepred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let p = topleft_pixel(a, x0, y0, stride);
    let (a0, a1, a2, a3, a4, ..) = top_pixels(a, x0, y0, stride);
    let avg = [
        avg3(p, a0, a1),
        avg3(a0, a1, a2),
        avg3(a1, a2, a3),
        avg3(a2, a3, a4),
    ];

    let mut pos = y0 * stride + x0;
    for _ in 0..4 {
        a[pos..=pos + 3].copy_from_slice(&avg);
        pos += stride;
    }
}

pub(crate) fn predict_bhepred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let p = topleft_pixel(a, x0, y0, stride);
    let (l0, l1, l2, l3) = left_pixels(a, x0, y0, stride);

    let avgs = [
        avg3(p, l0, l1),
        avg3(l0, l1, l2),
        avg3(l1, l2, l3),
        avg3(l2, l3, l3),
    ];

    let mut pos = y0 * stride + x0;
    for avg in avgs {
        a[pos..=pos + 3].fill(avg);
        pos += stride;
    }
}

pub(crate) fn predict_bldpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (a0, a1, a2, a3, a4, a5, a6, a7) = top_pixels(a, x0, y0, stride);

    let avgs = [
        avg3(a0, a1, a2),
        avg3(a1, a2, a3),
        avg3(a2, a3, a4),
        avg3(a3, a4, a5),
        avg3(a4, a5, a6),
        avg3(a5, a6, a7),
        avg3(a6, a7, a7),
    ];

    let mut pos = y0 * stride + x0;
    for i in 0..4 {
        a[pos..=pos + 3].copy_from_slice(&avgs[i..=i + 3]);
        pos += stride;
    }
}

pub(crate) fn predict_brdpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (e0, e1, e2, e3, e4, e5, e6, e7, e8) = edge_pixels(a, x0, y0, stride);

    let avgs = [
        avg3(e0, e1, e2),
        avg3(e1, e2, e3),
        avg3(e2, e3, e4),
        avg3(e3, e4, e5),
        avg3(e4, e5, e6),
        avg3(e5, e6, e7),
        avg3(e6, e7, e8),
    ];

    let mut pos = y0 * stride + x0;
    for i in 0..4 {
        a[pos..=pos + 3].copy_from_slice(&avgs[3 - i..7 - i]);
        pos += stride;
    }
}

pub(crate) fn predict_bvrpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (_, e1, e2, e3, e4, e5, e6, e7, e8) = edge_pixels(a, x0, y0, stride);

    a[(y0 + 3) * stride + x0] = avg3(e1, e2, e3);
    a[(y0 + 2) * stride + x0] = avg3(e2, e3, e4);
    a[(y0 + 3) * stride + x0 + 1] = avg3(e3, e4, e5);
    a[(y0 + 1) * stride + x0] = avg3(e3, e4, e5);
    a[(y0 + 2) * stride + x0 + 1] = avg2(e4, e5);
    a[y0 * stride + x0] = avg2(e4, e5);
    a[(y0 + 3) * stride + x0 + 2] = avg3(e4, e5, e6);
    a[(y0 + 1) * stride + x0 + 1] = avg3(e4, e5, e6);
    a[(y0 + 2) * stride + x0 + 2] = avg2(e5, e6);
    a[y0 * stride + x0 + 1] = avg2(e5, e6);
    a[(y0 + 3) * stride + x0 + 3] = avg3(e5, e6, e7);
    a[(y0 + 1) * stride + x0 + 2] = avg3(e5, e6, e7);
    a[(y0 + 2) * stride + x0 + 3] = avg2(e6, e7);
    a[y0 * stride + x0 + 2] = avg2(e6, e7);
    a[(y0 + 1) * stride + x0 + 3] = avg3(e6, e7, e8);
    a[y0 * stride + x0 + 3] = avg2(e7, e8);
}

pub(crate) fn predict_bvlpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (a0, a1, a2, a3, a4, a5, a6, a7) = top_pixels(a, x0, y0, stride);

    a[y0 * stride + x0] = avg2(a0, a1);
    a[(y0 + 1) * stride + x0] = avg3(a0, a1, a2);
    a[(y0 + 2) * stride + x0] = avg2(a1, a2);
    a[y0 * stride + x0 + 1] = avg2(a1, a2);
    a[(y0 + 1) * stride + x0 + 1] = avg3(a1, a2, a3);
    a[(y0 + 3) * stride + x0] = avg3(a1, a2, a3);
    a[(y0 + 2) * stride + x0 + 1] = avg2(a2, a3);
    a[y0 * stride + x0 + 2] = avg2(a2, a3);
    a[(y0 + 3) * stride + x0 + 1] = avg3(a2, a3, a4);
    a[(y0 + 1) * stride + x0 + 2] = avg3(a2, a3, a4);
    a[(y0 + 2) * stride + x0 + 2] = avg2(a3, a4);
    a[y0 * stride + x0 + 3] = avg2(a3, a4);
    a[(y0 + 3) * stride + x0 + 2] = avg3(a3, a4, a5);
    a[(y0 + 1) * stride + x0 + 3] = avg3(a3, a4, a5);
    a[(y0 + 2) * stride + x0 + 3] = avg3(a4, a5, a6);
    a[(y0 + 3) * stride + x0 + 3] = avg3(a5, a6, a7);
}

pub(crate) fn predict_bhdpred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (e0, e1, e2, e3, e4, e5, e6, e7, _) = edge_pixels(a, x0, y0, stride);

    a[(y0 + 3) * stride + x0] = avg2(e0, e1);
    a[(y0 + 3) * stride + x0 + 1] = avg3(e0, e1, e2);
    a[(y0 + 2) * stride + x0] = avg2(e1, e2);
    a[(y0 + 3) * stride + x0 + 2] = avg2(e1, e2);
    a[(y0 + 2) * stride + x0 + 1] = avg3(e1, e2, e3);
    a[(y0 + 3) * stride + x0 + 3] = avg3(e1, e2, e3);
    a[(y0 + 2) * stride + x0 + 2] = avg2(e2, e3);
    a[(y0 + 1) * stride + x0] = avg2(e2, e3);
    a[(y0 + 2) * stride + x0 + 3] = avg3(e2, e3, e4);
    a[(y0 + 1) * stride + x0 + 1] = avg3(e2, e3, e4);
    a[(y0 + 1) * stride + x0 + 2] = avg2(e3, e4);
    a[y0 * stride + x0] = avg2(e3, e4);
    a[(y0 + 1) * stride + x0 + 3] = avg3(e3, e4, e5);
    a[y0 * stride + x0 + 1] = avg3(e3, e4, e5);
    a[y0 * stride + x0 + 2] = avg3(e4, e5, e6);
    a[y0 * stride + x0 + 3] = avg3(e5, e6, e7);
}

pub(crate) fn predict_bhupred(a: &mut [u8], x0: usize, y0: usize, stride: usize) {
    let (l0, l1, l2, l3) = left_pixels(a, x0, y0, stride);

    a[y0 * stride + x0] = avg2(l0, l1);
    a[y0 * stride + x0 + 1] = avg3(l0, l1, l2);
    a[y0 * stride + x0 + 2] = avg2(l1, l2);
    a[(y0 + 1) * stride + x0] = avg2(l1, l2);
    a[y0 * stride + x0 + 3] = avg3(l1, l2, l3);
    a[(y0 + 1) * stride + x0 + 1] = avg3(l1, l2, l3);
    a[(y0 + 1) * stride + x0 + 2] = avg2(l2, l3);
    a[(y0 + 2) * stride + x0] = avg2(l2, l3);
    a[(y0 + 1) * stride + x0 + 3] = avg3(l2, l3, l3);
    a[(y0 + 2) * stride + x0 + 1] = avg3(l2, l3, l3);
    a[(y0 + 2) * stride + x0 + 2] = l3;
    a[(y0 + 2) * stride + x0 + 3] = l3;
    a[(y0 + 3) * stride + x0] = l3;
    a[(y0 + 3) * stride + x0 + 1] = l3;
    a[(y0 + 3) * stride + x0 + 2] = l3;
    a[(y0 + 3) * stride + x0 + 3] = l3;
}

/// Predicts the 16×16 luma block of a bordered workspace.
pub(crate) fn predict_luma(ws: &mut [u8; LUMA_BLOCK_SIZE], mode: LumaMode, mbx: usize, mby: usize) {
    match mode {
        LumaMode::DC => predict_dcpred(ws, 16, LUMA_STRIDE, mby > 0, mbx > 0),
        LumaMode::V => predict_vpred(ws, 16, 1, 1, LUMA_STRIDE),
        LumaMode::H => predict_hpred(ws, 16, 1, 1, LUMA_STRIDE),
        LumaMode::TM => predict_tmpred(ws, 16, 1, 1, LUMA_STRIDE),
        LumaMode::B => unreachable!("B_PRED is predicted per sub-block"),
    }
}

/// Predicts one 8×8 chroma block of a bordered workspace.
pub(crate) fn predict_chroma(
    cb: &mut [u8; CHROMA_BLOCK_SIZE],
    mode: ChromaMode,
    mbx: usize,
    mby: usize,
) {
    match mode {
        ChromaMode::DC => predict_dcpred(cb, 8, CHROMA_STRIDE, mby > 0, mbx > 0),
        ChromaMode::V => predict_vpred(cb, 8, 1, 1, CHROMA_STRIDE),
        ChromaMode::H => predict_hpred(cb, 8, 1, 1, CHROMA_STRIDE),
        ChromaMode::TM => predict_tmpred(cb, 8, 1, 1, CHROMA_STRIDE),
    }
}

/// Predicts the 4×4 sub-block whose top-left pixel sits at `(x0, y0)` of the workspace.
pub(crate) fn predict_subblock(ws: &mut [u8], mode: IntraMode, x0: usize, y0: usize, stride: usize) {
    match mode {
        IntraMode::DC => predict_bdcpred(ws, x0, y0, stride),
        IntraMode::TM => predict_tmpred(ws, 4, x0, y0, stride),
        IntraMode::VE => predict_bvepred(ws, x0, y0, stride),
        IntraMode::HE => predict_bhepred(ws, x0, y0, stride),
        IntraMode::LD => predict_bldpred(ws, x0, y0, stride),
        IntraMode::RD => predict_brdpred(ws, x0, y0, stride),
        IntraMode::VR => predict_bvrpred(ws, x0, y0, stride),
        IntraMode::VL => predict_bvlpred(ws, x0, y0, stride),
        IntraMode::HD => predict_bhdpred(ws, x0, y0, stride),
        IntraMode::HU => predict_bhupred(ws, x0, y0, stride),
    }
}

/// Six-tap motion-compensated prediction of a `w`×`h` block.
///
/// `pos` indexes the full-pel top-left sample in `src`; `fx` and `fy` are the
/// eighth-pel filter indices. The source must carry at least two samples of
/// margin before and three after the block in both directions. Both passes
/// round and saturate to 8 bits, as the decoder does.
#[allow(clippy::too_many_arguments)]
pub(crate) fn predict_inter(
    src: &[u8],
    stride: usize,
    pos: usize,
    fx: usize,
    fy: usize,
    w: usize,
    h: usize,
    dst: &mut [u8],
    dst_stride: usize,
) {
    debug_assert!(w <= 16 && h <= 16);
    if fx == 0 && fy == 0 {
        for y in 0..h {
            dst[y * dst_stride..][..w].copy_from_slice(&src[pos + y * stride..][..w]);
        }
        return;
    }

    // Horizontal pass over h + 5 rows, starting two rows above the block.
    let mut temp = [0u8; 16 * 21];
    let hf = &SUBPEL_FILTERS[fx];
    for y in 0..h + 5 {
        let row = pos + y * stride - 2 * stride;
        for x in 0..w {
            let s = row + x;
            let sum = hf
                .iter()
                .enumerate()
                .map(|(t, &k)| k * i32::from(src[s + t - 2]))
                .sum::<i32>();
            temp[y * 16 + x] = ((sum + 64) >> 7).clamp(0, 255) as u8;
        }
    }

    let vf = &SUBPEL_FILTERS[fy];
    for y in 0..h {
        for x in 0..w {
            let sum = vf
                .iter()
                .enumerate()
                .map(|(t, &k)| k * i32::from(temp[(y + t) * 16 + x]))
                .sum::<i32>();
            dst[y * dst_stride + x] = ((sum + 64) >> 7).clamp(0, 255) as u8;
        }
    }
}

use super::types::{ChromaMode, IntraMode, LumaMode};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg2() {
        for i in 0u8..=255 {
            for j in 0u8..=255 {
                let ceil_avg = (f32::from(i) + f32::from(j)) / 2.0;
                let ceil_avg = ceil_avg.ceil() as u8;
                assert_eq!(
                    ceil_avg,
                    avg2(i, j),
                    "avg2({}, {}), expected {}, got {}.",
                    i,
                    j,
                    ceil_avg,
                    avg2(i, j)
                );
            }
        }
    }

    #[test]
    fn test_avg3() {
        for i in 0u8..=255 {
            for j in (0u8..=255).step_by(3) {
                for k in (0u8..=255).step_by(5) {
                    let floor_avg =
                        (2.0f32.mul_add(f32::from(j), f32::from(i)) + { f32::from(k) } + 2.0) / 4.0;
                    let floor_avg = floor_avg.floor() as u8;
                    assert_eq!(floor_avg, avg3(i, j, k), "avg3({i}, {j}, {k})");
                }
            }
        }
    }

    #[test]
    fn test_edge_pixels() {
        #[rustfmt::skip]
        let im = vec![5, 6, 7, 8, 9,
                      4, 0, 0, 0, 0,
                      3, 0, 0, 0, 0,
                      2, 0, 0, 0, 0,
                      1, 0, 0, 0, 0];
        let (e0, e1, e2, e3, e4, e5, e6, e7, e8) = edge_pixels(&im, 1, 1, 5);
        assert_eq!((e0, e1, e2, e3, e4), (1, 2, 3, 4, 5));
        assert_eq!((e5, e6, e7, e8), (6, 7, 8, 9));
    }

    #[test]
    fn test_add_residue() {
        let mut pblock = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let rblock = [
            -1, -2, -3, -4, 250, 249, 248, 250, -10, -18, -192, -17, -3, 15, 18, 9,
        ];
        let expected: [u8; 16] = [0, 0, 0, 0, 255, 255, 255, 255, 0, 0, 0, 0, 10, 29, 33, 25];

        add_residue(&mut pblock, &rblock, 0, 0, 4);

        assert_eq!(expected, pblock);
    }

    #[test]
    fn test_predict_bhepred() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![5, 0, 0, 0, 0,
              4, 4, 4, 4, 4,
              3, 3, 3, 3, 3,
              2, 2, 2, 2, 2,
              1, 1, 1, 1, 1];

        #[rustfmt::skip]
        let mut im = vec![5, 0, 0, 0, 0,
                      4, 0, 0, 0, 0,
                      3, 0, 0, 0, 0,
                      2, 0, 0, 0, 0,
                      1, 0, 0, 0, 0];
        predict_bhepred(&mut im, 1, 1, 5);
        assert_eq!(expected, im);
    }

    #[test]
    fn test_predict_brdpred() {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![5, 6, 7, 8, 9,
              4, 5, 6, 7, 8,
              3, 4, 5, 6, 7,
              2, 3, 4, 5, 6,
              1, 2, 3, 4, 5];

        #[rustfmt::skip]
        let mut im = vec![5, 6, 7, 8, 9,
                      4, 0, 0, 0, 0,
                      3, 0, 0, 0, 0,
                      2, 0, 0, 0, 0,
                      1, 0, 0, 0, 0];
        predict_brdpred(&mut im, 1, 1, 5);
        assert_eq!(expected, im);
    }

    #[test]
    fn test_predict_bvepred() {
        let mut im = vec![0u8; 9 * 9];
        im[..9].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        predict_bvepred(&mut im, 1, 1, 9);

        for row in 1..5 {
            assert_eq!(&im[row * 9 + 1..row * 9 + 5], &[2, 3, 4, 5]);
        }
    }

    #[test]
    fn border_uses_127_and_129_outside_the_frame() {
        let mut ws = [0u8; LUMA_BLOCK_SIZE];
        update_border_luma(&mut ws, 0, 0, 2, &[], &[0; 17]);
        assert!(ws[..21].iter().all(|&p| p == 127));
        assert!((1..17).all(|y| ws[y * LUMA_STRIDE] == 129));
        assert_eq!(ws[4 * LUMA_STRIDE + 17], 127);

        let top: Vec<u8> = (0..32).collect();
        let mut left = [50u8; 17];
        left[0] = 9;
        update_border_luma(&mut ws, 1, 1, 2, &top, &left);
        assert_eq!(&ws[1..17], &top[16..32]);
        // Last column: above-right replicates the final pixel above.
        assert_eq!(&ws[17..21], &[31, 31, 31, 31]);
        assert_eq!(ws[0], 9);
        assert_eq!(ws[12 * LUMA_STRIDE + 20], 31);
    }

    #[test]
    fn dc_prediction_without_neighbours_is_128() {
        let mut cb = [7u8; CHROMA_BLOCK_SIZE];
        predict_chroma(&mut cb, ChromaMode::DC, 0, 0);
        for y in 1..9 {
            assert!(cb[y * CHROMA_STRIDE + 1..][..8].iter().all(|&p| p == 128));
        }
    }

    #[test]
    fn full_pel_inter_prediction_copies() {
        let stride = 40;
        let src: Vec<u8> = (0..stride * 40).map(|i| (i * 7 % 251) as u8).collect();
        let mut dst = [0u8; 16 * 16];
        let pos = 10 * stride + 10;
        predict_inter(&src, stride, pos, 0, 0, 16, 16, &mut dst, 16);
        for y in 0..16 {
            assert_eq!(&dst[y * 16..][..16], &src[pos + y * stride..][..16]);
        }
    }

    #[test]
    fn half_pel_filter_averages_a_flat_ramp() {
        let stride = 32;
        // Horizontal ramp 4*x: the symmetric half-pel tap lands exactly between samples.
        let src: Vec<u8> = (0..stride * 32).map(|i| ((i % stride) * 4) as u8).collect();
        let mut dst = [0u8; 16];
        let pos = 8 * stride + 8;
        predict_inter(&src, stride, pos, 4, 0, 4, 4, &mut dst, 4);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(dst[y * 4 + x], (4 * (8 + x) + 2) as u8);
            }
        }
    }

    #[test]
    fn filters_sum_to_128() {
        for f in SUBPEL_FILTERS {
            assert_eq!(f.iter().sum::<i32>(), 128);
        }
    }
}
