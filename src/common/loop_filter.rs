//! In-loop deblocking filters (RFC 6386 §15).
//!
//! The encoder runs the same filter a decoder does, so reference frames match
//! decoder output bit for bit. "Horizontal" functions filter across a
//! vertical edge and take the eight pixels of one row (`p3..p0 q0..q3`);
//! "vertical" functions filter across a horizontal edge and walk a column
//! through `point` with `stride`.

#[inline(always)]
fn c(v: i32) -> i32 {
    v.clamp(-128, 127)
}

#[inline(always)]
fn u2s(v: u8) -> i32 {
    i32::from(v) - 128
}

#[inline(always)]
fn s2u(v: i32) -> u8 {
    (c(v) + 128) as u8
}

#[inline(always)]
fn diff(a: u8, b: u8) -> u8 {
    a.abs_diff(b)
}

/// Adjusts p0/q0 toward each other; returns the filter value `a` applied.
#[inline(always)]
fn common_adjust(use_outer_taps: bool, px: &mut [u8; 8]) -> i32 {
    let p1 = u2s(px[2]);
    let p0 = u2s(px[3]);
    let q0 = u2s(px[4]);
    let q1 = u2s(px[5]);

    let outer = if use_outer_taps { c(p1 - q1) } else { 0 };
    let a = c(outer + 3 * (q0 - p0));

    let b = c(a + 3) >> 3;
    let a = c(a + 4) >> 3;

    px[4] = s2u(q0 - a);
    px[3] = s2u(p0 + b);

    a
}

#[inline(always)]
fn simple_threshold(filter_limit: i32, px: &[u8; 8]) -> bool {
    i32::from(diff(px[3], px[4])) * 2 + i32::from(diff(px[2], px[5])) / 2 <= filter_limit
}

#[inline(always)]
fn should_filter(interior_limit: u8, edge_limit: u8, px: &[u8; 8]) -> bool {
    simple_threshold(i32::from(edge_limit), px)
        && diff(px[0], px[1]) <= interior_limit
        && diff(px[1], px[2]) <= interior_limit
        && diff(px[2], px[3]) <= interior_limit
        && diff(px[7], px[6]) <= interior_limit
        && diff(px[6], px[5]) <= interior_limit
        && diff(px[5], px[4]) <= interior_limit
}

#[inline(always)]
fn high_edge_variance(threshold: u8, px: &[u8; 8]) -> bool {
    diff(px[2], px[3]) > threshold || diff(px[5], px[4]) > threshold
}

fn simple_segment(edge_limit: u8, px: &mut [u8; 8]) {
    if simple_threshold(i32::from(edge_limit), px) {
        common_adjust(true, px);
    }
}

fn subblock_filter(hev_threshold: u8, interior_limit: u8, edge_limit: u8, px: &mut [u8; 8]) {
    if !should_filter(interior_limit, edge_limit, px) {
        return;
    }
    let hv = high_edge_variance(hev_threshold, px);
    let a = (common_adjust(hv, px) + 1) >> 1;
    if !hv {
        px[5] = s2u(u2s(px[5]) - a);
        px[2] = s2u(u2s(px[2]) + a);
    }
}

fn macroblock_filter(hev_threshold: u8, interior_limit: u8, edge_limit: u8, px: &mut [u8; 8]) {
    if !should_filter(interior_limit, edge_limit, px) {
        return;
    }
    if high_edge_variance(hev_threshold, px) {
        common_adjust(true, px);
        return;
    }

    let p2 = u2s(px[1]);
    let p1 = u2s(px[2]);
    let p0 = u2s(px[3]);
    let q0 = u2s(px[4]);
    let q1 = u2s(px[5]);
    let q2 = u2s(px[6]);

    let w = c(c(p1 - q1) + 3 * (q0 - p0));

    let a = c((27 * w + 63) >> 7);
    px[4] = s2u(q0 - a);
    px[3] = s2u(p0 + a);

    let a = c((18 * w + 63) >> 7);
    px[5] = s2u(q1 - a);
    px[2] = s2u(p1 + a);

    let a = c((9 * w + 63) >> 7);
    px[6] = s2u(q2 - a);
    px[1] = s2u(p2 + a);
}

#[inline(always)]
fn row(pixels: &[u8]) -> [u8; 8] {
    let mut px = [0u8; 8];
    px.copy_from_slice(&pixels[..8]);
    px
}

#[inline(always)]
fn load_col(buf: &[u8], point: usize, stride: usize) -> [u8; 8] {
    let top = point - 4 * stride;
    core::array::from_fn(|i| buf[top + i * stride])
}

#[inline(always)]
fn store_col(buf: &mut [u8], point: usize, stride: usize, px: &[u8; 8]) {
    let top = point - 4 * stride;
    for (i, &p) in px.iter().enumerate() {
        buf[top + i * stride] = p;
    }
}

/// Simple filter across a vertical edge; `pixels` starts four left of the edge.
pub(crate) fn simple_segment_horizontal(edge_limit: u8, pixels: &mut [u8]) {
    let mut px = row(pixels);
    simple_segment(edge_limit, &mut px);
    pixels[..8].copy_from_slice(&px);
}

/// Simple filter across a horizontal edge at `point`.
pub(crate) fn simple_segment_vertical(edge_limit: u8, buf: &mut [u8], point: usize, stride: usize) {
    let mut px = load_col(buf, point, stride);
    simple_segment(edge_limit, &mut px);
    store_col(buf, point, stride, &px);
}

/// Normal inner-edge filter across a vertical edge.
pub(crate) fn subblock_filter_horizontal(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    pixels: &mut [u8],
) {
    let mut px = row(pixels);
    subblock_filter(hev_threshold, interior_limit, edge_limit, &mut px);
    pixels[..8].copy_from_slice(&px);
}

/// Normal inner-edge filter across a horizontal edge at `point`.
pub(crate) fn subblock_filter_vertical(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    buf: &mut [u8],
    point: usize,
    stride: usize,
) {
    let mut px = load_col(buf, point, stride);
    subblock_filter(hev_threshold, interior_limit, edge_limit, &mut px);
    store_col(buf, point, stride, &px);
}

/// Normal macroblock-edge filter across a vertical edge.
pub(crate) fn macroblock_filter_horizontal(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    pixels: &mut [u8],
) {
    let mut px = row(pixels);
    macroblock_filter(hev_threshold, interior_limit, edge_limit, &mut px);
    pixels[..8].copy_from_slice(&px);
}

/// Normal macroblock-edge filter across a horizontal edge at `point`.
pub(crate) fn macroblock_filter_vertical(
    hev_threshold: u8,
    interior_limit: u8,
    edge_limit: u8,
    buf: &mut [u8],
    point: usize,
    stride: usize,
) {
    let mut px = load_col(buf, point, stride);
    macroblock_filter(hev_threshold, interior_limit, edge_limit, &mut px);
    store_col(buf, point, stride, &px);
}

/// Filter strength of one macroblock, already resolved from level and sharpness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeParams {
    pub(crate) level: u8,
    pub(crate) interior_limit: u8,
    pub(crate) hev_threshold: u8,
    pub(crate) mbedge_limit: u8,
    pub(crate) subedge_limit: u8,
}

impl EdgeParams {
    /// Derives limits from a clamped level (0..=63) and sharpness (0..=7).
    pub(crate) fn new(level: u8, sharpness: u8, keyframe: bool) -> Self {
        let mut interior_limit = level;
        if sharpness > 0 {
            interior_limit >>= if sharpness > 4 { 2 } else { 1 };
            if interior_limit > 9 - sharpness {
                interior_limit = 9 - sharpness;
            }
        }
        if interior_limit == 0 {
            interior_limit = 1;
        }

        let hev_threshold = if keyframe {
            match level {
                40.. => 2,
                15.. => 1,
                _ => 0,
            }
        } else {
            match level {
                40.. => 3,
                20.. => 2,
                15.. => 1,
                _ => 0,
            }
        };

        Self {
            level,
            interior_limit,
            hev_threshold,
            mbedge_limit: (level + 2) * 2 + interior_limit,
            subedge_limit: level * 2 + interior_limit,
        }
    }
}

/// Filters the edges of one macroblock of a plane.
///
/// `size` is 16 for luma and 8 for chroma; `(x0, y0)` is the top-left pixel.
/// Left and top edges are skipped on the frame border, inner edges unless
/// `inner` is set. The simple filter only ever touches luma.
#[allow(clippy::too_many_arguments)]
pub(crate) fn filter_macroblock(
    buf: &mut [u8],
    stride: usize,
    x0: usize,
    y0: usize,
    size: usize,
    params: &EdgeParams,
    simple: bool,
    left: bool,
    top: bool,
    inner: bool,
) {
    let EdgeParams {
        interior_limit: il,
        hev_threshold: hev,
        mbedge_limit: mbe,
        subedge_limit: sbe,
        ..
    } = *params;

    if left {
        for y in y0..y0 + size {
            let px = &mut buf[y * stride + x0 - 4..][..8];
            if simple {
                simple_segment_horizontal(mbe, px);
            } else {
                macroblock_filter_horizontal(hev, il, mbe, px);
            }
        }
    }

    if inner {
        for x in (x0 + 4..x0 + size).step_by(4) {
            for y in y0..y0 + size {
                let px = &mut buf[y * stride + x - 4..][..8];
                if simple {
                    simple_segment_horizontal(sbe, px);
                } else {
                    subblock_filter_horizontal(hev, il, sbe, px);
                }
            }
        }
    }

    if top {
        for x in x0..x0 + size {
            let point = y0 * stride + x;
            if simple {
                simple_segment_vertical(mbe, buf, point, stride);
            } else {
                macroblock_filter_vertical(hev, il, mbe, buf, point, stride);
            }
        }
    }

    if inner {
        for y in (y0 + 4..y0 + size).step_by(4) {
            for x in x0..x0 + size {
                let point = y * stride + x;
                if simple {
                    simple_segment_vertical(sbe, buf, point, stride);
                } else {
                    subblock_filter_vertical(hev, il, sbe, buf, point, stride);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_rows_are_untouched() {
        let mut px = [90u8; 8];
        macroblock_filter_horizontal(2, 10, 40, &mut px);
        assert_eq!(px, [90; 8]);
        subblock_filter_horizontal(2, 10, 40, &mut px);
        assert_eq!(px, [90; 8]);
    }

    #[test]
    fn small_step_is_smoothed() {
        let mut px = [100, 100, 100, 100, 108, 108, 108, 108];
        macroblock_filter_horizontal(0, 10, 60, &mut px);
        // w = (p1 - q1) + 3 * (q0 - p0) = 16: taps 27/18/9 give 3, 2 and 1.
        assert_eq!(px, [100, 101, 102, 103, 105, 106, 107, 108]);
    }

    #[test]
    fn strong_edge_survives() {
        let mut px = [10, 10, 10, 10, 200, 200, 200, 200];
        let before = px;
        simple_segment_horizontal(20, &mut px);
        assert_eq!(px, before);
    }

    #[test]
    fn simple_filter_moves_only_the_edge_pixels() {
        let mut px = [100, 100, 100, 100, 110, 110, 110, 110];
        simple_segment_horizontal(40, &mut px);
        // a = -10 + 30: q0 -= (20 + 4) >> 3, p0 += (20 + 3) >> 3.
        assert_eq!(px, [100, 100, 100, 102, 107, 110, 110, 110]);
    }

    #[test]
    fn vertical_matches_horizontal_on_a_transposed_column() {
        let column = [30u8, 32, 33, 35, 47, 48, 50, 51];
        let stride = 3;
        let mut buf = [0u8; 8 * 3];
        for (i, &v) in column.iter().enumerate() {
            buf[i * stride + 1] = v;
        }
        let mut row = column;
        subblock_filter_horizontal(1, 8, 40, &mut row);
        subblock_filter_vertical(1, 8, 40, &mut buf, 4 * stride + 1, stride);
        for (i, &v) in row.iter().enumerate() {
            assert_eq!(buf[i * stride + 1], v);
        }
    }

    #[test]
    fn edge_params_follow_sharpness() {
        let p = EdgeParams::new(32, 0, true);
        assert_eq!((p.interior_limit, p.hev_threshold), (32, 1));
        assert_eq!((p.mbedge_limit, p.subedge_limit), (100, 96));

        let p = EdgeParams::new(32, 5, false);
        assert_eq!((p.interior_limit, p.hev_threshold), (4, 2));

        let p = EdgeParams::new(0, 7, true);
        assert_eq!(p.interior_limit, 1);
    }
}
