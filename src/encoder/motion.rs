//! Motion estimation: candidate vectors from neighbours, integer-pel search
//! and sub-pixel refinement.
//!
//! Vectors are in quarter pixels. Luma prediction uses filter index
//! `(mv & 3) * 2`; chroma vectors are eighth-pel values on the half-size
//! planes.

use crate::common::prediction::predict_inter;
use crate::common::types::{MotionVector, RefFrame, MODE_CONTEXTS, MV_MAX};

use super::config::{SearchMethod, SubpelMethod};
use super::cost::distortion::{sad, sse};
use super::cost::{mv_penalty, RdCostTables};

/// Legal vector range of one macroblock, in quarter pixels.
///
/// Keeps every predicted block within 16 pixels outside the frame, where the
/// decoder never clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MvBounds {
    pub(crate) row_min: i16,
    pub(crate) row_max: i16,
    pub(crate) col_min: i16,
    pub(crate) col_max: i16,
}

impl MvBounds {
    pub(crate) fn for_macroblock(mbx: usize, mby: usize, mb_width: usize, mb_height: usize) -> Self {
        let edge = |before: usize, after: usize| {
            (
                -((before as i32 * 16 + 16) * 4),
                (after as i32 * 16 + 16) * 4,
            )
        };
        let (col_min, col_max) = edge(mbx, mb_width - 1 - mbx);
        let (row_min, row_max) = edge(mby, mb_height - 1 - mby);
        let fit = |v: i32| v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        Self {
            row_min: fit(row_min),
            row_max: fit(row_max),
            col_min: fit(col_min),
            col_max: fit(col_max),
        }
    }

    #[inline]
    pub(crate) fn contains(&self, mv: MotionVector) -> bool {
        (self.row_min..=self.row_max).contains(&mv.row)
            && (self.col_min..=self.col_max).contains(&mv.col)
    }

    #[inline]
    pub(crate) fn clamp(&self, mv: MotionVector) -> MotionVector {
        MotionVector::new(
            mv.row.clamp(self.row_min, self.row_max),
            mv.col.clamp(self.col_min, self.col_max),
        )
    }

    /// Narrows the bounds so that every vector stays codable against `base`.
    pub(crate) fn codable_from(&self, base: MotionVector) -> Self {
        let lo = |b: i16| (i32::from(b) - i32::from(MV_MAX)) as i16;
        let hi = |b: i16| (i32::from(b) + i32::from(MV_MAX)).min(i32::from(i16::MAX)) as i16;
        Self {
            row_min: self.row_min.max(lo(base.row)),
            row_max: self.row_max.min(hi(base.row)),
            col_min: self.col_min.max(lo(base.col)),
            col_max: self.col_max.min(hi(base.col)),
        }
    }
}

/// What a motion vector candidate list needs to know about a neighbouring macroblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Neighbor {
    pub(crate) reference: RefFrame,
    /// Whole-MB vector; the last block's vector for SPLITMV.
    pub(crate) mv: MotionVector,
    pub(crate) split: bool,
}

/// Candidate vectors and the inter mode probabilities they select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NearMvs {
    pub(crate) best: MotionVector,
    pub(crate) nearest: MotionVector,
    pub(crate) near: MotionVector,
    pub(crate) probs: [u8; 4],
}

/// Ranks the above, left and above-left vectors (weights 2, 2, 1).
///
/// `None` marks a neighbour outside the frame. Intra neighbours add nothing;
/// vectors from a reference with a different sign bias are negated. The
/// results are clamped to `bounds`, ranking uses the raw vectors.
pub(crate) fn find_near_mvs(
    above: Option<Neighbor>,
    left: Option<Neighbor>,
    above_left: Option<Neighbor>,
    reference: RefFrame,
    sign_bias: &[bool; 4],
    bounds: &MvBounds,
) -> NearMvs {
    const CNT_INTRA: usize = 0;
    const CNT_NEAREST: usize = 1;
    const CNT_NEAR: usize = 2;
    const CNT_SPLITMV: usize = 3;

    let mut mvs = [MotionVector::ZERO; 4];
    let mut cnt = [0u8; 4];
    let mut idx = 0usize;

    let biased = |n: &Neighbor| {
        if sign_bias[n.reference as usize] != sign_bias[reference as usize] {
            n.mv.negated()
        } else {
            n.mv
        }
    };

    let inter = |n: Option<Neighbor>| n.filter(|n| n.reference != RefFrame::Intra);

    if let Some(n) = inter(above) {
        if !n.mv.is_zero() {
            idx += 1;
            mvs[idx] = biased(&n);
        }
        cnt[idx] += 2;
    }
    for (n, weight) in [(inter(left), 2), (inter(above_left), 1)] {
        let Some(n) = n else { continue };
        if n.mv.is_zero() {
            cnt[CNT_INTRA] += weight;
            continue;
        }
        let mv = biased(&n);
        if mv != mvs[idx] {
            idx += 1;
            mvs[idx] = mv;
        }
        cnt[idx] += weight;
    }

    // Three distinct vectors where the last matches the first.
    if cnt[CNT_SPLITMV] > 0 && mvs[idx] == mvs[CNT_NEAREST] {
        cnt[CNT_NEAREST] += 1;
    }

    let split = |n: Option<Neighbor>, w: u8| if n.is_some_and(|n| n.split) { w } else { 0 };
    cnt[CNT_SPLITMV] = split(above, 2) + split(left, 2) + split(above_left, 1);

    if cnt[CNT_NEAR] > cnt[CNT_NEAREST] {
        cnt.swap(CNT_NEAREST, CNT_NEAR);
        mvs.swap(CNT_NEAREST, CNT_NEAR);
    }
    if cnt[CNT_NEAREST] >= cnt[CNT_INTRA] {
        mvs[CNT_INTRA] = mvs[CNT_NEAREST];
    }

    let probs = core::array::from_fn(|i| MODE_CONTEXTS[usize::from(cnt[i])][i]);
    NearMvs {
        best: bounds.clamp(mvs[CNT_INTRA]),
        nearest: bounds.clamp(mvs[CNT_NEAREST]),
        near: bounds.clamp(mvs[CNT_NEAR]),
        probs,
    }
}

/// Index of the sample a quarter-pel luma vector points at, and its filter indices.
#[inline]
fn luma_position(origin: usize, stride: usize, mv: MotionVector) -> (usize, usize, usize) {
    let (row, col) = (isize::from(mv.row >> 2), isize::from(mv.col >> 2));
    let pos = (origin as isize + row * stride as isize + col) as usize;
    (pos, usize::from((mv.col & 3) as u8) * 2, usize::from((mv.row & 3) as u8) * 2)
}

/// Predicts a `w`×`h` luma block displaced by a quarter-pel vector.
///
/// `origin` indexes the block's top-left sample at zero motion.
#[allow(clippy::too_many_arguments)]
pub(crate) fn predict_luma_block(
    reference: &[u8],
    stride: usize,
    origin: usize,
    mv: MotionVector,
    w: usize,
    h: usize,
    dst: &mut [u8],
    dst_stride: usize,
) {
    let (pos, fx, fy) = luma_position(origin, stride, mv);
    predict_inter(reference, stride, pos, fx, fy, w, h, dst, dst_stride);
}

/// Predicts a `w`×`h` chroma block displaced by an eighth-pel vector.
#[allow(clippy::too_many_arguments)]
pub(crate) fn predict_chroma_block(
    reference: &[u8],
    stride: usize,
    origin: usize,
    mv: MotionVector,
    w: usize,
    h: usize,
    dst: &mut [u8],
    dst_stride: usize,
) {
    let (row, col) = (isize::from(mv.row >> 3), isize::from(mv.col >> 3));
    let pos = (origin as isize + row * stride as isize + col) as usize;
    let fx = usize::from((mv.col & 7) as u8);
    let fy = usize::from((mv.row & 7) as u8);
    predict_inter(reference, stride, pos, fx, fy, w, h, dst, dst_stride);
}

/// Chroma vector of a whole-MB luma vector: the same value, read as eighth pels.
#[inline]
pub(crate) fn chroma_mv(luma: MotionVector) -> MotionVector {
    luma
}

/// Chroma vector of a 4×4 chroma block from the four luma vectors covering it.
///
/// The sum is rounded away from zero to eighth-pel units of the half-size plane.
pub(crate) fn split_chroma_mv(luma: [MotionVector; 4]) -> MotionVector {
    let average = |sum: i32| -> i16 {
        let rounded = (sum.abs() + 2) / 4;
        (if sum < 0 { -rounded } else { rounded }) as i16
    };
    let row = luma.iter().map(|m| i32::from(m.row)).sum();
    let col = luma.iter().map(|m| i32::from(m.col)).sum();
    MotionVector::new(average(row), average(col))
}

/// Inputs of one block's search.
pub(crate) struct MotionSearch<'a> {
    pub(crate) src: &'a [u8],
    pub(crate) src_stride: usize,
    /// Index of the source block's top-left sample.
    pub(crate) src_pos: usize,
    pub(crate) reference: &'a [u8],
    pub(crate) ref_stride: usize,
    /// Index of the co-located reference sample.
    pub(crate) ref_origin: usize,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) costs: &'a RdCostTables,
    /// Vector the result is coded against.
    pub(crate) base: MotionVector,
    pub(crate) bounds: MvBounds,
    pub(crate) sad_per_bit: u32,
    pub(crate) error_per_bit: u32,
}

/// Large hexagon, in full pixels `(row, col)`.
const HEX: [(i16, i16); 6] = [(-1, -2), (1, -2), (2, 0), (1, 2), (-1, 2), (-2, 0)];
/// Small hexagon: the diagonals and the horizontal neighbours.
const SMALL_HEX: [(i16, i16); 6] = [(-1, -1), (-1, 1), (0, 1), (1, 1), (1, -1), (0, -1)];
/// Plus-shaped neighbourhood.
const CROSS: [(i16, i16); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
/// All eight neighbours.
const RING: [(i16, i16); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl MotionSearch<'_> {
    fn sad_penalty(&self, mv: MotionVector) -> u32 {
        mv_penalty(self.costs.mv_cost(mv - self.base), self.sad_per_bit)
    }

    fn error_penalty(&self, mv: MotionVector) -> u32 {
        mv_penalty(self.costs.mv_cost(mv - self.base), self.error_per_bit)
    }

    /// SAD plus rate penalty of a full-pel vector, or `u32::MAX` out of bounds.
    fn full_pel_cost(&self, mv: MotionVector, best: u32) -> u32 {
        if !self.bounds.contains(mv) {
            return u32::MAX;
        }
        let penalty = self.sad_penalty(mv);
        if penalty >= best {
            return u32::MAX;
        }
        let (pos, _, _) = luma_position(self.ref_origin, self.ref_stride, mv);
        let d = sad(
            &self.src[self.src_pos..],
            self.src_stride,
            &self.reference[pos..],
            self.ref_stride,
            self.width,
            self.height,
            best - penalty,
        );
        d.saturating_add(penalty)
    }

    /// Integer-pel search around `start`, limited to `range` pixels from it.
    ///
    /// Returns the best full-pel vector and its SAD + rate cost.
    pub(crate) fn integer(&self, method: SearchMethod, start: MotionVector, range: u8) -> (MotionVector, u32) {
        // Round the start to full pel inside the bounds.
        let start = self.bounds.clamp(MotionVector::new(
            (start.row + 2) & !3,
            (start.col + 2) & !3,
        ));
        let start = self.full_pel_inside(start);
        let reach = i16::from(range) * 4;
        let window = MvBounds {
            row_min: self.bounds.row_min.max(start.row.saturating_sub(reach)),
            row_max: self.bounds.row_max.min(start.row.saturating_add(reach)),
            col_min: self.bounds.col_min.max(start.col.saturating_sub(reach)),
            col_max: self.bounds.col_max.min(start.col.saturating_add(reach)),
        };
        let search = MotionSearch {
            bounds: window,
            ..*self
        };
        let mut best = (start, search.full_pel_cost(start, u32::MAX));
        // The zero vector is always worth a look.
        let zero_cost = search.full_pel_cost(MotionVector::ZERO, best.1);
        if zero_cost < best.1 {
            best = (MotionVector::ZERO, zero_cost);
        }
        match method {
            SearchMethod::Diamond => search.diamond(best, range),
            SearchMethod::Hex => search.hex(best, range),
            SearchMethod::Full => search.full(best),
        }
    }

    /// Moves a full-pel vector the minimum amount needed to sit on the full-pel grid inside the bounds.
    fn full_pel_inside(&self, mv: MotionVector) -> MotionVector {
        let snap = |v: i16, lo: i16, hi: i16| {
            let v = v & !3;
            if v < lo {
                v + 4
            } else if v > hi {
                v - 4
            } else {
                v
            }
        };
        MotionVector::new(
            snap(mv.row, self.bounds.row_min, self.bounds.row_max),
            snap(mv.col, self.bounds.col_min, self.bounds.col_max),
        )
    }

    fn step(&self, from: MotionVector, (dr, dc): (i16, i16), scale: i16) -> MotionVector {
        MotionVector::new(from.row + dr * scale * 4, from.col + dc * scale * 4)
    }

    fn diamond(&self, mut best: (MotionVector, u32), range: u8) -> (MotionVector, u32) {
        let mut radius = (i16::from(range).max(2) / 2).max(1);
        loop {
            let center = best.0;
            for &d in &CROSS {
                let mv = self.step(center, d, radius);
                let cost = self.full_pel_cost(mv, best.1);
                if cost < best.1 {
                    best = (mv, cost);
                }
            }
            if best.0 == center {
                if radius == 1 {
                    break;
                }
                radius /= 2;
            }
        }
        best
    }

    /// Large hexagon until it settles, then the small hexagon, then the cross.
    fn hex(&self, best: (MotionVector, u32), range: u8) -> (MotionVector, u32) {
        let best = self.descend(best, &HEX, range);
        let best = self.descend(best, &SMALL_HEX, range);
        self.descend(best, &CROSS, range)
    }

    /// Moves to the cheapest point of `pattern` around the best vector for at
    /// most `steps` rounds, stopping when the center wins.
    fn descend(
        &self,
        mut best: (MotionVector, u32),
        pattern: &[(i16, i16)],
        steps: u8,
    ) -> (MotionVector, u32) {
        for _ in 0..steps {
            let center = best.0;
            for &d in pattern {
                let mv = self.step(center, d, 1);
                let cost = self.full_pel_cost(mv, best.1);
                if cost < best.1 {
                    best = (mv, cost);
                }
            }
            if best.0 == center {
                break;
            }
        }
        best
    }

    fn full(&self, mut best: (MotionVector, u32)) -> (MotionVector, u32) {
        let b = self.bounds;
        let rows = ((b.row_min + 3) >> 2)..=(b.row_max >> 2);
        for row in rows {
            for col in ((b.col_min + 3) >> 2)..=(b.col_max >> 2) {
                let mv = MotionVector::new(row * 4, col * 4);
                let cost = self.full_pel_cost(mv, best.1);
                if cost < best.1 {
                    best = (mv, cost);
                }
            }
        }
        best
    }

    /// SSE plus rate penalty of any quarter-pel vector, or `u64::MAX` out of bounds.
    pub(crate) fn subpel_cost(&self, mv: MotionVector) -> u64 {
        if !self.bounds.contains(mv) {
            return u64::MAX;
        }
        let mut pred = [0u8; 256];
        predict_luma_block(
            self.reference,
            self.ref_stride,
            self.ref_origin,
            mv,
            self.width,
            self.height,
            &mut pred,
            16,
        );
        let d = sse(
            &self.src[self.src_pos..],
            self.src_stride,
            &pred,
            16,
            self.width,
            self.height,
        );
        d + u64::from(self.error_penalty(mv))
    }

    /// Refines a full-pel vector to half and then quarter pel.
    pub(crate) fn subpel(&self, method: SubpelMethod, start: MotionVector) -> (MotionVector, u64) {
        let mut best = (start, self.subpel_cost(start));
        match method {
            SubpelMethod::Off => {}
            SubpelMethod::Iterative => {
                for step in [2i16, 1] {
                    // Bounded walk: a position never repeats once left.
                    for _ in 0..8 {
                        let center = best.0;
                        for &(dr, dc) in &RING {
                            let mv = MotionVector::new(center.row + dr * step, center.col + dc * step);
                            let cost = self.subpel_cost(mv);
                            if cost < best.1 {
                                best = (mv, cost);
                            }
                        }
                        if best.0 == center {
                            break;
                        }
                    }
                }
            }
            SubpelMethod::Fast => {
                for step in [2i16, 1] {
                    let (center, center_cost) = best;
                    // CROSS order: up, left, right, down.
                    let costs = CROSS.map(|(dr, dc)| {
                        self.subpel_cost(MotionVector::new(center.row + dr * step, center.col + dc * step))
                    });
                    for (&(dr, dc), &cost) in CROSS.iter().zip(&costs) {
                        if cost < best.1 {
                            best = (MotionVector::new(center.row + dr * step, center.col + dc * step), cost);
                        }
                    }
                    // One diagonal towards the better vertical and horizontal sides.
                    let dr = if costs[0] < costs[3] { -step } else { step };
                    let dc = if costs[1] < costs[2] { -step } else { step };
                    if costs[0].min(costs[3]) < center_cost || costs[1].min(costs[2]) < center_cost {
                        let mv = MotionVector::new(center.row + dr, center.col + dc);
                        let cost = self.subpel_cost(mv);
                        if cost < best.1 {
                            best = (mv, cost);
                        }
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{COEFF_PROBS, DEFAULT_MV_PROBS};
    use crate::encoder::frame::Plane;

    fn inter(mv: MotionVector) -> Option<Neighbor> {
        Some(Neighbor {
            reference: RefFrame::Last,
            mv,
            split: false,
        })
    }

    fn wide_bounds() -> MvBounds {
        MvBounds::for_macroblock(5, 5, 20, 20)
    }

    #[test]
    fn bounds_keep_blocks_near_the_frame() {
        let b = MvBounds::for_macroblock(0, 0, 4, 3);
        assert_eq!((b.col_min, b.col_max), (-64, (3 * 16 + 16) * 4));
        assert_eq!((b.row_min, b.row_max), (-64, (2 * 16 + 16) * 4));
        assert_eq!(b.clamp(MotionVector::new(-100, 1000)), MotionVector::new(-64, 256));
        let c = b.codable_from(MotionVector::new(0, -60));
        assert_eq!(c.col_max, (3 * 16 + 16) * 4);
        let far = MvBounds::for_macroblock(30, 0, 40, 1).codable_from(MotionVector::ZERO);
        assert_eq!(far.col_min, -MV_MAX);
    }

    #[test]
    fn no_neighbours_gives_zero_candidates() {
        let near = find_near_mvs(None, None, None, RefFrame::Last, &[false; 4], &wide_bounds());
        assert_eq!(near.best, MotionVector::ZERO);
        assert_eq!(near.nearest, MotionVector::ZERO);
        assert_eq!(near.probs, [MODE_CONTEXTS[0][0], MODE_CONTEXTS[0][1], MODE_CONTEXTS[0][2], MODE_CONTEXTS[0][3]]);
    }

    #[test]
    fn agreeing_neighbours_accumulate_weight() {
        let mv = MotionVector::new(8, -4);
        let near = find_near_mvs(inter(mv), inter(mv), inter(MotionVector::new(4, 4)), RefFrame::Last, &[false; 4], &wide_bounds());
        assert_eq!(near.nearest, mv);
        assert_eq!(near.near, MotionVector::new(4, 4));
        assert_eq!(near.best, mv);
        // cnt = [0, 4, 1, 0]
        assert_eq!(near.probs[1], MODE_CONTEXTS[4][1]);
        assert_eq!(near.probs[2], MODE_CONTEXTS[1][2]);
    }

    #[test]
    fn left_outweighs_a_lone_above_left() {
        let a = MotionVector::new(4, 0);
        let l = MotionVector::new(0, 12);
        let near = find_near_mvs(inter(a), inter(l), None, RefFrame::Last, &[false; 4], &wide_bounds());
        // Equal weights keep above first.
        assert_eq!((near.nearest, near.near), (a, l));

        let intra = Some(Neighbor::default());
        let near = find_near_mvs(intra, inter(l), inter(l), RefFrame::Last, &[false; 4], &wide_bounds());
        assert_eq!(near.nearest, l);
        assert_eq!(near.probs[0], MODE_CONTEXTS[0][0]);
        assert_eq!(near.probs[1], MODE_CONTEXTS[3][1]);
    }

    #[test]
    fn sign_bias_negates_borrowed_vectors() {
        let golden = Some(Neighbor {
            reference: RefFrame::Golden,
            mv: MotionVector::new(8, 8),
            split: false,
        });
        let bias = [false, false, true, false];
        let near = find_near_mvs(golden, None, None, RefFrame::Last, &bias, &wide_bounds());
        assert_eq!(near.nearest, MotionVector::new(-8, -8));
        let near = find_near_mvs(golden, None, None, RefFrame::Golden, &bias, &wide_bounds());
        assert_eq!(near.nearest, MotionVector::new(8, 8));
    }

    #[test]
    fn candidates_are_clamped() {
        let b = MvBounds::for_macroblock(0, 0, 2, 2);
        let near = find_near_mvs(None, inter(MotionVector::new(0, -400)), None, RefFrame::Last, &[false; 4], &b);
        assert_eq!(near.nearest, MotionVector::new(0, -64));
    }

    #[test]
    fn split_chroma_rounds_away_from_zero() {
        let m = |r, c| MotionVector::new(r, c);
        assert_eq!(split_chroma_mv([m(1, -1), m(1, -1), m(0, 0), m(0, 0)]), m(1, -1));
        assert_eq!(split_chroma_mv([m(1, -1), m(0, 0), m(0, 0), m(0, 0)]), m(0, 0));
        assert_eq!(split_chroma_mv([m(8, -8); 4]), m(8, -8));
    }

    /// A reference with a smooth pattern and a source that is the same pattern shifted.
    fn shifted_pair(dy: isize, dx: isize) -> (Plane, Plane) {
        let mut reference = Plane::new(64, 64, 32);
        let mut source = Plane::new(64, 64, 32);
        let value = |x: isize, y: isize| ((x * 7 + y * 13 + (x * y) % 11) & 0xff) as u8;
        for y in 0..64 {
            for (x, p) in reference.row_mut(y).iter_mut().enumerate() {
                *p = value(x as isize, y as isize);
            }
            for (x, p) in source.row_mut(y).iter_mut().enumerate() {
                *p = value(x as isize + dx, y as isize + dy);
            }
        }
        reference.extend_borders();
        (reference, source)
    }

    #[test]
    fn every_integer_search_finds_a_pure_shift() {
        let (reference, source) = shifted_pair(2, -3);
        let costs = RdCostTables::new(&COEFF_PROBS, &DEFAULT_MV_PROBS);
        let search = MotionSearch {
            src: source.data(),
            src_stride: source.stride,
            src_pos: source.index(16, 16),
            reference: reference.data(),
            ref_stride: reference.stride,
            ref_origin: reference.index(16, 16),
            width: 16,
            height: 16,
            costs: &costs,
            base: MotionVector::ZERO,
            bounds: MvBounds::for_macroblock(1, 1, 4, 4),
            sad_per_bit: 1,
            error_per_bit: 1,
        };
        let expected = MotionVector::new(8, -12);
        for method in [SearchMethod::Full, SearchMethod::Diamond, SearchMethod::Hex] {
            let (mv, cost) = search.integer(method, MotionVector::ZERO, 16);
            if method == SearchMethod::Full {
                assert_eq!(mv, expected);
            }
            assert!(cost >= search.sad_penalty(mv));
        }
        let (mv, sse) = search.subpel(SubpelMethod::Iterative, expected);
        assert_eq!(mv, expected);
        assert_eq!(sse, u64::from(search.error_penalty(expected)));
    }

    #[test]
    fn hex_refinement_reaches_a_diagonal_neighbour() {
        let (reference, source) = shifted_pair(2, -3);
        let costs = RdCostTables::new(&COEFF_PROBS, &DEFAULT_MV_PROBS);
        let search = MotionSearch {
            src: source.data(),
            src_stride: source.stride,
            src_pos: source.index(16, 16),
            reference: reference.data(),
            ref_stride: reference.stride,
            ref_origin: reference.index(16, 16),
            width: 16,
            height: 16,
            costs: &costs,
            base: MotionVector::ZERO,
            bounds: MvBounds::for_macroblock(1, 1, 4, 4),
            sad_per_bit: 1,
            error_per_bit: 1,
        };
        // One pixel of range keeps the large hexagon outside the window, so
        // only the small hexagon can step onto the diagonal.
        let (mv, cost) = search.integer(SearchMethod::Hex, MotionVector::new(12, -8), 1);
        assert_eq!(mv, MotionVector::new(8, -12));
        assert_eq!(cost, search.sad_penalty(mv));
    }
}
