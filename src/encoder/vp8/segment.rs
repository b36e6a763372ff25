//! Segment assignment by k-means clustering of macroblock activity.
//!
//! Each macroblock gets an activity value ("alpha") from the standard
//! deviation of its luma samples. The alpha histogram is clustered into up to
//! four segments; flat segments receive a finer quantizer and busy segments a
//! coarser one through per-segment quantizer deltas.

#![allow(clippy::needless_range_loop)]

use alloc::vec;
use alloc::vec::Vec;

use crate::common::types::MAX_SEGMENTS;
use crate::encoder::cost::distortion::variance_16x16;
use crate::encoder::frame::Frame;

/// Largest alpha value.
const MAX_ALPHA: usize = 255;

/// Number of k-means iterations for segment assignment.
const MAX_ITERS_K_MEANS: usize = 6;

/// Largest quantizer delta a segment receives.
const SEGMENT_DQ_RANGE: i32 = 12;

/// Segment layout of one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct SegmentPlan {
    /// Segments in use, 1 to 4.
    pub(super) count: usize,
    /// Segment of every macroblock, raster order.
    pub(super) map: Vec<u8>,
    /// Quantizer index delta per segment.
    pub(super) deltas: [i8; MAX_SEGMENTS],
    /// Probabilities of the segment id tree.
    pub(super) tree_probs: [u8; 3],
}

impl SegmentPlan {
    /// Every macroblock in segment 0, segmentation off.
    pub(super) fn single(mb_count: usize) -> Self {
        Self {
            count: 1,
            map: vec![0; mb_count],
            deltas: [0; MAX_SEGMENTS],
            tree_probs: [255; 3],
        }
    }

    pub(super) fn enabled(&self) -> bool {
        self.count > 1
    }

    /// Quantizer index of segment `s` around the frame's `base` index.
    pub(super) fn quantizer(&self, s: usize, base: u8) -> u8 {
        (i32::from(base) + i32::from(self.deltas[s])).clamp(0, 127) as u8
    }

    /// Clusters the macroblocks of `source` into `count` segments.
    pub(super) fn analyze(
        source: &Frame,
        mb_width: usize,
        mb_height: usize,
        count: usize,
        quantizer: u8,
    ) -> Self {
        let count = count.clamp(1, MAX_SEGMENTS);
        let y = &source.y;
        let alphas: Vec<u8> = (0..mb_height)
            .flat_map(|mby| (0..mb_width).map(move |mbx| (mbx, mby)))
            .map(|(mbx, mby)| {
                let block = &y.data()[y.index(mbx * 16, mby * 16)..];
                mb_alpha(variance_16x16(block, y.stride))
            })
            .collect();

        let mut histogram = [0u32; MAX_ALPHA + 1];
        for &a in &alphas {
            histogram[usize::from(a)] += 1;
        }
        let clusters = assign_segments_kmeans(&histogram, count);

        let mut map: Vec<u8> = alphas
            .iter()
            .map(|&a| clusters.map[usize::from(a)])
            .collect();
        smooth_segment_map(&mut map, mb_width, mb_height);

        let half_range = ((clusters.max_alpha - clusters.min_alpha) / 2).max(1) as i32;
        let mut deltas = [0i8; MAX_SEGMENTS];
        for (delta, &center) in deltas.iter_mut().zip(&clusters.centers).take(count) {
            let d = (i32::from(center) - clusters.average) * SEGMENT_DQ_RANGE / half_range;
            let d = d.clamp(-SEGMENT_DQ_RANGE, SEGMENT_DQ_RANGE);
            // Keep base + delta inside the quantizer range.
            *delta = d.clamp(-i32::from(quantizer), 127 - i32::from(quantizer)) as i8;
        }

        let mut counts = [0u32; MAX_SEGMENTS];
        for &s in &map {
            counts[usize::from(s)] += 1;
        }
        let tree_probs = [
            get_proba(counts[0] + counts[1], counts.iter().sum()),
            get_proba(counts[0], counts[0] + counts[1]),
            get_proba(counts[2], counts[2] + counts[3]),
        ];

        log::debug!(
            "segments: centers {:?}, deltas {:?}, counts {:?}",
            &clusters.centers[..count],
            &deltas[..count],
            counts
        );
        Self {
            count,
            map,
            deltas,
            tree_probs,
        }
    }
}

/// Activity of a macroblock: twice the standard deviation of its luma.
fn mb_alpha(variance: u32) -> u8 {
    let std_dev = libm::sqrt(f64::from(variance) / 256.0);
    (2.0 * std_dev).min(MAX_ALPHA as f64) as u8
}

/// Probability of the zero branch for `count` zeros out of `total`.
fn get_proba(count: u32, total: u32) -> u8 {
    if total == 0 {
        255
    } else {
        ((255 * count + total / 2) / total) as u8
    }
}

/// Outcome of the alpha clustering.
struct Clusters {
    /// Alpha center of each segment.
    centers: [u8; MAX_SEGMENTS],
    /// Segment of every alpha value.
    map: [u8; MAX_ALPHA + 1],
    /// Population-weighted average of the centers.
    average: i32,
    min_alpha: usize,
    max_alpha: usize,
}

/// Clusters an alpha histogram into `num_segments` groups.
///
/// Centers start evenly spread over the populated range and move to the
/// mean of their members until they settle.
fn assign_segments_kmeans(alphas: &[u32; MAX_ALPHA + 1], num_segments: usize) -> Clusters {
    let num_segments = num_segments.clamp(1, MAX_SEGMENTS);
    let mut centers = [0u8; MAX_SEGMENTS];
    let mut map = [0u8; MAX_ALPHA + 1];

    let min_a = alphas.iter().position(|&c| c > 0).unwrap_or(0);
    let max_a = alphas.iter().rposition(|&c| c > 0).unwrap_or(MAX_ALPHA);
    let range_a = max_a.saturating_sub(min_a);

    for (k, center) in centers.iter_mut().enumerate().take(num_segments) {
        let n = 1 + 2 * k;
        *center = (min_a + (n * range_a) / (2 * num_segments)) as u8;
    }

    let mut weighted_average = 0i32;
    let mut total_weight = 0u32;

    for _ in 0..MAX_ITERS_K_MEANS {
        let mut accum = [0u32; MAX_SEGMENTS];
        let mut dist_accum = [0u32; MAX_SEGMENTS];

        // Assign each alpha value to its nearest center.
        let mut current = 0usize;
        for a in min_a..=max_a {
            if alphas[a] == 0 {
                continue;
            }
            while current + 1 < num_segments {
                let d_curr = (a as i32 - i32::from(centers[current])).abs();
                let d_next = (a as i32 - i32::from(centers[current + 1])).abs();
                if d_next < d_curr {
                    current += 1;
                } else {
                    break;
                }
            }
            map[a] = current as u8;
            dist_accum[current] += a as u32 * alphas[a];
            accum[current] += alphas[a];
        }

        // Move centers to the middle of their clouds.
        let mut displaced = 0i32;
        weighted_average = 0;
        total_weight = 0;
        for n in 0..num_segments {
            if accum[n] > 0 {
                let new_center = ((dist_accum[n] + accum[n] / 2) / accum[n]) as u8;
                displaced += (i32::from(centers[n]) - i32::from(new_center)).abs();
                centers[n] = new_center;
                weighted_average += i32::from(new_center) * accum[n] as i32;
                total_weight += accum[n];
            }
        }
        if displaced < 5 {
            break;
        }
    }

    let average = if total_weight > 0 {
        (weighted_average + total_weight as i32 / 2) / total_weight as i32
    } else {
        128
    };
    for i in num_segments..MAX_SEGMENTS {
        centers[i] = centers[num_segments - 1];
    }

    Clusters {
        centers,
        map,
        average,
        min_alpha: min_a,
        max_alpha: max_a,
    }
}

/// Replaces isolated segment ids by the majority of their eight neighbours.
///
/// A block changes when at least 5 neighbours agree; border blocks are kept.
fn smooth_segment_map(map: &mut [u8], mb_w: usize, mb_h: usize) {
    if mb_w < 3 || mb_h < 3 {
        return;
    }
    const MAJORITY_THRESHOLD: u8 = 5;

    let src = map.to_vec();
    for y in 1..mb_h - 1 {
        for x in 1..mb_w - 1 {
            let idx = x + y * mb_w;
            let mut counts = [0u8; MAX_SEGMENTS];
            for dy in [idx - mb_w, idx, idx + mb_w] {
                for n in [dy - 1, dy, dy + 1] {
                    if n != idx {
                        counts[usize::from(src[n])] += 1;
                    }
                }
            }
            if let Some(seg) = counts.iter().position(|&c| c >= MAJORITY_THRESHOLD) {
                map[idx] = seg as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Left half flat, right half noise.
    fn half_busy(mb_width: usize, mb_height: usize) -> Frame {
        let mut frame = Frame::new(mb_width, mb_height);
        let mut rng = StdRng::seed_from_u64(3);
        for y in 0..mb_height * 16 {
            let row = frame.y.row_mut(y);
            for (x, p) in row[..mb_width * 16].iter_mut().enumerate() {
                *p = if x < mb_width * 8 { 120 } else { rng.gen() };
            }
        }
        frame
    }

    #[test]
    fn single_plan_is_disabled() {
        let plan = SegmentPlan::single(6);
        assert!(!plan.enabled());
        assert_eq!(plan.map, vec![0; 6]);
        assert_eq!(plan.quantizer(0, 40), 40);
    }

    #[test]
    fn flat_areas_get_finer_quantizers() {
        let frame = half_busy(4, 3);
        let plan = SegmentPlan::analyze(&frame, 4, 3, 2, 60);
        assert!(plan.enabled());
        let flat = usize::from(plan.map[0]);
        let busy = usize::from(plan.map[3]);
        assert_ne!(flat, busy);
        assert!(plan.quantizer(flat, 60) < 60);
        assert!(plan.quantizer(busy, 60) > 60);
        // Columns 0-1 flat, 2-3 busy, in every row.
        for row in plan.map.chunks(4) {
            assert_eq!(row, [flat as u8, flat as u8, busy as u8, busy as u8]);
        }
        // Equal populations of segments 0 and 1.
        assert_eq!(plan.tree_probs[0], 255);
        assert_eq!(plan.tree_probs[1], 128);
    }

    #[test]
    fn deltas_stay_inside_the_quantizer_range() {
        let frame = half_busy(4, 2);
        let low = SegmentPlan::analyze(&frame, 4, 2, 4, 0);
        assert!(low.deltas.iter().all(|&d| d >= 0));
        let high = SegmentPlan::analyze(&frame, 4, 2, 4, 127);
        assert!(high.deltas.iter().all(|&d| d <= 0));
        for s in 0..MAX_SEGMENTS {
            assert!(high.quantizer(s, 127) <= 127);
        }
    }

    #[test]
    fn kmeans_separates_two_clouds() {
        let mut hist = [0u32; MAX_ALPHA + 1];
        hist[10] = 5;
        hist[12] = 5;
        hist[200] = 3;
        let c = assign_segments_kmeans(&hist, 2);
        assert_eq!(c.centers[0], 11);
        assert_eq!(c.centers[1], 200);
        assert_eq!((c.map[10], c.map[12], c.map[200]), (0, 0, 1));
        assert_eq!((c.min_alpha, c.max_alpha), (10, 200));
        // (11 * 10 + 200 * 3 + 6) / 13
        assert_eq!(c.average, 55);
    }

    #[test]
    fn smoothing_removes_isolated_blocks() {
        let mut map = vec![0u8; 9];
        map[4] = 2;
        smooth_segment_map(&mut map, 3, 3);
        assert_eq!(map, vec![0; 9]);

        let mut edge = vec![0u8; 6];
        edge[1] = 1;
        smooth_segment_map(&mut edge, 3, 2);
        assert_eq!(edge[1], 1);
    }

    #[test]
    fn probabilities_round_like_the_bitstream_expects() {
        assert_eq!(get_proba(0, 0), 255);
        assert_eq!(get_proba(1, 3), 85);
        assert_eq!(get_proba(3, 3), 255);
        assert_eq!(mb_alpha(0), 0);
        assert_eq!(mb_alpha(256 * 100), 20);
        assert_eq!(mb_alpha(u32::MAX), 255);
    }
}
