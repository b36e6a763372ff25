//! Bordered sample planes and the reference frame pool.
//!
//! Every plane covers whole macroblocks and carries a replicated border wide
//! enough for motion vectors reaching 16 pixels outside the frame plus the
//! six-tap filter footprint. References are slots in a fixed pool; LAST,
//! GOLDEN and ALTREF are handles into it, so refreshing or copying a
//! reference never copies samples.

use alloc::vec;
use alloc::vec::Vec;

use super::api::PlaneView;
use super::config::{AltRefUpdate, GoldenUpdate};
use crate::common::types::RefFrame;

/// Border around luma planes, in pixels.
pub(crate) const LUMA_BORDER: usize = 32;
/// Border around chroma planes, in pixels.
pub(crate) const CHROMA_BORDER: usize = 16;

/// One 8-bit plane with a border on every side.
#[derive(Clone)]
pub(crate) struct Plane {
    data: Vec<u8>,
    /// Distance between rows, border included.
    pub(crate) stride: usize,
    /// Width in samples, a multiple of the macroblock size.
    pub(crate) width: usize,
    /// Height in rows, a multiple of the macroblock size.
    pub(crate) height: usize,
    border: usize,
}

impl Plane {
    pub(crate) fn new(width: usize, height: usize, border: usize) -> Self {
        let stride = width + 2 * border;
        Self {
            data: vec![0; stride * (height + 2 * border)],
            stride,
            width,
            height,
            border,
        }
    }

    /// Index of sample `(x, y)`; coordinates may reach into the border.
    #[inline]
    pub(crate) fn offset(&self, x: isize, y: isize) -> usize {
        let b = self.border as isize;
        ((y + b) * self.stride as isize + x + b) as usize
    }

    /// Index of sample `(x, y)` inside the plane.
    #[inline]
    pub(crate) fn index(&self, x: usize, y: usize) -> usize {
        (y + self.border) * self.stride + x + self.border
    }

    #[inline]
    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Samples of row `y` inside the plane.
    pub(crate) fn row(&self, y: usize) -> &[u8] {
        let start = self.index(0, y);
        &self.data[start..][..self.width]
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = self.index(0, y);
        let width = self.width;
        &mut self.data[start..][..width]
    }

    /// Copies a source plane in, replicating its last column and row out to
    /// the macroblock-aligned size.
    pub(crate) fn load(&mut self, src: &PlaneView<'_>) {
        for y in 0..self.height {
            let src_row = src.row(y.min(src.height - 1));
            let row = self.row_mut(y);
            row[..src_row.len()].copy_from_slice(src_row);
            let last = src_row[src_row.len() - 1];
            row[src_row.len()..].fill(last);
        }
    }

    /// Replicates the outermost samples into the border.
    pub(crate) fn extend_borders(&mut self) {
        let (b, w, h, stride) = (self.border, self.width, self.height, self.stride);
        for y in 0..h {
            let start = (y + b) * stride;
            let row = &mut self.data[start..start + stride];
            let first = row[b];
            let last = row[b + w - 1];
            row[..b].fill(first);
            row[b + w..].fill(last);
        }
        let (top, rest) = self.data.split_at_mut(b * stride);
        let first_row = &rest[..stride];
        for chunk in top.chunks_exact_mut(stride) {
            chunk.copy_from_slice(first_row);
        }
        let last_start = (b + h - 1) * stride;
        let (body, bottom) = self.data.split_at_mut((b + h) * stride);
        let last_row = &body[last_start..];
        for chunk in bottom.chunks_exact_mut(stride) {
            chunk.copy_from_slice(last_row);
        }
    }
}

/// A frame of three planes, padded to whole macroblocks.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) y: Plane,
    pub(crate) u: Plane,
    pub(crate) v: Plane,
}

impl Frame {
    pub(crate) fn new(mb_width: usize, mb_height: usize) -> Self {
        Self {
            y: Plane::new(mb_width * 16, mb_height * 16, LUMA_BORDER),
            u: Plane::new(mb_width * 8, mb_height * 8, CHROMA_BORDER),
            v: Plane::new(mb_width * 8, mb_height * 8, CHROMA_BORDER),
        }
    }

    pub(crate) fn extend_borders(&mut self) {
        self.y.extend_borders();
        self.u.extend_borders();
        self.v.extend_borders();
    }
}

/// How the references change once a frame commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshPlan {
    pub(crate) keyframe: bool,
    pub(crate) refresh_last: bool,
    pub(crate) golden: GoldenUpdate,
    pub(crate) altref: AltRefUpdate,
}

const POOL_SLOTS: usize = 4;

/// Four frame slots and the LAST/GOLDEN/ALTREF handles into them.
pub(crate) struct ReferencePool {
    slots: [Frame; POOL_SLOTS],
    last: Option<usize>,
    golden: Option<usize>,
    altref: Option<usize>,
}

impl ReferencePool {
    pub(crate) fn new(mb_width: usize, mb_height: usize) -> Self {
        Self {
            slots: core::array::from_fn(|_| Frame::new(mb_width, mb_height)),
            last: None,
            golden: None,
            altref: None,
        }
    }

    fn handle(&self, reference: RefFrame) -> Option<usize> {
        match reference {
            RefFrame::Intra => None,
            RefFrame::Last => self.last,
            RefFrame::Golden => self.golden,
            RefFrame::AltRef => self.altref,
        }
    }

    /// Whether a reference holds a frame.
    pub(crate) fn has(&self, reference: RefFrame) -> bool {
        self.handle(reference).is_some()
    }

    /// The frame behind a reference.
    pub(crate) fn get(&self, reference: RefFrame) -> Option<&Frame> {
        self.handle(reference).map(|i| &self.slots[i])
    }

    /// A slot no reference points at.
    pub(crate) fn free_slot(&self) -> usize {
        let used = [self.last, self.golden, self.altref];
        // Three handles cannot cover four slots.
        (0..POOL_SLOTS)
            .find(|i| !used.contains(&Some(*i)))
            .unwrap_or(POOL_SLOTS - 1)
    }

    /// The frame under construction in slot `current` plus read access to
    /// the LAST, GOLDEN and ALTREF frames.
    pub(crate) fn split(&mut self, current: usize) -> (&mut Frame, [Option<&Frame>; 3]) {
        let handles = [self.last, self.golden, self.altref];
        let [s0, s1, s2, s3] = &mut self.slots;
        let (frame, others): (&mut Frame, [(usize, &Frame); 3]) = match current {
            0 => (s0, [(1, &*s1), (2, &*s2), (3, &*s3)]),
            1 => (s1, [(0, &*s0), (2, &*s2), (3, &*s3)]),
            2 => (s2, [(0, &*s0), (1, &*s1), (3, &*s3)]),
            _ => (s3, [(0, &*s0), (1, &*s1), (2, &*s2)]),
        };
        let find = |handle: Option<usize>| {
            handle.and_then(|h| others.iter().find(|(i, _)| *i == h).map(|&(_, f)| f))
        };
        (frame, handles.map(find))
    }

    /// Points the references at the slot `current` according to `plan`.
    ///
    /// Copies run before refreshes, and a GOLDEN copy of ALTREF sees the
    /// ALTREF copy made by the same frame, as the decoder applies them.
    pub(crate) fn commit(&mut self, current: usize, plan: &RefreshPlan) {
        if plan.keyframe {
            self.last = Some(current);
            self.golden = Some(current);
            self.altref = Some(current);
            return;
        }
        match plan.altref {
            AltRefUpdate::CopyLast => self.altref = self.last,
            AltRefUpdate::CopyGolden => self.altref = self.golden,
            AltRefUpdate::Keep | AltRefUpdate::Refresh => {}
        }
        match plan.golden {
            GoldenUpdate::CopyLast => self.golden = self.last,
            GoldenUpdate::CopyAltRef => self.golden = self.altref,
            GoldenUpdate::Keep | GoldenUpdate::Refresh => {}
        }
        if plan.golden == GoldenUpdate::Refresh {
            self.golden = Some(current);
        }
        if plan.altref == AltRefUpdate::Refresh {
            self.altref = Some(current);
        }
        if plan.refresh_last {
            self.last = Some(current);
        }
    }

    /// Drops every reference.
    pub(crate) fn clear(&mut self) {
        self.last = None;
        self.golden = None;
        self.altref = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(refresh_last: bool, golden: GoldenUpdate, altref: AltRefUpdate) -> RefreshPlan {
        RefreshPlan {
            keyframe: false,
            refresh_last,
            golden,
            altref,
        }
    }

    #[test]
    fn load_pads_to_macroblocks() {
        let src: Vec<u8> = (0..5 * 3).map(|i| i as u8).collect();
        let view = PlaneView::new(&src, 5, 5, 3);
        let mut plane = Plane::new(16, 16, 4);
        plane.load(&view);
        assert_eq!(&plane.row(0)[..6], &[0, 1, 2, 3, 4, 4]);
        assert_eq!(plane.row(15)[15], 14);
        assert_eq!(&plane.row(2)[..5], &plane.row(9)[..5]);
    }

    #[test]
    fn borders_replicate_edges() {
        let mut plane = Plane::new(16, 16, 4);
        for y in 0..16 {
            for (x, p) in plane.row_mut(y).iter_mut().enumerate() {
                *p = (y * 16 + x) as u8;
            }
        }
        plane.extend_borders();
        let d = plane.data();
        assert_eq!(d[plane.offset(-4, -4)], 0);
        assert_eq!(d[plane.offset(19, -1)], 15);
        assert_eq!(d[plane.offset(-2, 7)], 7 * 16);
        assert_eq!(d[plane.offset(20 - 1, 19)], 255);
        assert_eq!(d[plane.offset(3, 18)], 15 * 16 + 3);
    }

    #[test]
    fn keyframe_points_every_reference_at_the_frame() {
        let mut pool = ReferencePool::new(1, 1);
        assert!(!pool.has(RefFrame::Last));
        let slot = pool.free_slot();
        pool.commit(
            slot,
            &RefreshPlan {
                keyframe: true,
                ..plan(true, GoldenUpdate::Keep, AltRefUpdate::Keep)
            },
        );
        for r in RefFrame::INTER {
            assert_eq!(pool.handle(r), Some(slot));
        }
        assert_ne!(pool.free_slot(), slot);
    }

    #[test]
    fn copies_apply_before_refreshes() {
        let mut pool = ReferencePool::new(1, 1);
        pool.last = Some(0);
        pool.golden = Some(1);
        pool.altref = Some(2);
        assert_eq!(pool.free_slot(), 3);

        // ALTREF takes GOLDEN, then GOLDEN takes the new ALTREF.
        pool.commit(3, &plan(false, GoldenUpdate::CopyAltRef, AltRefUpdate::CopyGolden));
        assert_eq!((pool.last, pool.golden, pool.altref), (Some(0), Some(1), Some(1)));

        pool.commit(2, &plan(true, GoldenUpdate::CopyLast, AltRefUpdate::Refresh));
        assert_eq!((pool.last, pool.golden, pool.altref), (Some(2), Some(0), Some(2)));
    }

    #[test]
    fn split_hands_out_the_references() {
        let mut pool = ReferencePool::new(1, 1);
        pool.slots[1].y.row_mut(0)[0] = 11;
        pool.slots[2].y.row_mut(0)[0] = 22;
        pool.last = Some(1);
        pool.golden = Some(2);
        let cur = pool.free_slot();
        assert_eq!(cur, 0);
        let (frame, refs) = pool.split(cur);
        frame.y.row_mut(0)[0] = 99;
        assert_eq!(refs[0].map(|f| f.y.row(0)[0]), Some(11));
        assert_eq!(refs[1].map(|f| f.y.row(0)[0]), Some(22));
        assert!(refs[2].is_none());
    }
}
