//! Shared helpers for the integration tests: synthetic I420 content, frame
//! tag parsing, WebP wrapping for the reference decoder.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// An owned I420 picture.
pub struct Picture {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Picture {
    pub fn chroma_size(&self) -> (usize, usize) {
        (self.width.div_ceil(2), self.height.div_ceil(2))
    }

    pub fn frame(&self) -> zenvp8::YuvFrame<'_> {
        zenvp8::YuvFrame::from_i420(&self.data, self.width, self.height).unwrap()
    }

    pub fn y(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn u(&self, x: usize, y: usize) -> u8 {
        let (cw, _) = self.chroma_size();
        self.data[self.width * self.height + y * cw + x]
    }

    pub fn v(&self, x: usize, y: usize) -> u8 {
        let (cw, ch) = self.chroma_size();
        self.data[self.width * self.height + cw * ch + y * cw + x]
    }
}

/// Smooth diagonal luma ramp with soft chroma, shifted `shift` pixels right.
pub fn gradient(width: usize, height: usize, shift: usize) -> Picture {
    let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
    let mut data = Vec::with_capacity(width * height + 2 * cw * ch);
    for y in 0..height {
        for x in 0..width {
            data.push((((x + shift) * 2 + y * 3) % 200 + 28) as u8);
        }
    }
    for y in 0..ch {
        for x in 0..cw {
            data.push((100 + (x + shift / 2) % 40 + y % 16) as u8);
        }
    }
    for y in 0..ch {
        for x in 0..cw {
            data.push((150 - (x + shift / 2) % 30 + y % 8) as u8);
        }
    }
    Picture {
        width,
        height,
        data,
    }
}

/// Textured scene: blocks of seeded noise over a ramp, moved by `(dx, dy)`.
pub fn textured(width: usize, height: usize, dx: usize, dy: usize) -> Picture {
    let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
    let (tw, th) = (width + 64, height + 64);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let texture: Vec<u8> = (0..tw * th)
        .map(|i| {
            let (x, y) = (i % tw, i / tw);
            let base = ((x / 8 + y / 8) % 2) as u8 * 60 + 70;
            base.wrapping_add(rng.gen_range(0..24))
        })
        .collect();
    let mut data = Vec::with_capacity(width * height + 2 * cw * ch);
    for y in 0..height {
        for x in 0..width {
            data.push(texture[(y + 32 - dy.min(32)) * tw + x + 32 - dx.min(32)]);
        }
    }
    data.extend(core::iter::repeat(118).take(cw * ch));
    data.extend(core::iter::repeat(136).take(cw * ch));
    Picture {
        width,
        height,
        data,
    }
}

/// Fields of the 3-byte frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTag {
    pub keyframe: bool,
    pub version: u8,
    pub show: bool,
    pub first_partition_size: usize,
}

pub fn parse_tag(data: &[u8]) -> FrameTag {
    let raw = u32::from(data[0]) | u32::from(data[1]) << 8 | u32::from(data[2]) << 16;
    FrameTag {
        keyframe: raw & 1 == 0,
        version: ((raw >> 1) & 7) as u8,
        show: (raw >> 4) & 1 == 1,
        first_partition_size: (raw >> 5) as usize,
    }
}

/// Wraps a keyframe in a minimal RIFF/WebP container.
pub fn wrap_webp(vp8: &[u8]) -> Vec<u8> {
    let padded = vp8.len() + (vp8.len() & 1);
    let mut out = Vec::with_capacity(20 + padded);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((12 + padded) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBPVP8 ");
    out.extend_from_slice(&(vp8.len() as u32).to_le_bytes());
    out.extend_from_slice(vp8);
    if vp8.len() & 1 == 1 {
        out.push(0);
    }
    out
}

/// Decodes a keyframe with `image-webp`; returns RGB samples.
pub fn decode_keyframe(vp8: &[u8]) -> (u32, u32, Vec<u8>) {
    let webp = wrap_webp(vp8);
    let mut decoder = image_webp::WebPDecoder::new(std::io::Cursor::new(&webp)).unwrap();
    let (width, height) = decoder.dimensions();
    let mut rgb = vec![0u8; decoder.output_buffer_size().unwrap()];
    decoder.read_image(&mut rgb).unwrap();
    (width, height, rgb)
}

/// BT.601 limited-range conversion of the picture, nearest chroma sample.
pub fn to_rgb(picture: &Picture) -> Vec<u8> {
    let mut out = Vec::with_capacity(picture.width * picture.height * 3);
    for y in 0..picture.height {
        for x in 0..picture.width {
            let luma = 1.164 * (f64::from(picture.y(x, y)) - 16.0);
            let u = f64::from(picture.u(x / 2, y / 2)) - 128.0;
            let v = f64::from(picture.v(x / 2, y / 2)) - 128.0;
            for c in [
                luma + 1.596 * v,
                luma - 0.392 * u - 0.813 * v,
                luma + 2.017 * u,
            ] {
                out.push(c.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    out
}

pub fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let total: u64 = a.iter().zip(b).map(|(&x, &y)| u64::from(x.abs_diff(y))).sum();
    total as f64 / a.len() as f64
}

/// Luma PSNR between two planes of the same visible size.
pub fn luma_psnr(a: &zenvp8::PlaneView<'_>, b: &zenvp8::PlaneView<'_>) -> f64 {
    let mut sse = 0u64;
    for y in 0..a.height {
        for (&p, &q) in a.row(y)[..a.width].iter().zip(&b.row(y)[..b.width]) {
            sse += u64::from(p.abs_diff(q)).pow(2);
        }
    }
    if sse == 0 {
        return 99.0;
    }
    let mse = sse as f64 / (a.width * a.height) as f64;
    10.0 * (255.0 * 255.0 / mse).log10()
}
