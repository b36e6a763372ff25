//! Block distortion metrics over strided sample buffers.
//!
//! - SSE drives every mode decision score
//! - SAD drives the integer motion search

/// Sum of squared differences of a `w`×`h` block.
#[inline]
pub(crate) fn sse(a: &[u8], a_stride: usize, b: &[u8], b_stride: usize, w: usize, h: usize) -> u64 {
    let mut sum = 0u64;
    for y in 0..h {
        let ra = &a[y * a_stride..][..w];
        let rb = &b[y * b_stride..][..w];
        sum += ra
            .iter()
            .zip(rb)
            .map(|(&x, &y)| {
                let d = i32::from(x) - i32::from(y);
                (d * d) as u64
            })
            .sum::<u64>();
    }
    sum
}

/// Sum of absolute differences of a `w`×`h` block.
///
/// Stops early once the running sum reaches `limit`, returning a value `>= limit`.
#[inline]
pub(crate) fn sad(
    a: &[u8],
    a_stride: usize,
    b: &[u8],
    b_stride: usize,
    w: usize,
    h: usize,
    limit: u32,
) -> u32 {
    let mut sum = 0u32;
    for y in 0..h {
        let ra = &a[y * a_stride..][..w];
        let rb = &b[y * b_stride..][..w];
        sum += ra
            .iter()
            .zip(rb)
            .map(|(&x, &y)| u32::from(x.abs_diff(y)))
            .sum::<u32>();
        if sum >= limit {
            break;
        }
    }
    sum
}

/// Variance of a 16×16 block, times 256.
pub(crate) fn variance_16x16(src: &[u8], stride: usize) -> u32 {
    let mut sum = 0u32;
    let mut sq = 0u32;
    for y in 0..16 {
        for &p in &src[y * stride..][..16] {
            sum += u32::from(p);
            sq += u32::from(p) * u32::from(p);
        }
    }
    sq - ((sum * sum) >> 8)
}

/// Luma PSNR in dB for a total squared error over `samples` pixels, capped at 99.
pub(crate) fn psnr(sse: u64, samples: usize) -> f64 {
    if sse == 0 || samples == 0 {
        return 99.0;
    }
    let mse = sse as f64 / samples as f64;
    (10.0 * libm::log10(255.0 * 255.0 / mse)).min(99.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_and_sad_on_known_blocks() {
        let a = [10u8; 32];
        let mut b = [10u8; 32];
        b[0] = 13;
        b[17] = 6;
        assert_eq!(sse(&a, 8, &b, 8, 4, 4), 9 + 16);
        assert_eq!(sad(&a, 8, &b, 8, 4, 4, u32::MAX), 7);
        // b[17] is row 2 with stride 8: outside a 4x2 block.
        assert_eq!(sad(&a, 8, &b, 8, 4, 2, u32::MAX), 3);
    }

    #[test]
    fn sad_stops_at_the_limit() {
        let a = [0u8; 256];
        let b = [255u8; 256];
        let full = sad(&a, 16, &b, 16, 16, 16, u32::MAX);
        assert_eq!(full, 255 * 256);
        let early = sad(&a, 16, &b, 16, 16, 16, 1000);
        assert!(early >= 1000 && early < full);
    }

    #[test]
    fn flat_block_has_zero_variance() {
        assert_eq!(variance_16x16(&[77u8; 256], 16), 0);
        let mut ramp = [0u8; 256];
        for (i, p) in ramp.iter_mut().enumerate() {
            *p = (i % 2) as u8 * 2;
        }
        // Values 0 and 2 in equal share: variance 1 per pixel.
        assert_eq!(variance_16x16(&ramp, 16), 256);
    }

    #[test]
    fn psnr_caps_identical_frames() {
        assert_eq!(psnr(0, 100), 99.0);
        let p = psnr(100, 100);
        assert!((p - 48.13).abs() < 0.01);
    }
}
