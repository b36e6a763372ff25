//! Lambda calculation for rate-distortion optimization.
//!
//! Lambda values control the rate-distortion trade-off in mode selection.
//! Higher lambda = prefer lower rate (smaller frames).
//! Lower lambda = prefer lower distortion (better quality).
//!
//! Rates are in 1/256 bit; scores compare `rate * lambda + 256 * sse`.

/// Rate multiplier from the luma DC step: `2.80 * q²` with q capped at 160.
#[inline]
pub(crate) fn rd_lambda(q_dc: u16) -> u64 {
    let q = u64::from(q_dc.min(160));
    (280 * q * q / 100).max(1)
}

/// RD score of a candidate.
#[inline]
pub(crate) fn rd_score(rate: u32, sse: u64, lambda: u64) -> u64 {
    u64::from(rate) * lambda + 256 * sse
}

/// Weight of motion vector bits against SAD in the integer search.
#[inline]
pub(crate) fn sad_per_bit(qindex: u8) -> u32 {
    2 + u32::from(qindex) / 10
}

/// Weight of motion vector bits against SSE in the sub-pixel search.
#[inline]
pub(crate) fn error_per_bit(lambda: u64) -> u32 {
    (lambda >> 7).clamp(1, u64::from(u32::MAX)) as u32
}

/// Motion-vector rate (1/256 bit) scaled by a per-bit weight, in distortion units.
#[inline]
pub(crate) fn mv_penalty(mv_cost: u32, per_bit: u32) -> u32 {
    ((u64::from(mv_cost) * u64::from(per_bit) + 128) >> 8) as u32
}

/// Starting loop filter level for a quantizer index, before the SSE search.
#[inline]
pub(crate) fn filter_level_guess(qindex: u8) -> u8 {
    match qindex {
        0..=6 => 0,
        7..=16 => 1,
        _ => (qindex / 8).min(63),
    }
}

/// Distortion below which a zero-residual inter candidate ends the search.
#[inline]
pub(crate) fn zero_residual_threshold(q_ac: u16) -> u64 {
    let q = u64::from(q_ac);
    (q * q) >> 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_grows_with_q_and_saturates() {
        assert_eq!(rd_lambda(4), 44);
        assert!(rd_lambda(50) < rd_lambda(100));
        assert_eq!(rd_lambda(200), rd_lambda(160));
    }

    #[test]
    fn per_bit_weights() {
        assert_eq!(sad_per_bit(0), 2);
        assert_eq!(sad_per_bit(127), 14);
        assert_eq!(error_per_bit(10), 1);
        assert_eq!(error_per_bit(1280), 10);
        // 3 bits at 4 per bit.
        assert_eq!(mv_penalty(3 * 256, 4), 12);
    }

    #[test]
    fn filter_guess_is_monotonic() {
        assert_eq!(filter_level_guess(0), 0);
        assert_eq!(filter_level_guess(10), 1);
        let mut last = 0;
        for q in 0..=127 {
            let l = filter_level_guess(q);
            assert!(l >= last);
            last = l;
        }
        assert_eq!(last, 15);
    }
}
