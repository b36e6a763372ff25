//! Little-endian writes into a `Vec<u8>` without `std::io`.

use alloc::vec::Vec;

/// Extension trait for assembling the uncompressed frame prefix.
pub(crate) trait VecWriter {
    /// Append a slice to the buffer.
    fn write_all(&mut self, data: &[u8]);

    /// Write a u16 in little-endian.
    fn write_u16_le(&mut self, v: u16);

    /// Write a u24 (3 bytes) in little-endian.
    fn write_u24_le(&mut self, v: u32);
}

impl VecWriter for Vec<u8> {
    #[inline]
    fn write_all(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }

    #[inline]
    fn write_u16_le(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn write_u24_le(&mut self, v: u32) {
        debug_assert!(v < 1 << 24);
        let bytes = v.to_le_bytes();
        self.extend_from_slice(&bytes[..3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian() {
        let mut out = Vec::new();
        out.write_u16_le(0x0102);
        out.write_u24_le(0x030405);
        out.write_all(&[7, 8]);
        assert_eq!(out, [0x02, 0x01, 0x05, 0x04, 0x03, 7, 8]);
    }
}
