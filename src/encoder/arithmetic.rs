//! Boolean entropy encoder (RFC 6386 §7).
//!
//! Every bit of a compressed partition goes through [`BoolEncoder`]. The
//! encoder keeps a 24-bit window of not-yet-final output in `bottom`; carries
//! out of that window ripple back into bytes already pushed to the buffer.

use alloc::vec::Vec;

use super::api::EncodeError;

pub(crate) struct BoolEncoder {
    /// the entropy values that have been encoded so far
    writer: Vec<u8>,
    /// largest number of bytes the partition may take
    limit: usize,
    /// bytes dropped because of `limit`
    overflow: usize,
    /// value of the current bytes being encoded
    bottom: u32,
    /// the range for the next bit, must be between 128 and 255 inclusive
    range: u32,
    /// number of bits left before the next byte is complete
    bit_num: i32,
}

impl Default for BoolEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BoolEncoder {
    /// Encoder without an output limit.
    pub(crate) fn new() -> Self {
        Self::start(usize::MAX)
    }

    /// Encoder that refuses to grow past `limit` bytes.
    pub(crate) fn start(limit: usize) -> Self {
        Self {
            writer: Vec::with_capacity(limit.min(1 << 16)),
            limit,
            overflow: 0,
            bottom: 0,
            range: 255,
            bit_num: 24,
        }
    }

    fn push_byte(&mut self, byte: u8) {
        if self.writer.len() < self.limit {
            self.writer.push(byte);
        } else {
            self.overflow += 1;
        }
    }

    // Carry into emitted output: trailing 0xFF bytes wrap to 0x00.
    fn add_one_to_output(&mut self) {
        let mut i = self.writer.len();
        while i > 0 {
            i -= 1;
            if self.writer[i] < 255 {
                self.writer[i] += 1;
                return;
            }
            self.writer[i] = 0;
        }
        // `bottom` never exceeds the coded interval, so the first byte absorbs any carry.
        panic!("bool encoder carry overflowed the partition start");
    }

    /// Encodes `bit` where `probability / 256` is the chance of a zero.
    pub(crate) fn encode_bool(&mut self, bit: bool, probability: u8) {
        debug_assert!(probability > 0, "zero probability");
        let split = 1 + (((self.range - 1) * u32::from(probability)) >> 8);

        if bit {
            self.bottom += split;
            self.range -= split;
        } else {
            self.range = split;
        }

        while self.range < 128 {
            self.range <<= 1;

            if self.bottom & (1 << 31) != 0 {
                self.add_one_to_output();
            }
            self.bottom <<= 1;

            self.bit_num -= 1;
            if self.bit_num == 0 {
                let new_value = (self.bottom >> 24) as u8;
                self.push_byte(new_value);
                // only keep low 3 bytes
                self.bottom &= (1 << 24) - 1;
                self.bit_num = 8;
            }
        }
        debug_assert!((128..=255).contains(&self.range));
    }

    /// Encodes a bit with even odds.
    pub(crate) fn encode_flag(&mut self, flag: bool) {
        self.encode_bool(flag, 128);
    }

    /// Encodes the low `num_bits` of `value`, most significant first.
    pub(crate) fn encode_literal(&mut self, value: u32, num_bits: u8) {
        for bit in (0..num_bits).rev() {
            self.encode_bool((value >> bit) & 1 != 0, 128);
        }
    }

    /// Presence flag, then magnitude and sign when present.
    pub(crate) fn encode_optional_signed(&mut self, num_bits: u8, value: Option<i8>) {
        self.encode_flag(value.is_some());
        if let Some(value) = value {
            self.encode_literal(u32::from(value.unsigned_abs()), num_bits);
            self.encode_flag(value < 0);
        }
    }

    /// Flushes the pending window and returns the partition bytes.
    pub(crate) fn stop(mut self) -> Result<Vec<u8>, EncodeError> {
        let mut c = self.bit_num;
        let mut v = self.bottom;
        if self.bottom & (1 << (32 - self.bit_num)) != 0 {
            self.add_one_to_output();
        }
        v <<= c & 0b111;
        c = (c >> 3) - 1;
        while c >= 0 {
            v <<= 8;
            c -= 1;
        }
        c = 3;
        while c >= 0 {
            self.push_byte((v >> 24) as u8);
            v <<= 8;
            c -= 1;
        }
        if self.overflow > 0 {
            return Err(EncodeError::BufferExhausted {
                needed: self.limit + self.overflow,
                available: self.limit,
            });
        }
        Ok(self.writer)
    }
}
