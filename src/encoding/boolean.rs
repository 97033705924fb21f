//! Bit-level run-length encoding for booleans and present bitmaps.
//!
//! A 1-bit protocol layered on byte RLE: bits are packed MSB-first into
//! bytes, each complete byte is handed to the byte-RLE writer, and a partial
//! final byte is zero padded. The reader can therefore produce up to seven
//! trailing garbage bits; the stripe row count drives truncation in the
//! consumer.

use bytes::Bytes;

use super::byte_rle::{ByteRleReader, ByteRleWriter};
use crate::error::Result;
use crate::outstream::OutStream;

/// Encodes booleans one bit at a time over byte RLE.
pub struct BooleanRleWriter {
    inner: ByteRleWriter,
    data: u8,
    bits_in_data: usize,
}

impl BooleanRleWriter {
    /// Creates a writer emitting into `out`.
    pub fn new(out: OutStream) -> Self {
        Self { inner: ByteRleWriter::new(out), data: 0, bits_in_data: 0 }
    }

    /// Appends one boolean.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        if value {
            self.data |= 1 << (7 - self.bits_in_data);
        }
        self.bits_in_data += 1;
        if self.bits_in_data == 8 {
            self.inner.write_byte(self.data)?;
            self.data = 0;
            self.bits_in_data = 0;
        }
        Ok(())
    }

    /// Appends the inner positions plus the number of bits pending in the
    /// current byte.
    pub fn record_positions(&self, out: &mut Vec<u64>) {
        self.inner.record_positions(out);
        out.push(self.bits_in_data as u64);
    }

    /// Bytes currently buffered, for stripe sizing.
    pub fn buffered_len(&self) -> usize {
        self.inner.buffered_len() + 1
    }

    /// Flushes the zero-padded partial byte, then the inner writer, and
    /// returns the finished stream bytes.
    pub fn finish(&mut self) -> Result<Bytes> {
        if self.bits_in_data > 0 {
            self.inner.write_byte(self.data)?;
            self.data = 0;
            self.bits_in_data = 0;
        }
        self.inner.finish()
    }
}

/// Decodes booleans one bit at a time from byte RLE.
pub struct BooleanRleReader {
    inner: ByteRleReader,
    data: u8,
    bits_left: usize,
}

impl BooleanRleReader {
    /// Creates a reader over a fully decompressed stream.
    pub fn new(data: Bytes) -> Self {
        Self { inner: ByteRleReader::new(data), data: 0, bits_left: 0 }
    }

    /// Returns the next bit, or `None` at end of stream. The final byte's
    /// padding bits are indistinguishable from data at this layer.
    pub fn next_bool(&mut self) -> Result<Option<bool>> {
        if self.bits_left == 0 {
            match self.inner.next_byte()? {
                Some(b) => {
                    self.data = b;
                    self.bits_left = 8;
                }
                None => return Ok(None),
            }
        }
        let value = self.data & 0x80 != 0;
        self.data <<= 1;
        self.bits_left -= 1;
        Ok(Some(value))
    }

    /// Decodes and discards `n` bits.
    pub fn skip_bools(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.next_bool()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CompressionKind;

    use super::*;

    fn encode(input: &[bool]) -> Vec<u8> {
        let mut w = BooleanRleWriter::new(OutStream::new(CompressionKind::None, 1024));
        for &b in input {
            w.write_bool(b).unwrap();
        }
        w.finish().unwrap().to_vec()
    }

    fn decode(input: &[u8], count: usize) -> Vec<bool> {
        let mut r = BooleanRleReader::new(Bytes::copy_from_slice(input));
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(r.next_bool().unwrap().unwrap());
        }
        out
    }

    #[test]
    fn test_single_byte() {
        let input = [true, false, false, false, false, false, false, false];
        assert_eq!(encode(&input), vec![0xff, 0x80]);
        assert_eq!(decode(&[0xff, 0x80], 8), input);
    }

    #[test]
    fn test_partial_byte_zero_padded() {
        // Three bits written: 101 packed into the high bits.
        let encoded = encode(&[true, false, true]);
        assert_eq!(encoded, vec![0xff, 0xa0]);
        assert_eq!(decode(&encoded, 3), vec![true, false, true]);
    }

    #[test]
    fn test_all_true_run() {
        let input = vec![true; 80];
        // Ten 0xff bytes become a byte-level run.
        assert_eq!(encode(&input), vec![0x07, 0xff]);
        assert_eq!(decode(&[0x07, 0xff], 80), input);
    }

    #[test]
    fn test_round_trip_random() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<bool> = (0..10_000).map(|_| rng.random()).collect();
        let encoded = encode(&input);
        assert_eq!(decode(&encoded, input.len()), input);
    }

    #[test]
    fn test_trailing_garbage_bits_are_readable() {
        // 9 bits written, 16 stored. The count-aware caller stops at 9; the
        // remaining 7 decode as false.
        let mut input = vec![true; 9];
        let encoded = encode(&input);
        let mut r = BooleanRleReader::new(Bytes::from(encoded));
        let mut total = 0;
        while r.next_bool().unwrap().is_some() {
            total += 1;
        }
        assert_eq!(total, 16);
        input.extend(std::iter::repeat(false).take(7));
        let encoded = encode(&input[..9]);
        assert_eq!(decode(&encoded, 16), input);
    }
}
