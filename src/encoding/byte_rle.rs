//! Run-length encoding of bytes.
//!
//! Frames alternate between two forms:
//!
//! ```text
//! [header = length - 3 (0..=127)] [byte]          repeat run, 3..=130 bytes
//! [header = -length   (-1..=-128)] [bytes...]     literal, 1..=128 bytes
//! ```
//!
//! Runs shorter than three bytes are folded into literals.

use bytes::Bytes;

use super::{ByteReader, MIN_REPEAT_SIZE};
use crate::error::Result;
use crate::outstream::OutStream;

/// Maximum number of bytes in a literal frame.
pub const MAX_LITERAL_SIZE: usize = 128;

/// Maximum number of bytes in a repeat frame.
pub const MAX_REPEAT_SIZE: usize = 127 + MIN_REPEAT_SIZE;

/// Encodes a byte stream with run-length framing into an [`OutStream`].
pub struct ByteRleWriter {
    out: OutStream,
    literals: [u8; MAX_LITERAL_SIZE],
    num_literals: usize,
    repeat: bool,
    tail_run_length: usize,
}

impl ByteRleWriter {
    /// Creates a writer emitting frames into `out`.
    pub fn new(out: OutStream) -> Self {
        Self {
            out,
            literals: [0; MAX_LITERAL_SIZE],
            num_literals: 0,
            repeat: false,
            tail_run_length: 0,
        }
    }

    /// Appends one byte.
    pub fn write_byte(&mut self, value: u8) -> Result<()> {
        if self.num_literals == 0 {
            self.literals[0] = value;
            self.num_literals = 1;
            self.tail_run_length = 1;
        } else if self.repeat {
            if value == self.literals[0] {
                self.num_literals += 1;
                if self.num_literals == MAX_REPEAT_SIZE {
                    self.write_values()?;
                }
            } else {
                self.write_values()?;
                self.literals[0] = value;
                self.num_literals = 1;
                self.tail_run_length = 1;
            }
        } else {
            if value == self.literals[self.num_literals - 1] {
                self.tail_run_length += 1;
            } else {
                self.tail_run_length = 1;
            }
            if self.tail_run_length == MIN_REPEAT_SIZE {
                if self.num_literals + 1 == MIN_REPEAT_SIZE {
                    self.repeat = true;
                    self.num_literals += 1;
                } else {
                    // Flush the literal prefix and open a run with the tail.
                    self.num_literals -= MIN_REPEAT_SIZE - 1;
                    self.write_values()?;
                    self.literals[0] = value;
                    self.repeat = true;
                    self.num_literals = MIN_REPEAT_SIZE;
                }
            } else {
                self.literals[self.num_literals] = value;
                self.num_literals += 1;
                if self.num_literals == MAX_LITERAL_SIZE {
                    self.write_values()?;
                }
            }
        }
        Ok(())
    }

    fn write_values(&mut self) -> Result<()> {
        if self.num_literals != 0 {
            if self.repeat {
                self.out.put_u8((self.num_literals - MIN_REPEAT_SIZE) as u8)?;
                self.out.put_u8(self.literals[0])?;
            } else {
                self.out.put_u8(0u8.wrapping_sub(self.num_literals as u8))?;
                self.out.put(&self.literals[..self.num_literals])?;
            }
            self.repeat = false;
            self.tail_run_length = 0;
            self.num_literals = 0;
        }
        Ok(())
    }

    /// Emits any pending frame.
    pub fn flush(&mut self) -> Result<()> {
        self.write_values()
    }

    /// Appends the stream's position snapshot plus the count of values held
    /// in the unflushed frame.
    pub fn record_positions(&self, out: &mut Vec<u64>) {
        self.out.record_positions(out);
        out.push(self.num_literals as u64);
    }

    /// Bytes currently buffered, for stripe sizing.
    pub fn buffered_len(&self) -> usize {
        self.out.buffered_len() + self.num_literals
    }

    /// Flushes pending values and returns the finished stream bytes.
    pub fn finish(&mut self) -> Result<Bytes> {
        self.write_values()?;
        self.out.finish()
    }
}

/// Decodes a run-length encoded byte stream.
pub struct ByteRleReader {
    input: ByteReader,
    repeat_byte: u8,
    repeats_left: usize,
    literals_left: usize,
}

impl ByteRleReader {
    /// Creates a reader over a fully decompressed stream.
    pub fn new(data: Bytes) -> Self {
        Self {
            input: ByteReader::new(data),
            repeat_byte: 0,
            repeats_left: 0,
            literals_left: 0,
        }
    }

    /// Returns the next byte, or `None` at the end of the stream.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.repeats_left > 0 {
            self.repeats_left -= 1;
            return Ok(Some(self.repeat_byte));
        }
        if self.literals_left > 0 {
            self.literals_left -= 1;
            return Ok(Some(self.input.expect_u8("byte run literal")?));
        }
        let header = match self.input.next_u8() {
            Some(b) => b,
            None => return Ok(None),
        };
        if (header as i8) >= 0 {
            self.repeats_left = header as usize + MIN_REPEAT_SIZE;
            self.repeat_byte = self.input.expect_u8("byte run value")?;
        } else {
            self.literals_left = (header as i8).unsigned_abs() as usize;
        }
        self.next_byte()
    }

    /// Decodes and discards `n` bytes.
    pub fn skip_bytes(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.next_byte()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CompressionKind;

    use super::*;

    fn writer() -> ByteRleWriter {
        ByteRleWriter::new(OutStream::new(CompressionKind::None, 1024))
    }

    fn encode(input: &[u8]) -> Vec<u8> {
        let mut w = writer();
        for &b in input {
            w.write_byte(b).unwrap();
        }
        w.finish().unwrap().to_vec()
    }

    fn decode(input: &[u8]) -> Vec<u8> {
        let mut r = ByteRleReader::new(Bytes::copy_from_slice(input));
        let mut out = Vec::new();
        while let Some(b) = r.next_byte().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_literal_frame() {
        assert_eq!(encode(&[0x44, 0x45]), vec![0xfe, 0x44, 0x45]);
        assert_eq!(decode(&[0xfe, 0x44, 0x45]), vec![0x44, 0x45]);
    }

    #[test]
    fn test_run_frame() {
        assert_eq!(encode(&[0u8; 100]), vec![0x61, 0x00]);
        assert_eq!(decode(&[0x61, 0x00]), vec![0u8; 100]);
    }

    #[test]
    fn test_short_run_of_four() {
        assert_eq!(encode(&[1, 1, 1, 1]), vec![0x01, 0x01]);
        assert_eq!(decode(&[0x01, 0x01]), vec![1u8; 4]);
    }

    #[test]
    fn test_literal_then_run() {
        // Two distinct bytes followed by a run: literal frame then run frame.
        let mut input = vec![9u8, 7];
        input.extend(std::iter::repeat(5u8).take(10));
        let encoded = encode(&input);
        assert_eq!(encoded, vec![0xfe, 0x09, 0x07, 0x07, 0x05]);
        assert_eq!(decode(&encoded), input);
    }

    #[test]
    fn test_max_run_splits() {
        let input = vec![3u8; 200];
        let encoded = encode(&input);
        // 130 byte run then a 70 byte run.
        assert_eq!(encoded, vec![127, 3, 67, 3]);
        assert_eq!(decode(&encoded), input);
    }

    #[test]
    fn test_round_trip_random() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<u8> = (0..10_000).map(|_| rng.random_range(0..2)).collect();
        assert_eq!(decode(&encode(&input)), input);
    }

    #[test]
    fn test_truncated_run() {
        let mut r = ByteRleReader::new(Bytes::from_static(&[0x61]));
        assert!(r.next_byte().is_err());
    }
}
