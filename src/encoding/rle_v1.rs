//! Legacy run-length integer encoding (version 1).
//!
//! Frames:
//!
//! ```text
//! [header = length - 3 (0..=127)] [delta: i8] [base: varint]    run
//! [header = -length (-1..=-128)] [varint...]                    literal
//! ```
//!
//! A run is an arithmetic sequence of 3..=130 values with a constant delta
//! in -128..=127. Varints are zig-zag encoded when the stream is signed.

use bytes::Bytes;

use super::varint::{read_svarint, read_uvarint, write_svarint, write_uvarint};
use super::{ByteReader, IntegerReader, MIN_REPEAT_SIZE};
use crate::error::Result;
use crate::outstream::OutStream;

const MAX_LITERAL_SIZE: usize = 128;
const MAX_REPEAT_SIZE: usize = 127 + MIN_REPEAT_SIZE;
const MIN_DELTA: i64 = -128;
const MAX_DELTA: i64 = 127;

/// Writes integers with the legacy run/literal framing.
pub struct IntRleV1Writer {
    out: OutStream,
    signed: bool,
    literals: [i64; MAX_LITERAL_SIZE],
    num_literals: usize,
    delta: i64,
    repeat: bool,
    tail_run_length: usize,
}

impl IntRleV1Writer {
    /// Creates a writer emitting into `out`. Signed streams zig-zag their
    /// varints.
    pub fn new(out: OutStream, signed: bool) -> Self {
        Self {
            out,
            signed,
            literals: [0; MAX_LITERAL_SIZE],
            num_literals: 0,
            delta: 0,
            repeat: false,
            tail_run_length: 0,
        }
    }

    /// Appends one integer.
    pub fn write_int(&mut self, value: i64) -> Result<()> {
        if self.num_literals == 0 {
            self.literals[0] = value;
            self.num_literals = 1;
            self.tail_run_length = 1;
        } else if self.repeat {
            let expected = self.literals[0]
                .wrapping_add(self.delta.wrapping_mul(self.num_literals as i64));
            if value == expected {
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
            if self.tail_run_length == 1 {
                self.delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
                if (MIN_DELTA..=MAX_DELTA).contains(&self.delta) {
                    self.tail_run_length = 2;
                }
            } else if value == self.literals[self.num_literals - 1].wrapping_add(self.delta) {
                self.tail_run_length += 1;
            } else {
                self.delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
                if (MIN_DELTA..=MAX_DELTA).contains(&self.delta) {
                    self.tail_run_length = 2;
                } else {
                    self.tail_run_length = 1;
                }
            }
            if self.tail_run_length == MIN_REPEAT_SIZE {
                if self.num_literals + 1 == MIN_REPEAT_SIZE {
                    self.repeat = true;
                    self.num_literals += 1;
                } else {
                    // Flush the literal prefix, then open the run with its
                    // first value.
                    self.num_literals -= MIN_REPEAT_SIZE - 1;
                    let base = self.literals[self.num_literals];
                    self.write_values()?;
                    self.literals[0] = base;
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
                self.out.put_u8(self.delta as i8 as u8)?;
                self.write_varint(self.literals[0])?;
            } else {
                self.out.put_u8(0u8.wrapping_sub(self.num_literals as u8))?;
                for i in 0..self.num_literals {
                    self.write_varint(self.literals[i])?;
                }
            }
            self.repeat = false;
            self.num_literals = 0;
            self.tail_run_length = 0;
        }
        Ok(())
    }

    fn write_varint(&mut self, value: i64) -> Result<()> {
        if self.signed {
            write_svarint(&mut self.out, value)
        } else {
            write_uvarint(&mut self.out, value as u64)
        }
    }

    /// Emits any pending frame.
    pub fn flush(&mut self) -> Result<()> {
        self.write_values()
    }

    /// Appends the stream positions plus the count of buffered values.
    pub fn record_positions(&self, out: &mut Vec<u64>) {
        self.out.record_positions(out);
        out.push(self.num_literals as u64);
    }

    /// Flushes pending values and returns the finished stream bytes.
    pub fn finish(&mut self) -> Result<Bytes> {
        self.write_values()?;
        self.out.finish()
    }
}

/// Reads integers with the legacy run/literal framing.
pub struct IntRleV1Reader {
    input: ByteReader,
    signed: bool,
    run_value: i64,
    run_delta: i64,
    run_left: usize,
    literals_left: usize,
    first_of_run: bool,
}

impl IntRleV1Reader {
    /// Creates a reader over a fully decompressed stream.
    pub fn new(data: Bytes, signed: bool) -> Self {
        Self {
            input: ByteReader::new(data),
            signed,
            run_value: 0,
            run_delta: 0,
            run_left: 0,
            literals_left: 0,
            first_of_run: false,
        }
    }

    fn read_varint(&mut self) -> Result<i64> {
        if self.signed {
            read_svarint(&mut self.input)
        } else {
            read_uvarint(&mut self.input).map(|v| v as i64)
        }
    }
}

impl IntegerReader for IntRleV1Reader {
    fn next_int(&mut self) -> Result<Option<i64>> {
        if self.run_left > 0 {
            self.run_left -= 1;
            if self.first_of_run {
                self.first_of_run = false;
            } else {
                self.run_value = self.run_value.wrapping_add(self.run_delta);
            }
            return Ok(Some(self.run_value));
        }
        if self.literals_left > 0 {
            self.literals_left -= 1;
            return Ok(Some(self.read_varint()?));
        }
        let header = match self.input.next_u8() {
            Some(b) => b,
            None => return Ok(None),
        };
        if (header as i8) >= 0 {
            self.run_left = header as usize + MIN_REPEAT_SIZE;
            self.run_delta = self.input.expect_u8("integer run delta")? as i8 as i64;
            self.run_value = self.read_varint()?;
            self.first_of_run = true;
        } else {
            self.literals_left = (header as i8).unsigned_abs() as usize;
        }
        self.next_int()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CompressionKind;

    use super::*;

    fn encode(input: &[i64], signed: bool) -> Vec<u8> {
        let mut w = IntRleV1Writer::new(OutStream::new(CompressionKind::None, 1024), signed);
        for &v in input {
            w.write_int(v).unwrap();
        }
        w.finish().unwrap().to_vec()
    }

    fn decode(input: &[u8], signed: bool) -> Vec<i64> {
        let mut r = IntRleV1Reader::new(Bytes::copy_from_slice(input), signed);
        let mut out = Vec::new();
        while let Some(v) = r.next_int().unwrap() {
            out.push(v);
        }
        out
    }

    #[test]
    fn test_read_constant_run() {
        // 100 copies of 7: header 0x61, delta 0, base 7.
        assert_eq!(decode(&[0x61, 0x00, 0x07], false), vec![7i64; 100]);
    }

    #[test]
    fn test_read_descending_run() {
        // 100 values starting at 100 with delta -1.
        let expected: Vec<i64> = (0..100).map(|i| 100 - i).collect();
        assert_eq!(decode(&[0x61, 0xff, 0x64], false), expected);
    }

    #[test]
    fn test_read_literals() {
        assert_eq!(
            decode(&[0xfb, 0x02, 0x03, 0x04, 0x07, 0x0b], false),
            vec![2, 3, 4, 7, 11]
        );
    }

    #[test]
    fn test_write_constant_run() {
        assert_eq!(encode(&vec![7i64; 100], false), vec![0x61, 0x00, 0x07]);
    }

    #[test]
    fn test_write_descending_run() {
        let input: Vec<i64> = (0..100).map(|i| 100 - i).collect();
        assert_eq!(encode(&input, false), vec![0x61, 0xff, 0x64]);
    }

    #[test]
    fn test_write_mixed_run_and_literals() {
        // 2, 3, 4 form an arithmetic run; 7 and 11 spill into a literal.
        assert_eq!(
            encode(&[2, 3, 4, 7, 11], false),
            vec![0x00, 0x01, 0x02, 0xfe, 0x07, 0x0b]
        );
    }

    #[test]
    fn test_write_literals() {
        assert_eq!(
            encode(&[13, 2, 8, 5], false),
            vec![0xfc, 0x0d, 0x02, 0x08, 0x05]
        );
    }

    #[test]
    fn test_signed_round_trip() {
        let input = vec![-3i64, -2, -1, 0, 1, 2, 900, -900, 17];
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_round_trip_random() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<i64> = (0..100_000).map(|_| rng.random_range(0..1_000_000)).collect();
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_round_trip_runs() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<i64> = (0..100_000).map(|_| rng.random_range(0..2)).collect();
        assert_eq!(decode(&encode(&input, true), true), input);
    }
}
