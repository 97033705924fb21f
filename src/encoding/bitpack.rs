//! Fixed-width bit packing.
//!
//! Values are packed MSB-first, big-endian across bytes, at one of the
//! widths the format admits: 1..=24, 26, 28, 30, 32, 40, 48, 56 and 64
//! bits. Headers carry a 5-bit width code rather than the raw width.

use std::io::Write;

use super::ByteReader;
use crate::error::{Error, Result};

/// Maps a width onto the 5-bit code stored in run headers. Widths outside
/// the closed set round up to the next admitted width's code.
pub fn encode_bit_width(width: usize) -> usize {
    match width {
        1..=24 => width - 1,
        25..=26 => 24,
        27..=28 => 25,
        29..=30 => 26,
        31..=32 => 27,
        33..=40 => 28,
        41..=48 => 29,
        49..=56 => 30,
        _ => 31,
    }
}

/// Inverse of [`encode_bit_width`].
pub fn decode_bit_width(code: usize) -> usize {
    match code {
        0..=23 => code + 1,
        24 => 26,
        25 => 28,
        26 => 30,
        27 => 32,
        28 => 40,
        29 => 48,
        30 => 56,
        _ => 64,
    }
}

/// Returns the admitted width at or above `width`.
pub fn closest_fixed_bits(width: usize) -> usize {
    match width {
        0 => 1,
        1..=24 => width,
        25..=26 => 26,
        27..=28 => 28,
        29..=30 => 30,
        31..=32 => 32,
        33..=40 => 40,
        41..=48 => 48,
        49..=56 => 56,
        _ => 64,
    }
}

/// Returns the byte-aligned admitted width at or above `width`. The writer
/// always packs at aligned widths so runs stay byte-addressable.
pub fn closest_aligned_fixed_bits(width: usize) -> usize {
    match width {
        0..=1 => 1,
        2 => 2,
        3..=4 => 4,
        5..=8 => 8,
        9..=16 => 16,
        17..=24 => 24,
        25..=32 => 32,
        33..=40 => 40,
        41..=48 => 48,
        49..=56 => 56,
        _ => 64,
    }
}

/// Returns the admitted width needed to represent `value`'s magnitude bits.
pub fn find_closest_num_bits(value: i64) -> usize {
    let mut count = 0;
    let mut v = value as u64;
    while v != 0 {
        count += 1;
        v >>= 1;
    }
    closest_fixed_bits(count)
}

fn check_width(width: usize) -> Result<()> {
    if width == 0 || width > 64 || closest_fixed_bits(width) != width {
        return Err(Error::corrupt(format!("invalid bit width {}", width)));
    }
    Ok(())
}

/// Packs `values` at `width` bits each into `out`.
pub fn write_ints<W: Write>(values: &[i64], width: usize, out: &mut W) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    check_width(width)?;
    match width {
        1 => return write_packed_1(values, out),
        2 => return write_packed_2(values, out),
        4 => return write_packed_4(values, out),
        8 | 16 | 24 | 32 | 40 | 48 | 56 | 64 => {
            return write_big_endian(values, width / 8, out)
        }
        _ => {}
    }

    let mut current: u8 = 0;
    let mut bits_left: usize = 8;
    for &v in values {
        let mut value = v as u64;
        let mut bits_to_write = width;
        while bits_to_write > bits_left {
            // Take the high bits of the value into the low bits of the
            // current byte.
            current |= (value >> (bits_to_write - bits_left)) as u8;
            bits_to_write -= bits_left;
            value &= (1u64 << bits_to_write) - 1;
            out.write_all(&[current])?;
            current = 0;
            bits_left = 8;
        }
        bits_left -= bits_to_write;
        current |= (value << bits_left) as u8;
        if bits_left == 0 {
            out.write_all(&[current])?;
            current = 0;
            bits_left = 8;
        }
    }
    if bits_left != 8 {
        out.write_all(&[current])?;
    }
    Ok(())
}

fn write_packed_1<W: Write>(values: &[i64], out: &mut W) -> Result<()> {
    for chunk in values.chunks(8) {
        let mut b: u8 = 0;
        let mut shift: u8 = 7;
        for &v in chunk {
            b |= ((v & 1) as u8) << shift;
            shift = shift.wrapping_sub(1);
        }
        out.write_all(&[b])?;
    }
    Ok(())
}

fn write_packed_2<W: Write>(values: &[i64], out: &mut W) -> Result<()> {
    for chunk in values.chunks(4) {
        let mut b: u8 = 0;
        let mut shift: u8 = 6;
        for &v in chunk {
            b |= ((v & 3) as u8) << shift;
            shift = shift.wrapping_sub(2);
        }
        out.write_all(&[b])?;
    }
    Ok(())
}

fn write_packed_4<W: Write>(values: &[i64], out: &mut W) -> Result<()> {
    for chunk in values.chunks(2) {
        let mut b = ((chunk[0] & 0xf) as u8) << 4;
        if chunk.len() > 1 {
            b |= (chunk[1] & 0xf) as u8;
        }
        out.write_all(&[b])?;
    }
    Ok(())
}

fn write_big_endian<W: Write>(values: &[i64], num_bytes: usize, out: &mut W) -> Result<()> {
    let mut buf = [0u8; 8];
    for &v in values {
        let value = v as u64;
        for (i, b) in buf[..num_bytes].iter_mut().enumerate() {
            *b = (value >> ((num_bytes - 1 - i) * 8)) as u8;
        }
        out.write_all(&buf[..num_bytes])?;
    }
    Ok(())
}

/// Unpacks `buffer.len()` values of `width` bits each from `input` into
/// `buffer`, starting at `offset`.
pub fn read_ints(
    buffer: &mut [i64],
    offset: usize,
    length: usize,
    width: usize,
    input: &mut ByteReader,
) -> Result<()> {
    check_width(width)?;
    let mut bits_left: usize = 0;
    let mut current: u64 = 0;
    for slot in buffer[offset..offset + length].iter_mut() {
        let mut result: u64 = 0;
        let mut bits_to_read = width;
        while bits_to_read > bits_left {
            result <<= bits_left;
            result |= current & ((1u64 << bits_left) - 1);
            bits_to_read -= bits_left;
            current = input.expect_u8("bit-packed run")? as u64;
            bits_left = 8;
        }
        if bits_to_read > 0 {
            result <<= bits_to_read;
            bits_left -= bits_to_read;
            result |= (current >> bits_left) & ((1u64 << bits_to_read) - 1);
        }
        *slot = result as i64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn round_trip(values: &[i64], width: usize) -> Vec<i64> {
        let mut buf = Vec::new();
        write_ints(values, width, &mut buf).unwrap();
        let mut out = vec![0i64; values.len()];
        let mut r = ByteReader::new(Bytes::from(buf));
        read_ints(&mut out, 0, values.len(), width, &mut r).unwrap();
        out
    }

    #[test]
    fn test_width_codes() {
        assert_eq!(encode_bit_width(1), 0);
        assert_eq!(encode_bit_width(24), 23);
        assert_eq!(encode_bit_width(25), 24);
        assert_eq!(encode_bit_width(33), 28);
        assert_eq!(encode_bit_width(64), 31);
        for code in 0..32 {
            assert_eq!(encode_bit_width(decode_bit_width(code)), code);
        }
    }

    #[test]
    fn test_closest_fixed_bits() {
        assert_eq!(closest_fixed_bits(0), 1);
        assert_eq!(closest_fixed_bits(7), 7);
        assert_eq!(closest_fixed_bits(25), 26);
        assert_eq!(closest_fixed_bits(31), 32);
        assert_eq!(closest_fixed_bits(57), 64);
    }

    #[test]
    fn test_closest_aligned_fixed_bits() {
        assert_eq!(closest_aligned_fixed_bits(3), 4);
        assert_eq!(closest_aligned_fixed_bits(7), 8);
        assert_eq!(closest_aligned_fixed_bits(8), 8);
        assert_eq!(closest_aligned_fixed_bits(9), 16);
        assert_eq!(closest_aligned_fixed_bits(20), 24);
    }

    #[test]
    fn test_find_closest_num_bits() {
        assert_eq!(find_closest_num_bits(0), 1);
        assert_eq!(find_closest_num_bits(1), 1);
        assert_eq!(find_closest_num_bits(6), 3);
        assert_eq!(find_closest_num_bits(2000), 11);
        assert_eq!(find_closest_num_bits(1_000_000), 20);
    }

    #[test]
    fn test_pack_3_bits() {
        // 8 values of 3 bits each span exactly 3 bytes.
        let values = [1i64, 2, 3, 4, 5, 6, 7, 0];
        let mut buf = Vec::new();
        write_ints(&values, 3, &mut buf).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(round_trip(&values, 3), values);
    }

    #[test]
    fn test_pack_1_bit_bytes() {
        let values = [1i64, 0, 0, 0, 0, 0, 0, 1];
        let mut buf = Vec::new();
        write_ints(&values, 1, &mut buf).unwrap();
        assert_eq!(buf, vec![0x81]);
    }

    #[test]
    fn test_pack_byte_multiples() {
        let values = [0x1234i64, 0x5678, 0x0001];
        let mut buf = Vec::new();
        write_ints(&values, 16, &mut buf).unwrap();
        assert_eq!(buf, vec![0x12, 0x34, 0x56, 0x78, 0x00, 0x01]);
        assert_eq!(round_trip(&values, 16), values);
    }

    #[test]
    fn test_round_trip_all_widths() {
        for width in [1, 2, 3, 4, 5, 7, 8, 11, 13, 16, 23, 24, 26, 30, 32, 40, 48, 56, 64] {
            let max = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
            let values: Vec<i64> = (0..19)
                .map(|i| (max / 19 * i as u64) as i64)
                .collect();
            assert_eq!(round_trip(&values, width), values, "width {}", width);
        }
    }

    #[test]
    fn test_invalid_width() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_ints(&[1], 25, &mut buf),
            Err(Error::Corrupt(_))
        ));
        assert!(matches!(write_ints(&[1], 0, &mut buf), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_read_truncated() {
        let mut out = vec![0i64; 4];
        let mut r = ByteReader::new(Bytes::from_static(&[0xff]));
        assert!(read_ints(&mut out, 0, 4, 16, &mut r).is_err());
    }
}
