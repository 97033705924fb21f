//! Run-length integer encoding, version 2.
//!
//! A header byte's top two bits pick one of four sub-encodings:
//!
//! ```text
//! 00 short-repeat   [width-1: 3 bits][run-3: 3 bits] [value: BE bytes]
//! 01 direct         [width code: 5 bits][run-1: 9 bits] [packed values]
//! 10 patched-base   direct header, base/patch descriptor bytes, packed
//!                   base-reduced values, packed (gap, patch) list
//! 11 delta          direct header, first value varint, base delta varint,
//!                   packed absolute deltas
//! ```
//!
//! The writer buffers up to 512 values and tracks fixed and variable run
//! lengths as it ingests; short repetitions become short-repeat, constant
//! and monotonic deltas become delta runs, and everything else is decided
//! by bit-width percentiles: a distribution with rare outliers is encoded
//! against a base with a patch list, the rest goes direct. Packing always
//! uses byte-aligned widths.

use bytes::Bytes;

use super::bitpack::{
    closest_aligned_fixed_bits, closest_fixed_bits, decode_bit_width, encode_bit_width,
    find_closest_num_bits, read_ints, write_ints,
};
use super::varint::{read_svarint, read_uvarint, write_svarint, write_uvarint, zigzag_decode, zigzag_encode};
use super::{ByteReader, IntegerReader, MIN_REPEAT_SIZE};
use crate::error::{Error, Result};
use crate::outstream::OutStream;

/// Maximum run length for the short-repeat sub-encoding.
pub const MAX_SHORT_REPEAT_LENGTH: usize = 10;

/// The writer's literal buffer size, and so the maximum run length of the
/// other sub-encodings.
const MAX_SCOPE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubEncoding {
    ShortRepeat = 0,
    Direct = 1,
    PatchedBase = 2,
    Delta = 3,
}

/// Returns false when `left - right` would overflow an i64.
pub fn is_safe_subtract(left: i64, right: i64) -> bool {
    (left ^ right) >= 0 || (left ^ left.wrapping_sub(right)) >= 0
}

/// Returns the bit width needed by the `p`-th percentile of `data`, over
/// the closed width set.
fn percentile_bits(data: &[i64], p: f64) -> usize {
    debug_assert!(p > 0.0 && p <= 1.0);
    // Histogram of encoded width codes.
    let mut hist = [0i64; 32];
    for &v in data {
        hist[encode_bit_width(find_closest_num_bits(v))] += 1;
    }
    let mut per_len = (data.len() as f64 * (1.0 - p)).ceil() as i64;
    for code in (0..hist.len()).rev() {
        per_len -= hist[code];
        if per_len < 0 {
            return decode_bit_width(code);
        }
    }
    0
}

/// Writes integers choosing among the four sub-encodings.
pub struct IntRleV2Writer {
    out: OutStream,
    signed: bool,
    literals: [i64; MAX_SCOPE],
    num_literals: usize,
    encoding: SubEncoding,
    prev_delta: i64,
    fixed_delta: i64,
    zigzag_literals: [i64; MAX_SCOPE],
    base_red_literals: [i64; MAX_SCOPE],
    adj_deltas: [i64; MAX_SCOPE],
    zz_bits_90p: usize,
    zz_bits_100p: usize,
    br_bits_95p: usize,
    br_bits_100p: usize,
    bits_delta_max: usize,
    patch_gap_width: usize,
    patch_length: usize,
    patch_width: usize,
    gap_vs_patch_list: Vec<i64>,
    is_fixed_delta: bool,
    variable_run_length: usize,
    fixed_run_length: usize,
    min: i64,
}

impl IntRleV2Writer {
    /// Creates a writer emitting into `out`. Signed streams zig-zag values
    /// for the direct and short-repeat sub-encodings.
    pub fn new(out: OutStream, signed: bool) -> Self {
        let mut w = Self {
            out,
            signed,
            literals: [0; MAX_SCOPE],
            num_literals: 0,
            encoding: SubEncoding::Direct,
            prev_delta: 0,
            fixed_delta: 0,
            zigzag_literals: [0; MAX_SCOPE],
            base_red_literals: [0; MAX_SCOPE],
            adj_deltas: [0; MAX_SCOPE],
            zz_bits_90p: 0,
            zz_bits_100p: 0,
            br_bits_95p: 0,
            br_bits_100p: 0,
            bits_delta_max: 0,
            patch_gap_width: 0,
            patch_length: 0,
            patch_width: 0,
            gap_vs_patch_list: Vec::new(),
            is_fixed_delta: true,
            variable_run_length: 0,
            fixed_run_length: 0,
            min: 0,
        };
        w.clear();
        w
    }

    /// Appends one integer, draining the buffer when a run closes or the
    /// 512-value scope fills.
    pub fn write_int(&mut self, value: i64) -> Result<()> {
        if self.num_literals == 0 {
            self.initialize_literals(value);
            return Ok(());
        }
        if self.num_literals == 1 {
            self.prev_delta = value.wrapping_sub(self.literals[0]);
            self.literals[1] = value;
            self.num_literals = 2;
            if value == self.literals[0] {
                self.fixed_run_length = 2;
                self.variable_run_length = 0;
            } else {
                self.fixed_run_length = 0;
                self.variable_run_length = 2;
            }
            return Ok(());
        }
        let current_delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
        if self.prev_delta == 0 && current_delta == 0 {
            // Continuing a run of identical values.
            self.literals[self.num_literals] = value;
            self.num_literals += 1;

            // Repeating values at the tail of a variable run restart the
            // fixed counter.
            if self.variable_run_length > 0 {
                self.fixed_run_length = 2;
            }
            self.fixed_run_length += 1;

            // Once the tail repetition qualifies as a run, flush the
            // variable prefix and move the tail to the buffer start.
            if self.fixed_run_length >= MIN_REPEAT_SIZE && self.variable_run_length > 0 {
                self.num_literals -= MIN_REPEAT_SIZE;
                self.variable_run_length -= MIN_REPEAT_SIZE - 1;
                let tail = [
                    self.literals[self.num_literals],
                    self.literals[self.num_literals + 1],
                    self.literals[self.num_literals + 2],
                ];
                self.determine_encoding()?;
                self.write_values()?;
                for v in tail {
                    self.literals[self.num_literals] = v;
                    self.num_literals += 1;
                }
            }

            if self.fixed_run_length == MAX_SCOPE {
                self.determine_encoding()?;
                self.write_values()?;
            }
        } else {
            // Variable delta run. A pending fixed run is flushed first,
            // as a short repeat if it is short enough.
            if self.fixed_run_length >= MIN_REPEAT_SIZE {
                if self.fixed_run_length <= MAX_SHORT_REPEAT_LENGTH {
                    self.encoding = SubEncoding::ShortRepeat;
                    self.write_values()?;
                } else {
                    self.encoding = SubEncoding::Delta;
                    self.is_fixed_delta = true;
                    self.write_values()?;
                }
            }

            if self.fixed_run_length > 0
                && self.fixed_run_length < MIN_REPEAT_SIZE
                && value != self.literals[self.num_literals - 1]
            {
                self.variable_run_length = self.fixed_run_length;
                self.fixed_run_length = 0;
            }

            if self.num_literals == 0 {
                self.initialize_literals(value);
            } else {
                self.prev_delta = value.wrapping_sub(self.literals[self.num_literals - 1]);
                self.literals[self.num_literals] = value;
                self.num_literals += 1;
                self.variable_run_length += 1;

                if self.variable_run_length == MAX_SCOPE {
                    self.determine_encoding()?;
                    self.write_values()?;
                }
            }
        }
        Ok(())
    }

    fn initialize_literals(&mut self, value: i64) {
        self.literals[0] = value;
        self.num_literals = 1;
        self.fixed_run_length = 1;
        self.variable_run_length = 1;
    }

    /// Drains any buffered values.
    pub fn flush(&mut self) -> Result<()> {
        if self.num_literals != 0 {
            if self.variable_run_length != 0 {
                self.determine_encoding()?;
                self.write_values()?;
            } else if self.fixed_run_length != 0 {
                if self.fixed_run_length < MIN_REPEAT_SIZE {
                    self.variable_run_length = self.fixed_run_length;
                    self.fixed_run_length = 0;
                    self.determine_encoding()?;
                    self.write_values()?;
                } else if self.fixed_run_length <= MAX_SHORT_REPEAT_LENGTH {
                    self.encoding = SubEncoding::ShortRepeat;
                    self.write_values()?;
                } else {
                    self.encoding = SubEncoding::Delta;
                    self.is_fixed_delta = true;
                    self.write_values()?;
                }
            }
        }
        Ok(())
    }

    /// Appends the stream positions plus the count of buffered values.
    pub fn record_positions(&self, out: &mut Vec<u64>) {
        self.out.record_positions(out);
        out.push(self.num_literals as u64);
    }

    /// Bytes currently buffered, for stripe sizing.
    pub fn buffered_len(&self) -> usize {
        self.out.buffered_len() + self.num_literals * 8
    }

    /// Drains buffered values and returns the finished stream bytes.
    pub fn finish(&mut self) -> Result<Bytes> {
        self.flush()?;
        self.out.finish()
    }

    fn clear(&mut self) {
        self.num_literals = 0;
        self.encoding = SubEncoding::Direct;
        self.prev_delta = 0;
        self.fixed_delta = 0;
        self.zz_bits_90p = 0;
        self.zz_bits_100p = 0;
        self.br_bits_95p = 0;
        self.br_bits_100p = 0;
        self.bits_delta_max = 0;
        self.patch_gap_width = 0;
        self.patch_length = 0;
        self.patch_width = 0;
        self.gap_vs_patch_list.clear();
        self.min = 0;
        self.is_fixed_delta = true;
    }

    fn write_values(&mut self) -> Result<()> {
        if self.num_literals != 0 {
            match self.encoding {
                SubEncoding::ShortRepeat => self.write_short_repeat_values()?,
                SubEncoding::Direct => self.write_direct_values()?,
                SubEncoding::PatchedBase => self.write_patched_base_values()?,
                SubEncoding::Delta => self.write_delta_values()?,
            }
            self.clear();
        }
        Ok(())
    }

    fn compute_zigzag_literals(&mut self) {
        for j in 0..self.num_literals {
            self.zigzag_literals[j] = if self.signed {
                zigzag_encode(self.literals[j]) as i64
            } else {
                self.literals[j]
            };
        }
    }

    fn determine_encoding(&mut self) -> Result<()> {
        // Zig-zag values are needed whenever direct is chosen, which
        // includes every early exit below.
        self.compute_zigzag_literals();
        self.zz_bits_100p = percentile_bits(&self.zigzag_literals[..self.num_literals], 1.0);

        // Not worth analysing very short runs.
        if self.num_literals <= MIN_REPEAT_SIZE {
            self.encoding = SubEncoding::Direct;
            return Ok(());
        }

        let mut is_increasing = true;
        let mut is_decreasing = true;
        self.is_fixed_delta = true;

        self.min = self.literals[0];
        let mut max = self.literals[0];
        let initial_delta = self.literals[1].wrapping_sub(self.literals[0]);
        let mut curr_delta = initial_delta;
        let mut delta_max = initial_delta;
        self.adj_deltas[0] = initial_delta;

        for j in 1..self.num_literals {
            let l1 = self.literals[j];
            let l0 = self.literals[j - 1];
            curr_delta = l1.wrapping_sub(l0);
            self.min = self.min.min(l1);
            max = max.max(l1);

            is_increasing = is_increasing && l0 <= l1;
            is_decreasing = is_decreasing && l0 >= l1;

            self.is_fixed_delta = self.is_fixed_delta && curr_delta == initial_delta;
            if j > 1 {
                self.adj_deltas[j - 1] = curr_delta.wrapping_abs();
                delta_max = delta_max.max(self.adj_deltas[j - 1]);
            }
        }

        // Base reduction would overflow, and direct has less overhead than
        // patching anyway.
        if !is_safe_subtract(max, self.min) {
            self.encoding = SubEncoding::Direct;
            return Ok(());
        }

        // A fixed value run longer than short-repeat allows.
        if self.min == max {
            if !self.is_fixed_delta || curr_delta != 0 {
                return Err(Error::corrupt("constant run with non-zero delta"));
            }
            self.fixed_delta = 0;
            self.encoding = SubEncoding::Delta;
            return Ok(());
        }

        if self.is_fixed_delta {
            self.encoding = SubEncoding::Delta;
            self.fixed_delta = curr_delta;
            return Ok(());
        }

        // A zero initial delta leaves the direction of the sequence
        // ambiguous, which delta encoding cannot express.
        if initial_delta != 0 {
            self.bits_delta_max = find_closest_num_bits(delta_max);
            if is_increasing || is_decreasing {
                self.encoding = SubEncoding::Delta;
                return Ok(());
            }
        }

        // Patch only when the outliers are rare: the 90th and 100th
        // percentile widths of the zig-zag values must differ by more
        // than one.
        self.zz_bits_90p = percentile_bits(&self.zigzag_literals[..self.num_literals], 0.9);
        let diff_bits_lh = self.zz_bits_100p as i64 - self.zz_bits_90p as i64;

        if diff_bits_lh > 1 {
            // Patching applies to base-reduced values.
            for j in 0..self.num_literals {
                self.base_red_literals[j] = self.literals[j].wrapping_sub(self.min);
            }

            // The 95th percentile width bounds the main blob; everything
            // wider gets patched.
            self.br_bits_95p = closest_aligned_fixed_bits(percentile_bits(
                &self.base_red_literals[..self.num_literals],
                0.95,
            ));
            self.br_bits_100p =
                percentile_bits(&self.base_red_literals[..self.num_literals], 1.0);

            if self.br_bits_100p > self.br_bits_95p {
                self.encoding = SubEncoding::PatchedBase;
                self.prepare_patched_blob();
            } else {
                self.encoding = SubEncoding::Direct;
            }
        } else {
            self.encoding = SubEncoding::Direct;
        }
        Ok(())
    }

    fn prepare_patched_blob(&mut self) {
        // Values above the mask get patched.
        let mut mask = (1i64 << self.br_bits_95p) - 1;

        // Only 5% of the values can exceed the 95th percentile width.
        self.patch_length = (self.num_literals as f64 * 0.05).ceil() as usize;
        let mut gap_list = vec![0usize; self.patch_length];
        let mut patch_list = vec![0i64; self.patch_length];

        self.patch_width = closest_fixed_bits(self.br_bits_100p - self.br_bits_95p);

        // A 64-bit patch cannot share a word with its gap; narrow the main
        // blob instead.
        if self.patch_width == 64 {
            self.patch_width = 56;
            self.br_bits_95p = 8;
            mask = (1i64 << self.br_bits_95p) - 1;
        }

        let mut gap_idx = 0;
        let mut prev = 0usize;
        let mut max_gap = 0usize;

        for j in 0..self.num_literals {
            if self.base_red_literals[j] > mask {
                let gap = j - prev;
                max_gap = max_gap.max(gap);

                // Gaps are relative to the previous patched index.
                prev = j;
                gap_list[gap_idx] = gap;
                patch_list[gap_idx] =
                    ((self.base_red_literals[j] as u64) >> self.br_bits_95p) as i64;
                gap_idx += 1;

                // Strip the patched bits so the main blob packs safely.
                self.base_red_literals[j] &= mask;
            }
        }
        self.patch_length = gap_idx;

        // A single patch at index zero still needs one bit of gap.
        if max_gap == 0 && self.patch_length != 0 {
            self.patch_gap_width = 1;
        } else {
            self.patch_gap_width = find_closest_num_bits(max_gap as i64);
        }

        // The header has three bits for the gap width. Larger gaps are
        // split across entries: a gap of 255 with patch 0 is a
        // continuation marker. The worst case, gap 511, needs two extra
        // entries (255 + 255 + 1).
        if self.patch_gap_width > 8 {
            self.patch_gap_width = 8;
            if max_gap == 511 {
                self.patch_length += 2;
            } else {
                self.patch_length += 1;
            }
        }

        let mut entries = vec![0i64; self.patch_length];
        let mut src = 0;
        let mut j = 0;
        while j < entries.len() {
            let mut g = gap_list[src];
            let p = patch_list[src];
            src += 1;
            while g > 255 {
                entries[j] = 255i64 << self.patch_width;
                j += 1;
                g -= 255;
            }
            // Gap in the high bits, patch in the low.
            entries[j] = ((g as i64) << self.patch_width) | p;
            j += 1;
        }
        self.gap_vs_patch_list = entries;
    }

    fn op_code(&self) -> usize {
        (self.encoding as usize) << 6
    }

    fn write_short_repeat_values(&mut self) -> Result<()> {
        let repeat_val = if self.signed {
            zigzag_encode(self.literals[0]) as i64
        } else {
            self.literals[0]
        };
        let num_bits = find_closest_num_bits(repeat_val);
        let num_bytes = if num_bits % 8 == 0 { num_bits >> 3 } else { (num_bits >> 3) + 1 };

        let mut header = self.op_code();
        header |= (num_bytes - 1) << 3;
        self.fixed_run_length -= MIN_REPEAT_SIZE;
        header |= self.fixed_run_length;

        self.out.put_u8(header as u8)?;
        for j in (0..num_bytes).rev() {
            self.out.put_u8(((repeat_val as u64) >> (j * 8)) as u8)?;
        }
        self.fixed_run_length = 0;
        Ok(())
    }

    fn write_direct_values(&mut self) -> Result<()> {
        let fb = closest_aligned_fixed_bits(self.zz_bits_100p);
        let efb = encode_bit_width(fb) << 1;

        self.variable_run_length -= 1;
        let tail_bits = (self.variable_run_length >> 8) & 1;

        self.out.put_u8((self.op_code() | efb | tail_bits) as u8)?;
        self.out.put_u8((self.variable_run_length & 0xff) as u8)?;
        write_ints(&self.zigzag_literals[..self.num_literals], fb, &mut self.out)?;
        self.variable_run_length = 0;
        Ok(())
    }

    fn write_patched_base_values(&mut self) -> Result<()> {
        // Aligned packing is off limits here: the patch overlays the bits
        // directly above the main width, so widening the blob would tear
        // the reconstruction apart.
        let fb = self.br_bits_95p;
        let efb = encode_bit_width(fb) << 1;

        self.variable_run_length -= 1;
        let tail_bits = (self.variable_run_length >> 8) & 1;

        let mut base = self.min as u64;
        let is_negative = self.min < 0;
        if is_negative {
            base = self.min.wrapping_neg() as u64;
        }
        // Magnitude bits plus one sign bit, at the MSB of the base field.
        let base_width = find_closest_num_bits(base as i64) + 1;
        let base_bytes = if base_width % 8 == 0 { base_width / 8 } else { base_width / 8 + 1 };
        if is_negative {
            base |= 1u64 << (base_bytes * 8 - 1);
        }

        let third = ((base_bytes - 1) << 5) | encode_bit_width(self.patch_width);
        let fourth = ((self.patch_gap_width - 1) << 5) | self.patch_length;

        self.out.put_u8((self.op_code() | efb | tail_bits) as u8)?;
        self.out.put_u8((self.variable_run_length & 0xff) as u8)?;
        self.out.put_u8(third as u8)?;
        self.out.put_u8(fourth as u8)?;
        for j in (0..base_bytes).rev() {
            self.out.put_u8((base >> (j * 8)) as u8)?;
        }

        write_ints(
            &self.base_red_literals[..self.num_literals],
            closest_fixed_bits(fb),
            &mut self.out,
        )?;
        write_ints(
            &self.gap_vs_patch_list,
            closest_fixed_bits(self.patch_gap_width + self.patch_width),
            &mut self.out,
        )?;
        self.variable_run_length = 0;
        Ok(())
    }

    fn write_delta_values(&mut self) -> Result<()> {
        let mut fb = self.bits_delta_max;
        let mut efb = 0;
        let len;

        if self.is_fixed_delta {
            if self.fixed_run_length > MIN_REPEAT_SIZE {
                // A repeating sequence too long for short-repeat.
                len = self.fixed_run_length - 1;
                self.fixed_run_length = 0;
            } else {
                // An arithmetic sequence with constant delta.
                len = self.variable_run_length - 1;
                self.variable_run_length = 0;
            }
        } else {
            // Width zero means fixed delta, so a one-bit blob is promoted.
            fb = closest_aligned_fixed_bits(fb);
            if fb == 1 {
                fb = 2;
            }
            efb = encode_bit_width(fb) << 1;
            len = self.variable_run_length - 1;
            self.variable_run_length = 0;
        }

        let tail_bits = (len >> 8) & 1;
        self.out.put_u8((self.op_code() | efb | tail_bits) as u8)?;
        self.out.put_u8((len & 0xff) as u8)?;

        if self.signed {
            write_svarint(&mut self.out, self.literals[0])?;
        } else {
            write_uvarint(&mut self.out, self.literals[0] as u64)?;
        }

        if self.is_fixed_delta {
            write_svarint(&mut self.out, self.fixed_delta)?;
        } else {
            // The first delta carries the sign of the whole sequence; the
            // rest are absolute values.
            write_svarint(&mut self.out, self.adj_deltas[0])?;
            write_ints(&self.adj_deltas[1..self.num_literals - 1], fb, &mut self.out)?;
        }
        Ok(())
    }
}

/// Reads integers encoded with any of the four sub-encodings.
pub struct IntRleV2Reader {
    input: ByteReader,
    signed: bool,
    buffer: Vec<i64>,
    idx: usize,
}

impl IntRleV2Reader {
    /// Creates a reader over a fully decompressed stream.
    pub fn new(data: Bytes, signed: bool) -> Self {
        Self { input: ByteReader::new(data), signed, buffer: Vec::new(), idx: 0 }
    }

    fn read_values(&mut self) -> Result<()> {
        let b0 = self.input.expect_u8("run header")?;
        match (b0 >> 6) & 0x03 {
            0 => self.read_short_repeat(b0),
            1 => self.read_direct(b0),
            2 => self.read_patched_base(b0),
            _ => self.read_delta(b0),
        }
    }

    fn read_big_endian(&mut self, n: usize) -> Result<i64> {
        let mut out: u64 = 0;
        for _ in 0..n {
            out = (out << 8) | self.input.expect_u8("big-endian value")? as u64;
        }
        Ok(out as i64)
    }

    fn read_run_length(&mut self, b0: u8) -> Result<usize> {
        let high = ((b0 & 0x01) as usize) << 8;
        let low = self.input.expect_u8("run length")? as usize;
        Ok(high | low)
    }

    fn read_short_repeat(&mut self, b0: u8) -> Result<()> {
        let width = ((b0 as usize >> 3) & 0x07) + 1;
        let run = (b0 as usize & 0x07) + MIN_REPEAT_SIZE;
        let mut value = self.read_big_endian(width)?;
        if self.signed {
            value = zigzag_decode(value as u64);
        }
        self.buffer.resize(run, value);
        Ok(())
    }

    fn read_direct(&mut self, b0: u8) -> Result<()> {
        let width = decode_bit_width((b0 as usize >> 1) & 0x1f);
        let length = self.read_run_length(b0)? + 1;
        self.buffer.resize(length, 0);
        read_ints(&mut self.buffer, 0, length, width, &mut self.input)?;
        if self.signed {
            for v in self.buffer.iter_mut() {
                *v = zigzag_decode(*v as u64);
            }
        }
        Ok(())
    }

    fn read_patched_base(&mut self, b0: u8) -> Result<()> {
        let width = decode_bit_width((b0 as usize >> 1) & 0x1f);
        let length = self.read_run_length(b0)? + 1;

        let third = self.input.expect_u8("patched base header")?;
        let base_bytes = ((third as usize >> 5) & 0x07) + 1;
        let patch_width = decode_bit_width(third as usize & 0x1f);

        let fourth = self.input.expect_u8("patched base header")?;
        let patch_gap_width = ((fourth as usize >> 5) & 0x07) + 1;
        let patch_list_length = fourth as usize & 0x1f;
        if patch_list_length == 0 {
            return Err(Error::corrupt("patched base run with empty patch list"));
        }
        if patch_width + patch_gap_width > 64 || width >= 64 {
            return Err(Error::corrupt("patch and gap widths exceed 64 bits"));
        }

        // The base is big-endian with the sign bit at the MSB of its field.
        let mut base = self.read_big_endian(base_bytes)?;
        let mask = 1i64 << (base_bytes * 8 - 1);
        if base & mask != 0 {
            base &= !mask;
            base = -base;
        }

        let mut unpacked = vec![0i64; length];
        read_ints(&mut unpacked, 0, length, width, &mut self.input)?;

        let patch_bit_size = closest_fixed_bits(patch_width + patch_gap_width);
        let mut unpacked_patch = vec![0i64; patch_list_length];
        read_ints(&mut unpacked_patch, 0, patch_list_length, patch_bit_size, &mut self.input)?;

        let patch_mask = if patch_width == 64 { -1i64 } else { (1i64 << patch_width) - 1 };
        let mut patch_idx = 0usize;
        let next_gap_patch = |list: &[i64], idx: usize| -> Result<(i64, i64)> {
            let entry = *list
                .get(idx)
                .ok_or_else(|| Error::corrupt("patch list shorter than its gaps"))?;
            Ok(((entry as u64 >> patch_width) as i64, entry & patch_mask))
        };

        let (mut current_gap, mut current_patch) = next_gap_patch(&unpacked_patch, patch_idx)?;
        let mut actual_gap = 0i64;

        // A gap over 255 cannot fit its field: it is stored as repeated
        // (255, 0) continuation entries. A real patch is never zero.
        while current_gap == 255 && current_patch == 0 {
            actual_gap += 255;
            patch_idx += 1;
            let (g, p) = next_gap_patch(&unpacked_patch, patch_idx)?;
            current_gap = g;
            current_patch = p;
        }
        actual_gap += current_gap;

        self.buffer.reserve(length);
        for (i, &raw) in unpacked.iter().enumerate() {
            if i as i64 == actual_gap {
                // Overlay the patch above the main width, then rebase.
                let patched = raw | (current_patch << width);
                self.buffer.push(base.wrapping_add(patched));

                patch_idx += 1;
                if patch_idx < patch_list_length {
                    let (g, p) = next_gap_patch(&unpacked_patch, patch_idx)?;
                    current_gap = g;
                    current_patch = p;
                    actual_gap = 0;
                    while current_gap == 255 && current_patch == 0 {
                        actual_gap += 255;
                        patch_idx += 1;
                        let (g, p) = next_gap_patch(&unpacked_patch, patch_idx)?;
                        current_gap = g;
                        current_patch = p;
                    }
                    actual_gap += current_gap;
                    // The next gap is relative to this patch.
                    actual_gap += i as i64;
                }
            } else {
                self.buffer.push(base.wrapping_add(raw));
            }
        }
        Ok(())
    }

    fn read_delta(&mut self, b0: u8) -> Result<()> {
        let width_code = (b0 as usize >> 1) & 0x1f;
        let width = if width_code != 0 { decode_bit_width(width_code) } else { 0 };
        // The stored length is one less than the run length.
        let mut length = self.read_run_length(b0)?;

        let first = if self.signed {
            read_svarint(&mut self.input)?
        } else {
            read_uvarint(&mut self.input)? as i64
        };
        self.buffer.push(first);

        if width == 0 {
            // Fixed delta: the whole run is arithmetic.
            let fixed_delta = read_svarint(&mut self.input)?;
            let mut prev = first;
            for _ in 0..length {
                prev = prev.wrapping_add(fixed_delta);
                self.buffer.push(prev);
            }
        } else {
            if length == 0 {
                return Err(Error::corrupt("delta run of one value with a delta blob"));
            }
            let delta_base = read_svarint(&mut self.input)?;
            let mut prev = first.wrapping_add(delta_base);
            self.buffer.push(prev);
            length -= 1;

            // Remaining deltas are absolute; the base delta's sign decides
            // whether the sequence rises or falls.
            let mut deltas = vec![0i64; length];
            read_ints(&mut deltas, 0, length, width, &mut self.input)?;
            for d in deltas {
                prev = if delta_base < 0 { prev.wrapping_sub(d) } else { prev.wrapping_add(d) };
                self.buffer.push(prev);
            }
        }
        Ok(())
    }
}

impl IntegerReader for IntRleV2Reader {
    fn next_int(&mut self) -> Result<Option<i64>> {
        if self.idx >= self.buffer.len() {
            if self.input.remaining() == 0 {
                return Ok(None);
            }
            self.buffer.clear();
            self.idx = 0;
            self.read_values()?;
        }
        let v = self.buffer[self.idx];
        self.idx += 1;
        Ok(Some(v))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CompressionKind;

    use super::*;

    fn encode(input: &[i64], signed: bool) -> Vec<u8> {
        let mut w = IntRleV2Writer::new(OutStream::new(CompressionKind::None, 1024), signed);
        for &v in input {
            w.write_int(v).unwrap();
        }
        w.finish().unwrap().to_vec()
    }

    fn decode(input: &[u8], signed: bool) -> Vec<i64> {
        let mut r = IntRleV2Reader::new(Bytes::copy_from_slice(input), signed);
        let mut out = Vec::new();
        while let Some(v) = r.next_int().unwrap() {
            out.push(v);
        }
        out
    }

    const SHORT_REPEAT: (&[i64], &[u8]) = (&[10000, 10000, 10000, 10000, 10000], &[0x0a, 0x27, 0x10]);
    const DIRECT: (&[i64], &[u8]) = (
        &[23713, 43806, 57005, 48879],
        &[0x5e, 0x03, 0x5c, 0xa1, 0xab, 0x1e, 0xde, 0xad, 0xbe, 0xef],
    );
    const DELTA: (&[i64], &[u8]) = (
        &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29],
        &[0xc6, 0x09, 0x02, 0x02, 0x22, 0x42, 0x42, 0x46],
    );
    const PATCHED_BASE: (&[i64], &[u8]) = (
        &[2030, 2000, 2020, 1000000, 2040, 2050, 2060, 2070, 2080, 2090],
        &[
            0x8e, 0x09, 0x2b, 0x21, 0x07, 0xd0, 0x1e, 0x00, 0x14, 0x70, 0x28, 0x32, 0x3c, 0x46,
            0x50, 0x5a, 0xfc, 0xe8,
        ],
    );

    #[test]
    fn test_write_short_repeat() {
        assert_eq!(encode(SHORT_REPEAT.0, false), SHORT_REPEAT.1);
    }

    #[test]
    fn test_read_short_repeat() {
        assert_eq!(decode(SHORT_REPEAT.1, false), SHORT_REPEAT.0);
    }

    #[test]
    fn test_write_direct() {
        assert_eq!(encode(DIRECT.0, false), DIRECT.1);
    }

    #[test]
    fn test_read_direct() {
        assert_eq!(decode(DIRECT.1, false), DIRECT.0);
    }

    #[test]
    fn test_write_delta() {
        assert_eq!(encode(DELTA.0, false), DELTA.1);
    }

    #[test]
    fn test_read_delta() {
        assert_eq!(decode(DELTA.1, false), DELTA.0);
    }

    #[test]
    fn test_write_patched_base() {
        assert_eq!(encode(PATCHED_BASE.0, false), PATCHED_BASE.1);
    }

    #[test]
    fn test_read_patched_base() {
        assert_eq!(decode(PATCHED_BASE.1, false), PATCHED_BASE.0);
    }

    #[test]
    fn test_read_delta_unaligned_variant() {
        // The same primes packed at the unaligned 3-bit width.
        assert_eq!(decode(&[196, 9, 2, 2, 74, 40, 166], false), DELTA.0);
    }

    #[test]
    fn test_read_direct_fixed_delta_variants() {
        // Two alternative valid encodings of the patched-base values.
        let expected = PATCHED_BASE.0;
        let direct: &[u8] = &[
            102, 9, 0, 126, 224, 7, 208, 0, 126, 79, 66, 64, 0, 127, 128, 8, 2, 0, 128, 192, 8,
            22, 0, 130, 0, 8, 42,
        ];
        assert_eq!(decode(direct, false), expected);
        let delta: &[u8] = &[200, 9, 16, 202, 117, 182, 51, 191, 64];
        assert_eq!(decode(delta, false), expected);
    }

    #[test]
    fn test_is_safe_subtract() {
        assert!(!is_safe_subtract(22222222222, i64::MIN));
        assert!(!is_safe_subtract(-22222222222, i64::MAX));
        assert!(!is_safe_subtract(i64::MIN, i64::MAX));
        assert!(is_safe_subtract(0, 0));
        assert!(is_safe_subtract(i64::MAX, i64::MAX));
        assert!(is_safe_subtract(-100, 100));
    }

    #[test]
    fn test_fixed_delta_run() {
        let input: Vec<i64> = (0..100).map(|i| 4 + 2 * i).collect();
        let encoded = encode(&input, false);
        // Header, length, first value, delta: a fixed-delta run has no blob.
        assert_eq!(encoded, vec![0xc0, 0x63, 0x04, 0x04]);
        assert_eq!(decode(&encoded, false), input);
    }

    #[test]
    fn test_long_repeat_becomes_zero_delta() {
        let input = vec![42i64; 100];
        let encoded = encode(&input, false);
        assert_eq!(decode(&encoded, false), input);
        // Delta opcode with width code zero.
        assert_eq!(encoded[0] >> 6, 3);
        assert_eq!((encoded[0] >> 1) & 0x1f, 0);
    }

    #[test]
    fn test_signed_round_trip() {
        let input = vec![-3000i64, 2, -5, 7, 900000, -17, 0, 65, -129, 4];
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_round_trip_small_range() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<i64> = (0..1000).map(|_| rng.random_range(0..10)).collect();
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_round_trip_large_range() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<i64> = (0..1_000_000).map(|_| rng.random_range(0..1_000_000)).collect();
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_round_trip_outliers() {
        use rand::Rng;
        let mut rng = rand::rng();
        let input: Vec<i64> = (0..10_000)
            .map(|_| {
                if rng.random_range(0..100) == 0 {
                    rng.random_range(1_000_000_000..2_000_000_000)
                } else {
                    rng.random_range(2000..2100)
                }
            })
            .collect();
        assert_eq!(decode(&encode(&input, false), false), input);
    }

    #[test]
    fn test_round_trip_extremes() {
        let input = vec![i64::MIN, i64::MAX, 0, -1, 1, i64::MIN, i64::MAX];
        assert_eq!(decode(&encode(&input, true), true), input);
    }

    #[test]
    fn test_truncated_header() {
        let mut r = IntRleV2Reader::new(Bytes::from_static(&[0x5e]), false);
        assert!(r.next_int().is_err());
    }
}
