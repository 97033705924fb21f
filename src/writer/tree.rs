//! Per-column tree writers.
//!
//! Every column of the schema gets a writer that owns its streams, tracks
//! row-level positions for the row index, and maintains the three-level
//! statistics lifecycle. Compound writers dispatch into their children.
//!
//! Present bits are buffered unconditionally; if a stripe ends without a
//! single null the stream and its index positions are discarded, so a
//! column with no nulls never references a Present stream.

use bytes::Bytes;

use crate::config::CompressionKind;
use crate::encoding::boolean::BooleanRleWriter;
use crate::encoding::byte_rle::ByteRleWriter;
use crate::encoding::rle_v2::IntRleV2Writer;
use crate::encoding::varint::write_svarint128;
use crate::error::{Error, Result};
use crate::meta::{ColumnEncoding, ColumnEncodingKind, RowIndex, RowIndexEntry};
use crate::outstream::OutStream;
use crate::schema::{Category, FlatSchema};
use crate::statistics::ColumnStatistics;
use crate::stream::{StreamId, StreamKind};
use crate::value::Value;
use crate::writer::dictionary::StringDictionary;

/// Seconds between the Unix epoch and the ORC timestamp epoch,
/// 2015-01-01 00:00:00 UTC.
pub const TIMESTAMP_BASE_SECONDS: i64 = 1_420_070_400;

/// Stream codec parameters shared by every writer of a file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CodecConfig {
    pub kind: CompressionKind,
    pub block_size: usize,
    pub dictionary_key_ratio: f64,
}

impl CodecConfig {
    fn new_stream(&self) -> OutStream {
        OutStream::new(self.kind, self.block_size)
    }
}

/// The streams, encodings and statistics a stripe flush collects from the
/// writer tree, in pre-order column order.
#[derive(Default)]
pub(crate) struct StripeStreams {
    pub index_streams: Vec<(StreamId, Bytes)>,
    pub data_streams: Vec<(StreamId, Bytes)>,
    pub encodings: Vec<ColumnEncoding>,
    pub statistics: Vec<ColumnStatistics>,
}

/// The common contract of all column writers.
pub(crate) trait TreeWriter {
    /// Appends one row's value for this column.
    fn write(&mut self, value: &Value) -> Result<()>;

    /// Closes the current row index entry at a stride boundary and opens
    /// the next one.
    fn create_row_index_entry(&mut self) -> Result<()>;

    /// Finishes the stripe: emits streams, encoding, statistics and the
    /// row index, then resets for the next stripe. `finalize_last` closes
    /// the partial entry covering rows since the last stride boundary.
    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()>;

    /// An estimate of buffered bytes, for stripe sizing.
    fn estimated_size(&self) -> usize;

    /// Appends file-level statistics for this column and its children.
    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>);
}

/// One accumulated row index entry.
struct IndexEntry {
    present_positions: Vec<u64>,
    data_positions: Vec<u64>,
    statistics: ColumnStatistics,
}

/// State shared by every column writer: the Present stream, statistics
/// and the row index.
struct ColumnBase {
    id: usize,
    cfg: CodecConfig,
    present: BooleanRleWriter,
    has_null: bool,
    index_stats: ColumnStatistics,
    stripe_stats: ColumnStatistics,
    file_stats: ColumnStatistics,
    entries: Vec<IndexEntry>,
    pending_present: Vec<u64>,
    pending_data: Vec<u64>,
}

impl ColumnBase {
    fn new(id: usize, category: Category, cfg: CodecConfig) -> Self {
        Self {
            id,
            cfg,
            present: BooleanRleWriter::new(cfg.new_stream()),
            has_null: false,
            index_stats: ColumnStatistics::new(category),
            stripe_stats: ColumnStatistics::new(category),
            file_stats: ColumnStatistics::new(category),
            entries: Vec::new(),
            pending_present: Vec::new(),
            pending_data: Vec::new(),
        }
    }

    fn write_present(&mut self, present: bool) -> Result<()> {
        self.present.write_bool(present)?;
        if !present {
            self.has_null = true;
            self.index_stats.set_null();
        }
        Ok(())
    }

    /// Opens an index entry at the current stream state.
    fn start_entry(&mut self, data_positions: Vec<u64>) {
        self.pending_present.clear();
        self.present.record_positions(&mut self.pending_present);
        self.pending_data = data_positions;
    }

    /// Completes the open entry with the stride's statistics.
    fn finish_entry(&mut self) -> Result<()> {
        self.stripe_stats.merge(&self.index_stats)?;
        self.entries.push(IndexEntry {
            present_positions: std::mem::take(&mut self.pending_present),
            data_positions: std::mem::take(&mut self.pending_data),
            statistics: self.index_stats.clone(),
        });
        self.index_stats.reset();
        Ok(())
    }

    fn close_entries(&mut self, finalize_last: bool) -> Result<()> {
        if finalize_last {
            self.finish_entry()?;
        } else {
            self.pending_present.clear();
            self.pending_data.clear();
        }
        Ok(())
    }

    /// Emits this column's streams and bookkeeping into the stripe, then
    /// resets for the next one.
    fn emit(
        &mut self,
        out: &mut StripeStreams,
        encoding: ColumnEncoding,
        data_streams: Vec<(StreamKind, Bytes)>,
        next_data_positions: Vec<u64>,
    ) -> Result<()> {
        let present_bytes = self.present.finish()?;

        let mut index = RowIndex::default();
        for entry in self.entries.drain(..) {
            let mut positions = if self.has_null { entry.present_positions } else { Vec::new() };
            positions.extend(entry.data_positions);
            index.entries.push(RowIndexEntry { positions, statistics: entry.statistics });
        }
        let mut index_stream = self.cfg.new_stream();
        index_stream.put(&index.encode())?;
        out.index_streams
            .push((StreamId::new(self.id, StreamKind::RowIndex), index_stream.finish()?));

        // A stripe without nulls omits its Present stream entirely.
        if self.has_null && !present_bytes.is_empty() {
            out.data_streams
                .push((StreamId::new(self.id, StreamKind::Present), present_bytes));
        }
        for (kind, bytes) in data_streams {
            if !bytes.is_empty() {
                out.data_streams.push((StreamId::new(self.id, kind), bytes));
            }
        }

        out.encodings.push(encoding);
        out.statistics.push(self.stripe_stats.clone());
        self.file_stats.merge(&self.stripe_stats)?;
        self.stripe_stats.reset();
        self.index_stats.reset();
        self.has_null = false;
        self.start_entry(next_data_positions);
        Ok(())
    }

    fn estimated_size(&self) -> usize {
        self.present.buffered_len()
    }
}

fn invalid(category: Category, value: &Value) -> Error {
    Error::invalid_value(format!("cannot write {:?} to a {} column", value, category.name()))
}

/// Builds the writer for column `id` and, recursively, its children.
pub(crate) fn create_tree_writer(
    flat: &FlatSchema,
    id: usize,
    cfg: CodecConfig,
) -> Result<Box<dyn TreeWriter>> {
    let node = flat.node(id);
    Ok(match node.category {
        Category::Boolean => Box::new(BooleanTreeWriter::new(id, cfg)),
        Category::Byte => Box::new(ByteTreeWriter::new(id, cfg)),
        Category::Short | Category::Int | Category::Long => {
            Box::new(IntegerTreeWriter::new(id, node.category, cfg))
        }
        Category::Float => Box::new(FloatTreeWriter::new(id, Category::Float, cfg)),
        Category::Double => Box::new(FloatTreeWriter::new(id, Category::Double, cfg)),
        Category::String | Category::Char | Category::Varchar => {
            Box::new(StringTreeWriter::new(id, node.category, cfg))
        }
        Category::Binary => Box::new(BinaryTreeWriter::new(id, cfg)),
        Category::Timestamp => Box::new(TimestampTreeWriter::new(id, cfg)),
        Category::Date => Box::new(DateTreeWriter::new(id, cfg)),
        Category::Decimal => Box::new(DecimalTreeWriter::new(id, cfg)),
        Category::Struct => {
            let mut children = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                children.push(create_tree_writer(flat, child, cfg)?);
            }
            Box::new(StructTreeWriter::new(id, children, cfg))
        }
        Category::List => {
            let child = create_tree_writer(flat, node.children[0], cfg)?;
            Box::new(ListTreeWriter::new(id, child, cfg))
        }
        Category::Map => {
            let key = create_tree_writer(flat, node.children[0], cfg)?;
            let value = create_tree_writer(flat, node.children[1], cfg)?;
            Box::new(MapTreeWriter::new(id, key, value, cfg))
        }
        Category::Union => {
            if node.children.len() > 256 {
                return Err(Error::invalid_argument("union with more than 256 variants"));
            }
            let mut children = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                children.push(create_tree_writer(flat, child, cfg)?);
            }
            Box::new(UnionTreeWriter::new(id, children, cfg))
        }
    })
}

struct BooleanTreeWriter {
    base: ColumnBase,
    data: BooleanRleWriter,
}

impl BooleanTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Boolean, cfg),
            data: BooleanRleWriter::new(cfg.new_stream()),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for BooleanTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Boolean(b) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_boolean(*b);
                self.data.write_bool(*b)
            }
            other => Err(invalid(Category::Boolean, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::Direct),
            vec![(StreamKind::Data, data)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct ByteTreeWriter {
    base: ColumnBase,
    data: ByteRleWriter,
}

impl ByteTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Byte, cfg),
            data: ByteRleWriter::new(cfg.new_stream()),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for ByteTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Byte(b) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_integer(*b as i64);
                self.data.write_byte(*b as u8)
            }
            other => Err(invalid(Category::Byte, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::Direct),
            vec![(StreamKind::Data, data)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct IntegerTreeWriter {
    base: ColumnBase,
    category: Category,
    data: IntRleV2Writer,
}

impl IntegerTreeWriter {
    fn new(id: usize, category: Category, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, category, cfg),
            category,
            data: IntRleV2Writer::new(cfg.new_stream(), true),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        positions
    }

    fn check_range(&self, v: i64) -> Result<()> {
        let fits = match self.category {
            Category::Short => i16::try_from(v).is_ok(),
            Category::Int => i32::try_from(v).is_ok(),
            _ => true,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::invalid_value(format!(
                "{} out of range for a {} column",
                v,
                self.category.name()
            )))
        }
    }
}

impl TreeWriter for IntegerTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Int(v) => {
                self.check_range(*v)?;
                self.base.write_present(true)?;
                self.base.index_stats.update_integer(*v);
                self.data.write_int(*v)
            }
            other => Err(invalid(self.category, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Data, data)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct FloatTreeWriter {
    base: ColumnBase,
    category: Category,
    data: OutStream,
}

impl FloatTreeWriter {
    fn new(id: usize, category: Category, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, category, cfg),
            category,
            data: cfg.new_stream(),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for FloatTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match (self.category, value) {
            (_, Value::Null) => self.base.write_present(false),
            (Category::Float, Value::Float(v)) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_double(*v as f64);
                self.data.put(&v.to_le_bytes())
            }
            (Category::Double, Value::Double(v)) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_double(*v);
                self.data.put(&v.to_le_bytes())
            }
            (category, other) => Err(invalid(category, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::Direct),
            vec![(StreamKind::Data, data)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

/// Dual-mode string writer. Rows are buffered as dictionary handles for
/// the whole stripe; the encoding decision is deferred until flush, where
/// the buffered rows are replayed stride by stride to recover row index
/// positions for the streams written late.
struct StringTreeWriter {
    base: ColumnBase,
    category: Category,
    dictionary: StringDictionary,
    rows: Vec<Option<usize>>,
}

impl StringTreeWriter {
    fn new(id: usize, category: Category, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, category, cfg),
            category,
            dictionary: StringDictionary::new(),
            rows: Vec::new(),
        };
        // Data positions are recovered by replay; entries carry the row
        // count at their boundary until then.
        w.base.start_entry(vec![0]);
        w
    }

    fn use_dictionary(&self) -> bool {
        let present_rows = self.rows.iter().filter(|r| r.is_some()).count();
        if present_rows == 0 {
            return false;
        }
        let ratio = self.dictionary.len() as f64 / present_rows as f64;
        ratio <= self.base.cfg.dictionary_key_ratio
    }

    fn replay_dictionary(&mut self) -> Result<(Vec<(StreamKind, Bytes)>, u64)> {
        let (sorted, handle_to_sorted) = self.dictionary.sorted();

        let mut dict_data = self.base.cfg.new_stream();
        let mut lengths = IntRleV2Writer::new(self.base.cfg.new_stream(), false);
        for value in &sorted {
            dict_data.put(value.as_bytes())?;
            lengths.write_int(value.len() as i64)?;
        }

        let mut data = IntRleV2Writer::new(self.base.cfg.new_stream(), false);
        let mut entry_idx = 0;
        for (row, handle) in self.rows.iter().enumerate() {
            while entry_idx < self.base.entries.len()
                && self.base.entries[entry_idx].data_positions == [row as u64]
            {
                let mut positions = Vec::new();
                data.record_positions(&mut positions);
                self.base.entries[entry_idx].data_positions = positions;
                entry_idx += 1;
            }
            if let Some(handle) = handle {
                data.write_int(handle_to_sorted[*handle] as i64)?;
            }
        }
        let total = self.rows.len() as u64;
        while entry_idx < self.base.entries.len()
            && self.base.entries[entry_idx].data_positions == [total]
        {
            let mut positions = Vec::new();
            data.record_positions(&mut positions);
            self.base.entries[entry_idx].data_positions = positions;
            entry_idx += 1;
        }

        let dictionary_size = sorted.len() as u64;
        Ok((
            vec![
                (StreamKind::Data, data.finish()?),
                (StreamKind::Length, lengths.finish()?),
                (StreamKind::DictionaryData, dict_data.finish()?),
            ],
            dictionary_size,
        ))
    }

    fn replay_direct(&mut self) -> Result<Vec<(StreamKind, Bytes)>> {
        let mut data = self.base.cfg.new_stream();
        let mut lengths = IntRleV2Writer::new(self.base.cfg.new_stream(), false);
        let mut entry_idx = 0;
        for (row, handle) in self.rows.iter().enumerate() {
            while entry_idx < self.base.entries.len()
                && self.base.entries[entry_idx].data_positions == [row as u64]
            {
                let mut positions = Vec::new();
                data.record_positions(&mut positions);
                lengths.record_positions(&mut positions);
                self.base.entries[entry_idx].data_positions = positions;
                entry_idx += 1;
            }
            if let Some(handle) = handle {
                let value = self.dictionary.value(*handle);
                data.put(value.as_bytes())?;
                lengths.write_int(value.len() as i64)?;
            }
        }
        let total = self.rows.len() as u64;
        while entry_idx < self.base.entries.len()
            && self.base.entries[entry_idx].data_positions == [total]
        {
            let mut positions = Vec::new();
            data.record_positions(&mut positions);
            lengths.record_positions(&mut positions);
            self.base.entries[entry_idx].data_positions = positions;
            entry_idx += 1;
        }

        Ok(vec![
            (StreamKind::Data, data.finish()?),
            (StreamKind::Length, lengths.finish()?),
        ])
    }
}

impl TreeWriter for StringTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => {
                self.base.write_present(false)?;
                self.rows.push(None);
                Ok(())
            }
            Value::String(s) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_string(s);
                let handle = self.dictionary.add(s);
                self.rows.push(Some(handle));
                Ok(())
            }
            other => Err(invalid(self.category, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        self.base.start_entry(vec![self.rows.len() as u64]);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let (streams, encoding) = if self.use_dictionary() {
            let (streams, dictionary_size) = self.replay_dictionary()?;
            (streams, ColumnEncoding {
                kind: ColumnEncodingKind::DictionaryV2,
                dictionary_size,
            })
        } else {
            (
                self.replay_direct()?,
                ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            )
        };
        self.dictionary.reset();
        self.rows.clear();
        self.base.emit(out, encoding, streams, vec![0])
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.dictionary.byte_size() as usize + self.rows.len() * 8
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct BinaryTreeWriter {
    base: ColumnBase,
    data: OutStream,
    lengths: IntRleV2Writer,
}

impl BinaryTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Binary, cfg),
            data: cfg.new_stream(),
            lengths: IntRleV2Writer::new(cfg.new_stream(), false),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        self.lengths.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for BinaryTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Binary(bytes) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_binary(bytes.len() as u64);
                self.data.put(bytes)?;
                self.lengths.write_int(bytes.len() as i64)
            }
            other => Err(invalid(Category::Binary, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let lengths = self.lengths.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Data, data), (StreamKind::Length, lengths)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len() + self.lengths.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

/// Compacts a nanosecond count: trailing decimal zeros are stripped and
/// their count, minus one, is stored in the low three bits.
pub(crate) fn format_nanos(nanos: u32) -> u64 {
    if nanos == 0 {
        return 0;
    }
    let mut zeros = 0;
    let mut reduced = nanos;
    while reduced % 10 == 0 {
        reduced /= 10;
        zeros += 1;
    }
    if zeros > 2 {
        ((reduced as u64) << 3) | (zeros as u64 - 1)
    } else {
        (nanos as u64) << 3
    }
}

/// Inverse of [`format_nanos`].
pub(crate) fn parse_nanos(encoded: u64) -> u32 {
    let zeros = encoded & 0x07;
    let mut nanos = (encoded >> 3) as u32;
    if zeros != 0 {
        nanos *= 10u32.pow(zeros as u32 + 1);
    }
    nanos
}

struct TimestampTreeWriter {
    base: ColumnBase,
    seconds: IntRleV2Writer,
    nanos: IntRleV2Writer,
}

impl TimestampTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Timestamp, cfg),
            seconds: IntRleV2Writer::new(cfg.new_stream(), true),
            nanos: IntRleV2Writer::new(cfg.new_stream(), false),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.seconds.record_positions(&mut positions);
        self.nanos.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for TimestampTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Timestamp(ts) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_timestamp(ts.millis());
                self.seconds.write_int(ts.seconds - TIMESTAMP_BASE_SECONDS)?;
                self.nanos.write_int(format_nanos(ts.nanos) as i64)
            }
            other => Err(invalid(Category::Timestamp, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let seconds = self.seconds.finish()?;
        let nanos = self.nanos.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Data, seconds), (StreamKind::Secondary, nanos)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.seconds.buffered_len() + self.nanos.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct DateTreeWriter {
    base: ColumnBase,
    data: IntRleV2Writer,
}

impl DateTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Date, cfg),
            data: IntRleV2Writer::new(cfg.new_stream(), true),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for DateTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Date(days) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_date(*days);
                self.data.write_int(*days as i64)
            }
            other => Err(invalid(Category::Date, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Data, data)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct DecimalTreeWriter {
    base: ColumnBase,
    data: OutStream,
    scales: IntRleV2Writer,
}

impl DecimalTreeWriter {
    fn new(id: usize, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Decimal, cfg),
            data: cfg.new_stream(),
            scales: IntRleV2Writer::new(cfg.new_stream(), true),
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.data.record_positions(&mut positions);
        self.scales.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for DecimalTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Decimal(d) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_decimal(*d);
                write_svarint128(&mut self.data, d.value)?;
                self.scales.write_int(d.scale as i64)
            }
            other => Err(invalid(Category::Decimal, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let data = self.data.finish()?;
        let scales = self.scales.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Data, data), (StreamKind::Secondary, scales)],
            next,
        )
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.data.buffered_len() + self.scales.buffered_len()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
    }
}

struct StructTreeWriter {
    base: ColumnBase,
    children: Vec<Box<dyn TreeWriter>>,
}

impl StructTreeWriter {
    fn new(id: usize, children: Vec<Box<dyn TreeWriter>>, cfg: CodecConfig) -> Self {
        let mut w = Self { base: ColumnBase::new(id, Category::Struct, cfg), children };
        w.base.start_entry(Vec::new());
        w
    }
}

impl TreeWriter for StructTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Struct(fields) => {
                if fields.len() != self.children.len() {
                    return Err(Error::schema_mismatch(format!(
                        "struct has {} fields, row has {}",
                        self.children.len(),
                        fields.len()
                    )));
                }
                self.base.write_present(true)?;
                self.base.index_stats.update_generic();
                for (child, field) in self.children.iter_mut().zip(fields) {
                    child.write(field)?;
                }
                Ok(())
            }
            other => Err(invalid(Category::Struct, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        self.base.start_entry(Vec::new());
        for child in &mut self.children {
            child.create_row_index_entry()?;
        }
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::Direct),
            Vec::new(),
            Vec::new(),
        )?;
        for child in &mut self.children {
            child.flush_stripe(out, finalize_last)?;
        }
        Ok(())
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size()
            + self.children.iter().map(|c| c.estimated_size()).sum::<usize>()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
        for child in &self.children {
            child.collect_file_statistics(out);
        }
    }
}

struct ListTreeWriter {
    base: ColumnBase,
    lengths: IntRleV2Writer,
    child: Box<dyn TreeWriter>,
}

impl ListTreeWriter {
    fn new(id: usize, child: Box<dyn TreeWriter>, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::List, cfg),
            lengths: IntRleV2Writer::new(cfg.new_stream(), false),
            child,
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.lengths.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for ListTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::List(items) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_generic();
                self.lengths.write_int(items.len() as i64)?;
                for item in items {
                    self.child.write(item)?;
                }
                Ok(())
            }
            other => Err(invalid(Category::List, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        self.child.create_row_index_entry()
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let lengths = self.lengths.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Length, lengths)],
            next,
        )?;
        self.child.flush_stripe(out, finalize_last)
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size() + self.lengths.buffered_len() + self.child.estimated_size()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
        self.child.collect_file_statistics(out);
    }
}

struct MapTreeWriter {
    base: ColumnBase,
    lengths: IntRleV2Writer,
    key: Box<dyn TreeWriter>,
    value: Box<dyn TreeWriter>,
}

impl MapTreeWriter {
    fn new(
        id: usize,
        key: Box<dyn TreeWriter>,
        value: Box<dyn TreeWriter>,
        cfg: CodecConfig,
    ) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Map, cfg),
            lengths: IntRleV2Writer::new(cfg.new_stream(), false),
            key,
            value,
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.lengths.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for MapTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Map(pairs) => {
                self.base.write_present(true)?;
                self.base.index_stats.update_generic();
                self.lengths.write_int(pairs.len() as i64)?;
                for (k, v) in pairs {
                    self.key.write(k)?;
                    self.value.write(v)?;
                }
                Ok(())
            }
            other => Err(invalid(Category::Map, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        self.key.create_row_index_entry()?;
        self.value.create_row_index_entry()
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let lengths = self.lengths.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::DirectV2),
            vec![(StreamKind::Length, lengths)],
            next,
        )?;
        self.key.flush_stripe(out, finalize_last)?;
        self.value.flush_stripe(out, finalize_last)
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size()
            + self.lengths.buffered_len()
            + self.key.estimated_size()
            + self.value.estimated_size()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
        self.key.collect_file_statistics(out);
        self.value.collect_file_statistics(out);
    }
}

struct UnionTreeWriter {
    base: ColumnBase,
    tags: ByteRleWriter,
    children: Vec<Box<dyn TreeWriter>>,
}

impl UnionTreeWriter {
    fn new(id: usize, children: Vec<Box<dyn TreeWriter>>, cfg: CodecConfig) -> Self {
        let mut w = Self {
            base: ColumnBase::new(id, Category::Union, cfg),
            tags: ByteRleWriter::new(cfg.new_stream()),
            children,
        };
        let positions = w.data_positions();
        w.base.start_entry(positions);
        w
    }

    fn data_positions(&self) -> Vec<u64> {
        let mut positions = Vec::new();
        self.tags.record_positions(&mut positions);
        positions
    }
}

impl TreeWriter for UnionTreeWriter {
    fn write(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.base.write_present(false),
            Value::Union(tag, inner) => {
                if *tag as usize >= self.children.len() {
                    return Err(Error::invalid_value(format!(
                        "union tag {} out of range for {} variants",
                        tag,
                        self.children.len()
                    )));
                }
                self.base.write_present(true)?;
                self.base.index_stats.update_generic();
                self.tags.write_byte(*tag)?;
                self.children[*tag as usize].write(inner)
            }
            other => Err(invalid(Category::Union, other)),
        }
    }

    fn create_row_index_entry(&mut self) -> Result<()> {
        self.base.finish_entry()?;
        let positions = self.data_positions();
        self.base.start_entry(positions);
        for child in &mut self.children {
            child.create_row_index_entry()?;
        }
        Ok(())
    }

    fn flush_stripe(&mut self, out: &mut StripeStreams, finalize_last: bool) -> Result<()> {
        self.base.close_entries(finalize_last)?;
        let tags = self.tags.finish()?;
        let next = self.data_positions();
        self.base.emit(
            out,
            ColumnEncoding::direct(ColumnEncodingKind::Direct),
            vec![(StreamKind::Data, tags)],
            next,
        )?;
        for child in &mut self.children {
            child.flush_stripe(out, finalize_last)?;
        }
        Ok(())
    }

    fn estimated_size(&self) -> usize {
        self.base.estimated_size()
            + self.tags.buffered_len()
            + self.children.iter().map(|c| c.estimated_size()).sum::<usize>()
    }

    fn collect_file_statistics(&self, out: &mut Vec<ColumnStatistics>) {
        out.push(self.base.file_stats.clone());
        for child in &self.children {
            child.collect_file_statistics(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nanos() {
        assert_eq!(format_nanos(0), 0);
        assert_eq!(format_nanos(1000), (1 << 3) | 2);
        assert_eq!(format_nanos(100_000), (1 << 3) | 4);
        assert_eq!(format_nanos(7), 7 << 3);
        // Two trailing zeros are below the threshold: stored shifted only.
        assert_eq!(format_nanos(25_500), 25_500 << 3);
    }

    #[test]
    fn test_parse_nanos_round_trip() {
        for nanos in [0u32, 1, 7, 90, 1000, 25_500, 100_000, 999_999_999, 500_000_000] {
            assert_eq!(parse_nanos(format_nanos(nanos)), nanos, "nanos {}", nanos);
        }
    }

    #[test]
    fn test_string_writer_mode_decision() {
        let cfg = CodecConfig {
            kind: CompressionKind::None,
            block_size: 1024,
            dictionary_key_ratio: 0.49,
        };
        let mut w = StringTreeWriter::new(1, Category::String, cfg);
        for i in 0..100 {
            w.write(&Value::String(format!("key{}", i % 3))).unwrap();
        }
        assert!(w.use_dictionary());

        let mut w = StringTreeWriter::new(1, Category::String, cfg);
        for i in 0..100 {
            w.write(&Value::String(format!("key{}", i))).unwrap();
        }
        assert!(!w.use_dictionary());
    }

    #[test]
    fn test_integer_range_check() {
        let cfg = CodecConfig {
            kind: CompressionKind::None,
            block_size: 1024,
            dictionary_key_ratio: 0.49,
        };
        let mut w = IntegerTreeWriter::new(1, Category::Short, cfg);
        assert!(w.write(&Value::Int(1000)).is_ok());
        assert!(matches!(
            w.write(&Value::Int(100_000)),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_wrong_value_category() {
        let cfg = CodecConfig {
            kind: CompressionKind::None,
            block_size: 1024,
            dictionary_key_ratio: 0.49,
        };
        let mut w = BooleanTreeWriter::new(1, cfg);
        assert!(matches!(
            w.write(&Value::Int(1)),
            Err(Error::InvalidValue(_))
        ));
    }
}
