//! File metadata blobs: PostScript, Footer, StripeFooter, Metadata and
//! RowIndex.
//!
//! The file tail is laid out as: stripes, then the metadata blob, then the
//! footer blob, then the PostScript, then one byte holding the PostScript
//! length. The PostScript is never compressed and must not exceed 255
//! bytes; the metadata and footer blobs use the file's compression.
//!
//! These structures are serialized with a compact ordered binary encoding
//! built on the stream varint primitives: integers as varints, strings and
//! collections length-prefixed, doubles as little-endian bytes.

use bytes::Bytes;

use crate::config::CompressionKind;
use crate::encoding::varint::{
    read_svarint, read_svarint128, read_uvarint, write_svarint, write_svarint128, write_uvarint,
};
use crate::encoding::ByteReader;
use crate::error::{Error, Result};
use crate::schema::{Category, FlatNode, FlatSchema};
use crate::statistics::{ColumnStatistics, TypedStatistics};
use crate::stream::{StreamId, StreamKind};
use crate::value::Decimal;

/// The file magic, at offset zero and inside the PostScript.
pub const MAGIC: &[u8; 3] = b"ORC";

/// Upper bound on the PostScript, which must fit behind its length byte.
pub const MAX_POST_SCRIPT_SIZE: usize = 255;

/// The file format version written by this library.
pub const FORMAT_VERSION: (u64, u64) = (0, 12);

fn put_str(out: &mut Vec<u8>, s: &str) {
    write_uvarint(out, s.len() as u64).expect("vec write");
    out.extend_from_slice(s.as_bytes());
}

fn get_str(r: &mut ByteReader) -> Result<String> {
    let len = read_uvarint(r)? as usize;
    let raw = r.read_slice(len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| Error::corrupt("invalid utf-8 in metadata"))
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    write_uvarint(out, v).expect("vec write");
}

fn put_bool(out: &mut Vec<u8>, v: bool) {
    out.push(v as u8);
}

fn get_bool(r: &mut ByteReader) -> Result<bool> {
    Ok(r.expect_u8("metadata")? != 0)
}

fn put_opt_i64(out: &mut Vec<u8>, v: Option<i64>) {
    match v {
        Some(v) => {
            out.push(1);
            write_svarint(out, v).expect("vec write");
        }
        None => out.push(0),
    }
}

fn get_opt_i64(r: &mut ByteReader) -> Result<Option<i64>> {
    if get_bool(r)? {
        Ok(Some(read_svarint(r)?))
    } else {
        Ok(None)
    }
}

fn put_opt_f64(out: &mut Vec<u8>, v: Option<f64>) {
    match v {
        Some(v) => {
            out.push(1);
            out.extend_from_slice(&v.to_le_bytes());
        }
        None => out.push(0),
    }
}

fn get_opt_f64(r: &mut ByteReader) -> Result<Option<f64>> {
    if get_bool(r)? {
        let raw = r.read_slice(8)?;
        Ok(Some(f64::from_le_bytes(raw.as_ref().try_into().unwrap())))
    } else {
        Ok(None)
    }
}

fn put_opt_str(out: &mut Vec<u8>, v: &Option<String>) {
    match v {
        Some(s) => {
            out.push(1);
            put_str(out, s);
        }
        None => out.push(0),
    }
}

fn get_opt_str(r: &mut ByteReader) -> Result<Option<String>> {
    if get_bool(r)? {
        Ok(Some(get_str(r)?))
    } else {
        Ok(None)
    }
}

/// The final uncompressed record of the file, locating the footer and
/// metadata blobs and naming the compression they use.
#[derive(Debug, Clone, PartialEq)]
pub struct PostScript {
    /// Byte length of the compressed footer blob.
    pub footer_length: u64,
    /// Byte length of the compressed metadata blob.
    pub metadata_length: u64,
    /// Compression used by every stream and blob in the file.
    pub compression: CompressionKind,
    /// Uncompressed chunk size for that compression.
    pub compression_block_size: u64,
    /// Writer format version, major then minor.
    pub version: (u64, u64),
}

impl PostScript {
    /// Encodes the PostScript. The result must stay within
    /// [`MAX_POST_SCRIPT_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(32);
        put_u64(&mut out, self.footer_length);
        put_u64(&mut out, self.metadata_length);
        out.push(self.compression as u8);
        put_u64(&mut out, self.compression_block_size);
        put_u64(&mut out, self.version.0);
        put_u64(&mut out, self.version.1);
        out.extend_from_slice(MAGIC);
        if out.len() > MAX_POST_SCRIPT_SIZE {
            return Err(Error::corrupt("postscript exceeds 255 bytes"));
        }
        Ok(out)
    }

    /// Decodes a PostScript, verifying the trailing magic.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MAGIC.len() || &data[data.len() - MAGIC.len()..] != MAGIC {
            return Err(Error::corrupt("postscript magic mismatch"));
        }
        let mut r = ByteReader::new(Bytes::copy_from_slice(&data[..data.len() - MAGIC.len()]));
        let footer_length = read_uvarint(&mut r)?;
        let metadata_length = read_uvarint(&mut r)?;
        let compression = CompressionKind::from_u8(r.expect_u8("postscript")?)?;
        let compression_block_size = read_uvarint(&mut r)?;
        let version = (read_uvarint(&mut r)?, read_uvarint(&mut r)?);
        Ok(Self {
            footer_length,
            metadata_length,
            compression,
            compression_block_size,
            version,
        })
    }
}

/// Location and row count of one stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeInformation {
    /// Byte offset of the stripe from the start of the file.
    pub offset: u64,
    /// Total byte length of the stripe's index streams.
    pub index_length: u64,
    /// Total byte length of the stripe's data streams.
    pub data_length: u64,
    /// Byte length of the stripe footer.
    pub footer_length: u64,
    /// Number of rows in the stripe.
    pub number_of_rows: u64,
}

impl StripeInformation {
    fn encode(&self, out: &mut Vec<u8>) {
        put_u64(out, self.offset);
        put_u64(out, self.index_length);
        put_u64(out, self.data_length);
        put_u64(out, self.footer_length);
        put_u64(out, self.number_of_rows);
    }

    fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            offset: read_uvarint(r)?,
            index_length: read_uvarint(r)?,
            data_length: read_uvarint(r)?,
            footer_length: read_uvarint(r)?,
            number_of_rows: read_uvarint(r)?,
        })
    }
}

/// The file footer: schema, stripe directory, file statistics.
#[derive(Debug, Clone)]
pub struct Footer {
    /// Byte length of the file header (the magic).
    pub header_length: u64,
    /// Byte offset where stripe data ends.
    pub content_length: u64,
    /// Stripe directory, in file order.
    pub stripes: Vec<StripeInformation>,
    /// The schema, flattened pre-order; the index is the column id.
    pub types: FlatSchema,
    /// Total number of rows in the file.
    pub number_of_rows: u64,
    /// File-level statistics, one per column.
    pub statistics: Vec<ColumnStatistics>,
    /// Number of rows covered by each row index entry.
    pub row_index_stride: u64,
}

impl Footer {
    /// Encodes the footer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.header_length);
        put_u64(&mut out, self.content_length);
        put_u64(&mut out, self.stripes.len() as u64);
        for stripe in &self.stripes {
            stripe.encode(&mut out);
        }
        put_u64(&mut out, self.types.len() as u64);
        for node in self.types.nodes() {
            encode_type(node, &mut out);
        }
        put_u64(&mut out, self.number_of_rows);
        put_u64(&mut out, self.statistics.len() as u64);
        for stats in &self.statistics {
            encode_statistics(stats, &mut out);
        }
        put_u64(&mut out, self.row_index_stride);
        out
    }

    /// Decodes a footer.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let header_length = read_uvarint(&mut r)?;
        let content_length = read_uvarint(&mut r)?;
        let num_stripes = read_uvarint(&mut r)? as usize;
        let mut stripes = Vec::with_capacity(num_stripes.min(1 << 16));
        for _ in 0..num_stripes {
            stripes.push(StripeInformation::decode(&mut r)?);
        }
        let num_types = read_uvarint(&mut r)? as usize;
        let mut nodes = Vec::with_capacity(num_types.min(1 << 16));
        for _ in 0..num_types {
            nodes.push(decode_type(&mut r)?);
        }
        let types = FlatSchema::from_nodes(fix_parents(nodes)?);
        let number_of_rows = read_uvarint(&mut r)?;
        let num_stats = read_uvarint(&mut r)? as usize;
        let mut statistics = Vec::with_capacity(num_stats.min(1 << 16));
        for _ in 0..num_stats {
            statistics.push(decode_statistics(&mut r)?);
        }
        let row_index_stride = read_uvarint(&mut r)?;
        Ok(Self {
            header_length,
            content_length,
            stripes,
            types,
            number_of_rows,
            statistics,
            row_index_stride,
        })
    }
}

fn encode_type(node: &FlatNode, out: &mut Vec<u8>) {
    out.push(node.category as u8);
    put_u64(out, node.children.len() as u64);
    for &child in &node.children {
        put_u64(out, child as u64);
    }
    put_u64(out, node.field_names.len() as u64);
    for name in &node.field_names {
        put_str(out, name);
    }
    put_u64(out, node.precision as u64);
    put_u64(out, node.scale as u64);
    put_u64(out, node.max_length as u64);
}

fn decode_type(r: &mut ByteReader) -> Result<FlatNode> {
    let category = Category::from_u8(r.expect_u8("type descriptor")?)?;
    let num_children = read_uvarint(r)? as usize;
    let mut children = Vec::with_capacity(num_children.min(1 << 16));
    for _ in 0..num_children {
        children.push(read_uvarint(r)? as usize);
    }
    let num_names = read_uvarint(r)? as usize;
    let mut field_names = Vec::with_capacity(num_names.min(1 << 16));
    for _ in 0..num_names {
        field_names.push(get_str(r)?);
    }
    Ok(FlatNode {
        category,
        parent: None,
        children,
        field_names,
        precision: read_uvarint(r)? as u32,
        scale: read_uvarint(r)? as u32,
        max_length: read_uvarint(r)? as u32,
    })
}

fn fix_parents(mut nodes: Vec<FlatNode>) -> Result<Vec<FlatNode>> {
    for id in 0..nodes.len() {
        let children = nodes[id].children.clone();
        for child in children {
            if child >= nodes.len() {
                return Err(Error::corrupt("type child id out of range"));
            }
            nodes[child].parent = Some(id);
        }
    }
    Ok(nodes)
}

fn encode_statistics(stats: &ColumnStatistics, out: &mut Vec<u8>) {
    put_u64(out, stats.number_of_values());
    put_bool(out, stats.has_null());
    match stats.typed() {
        TypedStatistics::Generic => out.push(0),
        TypedStatistics::Integer { min, max, sum } => {
            out.push(1);
            put_opt_i64(out, *min);
            put_opt_i64(out, *max);
            put_opt_i64(out, *sum);
        }
        TypedStatistics::Double { min, max, sum } => {
            out.push(2);
            put_opt_f64(out, *min);
            put_opt_f64(out, *max);
            out.extend_from_slice(&sum.to_le_bytes());
        }
        TypedStatistics::String { min, max, total_length } => {
            out.push(3);
            put_opt_str(out, min);
            put_opt_str(out, max);
            put_u64(out, *total_length);
        }
        TypedStatistics::Boolean { true_count } => {
            out.push(4);
            put_u64(out, *true_count);
        }
        TypedStatistics::Binary { total_length } => {
            out.push(5);
            put_u64(out, *total_length);
        }
        TypedStatistics::Date { min, max } => {
            out.push(6);
            put_opt_i64(out, min.map(i64::from));
            put_opt_i64(out, max.map(i64::from));
        }
        TypedStatistics::Timestamp { min, max } => {
            out.push(7);
            put_opt_i64(out, *min);
            put_opt_i64(out, *max);
        }
        TypedStatistics::Decimal { min, max } => {
            out.push(8);
            for bound in [min, max] {
                match bound {
                    Some(d) => {
                        out.push(1);
                        write_svarint128(out, d.value).expect("vec write");
                        write_svarint(out, d.scale as i64).expect("vec write");
                    }
                    None => out.push(0),
                }
            }
        }
    }
}

fn decode_statistics(r: &mut ByteReader) -> Result<ColumnStatistics> {
    let number_of_values = read_uvarint(r)?;
    let has_null = get_bool(r)?;
    let typed = match r.expect_u8("statistics family")? {
        0 => TypedStatistics::Generic,
        1 => TypedStatistics::Integer {
            min: get_opt_i64(r)?,
            max: get_opt_i64(r)?,
            sum: get_opt_i64(r)?,
        },
        2 => {
            let min = get_opt_f64(r)?;
            let max = get_opt_f64(r)?;
            let raw = r.read_slice(8)?;
            TypedStatistics::Double {
                min,
                max,
                sum: f64::from_le_bytes(raw.as_ref().try_into().unwrap()),
            }
        }
        3 => TypedStatistics::String {
            min: get_opt_str(r)?,
            max: get_opt_str(r)?,
            total_length: read_uvarint(r)?,
        },
        4 => TypedStatistics::Boolean { true_count: read_uvarint(r)? },
        5 => TypedStatistics::Binary { total_length: read_uvarint(r)? },
        6 => TypedStatistics::Date {
            min: get_opt_i64(r)?.map(|v| v as i32),
            max: get_opt_i64(r)?.map(|v| v as i32),
        },
        7 => TypedStatistics::Timestamp { min: get_opt_i64(r)?, max: get_opt_i64(r)? },
        8 => {
            let mut bounds = [None, None];
            for bound in bounds.iter_mut() {
                if get_bool(r)? {
                    let value = read_svarint128(r)?;
                    let scale = read_svarint(r)? as i32;
                    *bound = Some(Decimal::new(value, scale));
                }
            }
            TypedStatistics::Decimal { min: bounds[0], max: bounds[1] }
        }
        other => return Err(Error::corrupt(format!("unknown statistics family {}", other))),
    };
    Ok(ColumnStatistics::from_parts(number_of_values, has_null, typed))
}

/// How a column's streams are encoded within a stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnEncodingKind {
    /// Version 1 value codecs.
    Direct = 0,
    /// Version 1 dictionary encoding.
    Dictionary = 1,
    /// Version 2 value codecs.
    DirectV2 = 2,
    /// Version 2 dictionary encoding.
    DictionaryV2 = 3,
}

impl ColumnEncodingKind {
    /// Converts from the wire value stored in the stripe footer.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => ColumnEncodingKind::Direct,
            1 => ColumnEncodingKind::Dictionary,
            2 => ColumnEncodingKind::DirectV2,
            3 => ColumnEncodingKind::DictionaryV2,
            other => {
                return Err(Error::corrupt(format!("unknown column encoding {}", other)))
            }
        })
    }
}

/// A column's encoding for one stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnEncoding {
    /// The encoding kind.
    pub kind: ColumnEncodingKind,
    /// The number of dictionary entries, for dictionary encodings.
    pub dictionary_size: u64,
}

impl ColumnEncoding {
    /// A direct (non-dictionary) encoding of the given kind.
    pub fn direct(kind: ColumnEncodingKind) -> Self {
        Self { kind, dictionary_size: 0 }
    }
}

/// One stream descriptor in a stripe footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInformation {
    /// The stream's identity.
    pub id: StreamId,
    /// The stream's compressed byte length in the stripe.
    pub length: u64,
}

/// The footer of one stripe: its streams, in file order, and the encoding
/// of every column. Stream offsets accumulate from the stripe base in
/// footer order.
#[derive(Debug, Clone, Default)]
pub struct StripeFooter {
    /// Stream descriptors, in the order the streams appear in the stripe.
    pub streams: Vec<StreamInformation>,
    /// Column encodings, indexed by column id.
    pub columns: Vec<ColumnEncoding>,
}

impl StripeFooter {
    /// Encodes the stripe footer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.streams.len() as u64);
        for stream in &self.streams {
            put_u64(&mut out, stream.id.column as u64);
            out.push(stream.id.kind as u8);
            put_u64(&mut out, stream.length);
        }
        put_u64(&mut out, self.columns.len() as u64);
        for column in &self.columns {
            out.push(column.kind as u8);
            put_u64(&mut out, column.dictionary_size);
        }
        out
    }

    /// Decodes a stripe footer.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let num_streams = read_uvarint(&mut r)? as usize;
        let mut streams = Vec::with_capacity(num_streams.min(1 << 16));
        for _ in 0..num_streams {
            let column = read_uvarint(&mut r)? as usize;
            let kind = StreamKind::from_u8(r.expect_u8("stream descriptor")?)?;
            let length = read_uvarint(&mut r)?;
            streams.push(StreamInformation { id: StreamId::new(column, kind), length });
        }
        let num_columns = read_uvarint(&mut r)? as usize;
        let mut columns = Vec::with_capacity(num_columns.min(1 << 16));
        for _ in 0..num_columns {
            let kind = ColumnEncodingKind::from_u8(r.expect_u8("column encoding")?)?;
            let dictionary_size = read_uvarint(&mut r)?;
            columns.push(ColumnEncoding { kind, dictionary_size });
        }
        Ok(Self { streams, columns })
    }
}

/// One row index entry: the stream positions needed to resume decoding at
/// a stride boundary, plus that stride's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIndexEntry {
    /// Per-stream resume positions, concatenated in the column's canonical
    /// stream order.
    pub positions: Vec<u64>,
    /// Statistics for the rows of this stride.
    pub statistics: ColumnStatistics,
}

/// The row index of one column in one stripe.
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    /// One entry per row index stride.
    pub entries: Vec<RowIndexEntry>,
}

impl RowIndex {
    /// Encodes the row index.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.entries.len() as u64);
        for entry in &self.entries {
            put_u64(&mut out, entry.positions.len() as u64);
            for &p in &entry.positions {
                put_u64(&mut out, p);
            }
            encode_statistics(&entry.statistics, &mut out);
        }
        out
    }

    /// Decodes a row index.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let num_entries = read_uvarint(&mut r)? as usize;
        let mut entries = Vec::with_capacity(num_entries.min(1 << 16));
        for _ in 0..num_entries {
            let num_positions = read_uvarint(&mut r)? as usize;
            let mut positions = Vec::with_capacity(num_positions.min(1 << 16));
            for _ in 0..num_positions {
                positions.push(read_uvarint(&mut r)?);
            }
            let statistics = decode_statistics(&mut r)?;
            entries.push(RowIndexEntry { positions, statistics });
        }
        Ok(Self { entries })
    }
}

/// The file metadata blob: stripe-level statistics for every stripe.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Per-stripe, per-column statistics, in stripe order.
    pub stripe_statistics: Vec<Vec<ColumnStatistics>>,
}

impl Metadata {
    /// Encodes the metadata blob.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.stripe_statistics.len() as u64);
        for stripe in &self.stripe_statistics {
            put_u64(&mut out, stripe.len() as u64);
            for stats in stripe {
                encode_statistics(stats, &mut out);
            }
        }
        out
    }

    /// Decodes the metadata blob.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let num_stripes = read_uvarint(&mut r)? as usize;
        let mut stripe_statistics = Vec::with_capacity(num_stripes.min(1 << 16));
        for _ in 0..num_stripes {
            let num_cols = read_uvarint(&mut r)? as usize;
            let mut cols = Vec::with_capacity(num_cols.min(1 << 16));
            for _ in 0..num_cols {
                cols.push(decode_statistics(&mut r)?);
            }
            stripe_statistics.push(cols);
        }
        Ok(Self { stripe_statistics })
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::TypeDescription;

    use super::*;

    #[test]
    fn test_postscript_round_trip() {
        let ps = PostScript {
            footer_length: 1234,
            metadata_length: 567,
            compression: CompressionKind::Zlib,
            compression_block_size: 262144,
            version: FORMAT_VERSION,
        };
        let encoded = ps.encode().unwrap();
        assert!(encoded.len() <= MAX_POST_SCRIPT_SIZE);
        assert_eq!(&encoded[encoded.len() - 3..], b"ORC");
        assert_eq!(PostScript::decode(&encoded).unwrap(), ps);
    }

    #[test]
    fn test_postscript_bad_magic() {
        let ps = PostScript {
            footer_length: 1,
            metadata_length: 1,
            compression: CompressionKind::None,
            compression_block_size: 1,
            version: FORMAT_VERSION,
        };
        let mut encoded = ps.encode().unwrap();
        let n = encoded.len();
        encoded[n - 1] = b'X';
        assert!(matches!(PostScript::decode(&encoded), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_footer_round_trip() {
        let schema = TypeDescription::from_str("struct<a:int,b:array<string>>").unwrap();
        let mut stats = ColumnStatistics::new(Category::Int);
        stats.update_integer(42);
        let footer = Footer {
            header_length: 3,
            content_length: 900,
            stripes: vec![StripeInformation {
                offset: 3,
                index_length: 20,
                data_length: 870,
                footer_length: 7,
                number_of_rows: 1000,
            }],
            types: schema.flatten(),
            number_of_rows: 1000,
            statistics: vec![
                ColumnStatistics::new(Category::Struct),
                stats,
                ColumnStatistics::new(Category::List),
                ColumnStatistics::new(Category::String),
            ],
            row_index_stride: 10_000,
        };
        let decoded = Footer::decode(Bytes::from(footer.encode())).unwrap();
        assert_eq!(decoded.stripes, footer.stripes);
        assert_eq!(decoded.number_of_rows, 1000);
        assert_eq!(decoded.row_index_stride, 10_000);
        assert_eq!(decoded.statistics, footer.statistics);
        assert_eq!(decoded.types.to_tree().unwrap(), schema);
        assert_eq!(decoded.types.node(2).parent, Some(0));
    }

    #[test]
    fn test_stripe_footer_round_trip() {
        let footer = StripeFooter {
            streams: vec![
                StreamInformation {
                    id: StreamId::new(1, StreamKind::RowIndex),
                    length: 12,
                },
                StreamInformation {
                    id: StreamId::new(1, StreamKind::Present),
                    length: 5,
                },
                StreamInformation { id: StreamId::new(1, StreamKind::Data), length: 99 },
            ],
            columns: vec![
                ColumnEncoding::direct(ColumnEncodingKind::Direct),
                ColumnEncoding { kind: ColumnEncodingKind::DictionaryV2, dictionary_size: 17 },
            ],
        };
        let decoded = StripeFooter::decode(Bytes::from(footer.encode())).unwrap();
        assert_eq!(decoded.streams, footer.streams);
        assert_eq!(decoded.columns, footer.columns);
    }

    #[test]
    fn test_row_index_round_trip() {
        let mut stats = ColumnStatistics::new(Category::String);
        stats.update_string("zeta");
        let index = RowIndex {
            entries: vec![
                RowIndexEntry {
                    positions: vec![0, 0, 0],
                    statistics: stats.clone(),
                },
                RowIndexEntry { positions: vec![120, 3, 511], statistics: stats },
            ],
        };
        let decoded = RowIndex::decode(Bytes::from(index.encode())).unwrap();
        assert_eq!(decoded.entries, index.entries);
    }

    #[test]
    fn test_decimal_statistics_round_trip() {
        let mut stats = ColumnStatistics::new(Category::Decimal);
        stats.update_decimal(Decimal::new(-12345, 2));
        stats.update_decimal(Decimal::new(99999, 2));
        let mut out = Vec::new();
        encode_statistics(&stats, &mut out);
        let mut r = ByteReader::new(Bytes::from(out));
        assert_eq!(decode_statistics(&mut r).unwrap(), stats);
    }

    #[test]
    fn test_metadata_round_trip() {
        let mut a = ColumnStatistics::new(Category::Int);
        a.update_integer(1);
        let md = Metadata { stripe_statistics: vec![vec![a.clone()], vec![a]] };
        let decoded = Metadata::decode(Bytes::from(md.encode())).unwrap();
        assert_eq!(decoded.stripe_statistics, md.stripe_statistics);
    }

    #[test]
    fn test_truncated_footer() {
        let schema = TypeDescription::from_str("struct<a:int>").unwrap();
        let footer = Footer {
            header_length: 3,
            content_length: 0,
            stripes: vec![],
            types: schema.flatten(),
            number_of_rows: 0,
            statistics: vec![],
            row_index_stride: 10_000,
        };
        let encoded = footer.encode();
        let result = Footer::decode(Bytes::from(encoded[..encoded.len() / 2].to_vec()));
        assert!(result.is_err());
    }
}
