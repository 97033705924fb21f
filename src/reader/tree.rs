//! Per-column tree readers.
//!
//! Mirrors of the tree writers: each reader pulls from the decompressed
//! streams of the current stripe and produces one [`Value`] per row. The
//! present bitmap short-circuits value decoding on absent rows; the cursor
//! drives every reader by the stripe row count, which also truncates the
//! boolean codec's trailing padding bits.

use bytes::Bytes;

use crate::encoding::boolean::BooleanRleReader;
use crate::encoding::byte_rle::ByteRleReader;
use crate::encoding::rle_v1::IntRleV1Reader;
use crate::encoding::rle_v2::IntRleV2Reader;
use crate::encoding::varint::read_svarint128;
use crate::encoding::{ByteReader, IntegerReader};
use crate::error::{Error, Result};
use crate::meta::{ColumnEncoding, ColumnEncodingKind};
use crate::schema::{Category, FlatSchema};
use crate::stream::{StreamId, StreamKind, StreamMap};
use crate::value::{Decimal, Timestamp, Value};
use crate::writer::{parse_nanos, TIMESTAMP_BASE_SECONDS};

/// The common contract of all column readers: produce the next row's
/// value. The caller bounds the number of calls by the stripe row count.
pub(crate) trait TreeReader {
    fn next(&mut self) -> Result<Value>;
}

/// The stream kinds a column of the given category can use. Stream
/// activation loads only these for selected columns.
pub(crate) fn streams_for(category: Category) -> &'static [StreamKind] {
    use StreamKind::*;
    match category {
        Category::Boolean
        | Category::Byte
        | Category::Short
        | Category::Int
        | Category::Long
        | Category::Date
        | Category::Float
        | Category::Double => &[Present, Data],
        Category::String | Category::Char | Category::Varchar => {
            &[Present, Data, Length, DictionaryData]
        }
        Category::Binary => &[Present, Data, Length],
        Category::Timestamp | Category::Decimal => &[Present, Data, Secondary],
        Category::List | Category::Map => &[Present, Length],
        Category::Struct => &[Present],
        Category::Union => &[Present, Data],
    }
}

/// Reads the Present stream, or reports every row present when the stripe
/// omitted it.
struct PresentReader(Option<BooleanRleReader>);

impl PresentReader {
    fn new(data: Option<Bytes>) -> Self {
        Self(data.map(BooleanRleReader::new))
    }

    fn next_present(&mut self) -> Result<bool> {
        match &mut self.0 {
            Some(r) => r
                .next_bool()?
                .ok_or_else(|| Error::corrupt("present stream exhausted")),
            None => Ok(true),
        }
    }
}

fn create_integer_reader(
    kind: ColumnEncodingKind,
    data: Bytes,
    signed: bool,
) -> Box<dyn IntegerReader> {
    match kind {
        ColumnEncodingKind::DirectV2 | ColumnEncodingKind::DictionaryV2 => {
            Box::new(IntRleV2Reader::new(data, signed))
        }
        ColumnEncodingKind::Direct | ColumnEncodingKind::Dictionary => {
            Box::new(IntRleV1Reader::new(data, signed))
        }
    }
}

fn require_direct(category: Category, encoding: ColumnEncoding) -> Result<()> {
    match encoding.kind {
        ColumnEncodingKind::Direct | ColumnEncodingKind::DirectV2 => Ok(()),
        other => Err(Error::unsupported(format!(
            "{} column with {:?} encoding",
            category.name(),
            other
        ))),
    }
}

/// Builds the reader for column `id` and, recursively, its children.
pub(crate) fn create_tree_reader(
    flat: &FlatSchema,
    id: usize,
    streams: &StreamMap,
    encodings: &[ColumnEncoding],
) -> Result<Box<dyn TreeReader>> {
    let node = flat.node(id);
    let encoding = *encodings.get(id).ok_or_else(|| {
        Error::corrupt(format!("stripe footer has no encoding for column {}", id))
    })?;
    let present = PresentReader::new(streams.try_get(StreamId::new(id, StreamKind::Present)));
    let data = streams.get(StreamId::new(id, StreamKind::Data));
    let lengths = streams.get(StreamId::new(id, StreamKind::Length));

    Ok(match node.category {
        Category::Boolean => {
            require_direct(node.category, encoding)?;
            Box::new(BooleanTreeReader { present, data: BooleanRleReader::new(data) })
        }
        Category::Byte => {
            require_direct(node.category, encoding)?;
            Box::new(ByteTreeReader { present, data: ByteRleReader::new(data) })
        }
        Category::Short | Category::Int | Category::Long => {
            require_direct(node.category, encoding)?;
            Box::new(IntegerTreeReader {
                present,
                data: create_integer_reader(encoding.kind, data, true),
            })
        }
        Category::Float => {
            require_direct(node.category, encoding)?;
            Box::new(FloatTreeReader {
                present,
                data: ByteReader::new(data),
                double: false,
            })
        }
        Category::Double => {
            require_direct(node.category, encoding)?;
            Box::new(FloatTreeReader { present, data: ByteReader::new(data), double: true })
        }
        Category::String | Category::Char | Category::Varchar => match encoding.kind {
            ColumnEncodingKind::Direct | ColumnEncodingKind::DirectV2 => {
                Box::new(StringDirectTreeReader {
                    present,
                    data: ByteReader::new(data),
                    lengths: create_integer_reader(encoding.kind, lengths, false),
                })
            }
            ColumnEncodingKind::Dictionary | ColumnEncodingKind::DictionaryV2 => {
                let dictionary_data =
                    streams.get(StreamId::new(id, StreamKind::DictionaryData));
                let dictionary =
                    load_dictionary(encoding, dictionary_data, lengths)?;
                Box::new(StringDictionaryTreeReader {
                    present,
                    refs: create_integer_reader(encoding.kind, data, false),
                    dictionary,
                })
            }
        },
        Category::Binary => {
            require_direct(node.category, encoding)?;
            Box::new(BinaryTreeReader {
                present,
                data: ByteReader::new(data),
                lengths: create_integer_reader(encoding.kind, lengths, false),
            })
        }
        Category::Timestamp => {
            require_direct(node.category, encoding)?;
            let secondary = streams.get(StreamId::new(id, StreamKind::Secondary));
            Box::new(TimestampTreeReader {
                present,
                seconds: create_integer_reader(encoding.kind, data, true),
                nanos: create_integer_reader(encoding.kind, secondary, false),
            })
        }
        Category::Date => {
            require_direct(node.category, encoding)?;
            Box::new(DateTreeReader {
                present,
                data: create_integer_reader(encoding.kind, data, true),
            })
        }
        Category::Decimal => {
            require_direct(node.category, encoding)?;
            let secondary = streams.get(StreamId::new(id, StreamKind::Secondary));
            Box::new(DecimalTreeReader {
                present,
                data: ByteReader::new(data),
                scales: create_integer_reader(encoding.kind, secondary, true),
            })
        }
        Category::Struct => {
            require_direct(node.category, encoding)?;
            let mut children = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                children.push(create_tree_reader(flat, child, streams, encodings)?);
            }
            Box::new(StructTreeReader { present, children })
        }
        Category::List => {
            require_direct(node.category, encoding)?;
            Box::new(ListTreeReader {
                present,
                lengths: create_integer_reader(encoding.kind, lengths, false),
                child: create_tree_reader(flat, node.children[0], streams, encodings)?,
            })
        }
        Category::Map => {
            require_direct(node.category, encoding)?;
            Box::new(MapTreeReader {
                present,
                lengths: create_integer_reader(encoding.kind, lengths, false),
                key: create_tree_reader(flat, node.children[0], streams, encodings)?,
                value: create_tree_reader(flat, node.children[1], streams, encodings)?,
            })
        }
        Category::Union => {
            require_direct(node.category, encoding)?;
            let mut children = Vec::with_capacity(node.children.len());
            for &child in &node.children {
                children.push(create_tree_reader(flat, child, streams, encodings)?);
            }
            Box::new(UnionTreeReader {
                present,
                tags: ByteRleReader::new(data),
                children,
            })
        }
    })
}

/// Decodes the dictionary entries from their concatenated bytes and
/// per-entry lengths.
fn load_dictionary(
    encoding: ColumnEncoding,
    data: Bytes,
    lengths: Bytes,
) -> Result<Vec<String>> {
    let mut length_reader = create_integer_reader(encoding.kind, lengths, false);
    let mut dictionary = Vec::with_capacity(encoding.dictionary_size as usize);
    let mut offset = 0usize;
    while let Some(len) = length_reader.next_int()? {
        let len = len as usize;
        if offset + len > data.len() {
            return Err(Error::corrupt("dictionary entry beyond dictionary data"));
        }
        let entry = String::from_utf8(data.slice(offset..offset + len).to_vec())
            .map_err(|_| Error::corrupt("invalid utf-8 in dictionary"))?;
        dictionary.push(entry);
        offset += len;
    }
    if dictionary.len() as u64 != encoding.dictionary_size {
        return Err(Error::corrupt(format!(
            "dictionary has {} entries, stripe footer says {}",
            dictionary.len(),
            encoding.dictionary_size
        )));
    }
    Ok(dictionary)
}

struct BooleanTreeReader {
    present: PresentReader,
    data: BooleanRleReader,
}

impl TreeReader for BooleanTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let value = self
            .data
            .next_bool()?
            .ok_or_else(|| Error::corrupt("boolean stream exhausted"))?;
        Ok(Value::Boolean(value))
    }
}

struct ByteTreeReader {
    present: PresentReader,
    data: ByteRleReader,
}

impl TreeReader for ByteTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let value = self
            .data
            .next_byte()?
            .ok_or_else(|| Error::corrupt("byte stream exhausted"))?;
        Ok(Value::Byte(value as i8))
    }
}

struct IntegerTreeReader {
    present: PresentReader,
    data: Box<dyn IntegerReader>,
}

impl TreeReader for IntegerTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let value = self
            .data
            .next_int()?
            .ok_or_else(|| Error::corrupt("integer stream exhausted"))?;
        Ok(Value::Int(value))
    }
}

struct FloatTreeReader {
    present: PresentReader,
    data: ByteReader,
    double: bool,
}

impl TreeReader for FloatTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        if self.double {
            let raw = self.data.read_slice(8)?;
            Ok(Value::Double(f64::from_le_bytes(raw.as_ref().try_into().unwrap())))
        } else {
            let raw = self.data.read_slice(4)?;
            Ok(Value::Float(f32::from_le_bytes(raw.as_ref().try_into().unwrap())))
        }
    }
}

struct StringDirectTreeReader {
    present: PresentReader,
    data: ByteReader,
    lengths: Box<dyn IntegerReader>,
}

impl TreeReader for StringDirectTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let len = self
            .lengths
            .next_int()?
            .ok_or_else(|| Error::corrupt("string length stream exhausted"))?;
        let raw = self.data.read_slice(len as usize)?;
        let value = String::from_utf8(raw.to_vec())
            .map_err(|_| Error::corrupt("invalid utf-8 in string column"))?;
        Ok(Value::String(value))
    }
}

struct StringDictionaryTreeReader {
    present: PresentReader,
    refs: Box<dyn IntegerReader>,
    dictionary: Vec<String>,
}

impl TreeReader for StringDictionaryTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let index = self
            .refs
            .next_int()?
            .ok_or_else(|| Error::corrupt("dictionary index stream exhausted"))?;
        let entry = self.dictionary.get(index as usize).ok_or_else(|| {
            Error::corrupt(format!(
                "dictionary index {} out of range 0..{}",
                index,
                self.dictionary.len()
            ))
        })?;
        Ok(Value::String(entry.clone()))
    }
}

struct BinaryTreeReader {
    present: PresentReader,
    data: ByteReader,
    lengths: Box<dyn IntegerReader>,
}

impl TreeReader for BinaryTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let len = self
            .lengths
            .next_int()?
            .ok_or_else(|| Error::corrupt("binary length stream exhausted"))?;
        let raw = self.data.read_slice(len as usize)?;
        Ok(Value::Binary(raw.to_vec()))
    }
}

struct TimestampTreeReader {
    present: PresentReader,
    seconds: Box<dyn IntegerReader>,
    nanos: Box<dyn IntegerReader>,
}

impl TreeReader for TimestampTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let seconds = self
            .seconds
            .next_int()?
            .ok_or_else(|| Error::corrupt("timestamp stream exhausted"))?;
        let nanos = self
            .nanos
            .next_int()?
            .ok_or_else(|| Error::corrupt("timestamp nanos stream exhausted"))?;
        Ok(Value::Timestamp(Timestamp::new(
            seconds + TIMESTAMP_BASE_SECONDS,
            parse_nanos(nanos as u64),
        )))
    }
}

struct DateTreeReader {
    present: PresentReader,
    data: Box<dyn IntegerReader>,
}

impl TreeReader for DateTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let days = self
            .data
            .next_int()?
            .ok_or_else(|| Error::corrupt("date stream exhausted"))?;
        Ok(Value::Date(days as i32))
    }
}

struct DecimalTreeReader {
    present: PresentReader,
    data: ByteReader,
    scales: Box<dyn IntegerReader>,
}

impl TreeReader for DecimalTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let value = read_svarint128(&mut self.data)?;
        let scale = self
            .scales
            .next_int()?
            .ok_or_else(|| Error::corrupt("decimal scale stream exhausted"))?;
        Ok(Value::Decimal(Decimal::new(value, scale as i32)))
    }
}

struct StructTreeReader {
    present: PresentReader,
    children: Vec<Box<dyn TreeReader>>,
}

impl TreeReader for StructTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let mut fields = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            fields.push(child.next()?);
        }
        Ok(Value::Struct(fields))
    }
}

struct ListTreeReader {
    present: PresentReader,
    lengths: Box<dyn IntegerReader>,
    child: Box<dyn TreeReader>,
}

impl TreeReader for ListTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let len = self
            .lengths
            .next_int()?
            .ok_or_else(|| Error::corrupt("list length stream exhausted"))?;
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            items.push(self.child.next()?);
        }
        Ok(Value::List(items))
    }
}

struct MapTreeReader {
    present: PresentReader,
    lengths: Box<dyn IntegerReader>,
    key: Box<dyn TreeReader>,
    value: Box<dyn TreeReader>,
}

impl TreeReader for MapTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let len = self
            .lengths
            .next_int()?
            .ok_or_else(|| Error::corrupt("map length stream exhausted"))?;
        let mut pairs = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let k = self.key.next()?;
            let v = self.value.next()?;
            pairs.push((k, v));
        }
        Ok(Value::Map(pairs))
    }
}

struct UnionTreeReader {
    present: PresentReader,
    tags: ByteRleReader,
    children: Vec<Box<dyn TreeReader>>,
}

impl TreeReader for UnionTreeReader {
    fn next(&mut self) -> Result<Value> {
        if !self.present.next_present()? {
            return Ok(Value::Null);
        }
        let tag = self
            .tags
            .next_byte()?
            .ok_or_else(|| Error::corrupt("union tag stream exhausted"))?;
        let child = self.children.get_mut(tag as usize).ok_or_else(|| {
            Error::corrupt(format!("union tag {} beyond last variant", tag))
        })?;
        Ok(Value::Union(tag, Box::new(child.next()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_for_categories() {
        assert_eq!(
            streams_for(Category::Int),
            &[StreamKind::Present, StreamKind::Data]
        );
        assert_eq!(
            streams_for(Category::Timestamp),
            &[StreamKind::Present, StreamKind::Data, StreamKind::Secondary]
        );
        assert_eq!(
            streams_for(Category::List),
            &[StreamKind::Present, StreamKind::Length]
        );
    }

    #[test]
    fn test_missing_present_stream_means_all_present() {
        let mut present = PresentReader::new(None);
        for _ in 0..100 {
            assert!(present.next_present().unwrap());
        }
    }

    #[test]
    fn test_unsupported_combination() {
        let encoding = ColumnEncoding {
            kind: ColumnEncodingKind::DictionaryV2,
            dictionary_size: 0,
        };
        assert!(matches!(
            require_direct(Category::Boolean, encoding),
            Err(Error::UnsupportedEncoding(_))
        ));
    }
}
