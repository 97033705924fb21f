//! ORC file writer.
//!
//! Rows are pushed into a tree of per-column writers; every
//! `row_index_stride` rows the tree records index positions, and once the
//! buffered streams reach the stripe size the stripe is flushed to the
//! sink: index streams, data streams, then the stripe footer. Closing the
//! writer appends the metadata blob, the file footer, the PostScript and
//! its length byte.

mod dictionary;
mod tree;

use tree::{create_tree_writer, CodecConfig, StripeStreams, TreeWriter};

pub(crate) use tree::parse_nanos;

pub use tree::TIMESTAMP_BASE_SECONDS;

use std::io::Write as IoWrite;

use log::debug;

use crate::config::WriterOptions;
use crate::error::{Error, Result};
use crate::meta::{
    Footer, Metadata, PostScript, StreamInformation, StripeFooter, StripeInformation, MAGIC,
};
use crate::outstream::OutStream;
use crate::schema::{Category, FlatSchema, TypeDescription};
use crate::value::Value;

/// Writes rows into an ORC file.
///
/// ```no_run
/// use orcfile::{TypeDescription, Value, Writer, WriterOptions};
///
/// # fn main() -> orcfile::Result<()> {
/// let schema = TypeDescription::from_str("struct<name:string,score:bigint>")?;
/// let file = std::fs::File::create("scores.orc")?;
/// let mut writer = Writer::new(file, &schema, WriterOptions::default())?;
/// writer.write_row(&[Value::from("ada"), Value::from(100i64)])?;
/// writer.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Writer<W: IoWrite> {
    sink: W,
    flat: FlatSchema,
    options: WriterOptions,
    root: Box<dyn TreeWriter>,
    offset: u64,
    stripes: Vec<StripeInformation>,
    stripe_statistics: Vec<Vec<crate::statistics::ColumnStatistics>>,
    rows_in_stripe: u64,
    rows_since_entry: u64,
    total_rows: u64,
    closed: bool,
}

impl<W: IoWrite> Writer<W> {
    /// Creates a writer over a sequential sink. The schema's root must be
    /// a struct; its fields are the top-level columns.
    pub fn new(mut sink: W, schema: &TypeDescription, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        if schema.category() != Category::Struct {
            return Err(Error::schema_mismatch("the root of a schema must be a struct"));
        }
        let flat = schema.flatten();
        let cfg = CodecConfig {
            kind: options.compression,
            block_size: options.compression_block_size,
            dictionary_key_ratio: options.dictionary_key_ratio,
        };
        let root = create_tree_writer(&flat, 0, cfg)?;
        sink.write_all(MAGIC)?;
        Ok(Self {
            sink,
            flat,
            options,
            root,
            offset: MAGIC.len() as u64,
            stripes: Vec::new(),
            stripe_statistics: Vec::new(),
            rows_in_stripe: 0,
            rows_since_entry: 0,
            total_rows: 0,
            closed: false,
        })
    }

    /// The schema being written.
    pub fn schema(&self) -> Result<TypeDescription> {
        self.flat.to_tree()
    }

    /// Appends one row, given as the values of the root struct's fields.
    pub fn write_row(&mut self, fields: &[Value]) -> Result<()> {
        let row = Value::Struct(fields.to_vec());
        self.write_value(&row)
    }

    /// Appends one row given as a struct value.
    pub fn write_value(&mut self, row: &Value) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_argument("writer is closed"));
        }
        self.root.write(row)?;
        self.rows_in_stripe += 1;
        self.rows_since_entry += 1;
        if self.rows_since_entry == self.options.row_index_stride {
            self.root.create_row_index_entry()?;
            self.rows_since_entry = 0;
        }
        if self.root.estimated_size() >= self.options.stripe_size {
            self.flush_stripe()?;
        }
        Ok(())
    }

    /// Flushes the current stripe to the sink, if it holds any rows.
    pub fn flush_stripe(&mut self) -> Result<()> {
        if self.rows_in_stripe == 0 {
            return Ok(());
        }
        let mut streams = StripeStreams::default();
        self.root.flush_stripe(&mut streams, self.rows_since_entry > 0)?;

        let stripe_offset = self.offset;
        let mut footer = StripeFooter { streams: Vec::new(), columns: streams.encodings };

        // Index streams first, then data streams; offsets accumulate from
        // the stripe base in footer order.
        let mut index_length = 0u64;
        for (id, bytes) in &streams.index_streams {
            footer
                .streams
                .push(StreamInformation { id: *id, length: bytes.len() as u64 });
            index_length += bytes.len() as u64;
        }
        let mut data_length = 0u64;
        for (id, bytes) in &streams.data_streams {
            footer
                .streams
                .push(StreamInformation { id: *id, length: bytes.len() as u64 });
            data_length += bytes.len() as u64;
        }
        for (_, bytes) in streams.index_streams.iter().chain(&streams.data_streams) {
            self.sink.write_all(bytes)?;
        }

        let mut footer_stream = OutStream::new(
            self.options.compression,
            self.options.compression_block_size,
        );
        footer_stream.put(&footer.encode())?;
        let footer_bytes = footer_stream.finish()?;
        self.sink.write_all(&footer_bytes)?;

        let info = StripeInformation {
            offset: stripe_offset,
            index_length,
            data_length,
            footer_length: footer_bytes.len() as u64,
            number_of_rows: self.rows_in_stripe,
        };
        debug!(
            "flushed stripe {} at offset {}: {} rows, {} streams",
            self.stripes.len(),
            stripe_offset,
            info.number_of_rows,
            footer.streams.len()
        );
        self.offset += index_length + data_length + info.footer_length;
        self.stripes.push(info);
        self.stripe_statistics.push(streams.statistics);
        self.total_rows += self.rows_in_stripe;
        self.rows_in_stripe = 0;
        self.rows_since_entry = 0;
        Ok(())
    }

    /// Flushes the last stripe and writes the file tail. The writer cannot
    /// be used afterwards.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_stripe()?;
        self.closed = true;

        let content_length = self.offset;

        let metadata = Metadata { stripe_statistics: std::mem::take(&mut self.stripe_statistics) };
        let mut metadata_stream = OutStream::new(
            self.options.compression,
            self.options.compression_block_size,
        );
        metadata_stream.put(&metadata.encode())?;
        let metadata_bytes = metadata_stream.finish()?;

        let mut file_statistics = Vec::with_capacity(self.flat.len());
        self.root.collect_file_statistics(&mut file_statistics);

        let footer = Footer {
            header_length: MAGIC.len() as u64,
            content_length,
            stripes: std::mem::take(&mut self.stripes),
            types: self.flat.clone(),
            number_of_rows: self.total_rows,
            statistics: file_statistics,
            row_index_stride: self.options.row_index_stride,
        };
        let mut footer_stream = OutStream::new(
            self.options.compression,
            self.options.compression_block_size,
        );
        footer_stream.put(&footer.encode())?;
        let footer_bytes = footer_stream.finish()?;

        // The PostScript itself is never compressed.
        let postscript = PostScript {
            footer_length: footer_bytes.len() as u64,
            metadata_length: metadata_bytes.len() as u64,
            compression: self.options.compression,
            compression_block_size: self.options.compression_block_size as u64,
            version: crate::meta::FORMAT_VERSION,
        };
        let postscript_bytes = postscript.encode()?;

        self.sink.write_all(&metadata_bytes)?;
        self.sink.write_all(&footer_bytes)?;
        self.sink.write_all(&postscript_bytes)?;
        self.sink.write_all(&[postscript_bytes.len() as u8])?;
        self.sink.flush()?;
        debug!(
            "closed file: {} rows, {} stripes, {} footer bytes",
            self.total_rows,
            footer.stripes.len(),
            footer_bytes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionKind;

    fn schema() -> TypeDescription {
        TypeDescription::from_str("struct<a:bigint,b:string>").unwrap()
    }

    #[test]
    fn test_magic_first() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf, &schema(), WriterOptions::default()).unwrap();
        w.close().unwrap();
        assert_eq!(&buf[..3], b"ORC");
    }

    #[test]
    fn test_tail_layout() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf, &schema(), WriterOptions::default()).unwrap();
        w.write_row(&[Value::Int(1), Value::from("x")]).unwrap();
        w.close().unwrap();

        // The last byte holds the PostScript length.
        let ps_len = buf[buf.len() - 1] as usize;
        assert!(ps_len > 0 && ps_len < buf.len());
        let ps = PostScript::decode(&buf[buf.len() - 1 - ps_len..buf.len() - 1]).unwrap();
        assert_eq!(ps.compression, CompressionKind::None);
        assert_eq!(ps.version, crate::meta::FORMAT_VERSION);
        assert!(ps.footer_length > 0);
    }

    #[test]
    fn test_root_must_be_struct() {
        let not_struct = TypeDescription::from_str("bigint").unwrap();
        let result = Writer::new(Vec::new(), &not_struct, WriterOptions::default());
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_struct_arity_checked() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf, &schema(), WriterOptions::default()).unwrap();
        assert!(matches!(
            w.write_row(&[Value::Int(1)]),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_write_after_close() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf, &schema(), WriterOptions::default()).unwrap();
        w.close().unwrap();
        assert!(w.write_row(&[Value::Int(1), Value::from("x")]).is_err());
    }
}
