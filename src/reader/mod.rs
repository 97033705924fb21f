//! ORC file reader.
//!
//! Opening a file reads the last bytes of the source: the trailing byte
//! gives the PostScript length, the PostScript locates the footer and
//! metadata blobs and names their compression, and the footer carries the
//! schema and the stripe directory. Stripes are loaded lazily by the
//! [`Cursor`], which decompresses only the streams the selected columns
//! need.

mod cursor;
mod tree;

pub use cursor::Cursor;

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use bytes::Bytes;
use log::debug;

use crate::compress::decompress;
use crate::config::CompressionKind;
use crate::error::{Error, Result};
use crate::meta::{Footer, Metadata, PostScript, RowIndex, StripeFooter, StripeInformation, MAGIC, MAX_POST_SCRIPT_SIZE};
use crate::schema::TypeDescription;
use crate::statistics::ColumnStatistics;
use crate::stream::{StreamId, StreamKind, StreamMap};

/// A positioned byte source that knows its size. The reader never needs
/// sequential access, so files and in-memory buffers both qualify.
pub trait SizedReadAt {
    /// The total size of the source in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` from the given offset, failing with `ShortRead` when
    /// not enough bytes are available.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

impl SizedReadAt for File {
    fn size(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0)
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;
        FileExt::read_exact_at(self, buf, offset).map_err(Error::from)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::windows::fs::FileExt;
        let mut read = 0;
        while read < buf.len() {
            let n = FileExt::seek_read(self, &mut buf[read..], offset + read as u64)?;
            if n == 0 {
                return Err(Error::ShortRead { expected: buf.len(), actual: read });
            }
            read += n;
        }
        Ok(())
    }
}

impl SizedReadAt for Bytes {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + buf.len() > self.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                actual: self.len().saturating_sub(offset),
            });
        }
        buf.copy_from_slice(&self[offset..offset + buf.len()]);
        Ok(())
    }
}

impl SizedReadAt for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        if offset + buf.len() > self.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                actual: self.len().saturating_sub(offset),
            });
        }
        buf.copy_from_slice(&self[offset..offset + buf.len()]);
        Ok(())
    }
}

/// Reads the metadata of an ORC file and hands out cursors over its rows.
pub struct Reader<R: SizedReadAt> {
    source: R,
    postscript: PostScript,
    footer: Footer,
    metadata: Metadata,
}

impl Reader<File> {
    /// Opens an ORC file on disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: SizedReadAt> Reader<R> {
    /// Reads the file tail (PostScript, footer, metadata) from `source`.
    pub fn new(source: R) -> Result<Self> {
        let size = source.size();
        if size < (MAGIC.len() + 2) as u64 {
            return Err(Error::corrupt("file too small to be an ORC file"));
        }

        let mut magic = [0u8; 3];
        source.read_at(0, &mut magic)?;
        if &magic != MAGIC {
            return Err(Error::corrupt("missing ORC magic at file start"));
        }

        // The tail is at most the PostScript, its length byte and the
        // magic-sized header before them.
        let tail_len = size.min((MAX_POST_SCRIPT_SIZE + 1) as u64);
        let mut tail = vec![0u8; tail_len as usize];
        source.read_at(size - tail_len, &mut tail)?;

        let ps_len = *tail.last().unwrap() as usize;
        if ps_len + 1 > tail.len() {
            return Err(Error::corrupt("postscript length exceeds file size"));
        }
        let ps_start = tail.len() - 1 - ps_len;
        let postscript = PostScript::decode(&tail[ps_start..tail.len() - 1])?;

        let footer_end = size - 1 - ps_len as u64;
        let footer_start = footer_end
            .checked_sub(postscript.footer_length)
            .ok_or_else(|| Error::corrupt("footer length exceeds file size"))?;
        let metadata_start = footer_start
            .checked_sub(postscript.metadata_length)
            .ok_or_else(|| Error::corrupt("metadata length exceeds file size"))?;

        let mut footer_raw = vec![0u8; postscript.footer_length as usize];
        source.read_at(footer_start, &mut footer_raw)?;
        let footer_bytes = decompress(postscript.compression, Bytes::from(footer_raw))?;
        let footer = Footer::decode(footer_bytes)?;

        let mut metadata_raw = vec![0u8; postscript.metadata_length as usize];
        source.read_at(metadata_start, &mut metadata_raw)?;
        let metadata_bytes = decompress(postscript.compression, Bytes::from(metadata_raw))?;
        let metadata = Metadata::decode(metadata_bytes)?;

        debug!(
            "opened ORC file: {} rows, {} stripes, compression {:?}",
            footer.number_of_rows,
            footer.stripes.len(),
            postscript.compression
        );
        Ok(Self { source, postscript, footer, metadata })
    }

    /// The file's schema.
    pub fn schema(&self) -> Result<TypeDescription> {
        self.footer.types.to_tree()
    }

    /// The total number of rows in the file.
    pub fn num_rows(&self) -> u64 {
        self.footer.number_of_rows
    }

    /// The number of stripes.
    pub fn num_stripes(&self) -> usize {
        self.footer.stripes.len()
    }

    /// The compression the file's streams use.
    pub fn compression(&self) -> CompressionKind {
        self.postscript.compression
    }

    /// The stripe directory entry at `index`.
    pub fn stripe_info(&self, index: usize) -> Result<StripeInformation> {
        self.footer
            .stripes
            .get(index)
            .copied()
            .ok_or_else(|| Error::invalid_argument(format!("no stripe {}", index)))
    }

    /// File-level statistics, one per column.
    pub fn file_statistics(&self) -> &[ColumnStatistics] {
        &self.footer.statistics
    }

    /// Per-stripe statistics from the metadata blob.
    pub fn stripe_statistics(&self) -> &[Vec<ColumnStatistics>] {
        &self.metadata.stripe_statistics
    }

    /// The number of rows between row index entries.
    pub fn row_index_stride(&self) -> u64 {
        self.footer.row_index_stride
    }

    /// Reads and decodes the footer of one stripe.
    pub fn stripe_footer(&self, index: usize) -> Result<StripeFooter> {
        let info = self.stripe_info(index)?;
        let offset = info.offset + info.index_length + info.data_length;
        let mut raw = vec![0u8; info.footer_length as usize];
        self.source.read_at(offset, &mut raw)?;
        let decoded = decompress(self.postscript.compression, Bytes::from(raw))?;
        StripeFooter::decode(decoded)
    }

    /// Reads the raw (still compressed) bytes of one stream of a stripe.
    /// Row index positions point into these bytes.
    pub fn stream_bytes(&self, stripe: usize, id: StreamId) -> Result<Bytes> {
        let info = self.stripe_info(stripe)?;
        let stripe_footer = self.stripe_footer(stripe)?;
        let mut offset = info.offset;
        for stream in &stripe_footer.streams {
            if stream.id == id {
                let mut raw = vec![0u8; stream.length as usize];
                self.source.read_at(offset, &mut raw)?;
                return Ok(Bytes::from(raw));
            }
            offset += stream.length;
        }
        Err(Error::invalid_argument(format!(
            "stripe {} has no stream {}",
            stripe, id
        )))
    }

    /// Reads and decodes the row index of one column in one stripe.
    pub fn row_index(&self, stripe: usize, column: usize) -> Result<RowIndex> {
        let raw = self.stream_bytes(stripe, StreamId::new(column, StreamKind::RowIndex))?;
        let decoded = decompress(self.postscript.compression, raw)?;
        RowIndex::decode(decoded)
    }

    /// Selects top-level columns by name and returns a cursor over them.
    pub fn select(&self, fields: &[&str]) -> Result<Cursor<'_, R>> {
        let mut selected = Vec::with_capacity(fields.len());
        let mut included = HashSet::new();
        for field in fields {
            let id = self.footer.types.field_id(field)?;
            selected.push(id);
            included.extend(self.footer.types.subtree_ids(id));
        }
        Ok(Cursor::new(self, selected, included))
    }

    /// Loads and decompresses the streams the included columns need from
    /// one stripe, together with the stripe's column encodings.
    pub(crate) fn load_streams(
        &self,
        stripe: usize,
        included: &HashSet<usize>,
    ) -> Result<(StreamMap, Vec<crate::meta::ColumnEncoding>)> {
        let info = self.stripe_info(stripe)?;
        let stripe_footer = self.stripe_footer(stripe)?;
        let mut map = StreamMap::new();
        let mut offset = info.offset;
        let mut loaded = 0usize;
        for stream in &stripe_footer.streams {
            let wanted = stream.id.kind != StreamKind::RowIndex
                && included.contains(&stream.id.column)
                && tree::streams_for(self.footer.types.node(stream.id.column).category)
                    .contains(&stream.id.kind);
            if wanted {
                let mut raw = vec![0u8; stream.length as usize];
                self.source.read_at(offset, &mut raw)?;
                let decoded = decompress(self.postscript.compression, Bytes::from(raw))?;
                map.set(stream.id, decoded);
                loaded += 1;
            }
            offset += stream.length;
        }
        debug!(
            "stripe {}: loaded {} of {} streams",
            stripe,
            loaded,
            stripe_footer.streams.len()
        );
        Ok((map, stripe_footer.columns))
    }

    pub(crate) fn flat_types(&self) -> &crate::schema::FlatSchema {
        &self.footer.types
    }
}
