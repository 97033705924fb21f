//! Configuration options for the ORC writer.

use crate::error::{Error, Result};

/// The number of rows between row index entries.
pub const DEFAULT_ROW_INDEX_STRIDE: u64 = 10_000;

/// The target uncompressed size of a stripe in bytes.
pub const DEFAULT_STRIPE_SIZE: usize = 200 * 1024 * 1024;

/// The uncompressed size of a compression chunk in bytes.
pub const DEFAULT_COMPRESSION_BLOCK_SIZE: usize = 256 * 1024;

/// Configuration options for writing an ORC file.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Target uncompressed stripe size in bytes. A stripe is flushed once
    /// its buffered streams reach this size.
    /// Default: 200MB
    pub stripe_size: usize,

    /// Number of rows between row index entries.
    /// Default: 10000
    pub row_index_stride: u64,

    /// Compression applied to every stream and metadata blob.
    /// Default: CompressionKind::None
    pub compression: CompressionKind,

    /// Uncompressed size of a single compression chunk (in bytes).
    /// Default: 256KB
    pub compression_block_size: usize,

    /// Threshold on `distinct / total` below which a string column is
    /// dictionary encoded for the stripe.
    /// Default: 0.49
    pub dictionary_key_ratio: f64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            stripe_size: DEFAULT_STRIPE_SIZE,
            row_index_stride: DEFAULT_ROW_INDEX_STRIDE,
            compression: CompressionKind::None,
            compression_block_size: DEFAULT_COMPRESSION_BLOCK_SIZE,
            dictionary_key_ratio: 0.49,
        }
    }
}

impl WriterOptions {
    /// Creates a new WriterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target stripe size.
    pub fn stripe_size(mut self, size: usize) -> Self {
        self.stripe_size = size;
        self
    }

    /// Sets the row index stride.
    pub fn row_index_stride(mut self, stride: u64) -> Self {
        self.row_index_stride = stride;
        self
    }

    /// Sets the compression kind.
    pub fn compression(mut self, kind: CompressionKind) -> Self {
        self.compression = kind;
        self
    }

    /// Sets the compression chunk size.
    pub fn compression_block_size(mut self, size: usize) -> Self {
        self.compression_block_size = size;
        self
    }

    /// Sets the dictionary encoding threshold.
    pub fn dictionary_key_ratio(mut self, ratio: f64) -> Self {
        self.dictionary_key_ratio = ratio;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.stripe_size == 0 {
            return Err(Error::invalid_argument("stripe_size must be > 0"));
        }
        if self.row_index_stride == 0 {
            return Err(Error::invalid_argument("row_index_stride must be > 0"));
        }
        if self.compression_block_size == 0 {
            return Err(Error::invalid_argument(
                "compression_block_size must be > 0",
            ));
        }
        // The chunk header stores the body length in 23 bits.
        if self.compression_block_size >= 1 << 23 {
            return Err(Error::invalid_argument(
                "compression_block_size must be < 8MB",
            ));
        }
        if self.dictionary_key_ratio < 0.0 || self.dictionary_key_ratio > 1.0 {
            return Err(Error::invalid_argument(
                "dictionary_key_ratio must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Compression kinds supported by the ORC format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionKind {
    /// No compression. Streams are raw bytes with no chunk headers.
    None = 0,

    /// Zlib (raw deflate) compressed chunks.
    Zlib = 1,

    /// Snappy (block format) compressed chunks.
    Snappy = 2,
}

impl CompressionKind {
    /// Converts from the wire value stored in the PostScript.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zlib),
            2 => Ok(CompressionKind::Snappy),
            other => Err(Error::UnknownCompression(other)),
        }
    }
}

impl Default for CompressionKind {
    fn default() -> Self {
        CompressionKind::None
    }
}
