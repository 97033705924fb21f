//! Stream identity.
//!
//! Within a stripe every column is stored as several independent byte
//! streams, identified by `(column id, stream kind)`.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{Error, Result};

/// The kinds of stream a column can own within a stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamKind {
    /// The boolean bitmap of non-null rows. Omitted for columns without
    /// nulls.
    Present = 0,
    /// The primary value stream.
    Data = 1,
    /// Per-value lengths (strings, binary) or per-row child counts
    /// (list, map).
    Length = 2,
    /// The concatenated dictionary entries of a dictionary-encoded column.
    DictionaryData = 3,
    /// The secondary value stream: timestamp nanoseconds, decimal scales.
    Secondary = 4,
    /// The serialized row index for the column.
    RowIndex = 5,
}

impl StreamKind {
    /// Converts from the wire value stored in the stripe footer.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => StreamKind::Present,
            1 => StreamKind::Data,
            2 => StreamKind::Length,
            3 => StreamKind::DictionaryData,
            4 => StreamKind::Secondary,
            5 => StreamKind::RowIndex,
            other => return Err(Error::corrupt(format!("unknown stream kind {}", other))),
        })
    }
}

/// Identifies one stream of one column within a stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId {
    /// The owning column id.
    pub column: usize,
    /// The stream kind.
    pub kind: StreamKind,
}

impl StreamId {
    /// Creates a stream id.
    pub fn new(column: usize, kind: StreamKind) -> Self {
        Self { column, kind }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{} kind:{:?}", self.column, self.kind)
    }
}

/// The decompressed streams of one stripe, keyed by identity.
#[derive(Debug, Default)]
pub struct StreamMap {
    streams: HashMap<StreamId, Bytes>,
}

impl StreamMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a stream.
    pub fn set(&mut self, id: StreamId, data: Bytes) {
        self.streams.insert(id, data);
    }

    /// Looks up a stream, returning empty bytes when absent. A missing
    /// Present stream means the column has no nulls, and a missing Data
    /// stream simply decodes zero values.
    pub fn get(&self, id: StreamId) -> Bytes {
        self.streams.get(&id).cloned().unwrap_or_else(Bytes::new)
    }

    /// Looks up a stream, distinguishing absence from emptiness.
    pub fn try_get(&self, id: StreamId) -> Option<Bytes> {
        self.streams.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_wire_values() {
        for kind in [
            StreamKind::Present,
            StreamKind::Data,
            StreamKind::Length,
            StreamKind::DictionaryData,
            StreamKind::Secondary,
            StreamKind::RowIndex,
        ] {
            assert_eq!(StreamKind::from_u8(kind as u8).unwrap(), kind);
        }
        assert!(StreamKind::from_u8(9).is_err());
    }

    #[test]
    fn test_stream_map() {
        let mut m = StreamMap::new();
        m.set(StreamId::new(1, StreamKind::Data), Bytes::from_static(b"abc"));
        assert_eq!(m.get(StreamId::new(1, StreamKind::Data)).as_ref(), b"abc");
        assert!(m.get(StreamId::new(1, StreamKind::Present)).is_empty());
        assert!(m.try_get(StreamId::new(2, StreamKind::Data)).is_none());
    }
}
