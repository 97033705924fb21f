//! Buffered stream output with position recording.
//!
//! Every stream a column writer emits is backed by an [`OutStream`]: a
//! two-layer buffer where incoming bytes fill an uncompressed chunk which is
//! framed into the finished accumulator once it reaches the compression
//! block size. The stream knows how many pre-compression bytes it has seen
//! and can snapshot the positions a reader needs to resume decoding at the
//! current output state, which is what row index entries are made of.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use crate::compress::compress_chunk;
use crate::config::CompressionKind;
use crate::error::Result;

/// A buffered, optionally compressed stream accumulator.
#[derive(Debug)]
pub struct OutStream {
    kind: CompressionKind,
    block_size: usize,
    /// Pending uncompressed chunk. Unused when `kind` is `None`.
    current: BytesMut,
    /// Finished (framed) output.
    finished: BytesMut,
    /// Total bytes received, before compression.
    written: u64,
}

impl OutStream {
    /// Creates a stream for the given codec and chunk size.
    pub fn new(kind: CompressionKind, block_size: usize) -> Self {
        Self {
            kind,
            block_size,
            current: BytesMut::new(),
            finished: BytesMut::new(),
            written: 0,
        }
    }

    /// The total number of pre-compression bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends this stream's position snapshot to `out`. Uncompressed
    /// streams resume from a byte offset; compressed streams resume from
    /// the chunk containing the next byte plus an offset into it.
    pub fn record_positions(&self, out: &mut Vec<u64>) {
        match self.kind {
            CompressionKind::None => out.push(self.written),
            _ => {
                out.push(self.finished.len() as u64);
                out.push(self.current.len() as u64);
            }
        }
    }

    /// The number of position values this stream contributes per snapshot.
    pub fn position_width(kind: CompressionKind) -> usize {
        match kind {
            CompressionKind::None => 1,
            _ => 2,
        }
    }

    /// An estimate of the bytes currently held, for stripe sizing.
    pub fn buffered_len(&self) -> usize {
        self.finished.len() + self.current.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Writes raw bytes into the stream.
    pub fn put(&mut self, mut buf: &[u8]) -> Result<()> {
        self.written += buf.len() as u64;
        if self.kind == CompressionKind::None {
            self.finished.put_slice(buf);
            return Ok(());
        }
        while !buf.is_empty() {
            let room = self.block_size - self.current.len();
            let take = room.min(buf.len());
            self.current.put_slice(&buf[..take]);
            buf = &buf[take..];
            if self.current.len() == self.block_size {
                self.spill()?;
            }
        }
        Ok(())
    }

    /// Writes a single byte into the stream.
    pub fn put_u8(&mut self, b: u8) -> Result<()> {
        self.put(&[b])
    }

    fn spill(&mut self) -> Result<()> {
        if !self.current.is_empty() {
            compress_chunk(self.kind, &self.current, &mut self.finished)?;
            self.current.clear();
        }
        Ok(())
    }

    /// Frames any pending chunk and returns the finished stream bytes,
    /// leaving the stream empty for the next stripe.
    pub fn finish(&mut self) -> Result<Bytes> {
        self.spill()?;
        self.written = 0;
        Ok(self.finished.split().freeze())
    }
}

impl io::Write for OutStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
