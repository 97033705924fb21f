//! Compression chunk framing.
//!
//! Every compressed stream is a sequence of chunks. A chunk starts with a
//! 3-byte little-endian header:
//!
//! ```text
//! [bit 0: is_original][bits 1..24: body length]
//! ```
//!
//! An original chunk carries the uncompressed bytes verbatim; otherwise the
//! body is raw deflate (zlib) or snappy block format. Chunks decompress
//! independently, which makes every chunk boundary a seek point. With
//! `CompressionKind::None` the framing disappears entirely and streams are
//! raw bytes.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::config::CompressionKind;
use crate::error::{Error, Result};

/// Size of the chunk header in bytes.
pub const CHUNK_HEADER_SIZE: usize = 3;

/// Maximum chunk body length representable in the 23-bit header field.
pub const MAX_CHUNK_SIZE: usize = (1 << 23) - 1;

/// Writes a chunk header for a body of `length` bytes.
fn put_chunk_header(out: &mut BytesMut, length: usize, original: bool) {
    let val = length;
    out.put_u8(((val << 1) as u8) | original as u8);
    out.put_u8((val >> 7) as u8);
    out.put_u8((val >> 15) as u8);
}

/// Compresses one chunk of stream bytes into `out`, header included. Falls
/// back to an original chunk when compression would not shrink the body.
pub fn compress_chunk(kind: CompressionKind, chunk: &[u8], out: &mut BytesMut) -> Result<()> {
    if chunk.len() > MAX_CHUNK_SIZE {
        return Err(Error::invalid_argument("compression chunk exceeds 8MB"));
    }
    let compressed = match kind {
        CompressionKind::None => {
            out.put_slice(chunk);
            return Ok(());
        }
        CompressionKind::Zlib => {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(chunk)?;
            enc.finish()?
        }
        CompressionKind::Snappy => snap::raw::Encoder::new()
            .compress_vec(chunk)
            .map_err(|e| Error::corrupt(format!("snappy compression failed: {}", e)))?,
    };
    if compressed.len() < chunk.len() {
        put_chunk_header(out, compressed.len(), false);
        out.put_slice(&compressed);
    } else {
        put_chunk_header(out, chunk.len(), true);
        out.put_slice(chunk);
    }
    Ok(())
}

fn decompress_body(kind: CompressionKind, body: &[u8], out: &mut BytesMut) -> Result<()> {
    match kind {
        CompressionKind::None => unreachable!("no chunk framing without compression"),
        CompressionKind::Zlib => {
            let mut decoded = Vec::new();
            DeflateDecoder::new(body).read_to_end(&mut decoded)?;
            out.put_slice(&decoded);
        }
        CompressionKind::Snappy => {
            let decoded = snap::raw::Decoder::new()
                .decompress_vec(body)
                .map_err(|e| Error::corrupt(format!("snappy chunk: {}", e)))?;
            out.put_slice(&decoded);
        }
    }
    Ok(())
}

/// Decompresses a whole stream of chunks. With `CompressionKind::None` the
/// input is returned as-is.
pub fn decompress(kind: CompressionKind, data: Bytes) -> Result<Bytes> {
    if kind == CompressionKind::None {
        return Ok(data);
    }
    let mut out = BytesMut::new();
    let mut pos = 0;
    while pos < data.len() {
        if data.len() - pos < CHUNK_HEADER_SIZE {
            return Err(Error::corrupt("stream truncated in chunk header"));
        }
        let b0 = data[pos] as usize;
        let b1 = data[pos + 1] as usize;
        let b2 = data[pos + 2] as usize;
        let is_original = b0 & 0x01 == 1;
        let chunk_len = (b2 << 15) | (b1 << 7) | (b0 >> 1);
        pos += CHUNK_HEADER_SIZE;
        if data.len() - pos < chunk_len {
            return Err(Error::corrupt("stream truncated in chunk body"));
        }
        let body = &data[pos..pos + chunk_len];
        if is_original {
            out.put_slice(body);
        } else {
            decompress_body(kind, body, &mut out)?;
        }
        pos += chunk_len;
    }
    Ok(out.freeze())
}

/// Decompresses a stream starting from a row-index seek point: the chunk at
/// `chunk_offset` bytes into the compressed stream, discarding `byte_offset`
/// decompressed bytes. For `CompressionKind::None` the seek point is a plain
/// byte offset and `chunk_offset` must be zero.
pub fn decompress_from(
    kind: CompressionKind,
    data: Bytes,
    chunk_offset: u64,
    byte_offset: u64,
) -> Result<Bytes> {
    let decoded = if kind == CompressionKind::None {
        data
    } else {
        if chunk_offset as usize > data.len() {
            return Err(Error::corrupt("chunk offset beyond end of stream"));
        }
        decompress(kind, data.slice(chunk_offset as usize..))?
    };
    if byte_offset as usize > decoded.len() {
        return Err(Error::corrupt("byte offset beyond end of chunk"));
    }
    Ok(decoded.slice(byte_offset as usize..))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_passthrough() {
        let data = Bytes::from_static(b"hello world");
        let out = decompress(CompressionKind::None, data.clone()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_zlib_round_trip() {
        let chunk: Vec<u8> = std::iter::repeat(b"abcd".as_ref())
            .take(256)
            .flatten()
            .copied()
            .collect();
        let mut framed = BytesMut::new();
        compress_chunk(CompressionKind::Zlib, &chunk, &mut framed).unwrap();
        // Repetitive input must actually compress.
        assert!(framed.len() < chunk.len());
        assert_eq!(framed[0] & 0x01, 0);
        let out = decompress(CompressionKind::Zlib, framed.freeze()).unwrap();
        assert_eq!(out.as_ref(), chunk.as_slice());
    }

    #[test]
    fn test_snappy_round_trip() {
        let chunk: Vec<u8> = std::iter::repeat(b"orcfile".as_ref())
            .take(300)
            .flatten()
            .copied()
            .collect();
        let mut framed = BytesMut::new();
        compress_chunk(CompressionKind::Snappy, &chunk, &mut framed).unwrap();
        let out = decompress(CompressionKind::Snappy, framed.freeze()).unwrap();
        assert_eq!(out.as_ref(), chunk.as_slice());
    }

    #[test]
    fn test_incompressible_chunk_stays_original() {
        // Short non-repetitive input: deflate output is larger, so the
        // chunk must be emitted with the original flag set.
        let chunk = [0x01u8, 0xa7, 0x33, 0x94];
        let mut framed = BytesMut::new();
        compress_chunk(CompressionKind::Zlib, &chunk, &mut framed).unwrap();
        assert_eq!(framed[0] & 0x01, 1);
        assert_eq!(framed.len(), CHUNK_HEADER_SIZE + chunk.len());
        let out = decompress(CompressionKind::Zlib, framed.freeze()).unwrap();
        assert_eq!(out.as_ref(), &chunk);
    }

    #[test]
    fn test_header_length_decode() {
        let mut framed = BytesMut::new();
        put_chunk_header(&mut framed, 100_000, true);
        let b0 = framed[0] as usize;
        let b1 = framed[1] as usize;
        let b2 = framed[2] as usize;
        assert_eq!(b0 & 1, 1);
        assert_eq!((b2 << 15) | (b1 << 7) | (b0 >> 1), 100_000);
    }

    #[test]
    fn test_multi_chunk_stream() {
        let chunk_a = vec![7u8; 4000];
        let chunk_b = vec![9u8; 1000];
        let mut framed = BytesMut::new();
        compress_chunk(CompressionKind::Zlib, &chunk_a, &mut framed).unwrap();
        let second_chunk_offset = framed.len() as u64;
        compress_chunk(CompressionKind::Zlib, &chunk_b, &mut framed).unwrap();
        let framed = framed.freeze();

        let all = decompress(CompressionKind::Zlib, framed.clone()).unwrap();
        assert_eq!(all.len(), 5000);

        // Seek straight to the second chunk.
        let tail = decompress_from(CompressionKind::Zlib, framed, second_chunk_offset, 10).unwrap();
        assert_eq!(tail.len(), 990);
        assert!(tail.iter().all(|&b| b == 9));
    }

    #[test]
    fn test_truncated_chunk() {
        let chunk = vec![7u8; 100];
        let mut framed = BytesMut::new();
        compress_chunk(CompressionKind::Zlib, &chunk, &mut framed).unwrap();
        let truncated = framed.freeze().slice(0..2);
        assert!(matches!(
            decompress(CompressionKind::Zlib, truncated),
            Err(Error::Corrupt(_))
        ));
    }
}
