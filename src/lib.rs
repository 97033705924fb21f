//! # orcfile - an Apache ORC reader and writer
//!
//! ORC is a columnar file format: a file is partitioned into stripes, and
//! within a stripe every column is stored as several independent byte
//! streams. Stream bytes pass through a chain of layered codecs: a value
//! encoder (run-length integer, byte, boolean, dictionary), then an
//! optional block compressor (zlib or snappy), then the stripe layout.
//!
//! ## Architecture
//!
//! - **Value codecs** (`encoding`): bit packing, varints, byte and boolean
//!   run-length coding, and the two generations of integer run-length
//!   coding, including RLE v2's four sub-encodings with automatic mode
//!   selection on write
//! - **Compression framing** (`compress`): independently decodable chunks
//!   with a 3-byte header, the seek points of the row index
//! - **Tree writers/readers** (`writer`, `reader`): per-column state
//!   machines assembling the codecs into streams, tracking positions for
//!   the row index and maintaining column statistics
//! - **Metadata** (`meta`): PostScript, footer, stripe footers, row
//!   indexes and stripe statistics
//!
//! ## Example
//!
//! ```
//! use orcfile::{Reader, TypeDescription, Value, Writer, WriterOptions};
//!
//! # fn main() -> orcfile::Result<()> {
//! let schema = TypeDescription::from_str("struct<word:string,count:bigint>")?;
//! let mut buf = Vec::new();
//! let mut writer = Writer::new(&mut buf, &schema, WriterOptions::default())?;
//! writer.write_row(&[Value::from("stripe"), Value::from(2i64)])?;
//! writer.write_row(&[Value::from("stream"), Value::from(11i64)])?;
//! writer.close()?;
//!
//! let reader = Reader::new(buf)?;
//! let mut cursor = reader.select(&["word", "count"])?;
//! let mut total = 0;
//! while cursor.stripes() {
//!     while cursor.next() {
//!         total += cursor.row()[1].as_int().unwrap();
//!     }
//! }
//! assert_eq!(total, 13);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod compress;
pub mod config;
pub mod encoding;
pub mod error;
pub mod meta;
pub mod outstream;
pub mod reader;
pub mod schema;
pub mod statistics;
pub mod stream;
pub mod value;
pub mod writer;

pub use config::{CompressionKind, WriterOptions};
pub use error::{Error, Result};
pub use reader::{Cursor, Reader, SizedReadAt};
pub use schema::{Category, TypeDescription};
pub use statistics::{ColumnStatistics, TypedStatistics};
pub use stream::{StreamId, StreamKind};
pub use value::{Decimal, Timestamp, Value};
pub use writer::Writer;
