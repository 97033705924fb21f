//! Error types for the orcfile library.

use std::fmt;
use std::io;

/// The result type used throughout orcfile.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for ORC read and write operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// The file or a stream within it is corrupt: an invalid header, a bit
    /// width outside the allowed set, or a stream truncated mid-frame.
    Corrupt(String),

    /// A stream ended inside a varint continuation chain.
    EofUnsignedVInt,

    /// A column category and encoding kind combination is not supported.
    UnsupportedEncoding(String),

    /// The PostScript names a compression kind other than NONE, ZLIB or SNAPPY.
    UnknownCompression(u8),

    /// A selected column was not found, or a struct row's arity does not
    /// match the schema.
    SchemaMismatch(String),

    /// The underlying source returned fewer bytes than requested.
    ShortRead {
        /// The number of bytes expected.
        expected: usize,
        /// The number of bytes actually read.
        actual: usize,
    },

    /// The underlying sink accepted fewer bytes than requested.
    ShortWrite {
        /// The number of bytes expected.
        expected: usize,
        /// The number of bytes actually written.
        actual: usize,
    },

    /// A value was written that is incompatible with the target column
    /// category.
    InvalidValue(String),

    /// An invalid argument was provided.
    InvalidArgument(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Creates a new unsupported encoding error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedEncoding(msg.into())
    }

    /// Creates a new schema mismatch error.
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    /// Creates a new invalid value error.
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Error::InvalidValue(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Corrupt(msg) => write!(f, "ORC file is corrupt: {}", msg),
            Error::EofUnsignedVInt => write!(f, "EOF while reading unsigned vint"),
            Error::UnsupportedEncoding(msg) => write!(f, "Unsupported encoding: {}", msg),
            Error::UnknownCompression(kind) => {
                write!(f, "Unknown compression kind: {}", kind)
            }
            Error::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            Error::ShortRead { expected, actual } => {
                write!(f, "Short read: expected {} bytes, got {}", expected, actual)
            }
            Error::ShortWrite { expected, actual } => {
                write!(f, "Short write: expected {} bytes, wrote {}", expected, actual)
            }
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corrupt("stream truncated mid-frame");
        assert_eq!(
            err.to_string(),
            "ORC file is corrupt: stream truncated mid-frame"
        );

        let err = Error::ShortRead { expected: 16, actual: 3 };
        assert!(err.to_string().contains("expected 16"));
        assert!(err.to_string().contains("got 3"));

        assert_eq!(
            Error::EofUnsignedVInt.to_string(),
            "EOF while reading unsigned vint"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
