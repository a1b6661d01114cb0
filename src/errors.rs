use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Error kinds surfaced by the engine. The command layer is responsible for
/// human-readable presentation; the core only returns these values.
#[derive(Debug)]
pub enum Error {
    /// Filesystem read/write/seek/flush failure, with the offending path
    /// when one is known.
    Io(PathBuf, io::Error),
    /// Header magic mismatch, short read, or unexpected EOF in an index file.
    CorruptIndex(String),
    /// Malformed metadata, unknown type, or a table/column limit exceeded.
    Schema(String),
    NoSuchTable(String),
    NoSuchColumn(String),
    /// The operation requires an INT primary key and the table has none.
    NoPrimaryKey(String),
    /// Insert whose primary key already exists.
    DuplicateKey(i32),
    /// A value cannot be parsed to the column's type.
    TypeMismatch(String),
    /// Integer literal exceeds INT32.
    OutOfRange(String),
    Syntax(String),
}

impl Error {
    pub fn io(path: &Path, err: io::Error) -> Error {
        Error::Io(path.to_path_buf(), err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(path, e) if path.as_os_str().is_empty() => write!(f, "IO error. {}", e),
            Error::Io(path, e) => write!(f, "IO error. {}: {}", path.display(), e),
            Error::CorruptIndex(msg) => write!(f, "Corrupt index. {}", msg),
            Error::Schema(msg) => write!(f, "Schema error. {}", msg),
            Error::NoSuchTable(name) => write!(f, "No such table '{}'.", name),
            Error::NoSuchColumn(name) => write!(f, "No such column '{}'.", name),
            Error::NoPrimaryKey(msg) => write!(f, "No primary key. {}", msg),
            Error::DuplicateKey(key) => write!(f, "Duplicate key {}.", key),
            Error::TypeMismatch(msg) => write!(f, "Type mismatch. {}", msg),
            Error::OutOfRange(msg) => write!(f, "Out of range. {}", msg),
            Error::Syntax(msg) => write!(f, "SQL Syntax Error. {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(PathBuf::new(), err)
    }
}

/// Build an `Error` variant from a format string, e.g.
/// `err!(Schema, "unknown type '{}'", t)`.
#[macro_export]
macro_rules! err {
    ($kind:ident, $($arg:tt)*) => {
        $crate::errors::Error::$kind(format!($($arg)*))
    };
}
