use crate::hash::H256;
use crate::sid::Sid;
use crate::time::Timestamp;
use std::fmt::{Display, Formatter};
use std::{error, fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum FileError {
    /// Failed to open a segment file or store directory.
    Open(PathBuf, io::Error),
    /// Failed to create a segment file.
    Create(PathBuf, io::Error),
    /// Store path does not exist.
    PathNotFound(PathBuf),
    /// Store path already exists and does not point to a directory.
    PathNotDir(PathBuf),
    /// Failed to list the store directory.
    ListDir(PathBuf, io::Error),
    /// Failed to write to the current segment.
    Write(io::Error),
    /// Failed to read a segment.
    Read(io::Error),
    /// Failed to flush the current segment to disk.
    Flush(io::Error),
}

impl Display for FileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Open(path, error) => {
                write!(f, "can't open {:?}, error: {}", path, error)
            }
            FileError::Create(path, error) => {
                write!(f, "can't create segment at {:?}, error: {}", path, error)
            }
            FileError::PathNotFound(path) => write!(f, "path {:?} is not found", path),
            FileError::PathNotDir(path) => write!(f, "{:?} is a file, not a folder", path),
            FileError::ListDir(path, error) => {
                write!(f, "can't list store directory {:?}, error: {}", path, error)
            }
            FileError::Write(error) => write!(f, "failed to write to segment: {}", error),
            FileError::Read(error) => write!(f, "failed to read segment: {}", error),
            FileError::Flush(error) => write!(f, "failed to flush segment to disk: {}", error),
        }
    }
}

impl error::Error for FileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            FileError::Open(_, source)
            | FileError::Create(_, source)
            | FileError::ListDir(_, source)
            | FileError::Write(source)
            | FileError::Read(source)
            | FileError::Flush(source) => Some(source),
            FileError::PathNotFound(_) | FileError::PathNotDir(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum CodecError {
    /// Underlying stream failure.
    Io(io::Error),
    /// The stream ended inside a record.
    Truncated,
    /// A varint did not terminate within ten bytes or exceeded 64 bits.
    VarintOverflow,
    /// A length prefix exceeded the decode-side cap.
    OversizedBlob { len: u64, max: u64 },
    /// An unrecognized discriminant byte.
    Tag(u8),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Io(error) => write!(f, "stream failure: {}", error),
            CodecError::Truncated => write!(f, "stream ended inside a record"),
            CodecError::VarintOverflow => write!(f, "varint exceeds 64 bits"),
            CodecError::OversizedBlob { len, max } => {
                write!(f, "blob length {} exceeds cap {}", len, max)
            }
            CodecError::Tag(tag) => write!(f, "unrecognized tag byte: {:#04x}", tag),
        }
    }
}

impl error::Error for CodecError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CodecError::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(error)
        }
    }
}

/// Chronology error.
#[derive(Debug)]
pub enum ChronologyError {
    /// Error related to the segment files
    File(FileError),
    /// Error related to encoding or decoding records
    Codec(CodecError),

    /// A reference did not resolve in the dictionary.
    UnknownReference(Sid),
    /// An object was referred to by id before being interned.
    NotInterned(H256),
    /// Segment ids must be strictly increasing.
    SegmentNotMonotonic { tip: u64, requested: u64 },
    /// Event timestamps must be monotonically non-decreasing.
    TimeRegression { current: Timestamp, requested: Timestamp },
    /// The store already holds a recording.
    StoreNotEmpty(PathBuf),

    /// Write operation on a read-mode store.
    ReadOnly,
    /// Read operation on a write-mode store.
    WriteOnly,
}

impl error::Error for ChronologyError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ChronologyError::File(err) => err.source(),
            ChronologyError::Codec(err) => err.source(),
            _ => None,
        }
    }
}

impl fmt::Display for ChronologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChronologyError::File(error) => write!(f, "file error: {}", error),
            ChronologyError::Codec(error) => write!(f, "codec error: {}", error),
            ChronologyError::UnknownReference(sid) => {
                write!(f, "reference {} is not in the dictionary", sid)
            }
            ChronologyError::NotInterned(hash) => {
                write!(f, "object {} has not been interned", hash)
            }
            ChronologyError::SegmentNotMonotonic { tip, requested } => {
                write!(f, "segment {} requested but tip is already {}", requested, tip)
            }
            ChronologyError::TimeRegression { current, requested } => {
                write!(f, "timestamp {} is before the register time {}", requested, current)
            }
            ChronologyError::StoreNotEmpty(path) => {
                write!(f, "store at {:?} already holds a recording", path)
            }
            ChronologyError::ReadOnly => write!(f, "store is open for reading"),
            ChronologyError::WriteOnly => write!(f, "store is open for writing"),
        }
    }
}

impl From<FileError> for ChronologyError {
    fn from(error: FileError) -> Self {
        ChronologyError::File(error)
    }
}

impl From<CodecError> for ChronologyError {
    fn from(error: CodecError) -> Self {
        ChronologyError::Codec(error)
    }
}
