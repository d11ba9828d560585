use std::path::PathBuf;

use thiserror::Error;

/// The errors the core decoders surface. Header-level failures here are
/// fatal for the file being parsed; anything finer-grained (a single bad
/// field, a single unresolved blob) is handled locally and never reaches
/// this type — see the RecordDecoder and BlobStore module docs.
#[derive(Debug, Error)]
pub enum ParadoxError {
    #[error("failed to read {path}: {cause}")]
    Io { path: PathBuf, cause: std::io::Error },

    #[error("{format} buffer too small: got {got} bytes, need at least {minimum}")]
    TooSmall {
        format: &'static str,
        got: usize,
        minimum: usize,
    },

    #[error("invalid signature: expected {expected:?}, found {found:?}")]
    InvalidSignature {
        expected: &'static str,
        found: String,
    },

    #[error("field descriptor section extends past the declared header area")]
    MissingFieldDescriptors,

    #[error("header declares a record size of 0")]
    InvalidRecordSize,

    #[error("out of bounds: requested {requested} bytes, {remaining} remaining")]
    OutOfBounds { requested: usize, remaining: usize },

    #[error("no decoder available for format {format:?}")]
    UnsupportedFormat { format: String },
}

pub type Result<T> = std::result::Result<T, ParadoxError>;
