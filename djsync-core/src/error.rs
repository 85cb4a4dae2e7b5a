//! Error types for djsync-core

use thiserror::Error;

use crate::record::TagKind;

/// Failure while decoding a record buffer. Decoding is all-or-nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated record at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("tag at offset {offset} is not ASCII: {bytes:02x?}")]
    InvalidTag { offset: usize, bytes: [u8; 4] },

    #[error("unknown tag kind for {0:?}")]
    UnknownTag(String),

    #[error("invalid UTF-16BE text in {tag:?}")]
    InvalidText { tag: String },

    #[error("integer payload of {tag:?} is {len} bytes, expected 4")]
    InvalidInteger { tag: String, len: usize },

    #[error("container at offset {offset} nests deeper than {max} levels")]
    TooDeep { offset: usize, max: usize },
}

/// Failure while encoding records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("tag {0:?} is not 4 ASCII characters")]
    InvalidTag(String),

    #[error("unknown tag kind for {0:?}")]
    UnknownTag(String),

    #[error("value for {tag:?} does not match its {expected:?} kind")]
    KindMismatch { tag: String, expected: TagKind },

    #[error("payload of {tag:?} is {len} bytes, over the 32-bit length limit")]
    PayloadOverflow { tag: String, len: usize },

    #[error("container {tag:?} nests deeper than {max} levels")]
    TooDeep { tag: String, max: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
