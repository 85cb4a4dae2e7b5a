//! Tagged record codec for crate files
//!
//! A crate file is a flat sequence of records, each laid out **big-endian** as:
//! - 4 bytes: ASCII tag
//! - 4 bytes: payload length (u32)
//! - N bytes: payload
//!
//! The payload interpretation depends on the tag:
//! - `vrsn`: UTF-16BE text (whole-tag override)
//! - `sbav`: raw bytes (whole-tag override)
//! - `o***`: nested record sequence
//! - `t***`, `p***`: UTF-16BE text
//! - `u***`: u32
//! - `b***`: raw bytes
//!
//! The top-level stream carries no length prefix; the end of the buffer ends it.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use binrw::{binread, BinRead};
use serde::{Serialize, Serializer};

use crate::error::{DecodeError, EncodeError};

/// Tag + length
const HEADER_LEN: usize = 8;

/// Deepest container nesting accepted by `decode` and `encode`
pub const MAX_DEPTH: usize = 64;

/// Record header as it sits on disk
#[binread]
#[br(big)]
#[derive(Debug, Clone, Copy)]
struct RecordHeader {
    tag: [u8; 4],
    len: u32,
}

/// Four ASCII bytes naming a record
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; 4]);

impl Tag {
    /// Format/version string, always the first record of a crate
    pub const VERSION: Tag = Tag(*b"vrsn");
    /// Track container
    pub const TRACK: Tag = Tag(*b"otrk");
    /// Track path inside a track container
    pub const TRACK_PATH: Tag = Tag(*b"ptrk");
    /// Opaque blob; raw despite its `s` prefix
    pub const SBAV: Tag = Tag(*b"sbav");

    /// Build a tag from a 4-character ASCII string
    pub fn new(tag: &str) -> Result<Self, EncodeError> {
        let bytes: [u8; 4] = tag
            .as_bytes()
            .try_into()
            .map_err(|_| EncodeError::InvalidTag(tag.to_string()))?;
        Self::from_bytes(bytes).ok_or_else(|| EncodeError::InvalidTag(tag.to_string()))
    }

    /// Returns `None` unless all four bytes are ASCII
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        bytes.is_ascii().then_some(Tag(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // ASCII is always valid UTF-8
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Resolve how this tag's payload is encoded
    pub fn kind(&self) -> Option<TagKind> {
        TagKind::resolve(self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl FromStr for Tag {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::new(s)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How a record payload is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// Nested record sequence
    Container,
    /// UTF-16BE text, no BOM
    Text,
    /// Big-endian u32
    UnsignedInt,
    /// Raw bytes
    Opaque,
}

impl TagKind {
    /// Whole-tag overrides win over the first-character classes.
    /// Unknown first characters have no fallback kind.
    pub fn resolve(tag: &Tag) -> Option<Self> {
        match tag.as_bytes() {
            b"vrsn" => return Some(TagKind::Text),
            b"sbav" => return Some(TagKind::Opaque),
            _ => {}
        }

        match tag.as_bytes()[0] {
            b'o' => Some(TagKind::Container),
            b't' | b'p' => Some(TagKind::Text),
            b'u' => Some(TagKind::UnsignedInt),
            b'b' => Some(TagKind::Opaque),
            _ => None,
        }
    }
}

/// Decoded payload of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Records(Vec<Record>),
    Text(String),
    UInt(u32),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> TagKind {
        match self {
            Value::Records(_) => TagKind::Container,
            Value::Text(_) => TagKind::Text,
            Value::UInt(_) => TagKind::UnsignedInt,
            Value::Bytes(_) => TagKind::Opaque,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Value::Records(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Record>> for Value {
    fn from(r: Vec<Record>) -> Self {
        Value::Records(r)
    }
}

/// One tag + payload unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub tag: Tag,
    pub value: Value,
}

impl Record {
    pub fn new(tag: Tag, value: impl Into<Value>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// First direct child with the given tag (container records only)
    pub fn child(&self, tag: Tag) -> Option<&Record> {
        self.value.as_records()?.iter().find(|r| r.tag == tag)
    }
}

/// Decode a complete record buffer
pub fn decode(data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    decode_records(data, 0, 0)
}

/// `base` is the absolute offset of `data` in the file, for error reporting
fn decode_records(data: &[u8], base: usize, depth: usize) -> Result<Vec<Record>, DecodeError> {
    let mut records = Vec::new();
    let mut cursor = Cursor::new(data);

    while (cursor.position() as usize) < data.len() {
        let position = cursor.position() as usize;
        let offset = base + position;
        let available = data.len() - position;
        if available < HEADER_LEN {
            return Err(DecodeError::Truncated {
                offset,
                needed: HEADER_LEN,
                available,
            });
        }

        let header = RecordHeader::read(&mut cursor).map_err(|_| DecodeError::Truncated {
            offset,
            needed: HEADER_LEN,
            available,
        })?;
        let tag = Tag::from_bytes(header.tag).ok_or(DecodeError::InvalidTag {
            offset,
            bytes: header.tag,
        })?;

        let start = position + HEADER_LEN;
        let len = header.len as usize;
        let available = data.len() - start;
        if len > available {
            return Err(DecodeError::Truncated {
                offset: base + start,
                needed: len,
                available,
            });
        }

        let value = decode_value(tag, &data[start..start + len], offset, depth)?;
        records.push(Record { tag, value });
        cursor.set_position((start + len) as u64);
    }

    Ok(records)
}

fn decode_value(tag: Tag, payload: &[u8], offset: usize, depth: usize) -> Result<Value, DecodeError> {
    let kind = tag
        .kind()
        .ok_or_else(|| DecodeError::UnknownTag(tag.to_string()))?;

    match kind {
        TagKind::Container => {
            if depth >= MAX_DEPTH {
                return Err(DecodeError::TooDeep {
                    offset,
                    max: MAX_DEPTH,
                });
            }
            decode_records(payload, offset + HEADER_LEN, depth + 1).map(Value::Records)
        }
        TagKind::Text => decode_utf16be(payload)
            .map(Value::Text)
            .ok_or_else(|| DecodeError::InvalidText { tag: tag.to_string() }),
        TagKind::UnsignedInt => {
            let bytes: [u8; 4] = payload.try_into().map_err(|_| DecodeError::InvalidInteger {
                tag: tag.to_string(),
                len: payload.len(),
            })?;
            Ok(Value::UInt(u32::from_be_bytes(bytes)))
        }
        TagKind::Opaque => Ok(Value::Bytes(payload.to_vec())),
    }
}

fn decode_utf16be(payload: &[u8]) -> Option<String> {
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

/// Encode records in order; duplicates are kept as-is
pub fn encode(records: &[Record]) -> Result<Vec<u8>, EncodeError> {
    encode_records(records, 0)
}

fn encode_records(records: &[Record], depth: usize) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    for record in records {
        write_record(&mut buffer, record, depth)?;
    }
    Ok(buffer)
}

fn write_record(buffer: &mut Vec<u8>, record: &Record, depth: usize) -> Result<(), EncodeError> {
    let payload = encode_value(record, depth)?;
    let len = payload_len(record.tag, payload.len())?;

    buffer.reserve(HEADER_LEN + payload.len());
    buffer.extend_from_slice(record.tag.as_bytes());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&payload);
    Ok(())
}

fn encode_value(record: &Record, depth: usize) -> Result<Vec<u8>, EncodeError> {
    let tag = record.tag;
    let kind = tag
        .kind()
        .ok_or_else(|| EncodeError::UnknownTag(tag.to_string()))?;

    match (kind, &record.value) {
        (TagKind::Container, Value::Records(_)) if depth >= MAX_DEPTH => Err(EncodeError::TooDeep {
            tag: tag.to_string(),
            max: MAX_DEPTH,
        }),
        (TagKind::Container, Value::Records(children)) => encode_records(children, depth + 1),
        (TagKind::Text, Value::Text(text)) => Ok(text
            .encode_utf16()
            .flat_map(u16::to_be_bytes)
            .collect()),
        (TagKind::UnsignedInt, Value::UInt(n)) => Ok(n.to_be_bytes().to_vec()),
        (TagKind::Opaque, Value::Bytes(bytes)) => Ok(bytes.clone()),
        (expected, _) => Err(EncodeError::KindMismatch {
            tag: tag.to_string(),
            expected,
        }),
    }
}

/// Length field for a payload, refusing anything over u32::MAX
fn payload_len(tag: Tag, len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::PayloadOverflow {
        tag: tag.to_string(),
        len,
    })
}
