//! djsync-core: DJ library formats with read and write support
//!
//! This crate provides:
//! - Tagged-record codec used by Serato crate files - big-endian
//! - Crate builder for `_Serato_/Subcrates/*.crate`
//! - M3U playlists and an iTunes-style XML library for Rekordbox
//! - The persisted track ID to download map shared by sync jobs

pub mod record;
pub mod crate_file;
pub mod validate;
pub mod m3u;
pub mod library_xml;
pub mod download_map;
pub mod track;
pub mod util;
pub mod error;

pub use crate_file::Crate;
pub use download_map::DownloadMap;
pub use error::{DecodeError, EncodeError, Error, Result};
pub use record::{Record, Tag, TagKind, Value};
pub use track::TrackDescriptor;
