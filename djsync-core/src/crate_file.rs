//! Crate file builder
//!
//! A crate is one playlist as the DJ software stores it on disk:
//! a `vrsn` record, caller metadata, then one `otrk` container per track
//! holding a `ptrk` path with the drive prefix removed.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::record::{decode, encode, Record, Tag, Value};
use crate::util::strip_drive_prefix;

/// Version string written when none is given
pub const DEFAULT_VERSION: &str = "1.0/Serato ScratchLive Crate";

/// Library subdirectory holding crate files
pub const SUBCRATE_DIR: &str = "_Serato_/Subcrates";

/// Separator between parent and child crate names in a crate filename
const SUBCRATE_SEPARATOR: &str = "%%";

/// In-memory crate, serialized once and discarded
#[derive(Debug, Clone, PartialEq)]
pub struct Crate {
    name: String,
    version: String,
    metadata: Vec<Record>,
    tracks: Vec<Record>,
}

impl Crate {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            metadata: Vec::new(),
            tracks: Vec::new(),
        }
    }

    pub fn with_default_version(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_VERSION)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Append a metadata record. Metadata always serializes after the
    /// version and before every track, in call order.
    pub fn add_metadata(&mut self, tag: Tag, value: impl Into<Value>) {
        self.metadata.push(Record::new(tag, value));
    }

    /// Append a track, stripping any drive or volume prefix from the path
    pub fn add_track(&mut self, file_path: impl AsRef<Path>) {
        let path = file_path.as_ref().to_string_lossy();
        let path_without_drive = strip_drive_prefix(&path);
        self.tracks.push(Record::new(
            Tag::TRACK,
            vec![Record::new(Tag::TRACK_PATH, path_without_drive)],
        ));
    }

    /// Drop the earliest track, if any
    pub fn remove_first_track(&mut self) {
        if !self.tracks.is_empty() {
            self.tracks.remove(0);
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Stored track paths in order
    pub fn track_paths(&self) -> impl Iterator<Item = &str> {
        self.tracks
            .iter()
            .filter_map(|t| t.child(Tag::TRACK_PATH)?.value.as_text())
    }

    /// The full record sequence: version, metadata, tracks
    pub fn records(&self) -> Vec<Record> {
        let mut records = Vec::with_capacity(1 + self.metadata.len() + self.tracks.len());
        records.push(Record::new(Tag::VERSION, self.version.as_str()));
        records.extend(self.metadata.iter().cloned());
        records.extend(self.tracks.iter().cloned());
        records
    }

    /// Encode the crate to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode(&self.records())?)
    }

    /// Write the crate to `path`.
    ///
    /// The crate is encoded before the file is opened, so an encode failure
    /// leaves any existing file untouched.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = self.to_bytes()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(())
    }

    /// Filename of this crate as a child of `parent`, e.g. `DJ Sync%%House.crate`
    pub fn file_name(&self, parent: &str) -> String {
        format!("{}{}{}.crate", parent, SUBCRATE_SEPARATOR, self.name)
    }

    /// Save into the library's subcrate directory and return the written path
    pub fn save_to_library(&self, library_dir: &Path, parent: &str) -> Result<PathBuf> {
        let subcrate_dir = library_dir.join(SUBCRATE_DIR);
        fs::create_dir_all(&subcrate_dir)?;

        let path = subcrate_dir.join(self.file_name(parent));
        self.save(&path)?;
        Ok(path)
    }

    /// Rebuild a crate from decoded records. The first record must be `vrsn`;
    /// `otrk` records become tracks and everything else metadata.
    pub fn from_records(name: impl Into<String>, records: Vec<Record>) -> Result<Self> {
        let mut records = records.into_iter();

        let version = match records.next() {
            Some(Record {
                tag: Tag::VERSION,
                value: Value::Text(version),
            }) => version,
            Some(other) => {
                return Err(Error::Validation(format!(
                    "crate starts with {} instead of vrsn",
                    other.tag
                )))
            }
            None => return Err(Error::Validation("crate is empty".into())),
        };

        let mut krate = Crate::new(name, version);
        for record in records {
            if record.tag == Tag::TRACK {
                krate.tracks.push(record);
            } else {
                krate.metadata.push(record);
            }
        }
        Ok(krate)
    }

    /// Load a crate file. The crate name is taken from the filename
    /// (the part after the last `%%`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let records = decode(&data)?;
        Self::from_records(crate_name_from_path(path)?, records)
    }
}

fn crate_name_from_path(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Path(format!("no crate name in {:?}", path)))?;
    let name = stem.rsplit(SUBCRATE_SEPARATOR).next().unwrap_or(stem);
    Ok(name.to_string())
}
