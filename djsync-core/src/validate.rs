//! Crate file validation
//!
//! Checks a crate buffer against the structure the DJ software expects:
//! - Buffer decodes completely (no truncated or unknown records)
//! - First record is `vrsn`
//! - Every `otrk` holds exactly one `ptrk` with a non-empty path
//!
//! Duplicate track paths are legal but reported as warnings.

use std::collections::HashSet;

use serde::Serialize;

use crate::record::{decode, Record, Tag};

/// Statistics about a crate file
#[derive(Debug, Default, Clone, Serialize)]
pub struct CrateStats {
    pub version: Option<String>,
    pub record_count: usize,
    pub track_count: usize,
    pub metadata_count: usize,
}

/// Result of validating a crate file
#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub stats: CrateStats,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            stats: CrateStats::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn add_error(&mut self, msg: impl Into<String>) {
        self.valid = false;
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Validate a crate buffer and return detailed results
pub fn validate_crate(data: &[u8]) -> ValidationResult {
    let mut result = ValidationResult::new();

    let records = match decode(data) {
        Ok(records) => records,
        Err(e) => {
            result.add_error(format!("Decode failed: {}", e));
            return result;
        }
    };

    result.stats.record_count = records.len();

    match records.first() {
        Some(first) if first.tag == Tag::VERSION => {
            result.stats.version = first.value.as_text().map(str::to_string);
        }
        Some(first) => {
            result.add_error(format!("First record is {} instead of vrsn", first.tag));
        }
        None => {
            result.add_error("Crate contains no records");
            return result;
        }
    }

    let mut seen_paths = HashSet::new();
    for (index, record) in records.iter().enumerate().skip(1) {
        if record.tag == Tag::VERSION {
            result.add_warning(format!("Record {}: repeated vrsn", index));
            continue;
        }
        if record.tag != Tag::TRACK {
            result.stats.metadata_count += 1;
            continue;
        }

        result.stats.track_count += 1;
        match track_path(record) {
            Ok(path) => {
                if !seen_paths.insert(path) {
                    result.add_warning(format!("Record {}: duplicate track {}", index, path));
                }
            }
            Err(msg) => result.add_error(format!("Record {}: {}", index, msg)),
        }
    }

    result
}

fn track_path(record: &Record) -> Result<&str, String> {
    let children = record.value.as_records().unwrap_or_default();
    let paths: Vec<&Record> = children.iter().filter(|c| c.tag == Tag::TRACK_PATH).collect();

    match paths.as_slice() {
        [single] => match single.value.as_text() {
            Some("") => Err("track has an empty ptrk".into()),
            Some(path) => Ok(path),
            None => Err("ptrk is not text".into()),
        },
        [] => Err("track has no ptrk".into()),
        many => Err(format!("track has {} ptrk records", many.len())),
    }
}
