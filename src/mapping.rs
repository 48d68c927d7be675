//! Loading the key → target table from the mapping CSV.
//!
//! Only column position matters: column 1 holds the current file name and
//! column 2 the new one. The first row is a header and never maps anything.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use csv::ReaderBuilder;

use crate::encoding::EncodingStrategy;
use crate::error::{RenameError, Result};
use crate::normalize::MatchMode;

#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    entries: HashMap<String, String>,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub overwritten: usize,
}

impl RenameMap {
    /// Builds the table from `(key, target)` pairs; later keys win.
    #[cfg(test)]
    pub fn from_pairs<I, K, T>(pairs: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Into<String>,
    {
        let mut map = Self::default();
        for (key, target) in pairs {
            map.insert(key.as_ref(), target.into(), mode);
        }
        map
    }

    fn insert(&mut self, key: &str, target: String, mode: MatchMode) {
        self.rows_read += 1;
        let key = mode.normalize(key).into_owned();
        if self.entries.insert(key, target).is_some() {
            self.overwritten += 1;
        }
    }

    /// `name` must already be normalized with the same mode as the keys.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_mapping(
    path: &Path,
    encoding: &EncodingStrategy,
    mode: MatchMode,
) -> Result<RenameMap> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            RenameError::CsvNotFound {
                path: path.to_path_buf(),
            }
        } else {
            RenameError::CsvRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let decoded = encoding.decode(&bytes);
    tracing::debug!(
        path = %path.display(),
        encoding = decoded.encoding.name(),
        source = %decoded.source,
        "decoded mapping CSV"
    );
    if decoded.had_errors {
        tracing::warn!(
            path = %path.display(),
            encoding = decoded.encoding.name(),
            "CSV contained bytes invalid for its encoding; replaced with U+FFFD"
        );
    }
    parse_mapping(&decoded.text, path, mode)
}

fn parse_mapping(text: &str, path: &Path, mode: MatchMode) -> Result<RenameMap> {
    let parse_error = |err: csv::Error| RenameError::CsvParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(parse_error)?;
    if headers.is_empty() {
        return Err(RenameError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }
    if headers.len() < 2 {
        return Err(RenameError::TooFewColumns {
            path: path.to_path_buf(),
            columns: headers.len(),
        });
    }

    let mut map = RenameMap::default();
    for record in reader.records() {
        let record = record.map_err(parse_error)?;
        let key = record.get(0).unwrap_or_default();
        let target = record.get(1).unwrap_or_default();
        if key.is_empty() || target.is_empty() {
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            tracing::warn!(line, "skipping CSV row with an empty key or target");
            map.rows_skipped += 1;
            continue;
        }
        map.insert(key, target.to_string(), mode);
    }
    Ok(map)
}
