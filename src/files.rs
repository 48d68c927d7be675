use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{RenameError, Result};

pub const BACKUP_SUFFIX: &str = ".backup";

/// A regular file found directly inside the input folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// `None` when the name is not valid UTF-8; such files never match.
    pub name: Option<String>,
}

impl FileEntry {
    fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        Self { path, name }
    }
}

pub fn ensure_folder(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RenameError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(_) => Err(RenameError::FolderNotFound {
            path: path.to_path_buf(),
        }),
    }
}

pub fn ensure_csv(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(RenameError::CsvNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Lists the regular files directly inside `dir`, sorted by path.
///
/// Symlinks count when they point at a regular file. Subdirectories are
/// never entered.
pub fn list_files(dir: &Path) -> Result<Vec<FileEntry>> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|err| RenameError::DirectoryRead {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        let path = entry.into_path();
        let is_file = fs::metadata(&path)
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if is_file {
            entries.push(FileEntry::new(path));
        }
    }
    Ok(entries)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

pub fn is_backup_file(path: &Path) -> bool {
    original_name_for_backup(path).is_some()
}

/// The name a stranded `<name>.backup` file had before the first hop.
pub fn original_name_for_backup(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(BACKUP_SUFFIX)
        .filter(|original| !original.is_empty())
}

pub fn find_backup_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(dir)?
        .into_iter()
        .map(|entry| entry.path)
        .filter(|path| is_backup_file(path))
        .collect())
}
