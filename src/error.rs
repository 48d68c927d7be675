//! Fatal errors that abort a rename run before any file is touched.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("Input folder does not exist: {}", path.display())]
    FolderNotFound { path: PathBuf },

    #[error("Input folder is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("CSV file does not exist: {}", path.display())]
    CsvNotFound { path: PathBuf },

    #[error("Error reading CSV file {}: {source}", path.display())]
    CsvRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading CSV file {}: {message}", path.display())]
    CsvParse { path: PathBuf, message: String },

    #[error("CSV file must have at least 2 columns: {} has {columns}", path.display())]
    TooFewColumns { path: PathBuf, columns: usize },

    #[error("CSV file is empty: {}", path.display())]
    EmptyCsv { path: PathBuf },

    #[error("unknown encoding '{label}'")]
    UnknownEncoding { label: String },

    #[error("failed to list {}: {message}", path.display())]
    DirectoryRead { path: PathBuf, message: String },

    #[error("failed to write transcript: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenameError>;
