use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const DEFAULT_LOG_PATH: &str = ".csvrename/change_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub timestamp: String,
    pub command: String,
    pub path: String,
    pub target: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only JSON-lines journal of rename events.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(
        &self,
        command: &str,
        source: &Path,
        target: &str,
        action: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".into());
        let entry = ChangeLogEntry {
            timestamp,
            command: command.to_string(),
            path: source.display().to_string(),
            target: target.to_string(),
            action: action.to_string(),
            detail: detail.map(str::to_string),
        };
        let json = serde_json::to_string(&entry)?;
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{json}")?;
        drop(file);
        self.truncate(MAX_ENTRIES)
    }

    /// Records an event, downgrading a write failure to a warning.
    pub fn record_or_warn(
        &self,
        command: &str,
        source: &Path,
        target: &str,
        action: &str,
        detail: Option<&str>,
    ) {
        if let Err(err) = self.record(command, source, target, action, detail) {
            tracing::warn!(
                log = %self.path.display(),
                error = %err,
                "failed to write change log entry"
            );
        }
    }

    pub fn read_all(&self) -> Result<Vec<ChangeLogEntry>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!(
                    log = %self.path.display(),
                    line = index + 1,
                    error = %err,
                    "ignoring unreadable change log line"
                ),
            }
        }
        Ok(entries)
    }

    pub fn read_recent(&self, tail: usize) -> Result<Vec<ChangeLogEntry>> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(tail);
        Ok(entries.split_off(skip))
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    fn truncate(&self, max_entries: usize) -> Result<()> {
        let file = fs::File::open(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let lines: Vec<_> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        if lines.len() <= max_entries {
            return Ok(());
        }
        let keep = &lines[lines.len() - max_entries..];
        fs::write(&self.path, keep.join("\n") + "\n")
            .with_context(|| format!("truncating {}", self.path.display()))?;
        Ok(())
    }
}
