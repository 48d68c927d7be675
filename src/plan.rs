use std::path::PathBuf;

use crate::files::FileEntry;
use crate::mapping::RenameMap;
use crate::normalize::MatchMode;

/// One matched file and the name it should get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTask {
    pub source: PathBuf,
    pub source_name: String,
    pub target: String,
}

impl RenameTask {
    pub fn target_path(&self) -> PathBuf {
        self.source.with_file_name(&self.target)
    }
}

/// Matches every listed file against the mapping, keeping listing order.
pub fn build_plan(files: &[FileEntry], map: &RenameMap, mode: MatchMode) -> Vec<RenameTask> {
    files
        .iter()
        .filter_map(|entry| {
            let name = entry.name.as_deref()?;
            let target = map.lookup(&mode.normalize(name))?;
            Some(RenameTask {
                source: entry.path.clone(),
                source_name: name.to_string(),
                target: target.to_string(),
            })
        })
        .collect()
}
