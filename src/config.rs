use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Everything one rename run needs. Built from CLI flags or a batch plan.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RenameJob {
    pub folder: PathBuf,
    pub csv: PathBuf,
    #[serde(default)]
    pub create_backup: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub change_log: Option<PathBuf>,
}

impl RenameJob {
    /// Anchors relative paths at `base` (the plan file's directory).
    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let anchor = |path: PathBuf| {
            if path.is_relative() {
                base.join(path)
            } else {
                path
            }
        };
        self.folder = anchor(self.folder);
        self.csv = anchor(self.csv);
        self.change_log = self.change_log.map(anchor);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchPlan {
    pub jobs: Vec<RenameJob>,
}

/// Reads a batch plan; `.json` files are JSON, everything else YAML.
pub fn load_plan(path: &Path) -> Result<BatchPlan> {
    let data = fs::read(path).with_context(|| format!("reading plan {}", path.display()))?;
    let plan: BatchPlan = if path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
    {
        serde_json::from_slice(&data)
            .with_context(|| format!("parsing plan {}", path.display()))?
    } else {
        serde_yaml::from_slice(&data)
            .with_context(|| format!("parsing plan {}", path.display()))?
    };
    if plan.jobs.is_empty() {
        bail!("plan {} has no jobs", path.display());
    }
    let base = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(BatchPlan {
        jobs: plan
            .jobs
            .into_iter()
            .map(|job| job.resolve_relative_to(base))
            .collect(),
    })
}
