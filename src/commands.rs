use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::{Component, Path};

use crate::changelog::ChangeLog;
use crate::config::RenameJob;
use crate::encoding::EncodingStrategy;
use crate::error::Result;
use crate::files::{self, FileEntry};
use crate::mapping::load_mapping;
use crate::normalize::MatchMode;
use crate::plan::{RenameTask, build_plan};

pub const RULE: &str = "--------------------------------------------------";
pub const NO_MATCHES: &str = "No files found that match the CSV mapping.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// The target name belongs to a different file.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub planned: usize,
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn errors(&self) -> usize {
        self.skipped + self.failed
    }

    fn tally(&mut self, outcome: &RenameOutcome) {
        match outcome {
            RenameOutcome::Renamed => self.renamed += 1,
            RenameOutcome::Skipped => self.skipped += 1,
            RenameOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl AddAssign for RunReport {
    fn add_assign(&mut self, other: Self) {
        self.planned += other.planned;
        self.renamed += other.renamed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Plans a job and then previews or executes it, writing the transcript to `out`.
///
/// Only validation and setup problems come back as `Err`; a file that
/// cannot be renamed is reported in the transcript and counted instead.
/// A dry run never writes the change log.
pub fn run_rename<W: Write>(job: &RenameJob, out: &mut W) -> Result<RunReport> {
    let mode = MatchMode::from_flag(job.case_sensitive);
    let encoding = EncodingStrategy::new(job.encoding.as_deref())?;

    files::ensure_folder(&job.folder)?;
    files::ensure_csv(&job.csv)?;

    tracing::debug!(
        matching = mode.label(),
        encoding = %encoding.describe(),
        create_backup = job.create_backup,
        dry_run = job.dry_run,
        "rename options"
    );
    tracing::info!("Reading CSV mapping from: {}", job.csv.display());
    let map = load_mapping(&job.csv, &encoding, mode)?;
    tracing::info!(
        rows = map.rows_read,
        skipped_rows = map.rows_skipped,
        "Loaded {} mappings from CSV",
        map.len()
    );
    if map.is_empty() {
        tracing::warn!("CSV contains no usable mappings");
    }
    if map.overwritten > 0 {
        tracing::info!(
            overwritten = map.overwritten,
            "duplicate keys in CSV; the last row for each key wins"
        );
    }

    let entries: Vec<FileEntry> = files::list_files(&job.folder)?;
    tracing::info!("Found {} files in input folder", entries.len());

    let plan = build_plan(&entries, &map, mode);
    let mut report = RunReport {
        planned: plan.len(),
        ..RunReport::default()
    };
    if plan.is_empty() {
        tracing::warn!("No files found that match the CSV mapping");
        writeln!(out, "{NO_MATCHES}")?;
        return Ok(report);
    }
    tracing::info!("Found {} files to rename", plan.len());

    if job.dry_run {
        if job.change_log.is_some() {
            tracing::debug!("dry run; change log left untouched");
        }
        preview_plan(&plan, out)?;
        return Ok(report);
    }

    let log = job.change_log.as_deref().map(ChangeLog::new);
    writeln!(out, "Renaming files...")?;
    writeln!(out, "{RULE}")?;
    for task in &plan {
        let outcome = execute_task(task, job.create_backup);
        print_outcome(task, &outcome, out)?;
        if let Some(log) = &log {
            let (action, detail) = match &outcome {
                RenameOutcome::Renamed => ("renamed", None),
                RenameOutcome::Skipped => ("skipped", Some("target exists")),
                RenameOutcome::Failed(reason) => ("failed", Some(reason.as_str())),
            };
            log.record_or_warn("rename", &task.source, &task.target, action, detail);
        }
        report.tally(&outcome);
    }
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "Renaming completed: {} successful, {} errors",
        report.renamed,
        report.errors()
    )?;
    if job.create_backup {
        writeln!(out, "Note: Backup files were created with .backup extension")?;
    }
    Ok(report)
}

fn preview_plan<W: Write>(plan: &[RenameTask], out: &mut W) -> io::Result<()> {
    writeln!(out, "DRY RUN - Preview of changes:")?;
    writeln!(out, "{RULE}")?;
    for task in plan {
        writeln!(out, "'{}' -> '{}'", task.source_name, task.target)?;
    }
    writeln!(out, "{RULE}")?;
    writeln!(out, "Total files to rename: {}", plan.len())?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Preview completed: {} files would be renamed", plan.len())
}

fn print_outcome<W: Write>(
    task: &RenameTask,
    outcome: &RenameOutcome,
    out: &mut W,
) -> io::Result<()> {
    match outcome {
        RenameOutcome::Renamed => {
            writeln!(out, "RENAMED: '{}' -> '{}'", task.source_name, task.target)
        }
        RenameOutcome::Skipped => writeln!(
            out,
            "SKIPPED: '{}' -> '{}' (target exists)",
            task.source_name, task.target
        ),
        RenameOutcome::Failed(reason) => {
            writeln!(out, "ERROR: Failed to rename '{}': {reason}", task.source_name)
        }
    }
}

pub fn execute_task(task: &RenameTask, create_backup: bool) -> RenameOutcome {
    if let Err(reason) = validate_target(&task.target) {
        tracing::error!("Error renaming {}: {reason}", task.source_name);
        return RenameOutcome::Failed(reason);
    }

    let target_path = task.target_path();
    if occupied(&target_path) && !is_same_file(&task.source, &target_path) {
        tracing::warn!("Target file already exists: {}", task.target);
        return RenameOutcome::Skipped;
    }

    let result = if create_backup {
        rename_via_backup(&task.source, &target_path)
    } else {
        fs::rename(&task.source, &target_path).map_err(|err| err.to_string())
    };

    match result {
        Ok(()) => RenameOutcome::Renamed,
        Err(reason) => {
            tracing::error!("Error renaming {}: {reason}", task.source_name);
            RenameOutcome::Failed(reason)
        }
    }
}

/// Moves `source` to `<name>.backup`, then the backup onto `target`.
///
/// If the second hop fails the content is left under the backup name.
fn rename_via_backup(source: &Path, target: &Path) -> std::result::Result<(), String> {
    let backup = files::backup_path(source);
    if occupied(&backup) {
        return Err(format!("backup file {} already exists", display_name(&backup)));
    }
    fs::rename(source, &backup).map_err(|err| format!("backup step failed: {err}"))?;
    fs::rename(&backup, target).map_err(|err| {
        tracing::warn!(
            backup = %backup.display(),
            "rename after backup failed; file left under its backup name"
        );
        format!("{err} (file left at '{}')", display_name(&backup))
    })
}

fn validate_target(target: &str) -> std::result::Result<(), String> {
    let mut components = Path::new(target).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == OsStr::new(target) => Ok(()),
        _ if target.is_empty() => Err("target name is empty".to_string()),
        _ => Err(format!("target name '{target}' is not a plain file name")),
    }
}

fn occupied(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(err) => err.kind() != io::ErrorKind::NotFound,
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _temp: TempDir,
        folder: PathBuf,
        csv: PathBuf,
    }

    fn fixture(files: &[&str], csv: &str) -> Fixture {
        let temp = tempdir().expect("temp dir");
        let folder = temp.path().join("input");
        fs::create_dir(&folder).expect("input dir");
        for name in files {
            fs::write(folder.join(name), format!("content of {name}")).expect("write file");
        }
        let csv_path = temp.path().join("map.csv");
        fs::write(&csv_path, csv).expect("write csv");
        Fixture {
            _temp: temp,
            folder,
            csv: csv_path,
        }
    }

    fn job(fx: &Fixture) -> RenameJob {
        RenameJob {
            folder: fx.folder.clone(),
            csv: fx.csv.clone(),
            ..RenameJob::default()
        }
    }

    fn run(job: &RenameJob) -> Result<RunReport> {
        run_rename(job, &mut io::sink())
    }

    fn transcript(job: &RenameJob) -> (RunReport, Vec<String>) {
        let mut out = Vec::new();
        let report = run_rename(job, &mut out).expect("run");
        let text = String::from_utf8(out).expect("utf-8 transcript");
        (report, text.lines().map(str::to_string).collect())
    }

    fn names(folder: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(folder)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn renames_with_case_insensitive_keys() {
        let fx = fixture(&["a.txt", "b.txt"], "current,new\na.txt,x.txt\nB.TXT,y.txt\n");
        let report = run(&job(&fx)).expect("run");

        assert_eq!(report.planned, 2);
        assert_eq!(report.renamed, 2);
        assert_eq!(report.errors(), 0);
        assert_eq!(names(&fx.folder), vec!["x.txt", "y.txt"]);
        assert_eq!(
            fs::read_to_string(fx.folder.join("x.txt")).expect("read"),
            "content of a.txt"
        );
    }

    #[test]
    fn existing_target_is_skipped_and_counted() {
        let fx = fixture(
            &["a.txt", "b.txt", "x.txt"],
            "current,new\na.txt,x.txt\nB.TXT,y.txt\n",
        );
        let report = run(&job(&fx)).expect("run");

        assert_eq!(report.renamed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors(), 1);
        assert_eq!(names(&fx.folder), vec!["a.txt", "x.txt", "y.txt"]);
        assert_eq!(
            fs::read_to_string(fx.folder.join("a.txt")).expect("read"),
            "content of a.txt"
        );
        assert_eq!(
            fs::read_to_string(fx.folder.join("x.txt")).expect("read"),
            "content of x.txt"
        );
    }

    #[test]
    fn backup_hop_leaves_no_backup_after_success() {
        let fx = fixture(&["a.txt"], "current,new\na.txt,x.txt\n");
        let report = run(&RenameJob {
            create_backup: true,
            ..job(&fx)
        })
        .expect("run");

        assert_eq!(report.renamed, 1);
        assert_eq!(names(&fx.folder), vec!["x.txt"]);
    }

    #[test]
    fn occupied_backup_slot_fails_without_touching_file() {
        let fx = fixture(&["a.txt", "a.txt.backup"], "current,new\na.txt,x.txt\n");
        let report = run(&RenameJob {
            create_backup: true,
            ..job(&fx)
        })
        .expect("run");

        assert_eq!(report.failed, 1);
        assert_eq!(report.renamed, 0);
        assert_eq!(names(&fx.folder), vec!["a.txt", "a.txt.backup"]);
    }

    #[test]
    fn dry_run_never_touches_the_folder() {
        let fx = fixture(&["a.txt", "b.txt", "x.txt"], "k,v\na.txt,x.txt\nb.txt,y.txt\n");
        let before = names(&fx.folder);
        let preview = run(&RenameJob {
            dry_run: true,
            create_backup: true,
            ..job(&fx)
        })
        .expect("dry run");

        assert_eq!(preview.planned, 2);
        assert_eq!(preview.renamed, 0);
        assert_eq!(names(&fx.folder), before);

        let live = run(&job(&fx)).expect("live run");
        assert_eq!(live.planned, preview.planned);
    }

    #[test]
    fn case_sensitive_mode_ignores_case_variants() {
        let fx = fixture(&["report.TXT"], "k,v\nReport.txt,final.txt\n");
        let report = run(&RenameJob {
            case_sensitive: true,
            ..job(&fx)
        })
        .expect("run");

        assert_eq!(report.planned, 0);
        assert_eq!(names(&fx.folder), vec!["report.TXT"]);
    }

    #[test]
    fn no_matches_renames_nothing() {
        let fx = fixture(&["keep.txt"], "k,v\nother.txt,x.txt\n");
        let report = run(&job(&fx)).expect("run");
        assert_eq!(report, RunReport::default());
        assert_eq!(names(&fx.folder), vec!["keep.txt"]);
    }

    #[test]
    fn invalid_target_fails_but_others_proceed() {
        let fx = fixture(&["a.txt", "b.txt"], "k,v\na.txt,sub/x.txt\nb.txt,y.txt\n");
        let report = run(&job(&fx)).expect("run");

        assert_eq!(report.failed, 1);
        assert_eq!(report.renamed, 1);
        assert_eq!(names(&fx.folder), vec!["a.txt", "y.txt"]);
    }

    #[test]
    fn renaming_onto_itself_is_not_a_collision() {
        let fx = fixture(&["a.txt"], "k,v\nA.TXT,a.txt\n");
        let report = run(&job(&fx)).expect("run");
        assert_eq!(report.renamed, 1);
        assert_eq!(report.errors(), 0);
        assert_eq!(names(&fx.folder), vec!["a.txt"]);
    }

    #[test]
    fn change_log_records_each_outcome() {
        let fx = fixture(&["a.txt", "b.txt", "x.txt"], "k,v\na.txt,x.txt\nb.txt,y.txt\n");
        let log_path = fx.folder.parent().expect("parent").join("changes.jsonl");
        run(&RenameJob {
            change_log: Some(log_path.clone()),
            ..job(&fx)
        })
        .expect("run");

        let entries = ChangeLog::new(&log_path).read_all().expect("read log");
        let actions: Vec<_> = entries.iter().map(|entry| entry.action.as_str()).collect();
        assert_eq!(actions, vec!["skipped", "renamed"]);
    }

    #[test]
    fn missing_folder_is_fatal() {
        let fx = fixture(&[], "k,v\na.txt,x.txt\n");
        let err = run(&RenameJob {
            folder: fx.folder.join("missing"),
            ..job(&fx)
        })
        .unwrap_err();
        assert!(matches!(err, crate::error::RenameError::FolderNotFound { .. }));
    }

    #[test]
    fn missing_csv_is_fatal() {
        let fx = fixture(&["a.txt"], "k,v\n");
        let err = run(&RenameJob {
            csv: fx.folder.join("missing.csv"),
            ..job(&fx)
        })
        .unwrap_err();
        assert!(matches!(err, crate::error::RenameError::CsvNotFound { .. }));
    }

    #[test]
    fn one_column_csv_is_fatal() {
        let fx = fixture(&["a.txt"], "name\na.txt\n");
        let err = run(&job(&fx)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RenameError::TooFewColumns { .. }
        ));
        assert_eq!(names(&fx.folder), vec!["a.txt"]);
    }

    #[test]
    fn dry_run_with_change_log_writes_nothing() {
        let fx = fixture(&["a.txt"], "k,v\na.txt,x.txt\n");
        let log_path = fx.folder.join(".csvrename").join("change_log.jsonl");
        let before = names(&fx.folder);
        let report = run(&RenameJob {
            dry_run: true,
            change_log: Some(log_path.clone()),
            ..job(&fx)
        })
        .expect("dry run");

        assert_eq!(report.planned, 1);
        assert_eq!(names(&fx.folder), before);
        assert!(!log_path.exists());
    }

    #[test]
    fn no_match_transcript_is_a_single_line() {
        let fx = fixture(&["keep.txt"], "k,v\nother.txt,x.txt\n");
        let (_, lines) = transcript(&job(&fx));
        assert_eq!(lines, vec![NO_MATCHES]);
        assert_eq!(NO_MATCHES, "No files found that match the CSV mapping.");
    }

    #[test]
    fn live_transcript_reports_each_outcome() {
        let fx = fixture(
            &["a.txt", "b.txt", "c.txt", "x.txt"],
            "k,v\na.txt,x.txt\nb.txt,y.txt\nc.txt,sub/z.txt\n",
        );
        let (report, lines) = transcript(&job(&fx));

        assert_eq!(report.errors(), 2);
        assert_eq!(
            lines,
            vec![
                "Renaming files...".to_string(),
                RULE.to_string(),
                "SKIPPED: 'a.txt' -> 'x.txt' (target exists)".to_string(),
                "RENAMED: 'b.txt' -> 'y.txt'".to_string(),
                "ERROR: Failed to rename 'c.txt': target name 'sub/z.txt' is not a plain file name"
                    .to_string(),
                RULE.to_string(),
                "Renaming completed: 1 successful, 2 errors".to_string(),
            ]
        );
    }

    #[test]
    fn collision_transcript_summary() {
        let fx = fixture(
            &["a.txt", "b.txt", "x.txt"],
            "current,new\na.txt,x.txt\nb.txt,y.txt\n",
        );
        let (_, lines) = transcript(&job(&fx));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Renaming completed: 1 successful, 1 errors")
        );
    }

    #[test]
    fn backup_mode_appends_note() {
        let fx = fixture(&["a.txt"], "k,v\na.txt,x.txt\n");
        let (_, lines) = transcript(&RenameJob {
            create_backup: true,
            ..job(&fx)
        });
        assert_eq!(
            &lines[lines.len() - 2..],
            [
                "Renaming completed: 1 successful, 0 errors",
                "Note: Backup files were created with .backup extension",
            ]
        );
    }

    #[test]
    fn dry_run_transcript_previews_plan() {
        let fx = fixture(&["a.txt", "b.txt"], "k,v\nA.TXT,x.txt\nb.txt,y.txt\n");
        let (_, lines) = transcript(&RenameJob {
            dry_run: true,
            ..job(&fx)
        });
        assert_eq!(
            lines,
            vec![
                "DRY RUN - Preview of changes:".to_string(),
                RULE.to_string(),
                "'a.txt' -> 'x.txt'".to_string(),
                "'b.txt' -> 'y.txt'".to_string(),
                RULE.to_string(),
                "Total files to rename: 2".to_string(),
                RULE.to_string(),
                "Preview completed: 2 files would be renamed".to_string(),
            ]
        );
    }

    #[test]
    fn reports_add_up() {
        let mut total = RunReport {
            planned: 2,
            renamed: 1,
            skipped: 1,
            failed: 0,
        };
        total += RunReport {
            planned: 3,
            renamed: 1,
            skipped: 0,
            failed: 2,
        };
        assert_eq!(
            total,
            RunReport {
                planned: 5,
                renamed: 2,
                skipped: 1,
                failed: 2,
            }
        );
        assert_eq!(total.errors(), 3);
    }

    #[test]
    fn target_validation() {
        assert!(validate_target("x.txt").is_ok());
        assert!(validate_target("New Name (1).pdf").is_ok());
        assert!(validate_target("").is_err());
        assert!(validate_target(".").is_err());
        assert!(validate_target("..").is_err());
        assert!(validate_target("dir/x.txt").is_err());
        assert!(validate_target("x.txt/").is_err());
    }
}
