use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use is_terminal::IsTerminal;

mod changelog;
mod commands;
mod config;
mod encoding;
mod error;
mod files;
mod logging;
mod mapping;
mod normalize;
mod plan;

use changelog::{ChangeLog, DEFAULT_LOG_PATH};
use commands::{RunReport, run_rename};
use config::{RenameJob, load_plan};
use logging::{LogConfig, init_logging};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn should_color(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stderr().is_terminal(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig {
        level: cli.verbosity.tracing_level_filter(),
        with_ansi: cli.color.should_color(),
        use_env_filter: !cli.verbosity.is_present(),
    });
    run(cli).inspect_err(|err| tracing::error!("Program error: {err:#}"))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Rename(cmd) => handle_rename(cmd)?,
        Command::Batch(cmd) => handle_batch(cmd)?,
        Command::Log(cmd) => handle_log(cmd)?,
        Command::Cleanup(cmd) => handle_cleanup(cmd)?,
    }

    Ok(())
}

fn handle_rename(cmd: RenameCommand) -> Result<()> {
    let job = cmd.into_job();
    tracing::debug!(?job, "starting rename");
    run_rename(&job, &mut io::stdout().lock())?;
    Ok(())
}

fn handle_batch(cmd: BatchCommand) -> Result<()> {
    let plan = load_plan(&cmd.plan)?;
    let total = plan.jobs.len();
    let mut totals = RunReport::default();
    for (index, mut job) in plan.jobs.into_iter().enumerate() {
        job.dry_run |= cmd.dry_run;
        println!(
            "job {}/{total}: {} <- {}{}",
            index + 1,
            job.folder.display(),
            job.csv.display(),
            if job.dry_run { " (dry run)" } else { "" }
        );
        let report = run_rename(&job, &mut io::stdout().lock())
            .with_context(|| format!("batch job {} of {total}", index + 1))?;
        totals += report;
        println!();
    }
    println!(
        "batch summary: jobs={total}, planned={}, renamed={}, errors={}",
        totals.planned,
        totals.renamed,
        totals.errors()
    );
    Ok(())
}

fn handle_log(cmd: LogCommand) -> Result<()> {
    let log = ChangeLog::new(cmd.change_log);
    let entries = log.read_recent(cmd.tail)?;
    if entries.is_empty() {
        println!("change log is empty.");
        return Ok(());
    }
    for entry in entries {
        println!(
            "[{}] {:<8} {:<9} {} -> {}",
            entry.timestamp, entry.command, entry.action, entry.path, entry.target
        );
        if let Some(detail) = entry.detail {
            println!("    {detail}");
        }
    }
    Ok(())
}

fn handle_cleanup(cmd: CleanupCommand) -> Result<()> {
    files::ensure_folder(&cmd.folder)?;
    let candidates = files::find_backup_files(&cmd.folder)?;
    if candidates.is_empty() {
        println!("no .backup files found in {}", cmd.folder.display());
        return Ok(());
    }
    println!("found {} backup file(s):", candidates.len());
    for path in &candidates {
        println!("  - {}", path.display());
    }
    if !cmd.apply {
        println!("dry-run: rerun with --apply to restore these files.");
        return Ok(());
    }

    let log = cmd.change_log.map(ChangeLog::new);
    let mut stats = CommandStats::default();
    let mut apply_all = cmd.auto_apply;
    for path in candidates {
        let decision = if apply_all {
            ApprovalDecision::Apply
        } else {
            prompt_approval(&path)?
        };
        match decision {
            ApprovalDecision::Apply | ApprovalDecision::ApplyAll => {
                if matches!(decision, ApprovalDecision::ApplyAll) {
                    apply_all = true;
                }
                match restore_backup(&path) {
                    Ok(restored) => {
                        println!("restored {} -> {}", path.display(), restored.display());
                        stats.applied += 1;
                        if let Some(log) = &log {
                            let target = restored
                                .file_name()
                                .map(|name| name.to_string_lossy().into_owned())
                                .unwrap_or_default();
                            log.record_or_warn("cleanup", &path, &target, "restored", None);
                        }
                    }
                    Err(err) => {
                        println!("skipped {}: {err:#}", path.display());
                        stats.skipped += 1;
                    }
                }
            }
            ApprovalDecision::Skip => {
                println!("skipped {}", path.display());
                stats.skipped += 1;
            }
            ApprovalDecision::Quit => {
                println!("stopping cleanup after user request.");
                break;
            }
        }
    }
    stats.print("cleanup");
    Ok(())
}

/// Moves a stranded `<name>.backup` back to `<name>` unless that name is taken.
fn restore_backup(path: &Path) -> Result<PathBuf> {
    let original = files::original_name_for_backup(path)
        .with_context(|| format!("{} is not a .backup file", path.display()))?;
    let destination = path.with_file_name(original);
    if fs::symlink_metadata(&destination).is_ok() {
        anyhow::bail!("{} already exists", destination.display());
    }
    fs::rename(path, &destination)
        .with_context(|| format!("renaming {} to {}", path.display(), destination.display()))?;
    Ok(destination)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApprovalDecision {
    Apply,
    Skip,
    ApplyAll,
    Quit,
}

impl ApprovalDecision {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" | "" => Some(ApprovalDecision::Apply),
            "n" | "no" => Some(ApprovalDecision::Skip),
            "a" | "all" => Some(ApprovalDecision::ApplyAll),
            "q" | "quit" => Some(ApprovalDecision::Quit),
            _ => None,
        }
    }
}

fn prompt_approval(path: &Path) -> Result<ApprovalDecision> {
    loop {
        print!("Restore {}? [y]es/[n]o/[a]ll/[q]uit: ", path.display());
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(ApprovalDecision::Quit);
        }
        match ApprovalDecision::parse(&input) {
            Some(decision) => return Ok(decision),
            None => println!("Please enter y, n, a, or q."),
        }
    }
}

#[derive(Default)]
struct CommandStats {
    applied: usize,
    skipped: usize,
}

impl CommandStats {
    fn print(&self, label: &str) {
        if self.applied + self.skipped == 0 {
            return;
        }
        println!(
            "{label} summary: restored={}, skipped={}",
            self.applied, self.skipped
        );
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "csvrename",
    version,
    about = "Rename files in a folder from a two-column CSV mapping"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
    /// Colorize log output on stderr.
    #[arg(long = "color", value_enum, default_value = "auto", global = true)]
    color: ColorChoice,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rename files in FOLDER using the first two columns of CSV.
    Rename(RenameCommand),
    /// Run every job listed in a YAML or JSON plan.
    Batch(BatchCommand),
    /// Show the most recent change log entries.
    Log(LogCommand),
    /// Restore `.backup` files left behind by a failed rename.
    Cleanup(CleanupCommand),
}

#[derive(Debug, Args)]
struct RenameCommand {
    /// Folder containing files to rename.
    #[arg(value_name = "FOLDER", value_hint = ValueHint::DirPath)]
    folder: PathBuf,
    /// CSV with current names (column 1) and target names (column 2).
    #[arg(value_name = "CSV", value_hint = ValueHint::FilePath)]
    csv: PathBuf,
    /// Rename through `<name>.backup` before the final name.
    #[arg(long = "create-backup", action = ArgAction::SetTrue)]
    create_backup: bool,
    /// Preview changes without renaming anything.
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Match file names case-sensitively.
    #[arg(long = "case-sensitive", action = ArgAction::SetTrue)]
    case_sensitive: bool,
    /// Encoding of the CSV file (auto-detected when omitted).
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
    /// Append each rename to a JSON-lines change log.
    #[arg(
        long = "change-log",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_LOG_PATH,
        value_hint = ValueHint::FilePath
    )]
    change_log: Option<PathBuf>,
}

impl RenameCommand {
    fn into_job(self) -> RenameJob {
        RenameJob {
            folder: self.folder,
            csv: self.csv,
            create_backup: self.create_backup,
            dry_run: self.dry_run,
            case_sensitive: self.case_sensitive,
            encoding: self.encoding,
            change_log: self.change_log,
        }
    }
}

#[derive(Debug, Args)]
struct BatchCommand {
    #[arg(value_name = "PLAN", value_hint = ValueHint::FilePath)]
    plan: PathBuf,
    /// Preview every job regardless of its own setting.
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(long = "change-log", value_name = "PATH", default_value = DEFAULT_LOG_PATH)]
    change_log: PathBuf,
    #[arg(long = "tail", default_value_t = 20)]
    tail: usize,
}

#[derive(Debug, Args)]
struct CleanupCommand {
    #[arg(value_name = "FOLDER", value_hint = ValueHint::DirPath)]
    folder: PathBuf,
    #[arg(long, action = ArgAction::SetTrue)]
    apply: bool,
    #[arg(long = "yes", action = ArgAction::SetTrue)]
    auto_apply: bool,
    #[arg(long = "change-log", value_name = "PATH")]
    change_log: Option<PathBuf>,
}
