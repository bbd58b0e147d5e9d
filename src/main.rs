use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::error;
use serde::Serialize;

use dircompare::config::PROGRAM_LOG_LEVEL;
use dircompare::interact::{ErrorAction, Interaction, SkipErrors};
use dircompare::progress::{CancelFlag, ProgressSink, SilentProgress, TerminalLock};
use dircompare::source::DiskSource;
use dircompare::walker::{DirComparer, Side};
use dircompare::{
    CompareCriteria, CompareOptions, CompareOutcome, Error, Listing, Preferences, load_listing,
};

const EXIT_DIFFERENT: u8 = 1;
const EXIT_ERROR: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "dircompare",
    version,
    about = "Compare two directories and list what differs"
)]
struct Cli {
    left: PathBuf,
    right: PathBuf,

    /// Compare sizes
    #[arg(long)]
    size: bool,
    /// Compare last-write times
    #[arg(long)]
    time: bool,
    /// Compare attributes
    #[arg(long)]
    attributes: bool,
    /// Compare file contents byte by byte
    #[arg(long)]
    content: bool,
    /// Descend into subdirectories present on both sides
    #[arg(long, short = 'r')]
    subdirs: bool,
    /// Compare attributes of subdirectories
    #[arg(long)]
    subdir_attributes: bool,
    /// Report directories present on one side only
    #[arg(long)]
    one_panel_dirs: bool,

    /// Ignore files matching MASK, e.g. "*.bak;*.tmp"
    #[arg(long, value_name = "MASK")]
    ignore_files: Option<String>,
    /// Ignore directories matching MASK, e.g. ".git;target"
    #[arg(long, value_name = "MASK")]
    ignore_dirs: Option<String>,

    /// Seconds two times may differ and still be equal (0-3600)
    #[arg(long, value_name = "SECS", conflicts_with = "exact_time")]
    time_resolution: Option<u32>,
    /// Compare times exactly, rounding to 2 seconds against FAT volumes
    #[arg(long)]
    exact_time: bool,
    /// Treat time differences of exactly one or two hours as equal
    #[arg(long)]
    ignore_dst: bool,
    /// The left directory is on a FAT volume
    #[arg(long)]
    left_fat: bool,
    /// The right directory is on a FAT volume
    #[arg(long)]
    right_fat: bool,

    /// Read options from a JSON file; flags override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Do not draw progress bars
    #[arg(long)]
    #[cfg_attr(not(feature = "progress"), allow(dead_code))]
    no_progress: bool,
    /// Never ask: skip unreadable items and leave preferences alone
    #[arg(long, short = 'y')]
    yes: bool,
}

impl Cli {
    fn criteria(&self) -> CompareCriteria {
        let mut criteria = CompareCriteria::empty();
        for (on, flag) in [
            (self.size, CompareCriteria::BY_SIZE),
            (self.time, CompareCriteria::BY_TIME),
            (self.attributes, CompareCriteria::BY_ATTRIBUTES),
            (self.content, CompareCriteria::BY_CONTENT),
            (self.subdirs, CompareCriteria::SUBDIRS),
            (self.subdir_attributes, CompareCriteria::SUBDIR_ATTRIBUTES),
            (self.one_panel_dirs, CompareCriteria::ONE_PANEL_DIRS),
        ] {
            criteria.set(flag, on);
        }
        criteria
    }

    fn options(&self) -> Result<CompareOptions> {
        let mut options = match &self.config {
            Some(path) => CompareOptions::load(path)?,
            None => CompareOptions::default(),
        };
        let criteria = self.criteria();
        if !criteria.is_empty() {
            let masks = options.criteria
                & (CompareCriteria::IGNORE_FILE_NAMES | CompareCriteria::IGNORE_DIR_NAMES);
            options.criteria = criteria | masks;
        }
        if let Some(mask) = &self.ignore_files {
            options.criteria |= CompareCriteria::IGNORE_FILE_NAMES;
            options.ignore_file_masks = mask.clone();
        }
        if let Some(mask) = &self.ignore_dirs {
            options.criteria |= CompareCriteria::IGNORE_DIR_NAMES;
            options.ignore_dir_masks = mask.clone();
        }
        if self.exact_time {
            options.time_resolution = None;
        } else if let Some(secs) = self.time_resolution {
            options.time_resolution = Some(secs);
        }
        if self.ignore_dst {
            options.ignore_dst_shifts = true;
        }
        Ok(options)
    }
}

/// Asks on the terminal what to do about unreadable items.
struct TerminalPrompt {
    terminal: TerminalLock,
}

impl Interaction for TerminalPrompt {
    fn on_error(&mut self, error: &Error) -> ErrorAction {
        self.terminal.run(|| ask_about(error))
    }
}

fn ask_about(error: &Error) -> ErrorAction {
    loop {
        eprint!("\n{error}\n[r]etry, [s]kip (treat as different), [c]ancel? ");
        let Some(answer) = read_answer() else {
            return ErrorAction::Cancel;
        };
        match answer.as_str() {
            "r" | "retry" => return ErrorAction::Retry,
            "s" | "skip" | "" => return ErrorAction::Skip,
            "c" | "cancel" => return ErrorAction::Cancel,
            _ => continue,
        }
    }
}

fn read_answer() -> Option<String> {
    io::stderr().flush().ok();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    left: Vec<String>,
    right: Vec<String>,
    outcome: &'a CompareOutcome,
    verdict: Option<&'static str>,
}

fn selected_names(listing: &Listing) -> Vec<String> {
    listing
        .selected()
        .map(|r| if r.is_dir() { format!("{}/", r.name) } else { r.name.clone() })
        .collect()
}

fn print_side(label: &Path, listing: &Listing) {
    let names = selected_names(listing);
    if names.is_empty() {
        return;
    }
    println!("{}:", label.display());
    for name in names {
        println!("  {name}");
    }
}

#[cfg(feature = "progress")]
fn progress_sink(cli: &Cli, cancel: CancelFlag) -> (Box<dyn ProgressSink>, TerminalLock) {
    if cli.no_progress || cli.json {
        return (Box::new(SilentProgress::new(cancel)), TerminalLock::default());
    }
    let bars = dircompare::progress::BarProgress::new(cancel);
    let terminal = bars.terminal_lock();
    (Box::new(bars), terminal)
}

#[cfg(not(feature = "progress"))]
fn progress_sink(_cli: &Cli, cancel: CancelFlag) -> (Box<dyn ProgressSink>, TerminalLock) {
    (Box::new(SilentProgress::new(cancel)), TerminalLock::default())
}

fn show_dst_advisory(cli: &Cli, options: &CompareOptions, outcome: &CompareOutcome) -> bool {
    let prefs_path = Preferences::default_path();
    let mut prefs = prefs_path
        .as_deref()
        .map(Preferences::load_or_default)
        .unwrap_or_default();
    let Some(advisory) = outcome.dst_advisory(options, &prefs) else {
        return false;
    };
    println!("\n{}", advisory.text);
    if !cli.yes {
        eprint!("{}? [y/N] ", advisory.checkbox);
        if matches!(read_answer().as_deref(), Some("y" | "yes")) {
            prefs.apply_dont_show(options.ignore_dst_shifts, true);
            if let Some(path) = &prefs_path {
                if let Err(e) = prefs.save(path) {
                    error!("{e}");
                }
            }
        }
    }
    advisory.includes_verdict
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let options = cli.options()?;
    let left = DiskSource::new(&cli.left).with_fat(cli.left_fat);
    let right = DiskSource::new(&cli.right).with_fat(cli.right_fat);
    let mut left_listing = load_listing(&left, Path::new(""))
        .with_context(|| format!("cannot list {}", cli.left.display()))?;
    let mut right_listing = load_listing(&right, Path::new(""))
        .with_context(|| format!("cannot list {}", cli.right.display()))?;

    let cancel = CancelFlag::new();
    cancel
        .install_ctrlc_handler()
        .context("cannot install the Ctrl-C handler")?;
    let (mut progress, terminal) = progress_sink(cli, cancel);
    let mut interaction: Box<dyn Interaction> = if cli.yes {
        Box::new(SkipErrors)
    } else {
        Box::new(TerminalPrompt { terminal })
    };

    let outcome = DirComparer::new(&options, progress.as_mut(), interaction.as_mut())
        .compare(
            Side::new(&left, &mut left_listing),
            Side::new(&right, &mut right_listing),
        )
        .context("comparison failed")?;
    drop(progress);

    if outcome.cancelled {
        eprintln!("Comparison cancelled.");
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }

    if cli.json {
        let report = JsonReport {
            left: selected_names(&left_listing),
            right: selected_names(&right_listing),
            outcome: &outcome,
            verdict: outcome.verdict(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_side(&cli.left, &left_listing);
        print_side(&cli.right, &right_listing);
        let verdict_shown = show_dst_advisory(cli, &options, &outcome);
        if let Some(verdict) = outcome.verdict().filter(|_| !verdict_shown) {
            println!("{verdict}");
        }
    }

    Ok(if outcome.identical {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DIFFERENT)
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().filter_or(PROGRAM_LOG_LEVEL, "warn")).init();

    let cli = Cli::parse();
    match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("dircompare: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
