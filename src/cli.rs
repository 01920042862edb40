//! Command-line interface module for dirsort.
//!
//! This module handles:
//! - Argument parsing
//! - Merging arguments over the configuration file
//! - Running the organizer with a progress bar
//! - Printing the summary and persisting the report

use crate::classifier::GroupingMode;
use crate::config::{CompiledFilters, Config, DedupeMode, OrganizeSettings, TransferMode};
use crate::file_organizer::Organizer;
use crate::output::OutputFormatter;
use crate::report::RunReport;
use anyhow::Context;
use clap::{ArgAction, Parser};
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Organize files into type/date folders, detecting duplicate content.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "dirsort", version, about, long_about = None)]
pub struct Cli {
    /// Source folder [default: resources]
    #[arg(long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Destination folder [default: organized]
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Grouping strategy [default: type]
    #[arg(long, value_enum)]
    pub by: Option<GroupingMode>,

    /// Duplicate handling [default: off]
    #[arg(long, value_enum)]
    pub dedupe: Option<DedupeMode>,

    /// Preview actions without touching the filesystem
    #[arg(long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    /// Really organize, even if the configuration file asks for a dry run
    #[arg(long, overrides_with = "dry_run")]
    pub no_dry_run: bool,

    /// Empty the output folder before organizing
    #[arg(long, overrides_with = "no_clean_output")]
    pub clean_output: bool,

    /// Keep existing output, even if the configuration file asks to clean it
    #[arg(long, overrides_with = "clean_output")]
    pub no_clean_output: bool,

    /// Write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Copy files instead of moving them
    #[arg(long)]
    pub copy: bool,

    /// Only organize files directly inside the input folder
    #[arg(long)]
    pub no_recursive: bool,

    /// Configuration file (defaults to .dirsortrc.toml, then ~/.config/dirsort/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More diagnostic output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Overrides configuration values with the flags that were given.
    pub fn apply_overrides(&self, settings: &mut OrganizeSettings) {
        if let Some(input) = &self.input {
            settings.input = input.clone();
        }
        if let Some(output) = &self.output {
            settings.output = output.clone();
        }
        if let Some(grouping) = self.by {
            settings.grouping = grouping;
        }
        if let Some(dedupe) = self.dedupe {
            settings.dedupe = dedupe;
        }
        if let Some(report) = &self.report {
            settings.report = Some(report.clone());
        }
        if self.dry_run {
            settings.dry_run = true;
        } else if self.no_dry_run {
            settings.dry_run = false;
        }
        if self.clean_output {
            settings.clean_output = true;
        } else if self.no_clean_output {
            settings.clean_output = false;
        }
        if self.copy {
            settings.transfer = TransferMode::Copy;
        }
        if self.no_recursive {
            settings.recursive = false;
        }
    }
}

/// Loads configuration, applies the command line and runs the organizer.
pub fn run_cli(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = Config::load(cli.config.as_deref()).context("Error loading configuration")?;
    let filters = config
        .filters
        .compile()
        .context("Error compiling filters")?;

    let mut settings = config.organize;
    cli.apply_overrides(&mut settings);

    execute(settings, filters, cli.quiet)
}

/// Runs the organizer with resolved settings and prints its outcome.
///
/// The report is written to `settings.report` when set. Per-file errors are
/// listed but do not make this fail; only a run that could not start (or a
/// report that could not be written) does.
pub fn execute(
    settings: OrganizeSettings,
    filters: CompiledFilters,
    quiet: bool,
) -> anyhow::Result<RunReport> {
    let organizer = Organizer::with_filters(settings, filters).context("Cannot start run")?;
    let settings = organizer.settings();

    if !quiet {
        let message = format!(
            "Organizing {} into {} (by {}, dedupe {})",
            organizer.input_root().display(),
            organizer.output_root().display(),
            settings.grouping,
            settings.dedupe
        );
        if settings.dry_run {
            OutputFormatter::dry_run_notice(&message);
        } else {
            OutputFormatter::info(&message);
        }
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        OutputFormatter::create_progress_bar(0)
    };
    let report = organizer.run_with_progress(&progress)?;
    progress.finish_and_clear();

    if !quiet {
        for action in &report.actions {
            OutputFormatter::action_line(action, settings.dry_run);
        }
    }
    for error in &report.errors {
        OutputFormatter::error_line(error);
    }
    if !quiet {
        OutputFormatter::summary_table(&report);
        if report.totals.errors > 0 {
            OutputFormatter::warning("Some files could not be organized. Please review errors above.");
        }
    }

    match &settings.report {
        Some(path) => {
            report.write_json(path)?;
            if !quiet {
                OutputFormatter::success(&format!("Report written to: {}", path.display()));
            }
        }
        None if !quiet => OutputFormatter::plain("Report not written (no --report given)."),
        None => {}
    }

    if settings.dry_run && !quiet {
        OutputFormatter::dry_run_notice("Complete. No files were modified.");
    }

    Ok(report)
}
