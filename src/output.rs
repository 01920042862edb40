//! Console output formatting.
//!
//! All user-facing console output goes through [`OutputFormatter`] so colors,
//! symbols and table layout stay consistent. Diagnostics go through `tracing`
//! instead (see [`crate::logging`]).

use crate::file_organizer::ActionStatus;
use crate::report::{ActionEntry, ErrorEntry, RunReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages CLI output with consistent styling.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bar and summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("Report written");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints one line per handled file.
    pub fn action_line(action: &ActionEntry, dry_run: bool) {
        let verb = match (action.status, dry_run) {
            (ActionStatus::DuplicateDeleted, true) => "would delete duplicate",
            (ActionStatus::DuplicateDeleted, false) => "deleted duplicate",
            (_, true) => "would place at",
            (_, false) => "placed at",
        };
        let target = action.destination.as_deref().unwrap_or("");
        let mut line = format!(" - {} {} {}", action.source, verb, target);
        if action.renamed {
            line.push_str(" (renamed)");
        }

        match action.status {
            ActionStatus::Placed if action.duplicate_of.is_none() => Self::plain(&line),
            _ => println!("{}", line.yellow()),
        }
    }

    pub fn error_line(entry: &ErrorEntry) {
        Self::error(&format!("{} [{}]: {}", entry.source, entry.kind, entry.message));
    }

    /// Prints run totals and the per-folder breakdown.
    pub fn summary_table(report: &RunReport) {
        Self::header("SUMMARY");

        let totals = &report.totals;
        let rows = [
            ("Scanned", totals.scanned),
            ("Placed", totals.placed),
            ("Duplicates", totals.duplicates),
            ("Deleted", totals.deleted),
            ("Errors", totals.errors),
        ];
        for (label, count) in rows {
            let count = if label == "Errors" && count > 0 {
                count.to_string().red().bold()
            } else {
                count.to_string().green()
            };
            println!("{:<12} | {}", label.bold(), count);
        }

        if report.folders.is_empty() {
            return;
        }

        // Calculate column widths
        let width = report
            .folders
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(6); // At least "Folder" width

        Self::header("FOLDERS");
        println!("{:<width$} | {}", "Folder".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (folder, count) in &report.folders {
            let file_word = if *count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                file_word,
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
    }
}
