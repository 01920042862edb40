/// Integration tests for dirsort
///
/// These tests run the organizer end to end against temporary input and
/// output trees.
///
/// Test categories:
/// 1. Grouping layouts
/// 2. Duplicate handling
/// 3. Name collisions
/// 4. Dry-run mode
/// 5. Clean output
/// 6. Reports, errors and the CLI entry point
use chrono::{DateTime, TimeZone, Utc};
use dirsort::cli::{Cli, execute, run_cli};
use dirsort::config::{CompiledFilters, DedupeMode, OrganizeSettings, TransferMode};
use dirsort::file_organizer::{ActionStatus, OrganizeError};
use dirsort::{GroupingMode, RunReport, organize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace with an input folder and a (not yet created) output
/// folder next to it.
struct TestFixture {
    _temp_dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = fs::canonicalize(temp_dir.path()).expect("Failed to resolve temp directory");
        let input = root.join("resources");
        fs::create_dir(&input).expect("Failed to create input directory");
        TestFixture {
            _temp_dir: temp_dir,
            input,
            output: root.join("organized"),
        }
    }

    fn settings(&self) -> OrganizeSettings {
        OrganizeSettings {
            input: self.input.clone(),
            output: self.output.clone(),
            ..OrganizeSettings::default()
        }
    }

    /// Create a file (and its parent folders) below the input folder.
    fn create_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = self.input.join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file content");
        path
    }

    /// Create a file with a specific modification time.
    fn create_file_modified(&self, rel_path: &str, content: &[u8], at: DateTime<Utc>) -> PathBuf {
        let path = self.create_file(rel_path, content);
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("Failed to open file");
        file.set_modified(SystemTime::from(at))
            .expect("Failed to set modification time");
        path
    }

    /// Create a file directly in the output folder (leftover from an earlier run).
    fn create_output_file(&self, rel_path: &str, content: &[u8]) -> PathBuf {
        let path = self.output.join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file content");
        path
    }

    fn assert_output_file(&self, rel_path: &str) {
        let path = self.output.join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_input_file(&self, rel_path: &str) {
        let path = self.input.join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_input_missing(&self, rel_path: &str) {
        let path = self.input.join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// All files below the output folder, relative and `/`-separated.
    fn list_output_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        Self::walk_dir(&self.output, &mut files);
        let mut relative: Vec<String> = files
            .iter()
            .map(|path| {
                path.strip_prefix(&self.output)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect();
        relative.sort();
        relative
    }

    fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    files.push(path);
                } else if path.is_dir() {
                    Self::walk_dir(&path, files);
                }
            }
        }
    }

    fn destination_of(&self, report: &RunReport, rel_source: &str) -> Option<String> {
        report
            .action_for(&self.input.join(rel_source))
            .unwrap_or_else(|| panic!("No action recorded for {}", rel_source))
            .destination
            .clone()
    }

    fn output_path(&self, rel_path: &str) -> String {
        self.output.join(rel_path).to_string_lossy().into_owned()
    }
}

fn feb_2026() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()
}

fn assert_every_file_accounted_for(report: &RunReport) {
    assert_eq!(
        report.totals.scanned,
        report.actions.len() + report.errors.len(),
        "Every scanned file must appear exactly once"
    );
}

// ============================================================================
// Test Suite 1: Grouping
// ============================================================================

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let report = organize(&fixture.settings()).expect("Run should start");

    assert_eq!(report.totals.scanned, 0);
    assert!(report.actions.is_empty());
    assert!(fixture.list_output_files().is_empty());
}

#[test]
fn test_type_grouping_with_extensionless_file() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", b"%PDF-1.4");
    fixture.create_file("song.MP3", b"ID3");
    fixture.create_file("notes", b"plain notes");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(
        fixture.list_output_files(),
        vec!["mp3/song.mp3", "no_ext/notes", "pdf/report.pdf"]
    );
    fixture.assert_input_missing("report.pdf");
    assert_eq!(report.totals.placed, 3);
    assert_eq!(report.folders.get("no_ext"), Some(&1));
}

#[test]
fn test_type_date_grouping_lowercases_extension() {
    let fixture = TestFixture::new();
    fixture.create_file_modified("photo.JPG", b"\xFF\xD8\xFF\xE0", feb_2026());
    fixture.create_file_modified("readme", b"read me", feb_2026());

    let settings = OrganizeSettings {
        grouping: GroupingMode::TypeDate,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    fixture.assert_output_file("jpg/2026-02/photo.jpg");
    fixture.assert_output_file("no_ext/2026-02/readme");
    assert_eq!(
        fixture.destination_of(&report, "photo.JPG"),
        Some(fixture.output_path("jpg/2026-02/photo.jpg"))
    );
    assert_eq!(report.folders.get("jpg/2026-02"), Some(&1));
}

#[test]
fn test_date_grouping() {
    let fixture = TestFixture::new();
    let dec = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
    fixture.create_file_modified("a.txt", b"a", dec);
    fixture.create_file_modified("b.png", b"b", feb_2026());

    let settings = OrganizeSettings {
        grouping: GroupingMode::Date,
        ..fixture.settings()
    };
    organize(&settings).unwrap();

    assert_eq!(
        fixture.list_output_files(),
        vec!["2025-12/a.txt", "2026-02/b.png"]
    );
}

#[test]
fn test_nested_and_hidden_files_are_scanned() {
    let fixture = TestFixture::new();
    fixture.create_file("deep/er/still/data.csv", b"1,2,3");
    fixture.create_file(".env", b"KEY=value");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(report.totals.scanned, 2);
    fixture.assert_output_file("csv/data.csv");
    fixture.assert_output_file("no_ext/.env");
}

// ============================================================================
// Test Suite 2: Duplicates
// ============================================================================

#[test]
fn test_dedupe_move_sends_second_copy_to_duplicates() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same content");
    fixture.create_file("b.txt", b"same content");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Move,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    assert_eq!(
        fixture.list_output_files(),
        vec!["Duplicates/b.txt", "txt/a.txt"]
    );
    let dup = report.action_for(&fixture.input.join("b.txt")).unwrap();
    assert_eq!(dup.status, ActionStatus::DuplicateMoved);
    assert_eq!(dup.duplicate_of, Some(fixture.output_path("txt/a.txt")));
    assert_eq!(report.totals.duplicates, 1);
    assert_eq!(report.totals.placed, 2);
}

#[test]
fn test_identical_content_has_exactly_one_canonical_copy() {
    let fixture = TestFixture::new();
    fixture.create_file("one.txt", b"payload");
    fixture.create_file("sub/two.md", b"payload");
    fixture.create_file("zzz/three", b"payload");
    fixture.create_file("unique.txt", b"different");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Move,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    let payload_actions: Vec<_> = report
        .actions
        .iter()
        .filter(|a| !a.source.ends_with("unique.txt"))
        .collect();
    let first_seen = payload_actions
        .iter()
        .filter(|a| a.duplicate_of.is_none())
        .count();
    assert_eq!(first_seen, 1);
    assert_eq!(report.totals.duplicates, 2);
    assert_eq!(report.folders.get("Duplicates"), Some(&2));
}

#[test]
fn test_dedupe_off_places_every_copy_but_counts_duplicates() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same content");
    fixture.create_file("b.txt", b"same content");
    fixture.create_file("c.txt", b"same content");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(
        fixture.list_output_files(),
        vec!["txt/a.txt", "txt/b.txt", "txt/c.txt"]
    );
    assert_eq!(report.totals.duplicates, 2);
    assert_eq!(report.totals.placed, 3);
    assert!(report.actions.iter().all(|a| a.status == ActionStatus::Placed));
}

#[test]
fn test_dedupe_delete_removes_duplicates() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same content");
    fixture.create_file("b.txt", b"same content");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Delete,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    assert_eq!(fixture.list_output_files(), vec!["txt/a.txt"]);
    fixture.assert_input_missing("b.txt");
    let dup = report.action_for(&fixture.input.join("b.txt")).unwrap();
    assert_eq!(dup.status, ActionStatus::DuplicateDeleted);
    assert!(dup.destination.is_none());
    assert_eq!(report.totals.deleted, 1);
    assert_eq!(report.totals.placed, 1);
}

#[test]
fn test_dedupe_delete_dry_run_keeps_inputs() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same content");
    fixture.create_file("b.txt", b"same content");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Delete,
        dry_run: true,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    fixture.assert_input_file("a.txt");
    fixture.assert_input_file("b.txt");
    assert!(!fixture.output.exists());
    assert_eq!(report.totals.deleted, 1);
}

// ============================================================================
// Test Suite 3: Collisions
// ============================================================================

#[test]
fn test_same_name_different_content_is_disambiguated() {
    let fixture = TestFixture::new();
    fixture.create_file("2025/report.pdf", b"first report");
    fixture.create_file("2026/report.pdf", b"second report");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(
        fixture.list_output_files(),
        vec!["pdf/report (1).pdf", "pdf/report.pdf"]
    );
    let second = report.action_for(&fixture.input.join("2026/report.pdf")).unwrap();
    assert!(second.renamed);
    assert_eq!(second.destination, Some(fixture.output_path("pdf/report (1).pdf")));
    assert_eq!(
        fs::read(fixture.output.join("pdf/report.pdf")).unwrap(),
        b"first report"
    );
}

#[test]
fn test_existing_output_file_is_never_overwritten() {
    let fixture = TestFixture::new();
    fixture.create_output_file("txt/a.txt", b"from an earlier run");
    fixture.create_file("a.txt", b"new content");

    organize(&fixture.settings()).unwrap();

    assert_eq!(
        fs::read(fixture.output.join("txt/a.txt")).unwrap(),
        b"from an earlier run"
    );
    assert_eq!(fs::read(fixture.output.join("txt/a (1).txt")).unwrap(), b"new content");
}

#[test]
fn test_dry_run_claims_never_repeat() {
    let fixture = TestFixture::new();
    fixture.create_file("a/x.txt", b"1");
    fixture.create_file("b/x.txt", b"2");
    fixture.create_file("c/x.txt", b"3");

    let settings = OrganizeSettings {
        dry_run: true,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    let mut destinations: Vec<_> = report
        .actions
        .iter()
        .filter_map(|a| a.destination.clone())
        .collect();
    destinations.sort();
    destinations.dedup();
    assert_eq!(destinations.len(), 3);
}

#[test]
fn test_destination_folder_blocked_by_file_is_move_failure() {
    let fixture = TestFixture::new();
    fixture.create_output_file("txt", b"a file where a folder should be");
    fixture.create_file("a.txt", b"alpha");
    fixture.create_file("b.md", b"beta");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(report.totals.errors, 1);
    assert_eq!(report.errors[0].kind, "move-failure");
    fixture.assert_input_file("a.txt");
    fixture.assert_output_file("md/b.md");
    assert_every_file_accounted_for(&report);
}

// ============================================================================
// Test Suite 4: Dry-Run Mode
// ============================================================================

#[test]
fn test_dry_run_doesnt_touch_filesystem() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.png", b"png");
    fixture.create_file("report.pdf", b"pdf");

    let settings = OrganizeSettings {
        dry_run: true,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    fixture.assert_input_file("photo.png");
    fixture.assert_input_file("report.pdf");
    assert!(!fixture.output.exists(), "Dry-run should not create the output");
    assert!(report.settings.dry_run);
    assert_eq!(report.totals.placed, 2);
}

#[test]
fn test_dry_run_twice_gives_identical_reports() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same");
    fixture.create_file("b.txt", b"same");
    fixture.create_file("c/report.pdf", b"pdf one");
    fixture.create_file("d/report.pdf", b"pdf two");
    fixture.create_output_file("pdf/report.pdf", b"stale");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Move,
        dry_run: true,
        ..fixture.settings()
    };
    let first = organize(&settings).unwrap();
    let second = organize(&settings).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_dry_run_matches_real_run() {
    let fixture = TestFixture::new();
    fixture.create_file_modified("IMG_1.JPG", b"image one", feb_2026());
    fixture.create_file_modified("copy/IMG_1.jpg", b"image one", feb_2026());
    fixture.create_file_modified("notes", b"notes", feb_2026());

    let dry = OrganizeSettings {
        grouping: GroupingMode::TypeDate,
        dedupe: DedupeMode::Move,
        dry_run: true,
        ..fixture.settings()
    };
    let planned = organize(&dry).unwrap();
    let executed = organize(&OrganizeSettings {
        dry_run: false,
        ..dry.clone()
    })
    .unwrap();

    assert_eq!(planned.actions, executed.actions);
    assert_eq!(planned.folders, executed.folders);
    assert_eq!(planned.totals, executed.totals);
    assert!(planned.settings.dry_run);
    assert!(!executed.settings.dry_run);
}

// ============================================================================
// Test Suite 5: Clean Output
// ============================================================================

#[test]
fn test_clean_output_removes_previous_contents() {
    let fixture = TestFixture::new();
    fixture.create_output_file("old/leftover.bin", b"old");
    fixture.create_output_file("txt/a.txt", b"old a");
    fixture.create_file("a.txt", b"new a");

    let settings = OrganizeSettings {
        clean_output: true,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    assert_eq!(fixture.list_output_files(), vec!["txt/a.txt"]);
    assert_eq!(fs::read(fixture.output.join("txt/a.txt")).unwrap(), b"new a");
    assert!(!report.actions[0].renamed);
}

#[test]
fn test_clean_output_dry_run_is_simulated() {
    let fixture = TestFixture::new();
    fixture.create_output_file("txt/a.txt", b"old a");
    fixture.create_file("a.txt", b"new a");

    let settings = OrganizeSettings {
        clean_output: true,
        dry_run: true,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    // the stale file survives, but the plan assumes it is gone
    assert_eq!(fs::read(fixture.output.join("txt/a.txt")).unwrap(), b"old a");
    assert!(report.settings.clean_output);
    assert_eq!(
        fixture.destination_of(&report, "a.txt"),
        Some(fixture.output_path("txt/a.txt"))
    );
    assert!(!report.actions[0].renamed);
}

// ============================================================================
// Test Suite 6: Reports, Errors, CLI
// ============================================================================

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_reported_and_run_continues() {
    let fixture = TestFixture::new();
    fixture.create_file("good.txt", b"fine");
    std::os::unix::fs::symlink(fixture.input.join("missing-target"), fixture.input.join("broken.txt"))
        .expect("Failed to create symlink");

    let report = organize(&fixture.settings()).unwrap();

    assert_eq!(report.totals.scanned, 2);
    assert_eq!(report.totals.errors, 1);
    assert_eq!(report.errors[0].kind, "unreadable-source");
    assert!(report.errors[0].source.ends_with("broken.txt"));
    fixture.assert_output_file("txt/good.txt");
    assert_every_file_accounted_for(&report);
}

#[test]
fn test_missing_input_root_fails_before_processing() {
    let fixture = TestFixture::new();
    let settings = OrganizeSettings {
        input: fixture.input.join("does-not-exist"),
        ..fixture.settings()
    };

    let result = organize(&settings);
    assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));
    assert!(!fixture.output.exists());
}

#[test]
fn test_execute_writes_json_report() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"same");
    fixture.create_file("b.txt", b"same");
    let report_path = fixture.input.parent().unwrap().join("out").join("report.json");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Move,
        transfer: TransferMode::Copy,
        report: Some(report_path.clone()),
        ..fixture.settings()
    };
    let report = execute(settings, CompiledFilters::default(), true).expect("Run should succeed");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["settings"]["grouping"], "type");
    assert_eq!(json["settings"]["dedupe"], "move");
    assert_eq!(json["settings"]["dry_run"], false);
    assert_eq!(json["settings"]["clean_output"], false);
    assert_eq!(json["totals"]["scanned"], 2);
    assert_eq!(json["totals"]["duplicates"], 1);
    assert_eq!(json["actions"][1]["status"], "duplicate-moved");
    assert_eq!(json["folders"]["Duplicates"], 1);
    assert_eq!(json["folders"]["txt"], 1);
    assert_eq!(report.totals.placed, 2);

    // copies leave the input alone
    fixture.assert_input_file("a.txt");
    fixture.assert_input_file("b.txt");
}

#[test]
fn test_execute_without_report_path_writes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", b"alpha");

    let settings = OrganizeSettings {
        dry_run: true,
        ..fixture.settings()
    };
    execute(settings, CompiledFilters::default(), true).unwrap();

    let siblings: Vec<_> = fs::read_dir(fixture.input.parent().unwrap())
        .unwrap()
        .flatten()
        .map(|e| e.file_name())
        .collect();
    assert_eq!(siblings, vec![std::ffi::OsString::from("resources")]);
}

#[test]
fn test_run_cli_reads_config_file_and_flags_override_it() {
    let fixture = TestFixture::new();
    fixture.create_file_modified("a.txt", b"alpha", feb_2026());
    fixture.create_file("scratch.tmp", b"temporary");
    let config_path = fixture.input.parent().unwrap().join("dirsort.toml");
    let config = format!(
        "[organize]\ninput = {:?}\noutput = {:?}\ngrouping = \"date\"\n\n[filters.exclude]\nextensions = [\"tmp\"]\n",
        fixture.input.to_string_lossy(),
        fixture.output.to_string_lossy(),
    );
    fs::write(&config_path, config).unwrap();

    let cli = Cli {
        config: Some(config_path),
        by: Some(GroupingMode::TypeDate),
        quiet: true,
        ..Cli::default()
    };
    let report = run_cli(&cli).expect("Run should succeed");

    assert_eq!(report.totals.scanned, 1);
    fixture.assert_output_file("txt/2026-02/a.txt");
    fixture.assert_input_file("scratch.tmp");
}

#[test]
fn test_run_cli_rejects_missing_config_file() {
    let fixture = TestFixture::new();
    let cli = Cli {
        config: Some(fixture.input.join("missing.toml")),
        quiet: true,
        ..Cli::default()
    };
    assert!(run_cli(&cli).is_err());
}

#[cfg(unix)]
#[test]
fn test_symlink_never_replaces_its_target_under_delete() {
    let fixture = TestFixture::new();
    let target = fixture.create_file("photo.txt", b"only copy of this content");
    // sorts before its target
    std::os::unix::fs::symlink(&target, fixture.input.join("0link.txt"))
        .expect("Failed to create symlink");

    let settings = OrganizeSettings {
        dedupe: DedupeMode::Delete,
        ..fixture.settings()
    };
    let report = organize(&settings).unwrap();

    assert_eq!(report.totals.errors, 1);
    assert_eq!(report.errors[0].kind, "unreadable-source");
    assert!(report.errors[0].source.ends_with("0link.txt"));

    let placed = report.action_for(&target).unwrap();
    assert_eq!(placed.status, ActionStatus::Placed);
    assert_eq!(report.totals.deleted, 0);
    assert_eq!(
        fs::read(fixture.output.join("txt/photo.txt")).unwrap(),
        b"only copy of this content"
    );
    assert_every_file_accounted_for(&report);
}

#[test]
fn test_dry_run_reports_blocked_folder_like_real_run() {
    let fixture = TestFixture::new();
    fixture.create_output_file("txt", b"a file where a folder should be");
    fixture.create_file("a.txt", b"alpha");
    fixture.create_file("b.md", b"beta");

    let dry = OrganizeSettings {
        dry_run: true,
        ..fixture.settings()
    };
    let planned = organize(&dry).unwrap();
    let executed = organize(&fixture.settings()).unwrap();

    assert_eq!(planned.totals, executed.totals);
    assert_eq!(planned.actions, executed.actions);
    assert_eq!(planned.errors.len(), 1);
    assert_eq!(planned.errors[0].kind, "move-failure");
    assert_eq!(planned.errors[0].kind, executed.errors[0].kind);
}
