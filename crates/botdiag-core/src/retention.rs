//! Retention-bounded selection of integration assets.
//!
//! An asset root holds one directory per bot, each containing run folders
//! named by integration number:
//!
//! ```text
//! <asset_root>/<bot>/<run>/.../<file>
//! ```
//!
//! Under [`RetentionPolicy::LastN`] only the `n` highest-numbered runs of each
//! bot are scanned. Only files of a known [`AssetClass`] are extracted, in
//! either mode.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{CollectError, CollectResult};
use crate::fs::{copy_preserving, is_metadata_marker, resolved, sorted_entries};
use crate::journal::Journal;

/// Runs kept per bot when no policy is given.
pub const DEFAULT_RETAINED_RUNS: usize = 10;

/// Which run folders of a bot are eligible for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RetentionPolicy {
    /// Every run, and in fact the whole asset root.
    All,
    /// The `n` highest-numbered runs per bot.
    LastN(NonZeroUsize),
}

impl RetentionPolicy {
    /// `LastN(n)`, or `None` for `n == 0`.
    pub fn last(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Self::LastN)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::LastN(NonZeroUsize::new(DEFAULT_RETAINED_RUNS).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Kinds of diagnostic file worth extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Log,
    Sample,
    Crash,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Log, AssetClass::Sample, AssetClass::Crash];

    /// File-name globs for this class.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Log => &["*.log"],
            Self::Sample => &["*.sample"],
            Self::Crash => &["*.crash", "*.ips"],
        }
    }
}

/// Classifies file names against the [`AssetClass`] globs (case-insensitive).
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    set: GlobSet,
    classes: Vec<AssetClass>,
}

impl AssetMatcher {
    pub fn new() -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut classes = Vec::new();
        for class in AssetClass::ALL {
            for pattern in class.patterns() {
                let glob = GlobBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("asset patterns are valid globs");
                builder.add(glob);
                classes.push(class);
            }
        }
        let set = builder.build().expect("asset patterns are valid globs");
        Self { set, classes }
    }

    pub fn classify(&self, file_name: &OsStr) -> Option<AssetClass> {
        self.set
            .matches(file_name)
            .first()
            .and_then(|&i| self.classes.get(i).copied())
    }
}

impl Default for AssetMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A numbered run folder under a bot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolder {
    pub number: u64,
    pub name: String,
    pub path: PathBuf,
}

/// Integration number encoded in a run folder name.
///
/// Only plain ASCII digits are accepted; anything else (signs, whitespace,
/// suffixes, overflow) is not a run folder.
pub fn parse_run_folder(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Numeric order, ties ("7" vs "007") broken by name.
pub fn compare_runs(a: &RunFolder, b: &RunFolder) -> Ordering {
    a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name))
}

/// Apply `policy` to a bot's runs.
///
/// `All` returns every run in ascending order. `LastN(n)` returns the
/// `min(n, runs.len())` highest runs, highest first.
pub fn select_runs(mut runs: Vec<RunFolder>, policy: RetentionPolicy) -> Vec<RunFolder> {
    runs.sort_by(compare_runs);
    match policy {
        RetentionPolicy::All => runs,
        RetentionPolicy::LastN(n) => {
            let mut selected = Vec::with_capacity(n.get().min(runs.len()));
            while selected.len() < n.get() {
                match runs.pop() {
                    Some(run) => selected.push(run),
                    None => break,
                }
            }
            selected
        }
    }
}

/// Numbered run folders directly under `entity_dir`.
pub fn list_runs(entity_dir: &Path) -> std::io::Result<Vec<RunFolder>> {
    let mut runs = Vec::new();
    for entry in sorted_entries(entity_dir)? {
        let file_name = entry.file_name();
        if is_metadata_marker(&file_name) || !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = file_name.to_string_lossy().into_owned();
        match parse_run_folder(&name) {
            Some(number) => runs.push(RunFolder {
                number,
                name,
                path: entry.path(),
            }),
            None => debug!(dir = %entry.path().display(), "ignoring non-numeric run folder"),
        }
    }
    Ok(runs)
}

/// Runs selected for one bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySelection {
    pub entity: String,
    pub runs: Vec<String>,
}

/// Outcome of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub entities: Vec<EntitySelection>,
    pub copied: usize,
    pub failed: usize,
}

/// Extract asset files from `asset_root` into `dest_root` under `policy`,
/// preserving paths relative to `asset_root`.
pub fn select_and_extract(
    asset_root: &Path,
    dest_root: &Path,
    policy: RetentionPolicy,
    journal: &Journal,
) -> CollectResult<ExtractReport> {
    if !asset_root.is_dir() {
        return Err(CollectError::MissingRoot {
            path: asset_root.to_path_buf(),
        });
    }
    std::fs::create_dir_all(dest_root).map_err(|e| CollectError::io(dest_root, e))?;

    let extractor = Extractor {
        asset_root,
        dest_root,
        dest_real: resolved(dest_root),
        matcher: AssetMatcher::new(),
        journal,
    };
    let mut report = ExtractReport::default();

    match policy {
        RetentionPolicy::All => extractor.extract_tree(asset_root, &mut report),
        RetentionPolicy::LastN(_) => {
            let entities =
                sorted_entries(asset_root).map_err(|e| CollectError::io(asset_root, e))?;
            for entry in entities {
                let file_name = entry.file_name();
                if is_metadata_marker(&file_name) || !entry.file_type().is_ok_and(|t| t.is_dir())
                {
                    continue;
                }
                let entity_dir = entry.path();
                let entity = file_name.to_string_lossy().into_owned();

                let runs = match list_runs(&entity_dir) {
                    Ok(runs) => runs,
                    Err(e) => {
                        journal.warn(CollectError::io(&entity_dir, e).to_string());
                        report.failed += 1;
                        continue;
                    }
                };

                let selected = select_runs(runs, policy);
                if selected.is_empty() {
                    debug!(entity = %entity, "no runs to extract");
                    continue;
                }
                for run in &selected {
                    extractor.extract_tree(&run.path, &mut report);
                }
                report.entities.push(EntitySelection {
                    entity,
                    runs: selected.into_iter().map(|r| r.name).collect(),
                });
            }
        }
    }

    journal.info(format!(
        "extracted {} asset file(s) from {} ({:?}, {} bot(s), {} failed)",
        report.copied,
        asset_root.display(),
        policy,
        report.entities.len(),
        report.failed
    ));
    Ok(report)
}

struct Extractor<'a> {
    asset_root: &'a Path,
    dest_root: &'a Path,
    dest_real: PathBuf,
    matcher: AssetMatcher,
    journal: &'a Journal,
}

impl Extractor<'_> {
    /// Copy every matching file under `scan_root`.
    fn extract_tree(&self, scan_root: &Path, report: &mut ExtractReport) {
        let mut pending = vec![scan_root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = match sorted_entries(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    self.journal.warn(CollectError::io(&dir, e).to_string());
                    report.failed += 1;
                    continue;
                }
            };

            let mut subdirs = Vec::new();
            for entry in entries {
                let file_name = entry.file_name();
                if is_metadata_marker(&file_name) {
                    continue;
                }
                let path = entry.path();
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_dir() {
                    if resolved(&path) != self.dest_real {
                        subdirs.push(path);
                    }
                    continue;
                }
                if self.matcher.classify(&file_name).is_none() || path.is_dir() {
                    continue;
                }
                self.copy_asset(path, report);
            }
            pending.extend(subdirs.into_iter().rev());
        }
    }

    fn copy_asset(&self, path: PathBuf, report: &mut ExtractReport) {
        let Ok(relative) = path.strip_prefix(self.asset_root) else {
            return;
        };
        let target = self.dest_root.join(relative);
        match copy_preserving(&path, &target) {
            Ok(_) => report.copied += 1,
            Err(source) => {
                let err = CollectError::CopyFailure {
                    from: path,
                    to: target,
                    source,
                };
                self.journal.warn(err.to_string());
                report.failed += 1;
            }
        }
    }
}
