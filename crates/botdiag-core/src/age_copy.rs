//! Age-filtered recursive copy.
//!
//! Mirrors a source tree into a destination tree, copying only files whose
//! age in whole days is within the threshold. Directories are always
//! descended into, whatever their own modification time.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::debug;

use crate::error::{CollectError, CollectResult};
use crate::fs::{copy_preserving, is_metadata_marker, resolved, sorted_entries};
use crate::journal::Journal;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Outcome counters for one copy run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped_stale: usize,
    pub failed: usize,
}

/// Whole days between `modified` and `now`, rounded down. Timestamps in the
/// future count as age zero.
pub fn age_in_days(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .map(|elapsed| elapsed.as_secs() / SECONDS_PER_DAY)
        .unwrap_or(0)
}

/// Copy files under `source_root` modified within `max_age_days` into
/// `dest_root`, keeping their relative paths.
pub fn copy_recent(
    source_root: &Path,
    dest_root: &Path,
    max_age_days: u64,
    journal: &Journal,
) -> CollectResult<CopyReport> {
    copy_recent_at(source_root, dest_root, max_age_days, SystemTime::now(), journal)
}

/// [`copy_recent`] against a fixed clock.
pub fn copy_recent_at(
    source_root: &Path,
    dest_root: &Path,
    max_age_days: u64,
    now: SystemTime,
    journal: &Journal,
) -> CollectResult<CopyReport> {
    for root in [source_root, dest_root] {
        if !root.is_dir() {
            return Err(CollectError::MissingRoot {
                path: root.to_path_buf(),
            });
        }
    }

    let dest_real = resolved(dest_root);
    let mut report = CopyReport::default();
    let mut pending: Vec<PathBuf> = vec![source_root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match sorted_entries(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                journal.warn(CollectError::io(&dir, e).to_string());
                report.failed += 1;
                continue;
            }
        };

        let mut subdirs = Vec::new();
        for entry in entries {
            if is_metadata_marker(&entry.file_name()) {
                continue;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                // The destination may live inside the source tree.
                if resolved(&path) != dest_real {
                    subdirs.push(path);
                }
                continue;
            }
            if file_type.is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "not following symlinked directory");
                continue;
            }

            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    journal.warn(CollectError::io(&path, e).to_string());
                    report.failed += 1;
                    continue;
                }
            };

            if age_in_days(modified, now) > max_age_days {
                report.skipped_stale += 1;
                continue;
            }

            let Ok(relative) = path.strip_prefix(source_root) else {
                continue;
            };
            let target = dest_root.join(relative);
            match copy_preserving(&path, &target) {
                Ok(_) => report.copied += 1,
                Err(source) => {
                    let err = CollectError::CopyFailure {
                        from: path,
                        to: target,
                        source,
                    };
                    journal.warn(err.to_string());
                    report.failed += 1;
                }
            }
        }

        // Reversed so the stack pops subdirectories in name order.
        pending.extend(subdirs.into_iter().rev());
    }

    journal.info(format!(
        "copied {} file(s) from {} ({} older than {} day(s), {} failed)",
        report.copied,
        source_root.display(),
        report.skipped_stale,
        max_age_days,
        report.failed
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn days_ago(now: SystemTime, days: u64) -> SystemTime {
        // An hour past the day boundary keeps the floor stable.
        now - Duration::from_secs(days * SECONDS_PER_DAY + 3_600)
    }

    fn write_aged(path: &Path, now: SystemTime, days: u64) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(days_ago(now, days))
            .unwrap();
    }

    #[test]
    fn age_is_floored_to_whole_days() {
        let now = SystemTime::now();
        assert_eq!(age_in_days(now, now), 0);
        assert_eq!(age_in_days(now - Duration::from_secs(86_399), now), 0);
        assert_eq!(age_in_days(now - Duration::from_secs(86_400), now), 1);
        assert_eq!(age_in_days(now + Duration::from_secs(600), now), 0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        write_aged(&src.path().join("fresh.log"), now, 0);
        write_aged(&src.path().join("boundary.log"), now, 3);
        write_aged(&src.path().join("stale.log"), now, 4);

        let report =
            copy_recent_at(src.path(), dst.path(), 3, now, &Journal::new()).unwrap();

        assert!(dst.path().join("fresh.log").exists());
        assert!(dst.path().join("boundary.log").exists());
        assert!(!dst.path().join("stale.log").exists());
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped_stale, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn mirrors_nested_structure_and_descends_into_old_directories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        write_aged(&src.path().join("a/b/c/deep.log"), now, 1);
        write_aged(&src.path().join("a/old.log"), now, 30);
        write_aged(&src.path().join("top.txt"), now, 0);

        let old_dir = src.path().join("a/b");
        File::open(&old_dir)
            .unwrap()
            .set_modified(days_ago(now, 365))
            .unwrap();

        copy_recent_at(src.path(), dst.path(), 7, now, &Journal::new()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("a/b/c/deep.log")).unwrap(),
            src.path().join("a/b/c/deep.log").to_string_lossy()
        );
        assert!(dst.path().join("top.txt").exists());
        assert!(!dst.path().join("a/old.log").exists());
    }

    #[test]
    fn skips_metadata_markers() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let now = SystemTime::now();

        write_aged(&src.path().join(".DS_Store"), now, 0);
        write_aged(&src.path().join("logs/._xcsd.log"), now, 0);
        write_aged(&src.path().join("logs/xcsd.log"), now, 0);

        let report =
            copy_recent_at(src.path(), dst.path(), 7, now, &Journal::new()).unwrap();

        assert_eq!(report.copied, 1);
        assert!(!dst.path().join(".DS_Store").exists());
        assert!(!dst.path().join("logs/._xcsd.log").exists());
        assert!(dst.path().join("logs/xcsd.log").exists());
    }

    #[test]
    fn missing_source_root_fails_without_copying() {
        let dst = tempfile::tempdir().unwrap();
        let missing = dst.path().join("does-not-exist");

        let err = copy_recent(&missing, dst.path(), 7, &Journal::new()).unwrap_err();

        assert!(matches!(err, CollectError::MissingRoot { ref path } if path == &missing));
        assert_eq!(std::fs::read_dir(dst.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_destination_root_fails() {
        let src = tempfile::tempdir().unwrap();
        write_aged(&src.path().join("a.log"), SystemTime::now(), 0);
        let missing = src.path().join("out");

        let err = copy_recent(src.path(), &missing, 7, &Journal::new()).unwrap_err();

        assert!(matches!(err, CollectError::MissingRoot { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn failed_copy_is_journaled_and_walk_continues() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        write_aged(&src.path().join("a.log"), now, 0);
        write_aged(&src.path().join("b.log"), now, 0);
        std::fs::create_dir_all(dst.path().join("a.log/blocker")).unwrap();

        let journal = Journal::new();
        let report = copy_recent_at(src.path(), dst.path(), 7, now, &journal).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 1);
        assert!(dst.path().join("b.log").is_file());
        assert_eq!(journal.count(crate::JournalLevel::Warn), 1);
        assert!(journal.entries()[0].message.contains("a.log"));
    }

    #[cfg(unix)]
    #[test]
    fn destination_reached_through_symlink_is_not_walked() {
        let src = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        write_aged(&src.path().join("a.log"), now, 0);
        let out = src.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let link = src.path().join("link");
        std::os::unix::fs::symlink(&out, &link).unwrap();

        let report = copy_recent_at(src.path(), &link, 7, now, &Journal::new()).unwrap();

        assert_eq!(report.copied, 1);
        assert!(out.join("a.log").exists());
        assert!(!out.join("out").exists());
    }

    #[test]
    fn destination_inside_source_is_not_walked() {
        let src = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        write_aged(&src.path().join("a.log"), now, 0);
        let dst = src.path().join("zz-out");
        std::fs::create_dir(&dst).unwrap();

        let report = copy_recent_at(src.path(), &dst, 7, now, &Journal::new()).unwrap();

        assert_eq!(report.copied, 1);
        assert!(dst.join("a.log").exists());
        assert!(!dst.join("zz-out").exists());
    }
}
