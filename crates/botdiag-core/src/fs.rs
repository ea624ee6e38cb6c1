//! Filesystem helpers shared by the copy phases.

use std::ffi::OsStr;
use std::fs::{DirEntry, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Names that are never collected: directory self/parent links and
/// filesystem metadata left behind by the OS.
const METADATA_MARKERS: &[&str] = &[
    ".",
    "..",
    ".DS_Store",
    ".localized",
    ".Spotlight-V100",
    ".fseventsd",
    ".Trashes",
];

/// Whether `name` is an OS metadata marker (including AppleDouble `._*` files).
pub fn is_metadata_marker(name: &OsStr) -> bool {
    let Some(name) = name.to_str() else {
        return false;
    };
    METADATA_MARKERS.contains(&name) || name.starts_with("._")
}

/// Snapshot of a directory's entries, sorted by file name.
///
/// Unreadable individual entries are dropped; failing to open the directory
/// itself is an error.
pub fn sorted_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries: Vec<DirEntry> = std::fs::read_dir(dir)?.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// `path` with symlinks resolved, or `path` itself when it cannot be resolved.
pub fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Copy a file, creating parent directories of `to` as needed.
///
/// Permissions are carried over by `std::fs::copy`; access and
/// modification times are restored on the destination afterwards when the
/// copy is writable (a read-only source yields a read-only copy whose times
/// stay at copy time).
pub fn copy_preserving(from: &Path, to: &Path) -> io::Result<u64> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = std::fs::copy(from, to)?;

    if let Err(e) = restore_times(from, to) {
        debug!(path = %to.display(), error = %e, "could not restore file times");
    }

    Ok(bytes)
}

fn restore_times(from: &Path, to: &Path) -> io::Result<()> {
    let meta = std::fs::metadata(from)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    File::options().write(true).open(to)?.set_times(times)
}
