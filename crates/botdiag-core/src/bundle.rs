//! Archive packaging of the staging root.
//!
//! Writes a .tar.gz holding every file under the staging root beneath one
//! top-level directory named after the archive. Entries are sorted by path
//! and written with deterministic headers (mtime 0, fixed mode, uid/gid 0),
//! so the same staging tree always yields the same bytes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::{Compression, GzBuilder};
use tar::{Builder, EntryType, Header};
use tracing::debug;

use crate::error::{CollectError, CollectResult};
use crate::fs::sorted_entries;

/// File extension of produced archives.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// `<prefix>-<UTC timestamp>`, used for both the file name and the
/// top-level directory inside the archive.
pub fn archive_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, at.format("%Y%m%dT%H%M%SZ"))
}

struct StagedEntry {
    archive_path: String,
    source: PathBuf,
    is_dir: bool,
}

/// Write `staging_root` to `w` as .tar.gz under `top_level/`.
/// Returns the number of files written.
pub fn write_archive<W: Write>(w: W, staging_root: &Path, top_level: &str) -> CollectResult<usize> {
    let entries = collect_entries(staging_root)?;

    let gz = GzBuilder::new().mtime(0).write(w, Compression::default());
    let mut tar = Builder::new(gz);
    tar.mode(tar::HeaderMode::Deterministic);

    append_dir(&mut tar, top_level)?;

    let mut files = 0;
    for entry in &entries {
        let path = format!("{}/{}", top_level, entry.archive_path);
        if entry.is_dir {
            append_dir(&mut tar, &path)?;
        } else {
            append_file(&mut tar, &path, &entry.source)?;
            files += 1;
        }
    }

    let gz = tar.into_inner().map_err(archive_err("finalize tar"))?;
    gz.finish().map_err(archive_err("finish gzip"))?;
    debug!(files, root = %staging_root.display(), "archive written");
    Ok(files)
}

/// Package `staging_root` into `<output_dir>/<name>.tar.gz`, creating
/// `output_dir` if needed. Returns the archive path.
pub fn archive_staging_root(
    staging_root: &Path,
    output_dir: &Path,
    name: &str,
) -> CollectResult<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| CollectError::io(output_dir, e))?;
    let archive_path = output_dir.join(format!("{name}.{ARCHIVE_EXTENSION}"));

    let file = File::create(&archive_path).map_err(|e| CollectError::io(&archive_path, e))?;
    let mut writer = BufWriter::new(file);
    write_archive(&mut writer, staging_root, name)?;
    writer
        .flush()
        .map_err(|e| CollectError::io(&archive_path, e))?;

    Ok(archive_path)
}

/// Every directory and file under `root`, sorted by POSIX relative path.
fn collect_entries(root: &Path) -> CollectResult<Vec<StagedEntry>> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in sorted_entries(&dir).map_err(|e| CollectError::io(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| CollectError::io(&path, e))?;
            if file_type.is_symlink() {
                continue;
            }
            let Some(archive_path) = posix_relative(root, &path) else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(path.clone());
            }
            out.push(StagedEntry {
                archive_path,
                source: path,
                is_dir: file_type.is_dir(),
            });
        }
    }

    out.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
    Ok(out)
}

/// Relative path with forward slashes; `None` for anything that would
/// escape the root.
fn posix_relative(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn append_dir<T: Write>(tar: &mut Builder<T>, path: &str) -> CollectResult<()> {
    let mut header = deterministic_header(0o755);
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    tar.append_data(&mut header, format!("{path}/"), std::io::empty())
        .map_err(archive_err("append directory"))
}

fn append_file<T: Write>(tar: &mut Builder<T>, path: &str, source: &Path) -> CollectResult<()> {
    let file = File::open(source).map_err(|e| CollectError::io(source, e))?;
    let len = file
        .metadata()
        .map_err(|e| CollectError::io(source, e))?
        .len();
    let mut header = deterministic_header(0o644);
    header.set_entry_type(EntryType::Regular);
    header.set_size(len);
    tar.append_data(&mut header, path, file)
        .map_err(archive_err("append file"))
}

fn deterministic_header(mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header
}

fn archive_err(context: &'static str) -> impl Fn(std::io::Error) -> CollectError {
    move |e| CollectError::Archive {
        message: format!("{context}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn staging_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("database/My_Bot_")).unwrap();
        std::fs::create_dir_all(root.join("logs/xcs")).unwrap();
        std::fs::write(root.join("database/My_Bot_/bot.json"), r#"{"name":"My Bot!"}"#).unwrap();
        std::fs::write(root.join("logs/xcs/xcsd.log"), "started\n").unwrap();
        std::fs::write(root.join("collector.log"), "ok\n").unwrap();
        dir
    }

    fn read_archive(bytes: &[u8]) -> Vec<(String, String)> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut out = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let path = path.trim_end_matches('/').to_string();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            out.push((path, content));
        }
        out
    }

    #[test]
    fn archive_name_uses_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 8, 5, 9).unwrap();
        assert_eq!(archive_name("botdiag", at), "botdiag-20261017T080509Z");
    }

    #[test]
    fn writes_sorted_entries_under_top_level_directory() {
        let staging = staging_tree();
        let mut buf = Vec::new();
        let files = write_archive(&mut buf, staging.path(), "bundle").unwrap();
        assert_eq!(files, 3);

        let entries = read_archive(&buf);
        let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "bundle",
                "bundle/collector.log",
                "bundle/database",
                "bundle/database/My_Bot_",
                "bundle/database/My_Bot_/bot.json",
                "bundle/logs",
                "bundle/logs/xcs",
                "bundle/logs/xcs/xcsd.log",
            ]
        );
        let bot = entries
            .iter()
            .find(|(p, _)| p.ends_with("bot.json"))
            .unwrap();
        assert_eq!(bot.1, r#"{"name":"My Bot!"}"#);
    }

    #[test]
    fn same_tree_gives_identical_bytes() {
        let staging = staging_tree();
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_archive(&mut first, staging.path(), "bundle").unwrap();
        write_archive(&mut second, staging.path(), "bundle").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn archive_staging_root_creates_output_dir() {
        let staging = staging_tree();
        let out = tempfile::tempdir().unwrap();
        let output_dir = out.path().join("reports");

        let path = archive_staging_root(staging.path(), &output_dir, "botdiag-test").unwrap();

        assert_eq!(path, output_dir.join("botdiag-test.tar.gz"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(read_archive(&bytes)
            .iter()
            .any(|(p, _)| p == "botdiag-test/logs/xcs/xcsd.log"));
    }

    #[test]
    fn long_paths_are_supported() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a".repeat(60)).join("b".repeat(60));
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("c".repeat(40) + ".log"), "x").unwrap();

        let mut buf = Vec::new();
        write_archive(&mut buf, dir.path(), "bundle").unwrap();

        assert!(read_archive(&buf)
            .iter()
            .any(|(p, c)| p.ends_with(".log") && c == "x"));
    }
}
