//! Real-directory scanning and directory creation.

use std::fs;
use std::io;
use std::path::Path;

use crate::tree::{AssetFile, AssetKind, AssetTree, DirId, Insert, Priority};

/// File whose presence marks a real directory as an engine asset folder.
pub const SENTINEL: &str = "surge.rocks";

/// Whether `dir` contains the asset-folder sentinel.
pub fn is_asset_folder(dir: &Path) -> bool {
    let found = dir.join(SENTINEL).is_file();
    if !found {
        log::debug!("{} is not an asset folder", dir.display());
    }
    found
}

/// Counters reported by a scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub added: usize,
    pub overridden: usize,
    pub kept: usize,
}

/// Recursively attaches the contents of `real_dir` below `dir` in the tree.
///
/// Symlinked directories are not followed. Unreadable directories are logged
/// and skipped.
pub fn scan_folder(
    tree: &mut AssetTree,
    dir: DirId,
    real_dir: &Path,
    kind: AssetKind,
    priority: Priority,
) -> ScanStats {
    let mut stats = ScanStats::default();
    scan_into(tree, dir, real_dir, kind, priority, &mut stats);
    log::debug!(
        "Scanned {} ({:?}, {:?}): {} added, {} overridden, {} kept",
        real_dir.display(),
        kind,
        priority,
        stats.added,
        stats.overridden,
        stats.kept
    );
    stats
}

fn scan_into(
    tree: &mut AssetTree,
    dir: DirId,
    real_dir: &Path,
    kind: AssetKind,
    priority: Priority,
    stats: &mut ScanStats,
) {
    let entries = match fs::read_dir(real_dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Can't scan {}: {err}", real_dir.display());
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Can't read an entry of {}: {err}", real_dir.display());
                continue;
            }
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                log::warn!("Skipping non UTF-8 name {:?} in {}", raw, real_dir.display());
                continue;
            }
        };

        // file_type() does not follow symlinks
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            let subdir = tree.make_dir(dir, &name);
            scan_into(tree, subdir, &path, kind, priority, stats);
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            match tree.insert_scanned(dir, AssetFile::new(name, path, kind, priority)) {
                Insert::Added => stats.added += 1,
                Insert::Overridden => stats.overridden += 1,
                Insert::Kept => stats.kept += 1,
            }
        }
    }
}

/// Creates `path` and every missing ancestor.
///
/// Directories that already exist are tolerated; other failures are logged and
/// returned.
pub fn mkpath(path: &Path) -> io::Result<()> {
    let mut missing: Vec<&Path> = path
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.is_dir())
        .collect();
    missing.reverse();

    for dir in missing {
        match fs::create_dir(dir) {
            Ok(()) => log::trace!("mkpath: created {}", dir.display()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => {
                log::error!("mkpath: can't create {}: {err}", dir.display());
                return Err(err);
            }
        }
    }
    Ok(())
}
