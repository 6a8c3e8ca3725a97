// Copyright (c) 2025 FlatSQL Team
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Backup files
//!
//! Every destructive rewrite of a source file is preceded by a timestamped
//! copy named `<original-name>.<YYYYMMDD_HHMMSS>.bak`, co-located with the
//! original. Backups are never pruned by the catalog; the newest one can be
//! restored over its original ("undo last write").

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

use crate::error::{CatalogError, CatalogResult};

static BAK_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d{8}_\d{6}\.bak$").expect("static pattern"));

/// Copy `path` to a timestamped sibling `.bak` file and return the copy's path.
pub fn create_backup(path: &Path) -> CatalogResult<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let bak = path.with_file_name(format!("{name}.{stamp}.bak"));
    fs::copy(path, &bak)?;
    info!(original = %path.display(), backup = %bak.display(), "backup written");
    Ok(bak)
}

/// The original path a backup file was taken from, if the name matches the
/// backup naming scheme.
pub fn original_of(bak: &Path) -> Option<PathBuf> {
    let name = bak.file_name()?.to_str()?;
    let m = BAK_SUFFIX.find(name)?;
    Some(bak.with_file_name(&name[..m.start()]))
}

/// Find the most recently modified `.bak` file under `root` (recursive) and
/// rename it back over its original. Returns the restored original path.
pub fn restore_latest(root: &Path) -> CatalogResult<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    collect_latest_bak(root, &mut latest)?;
    let Some((_, bak)) = latest else {
        return Err(CatalogError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no .bak files under {}", root.display()),
        )));
    };
    let Some(original) = original_of(&bak) else {
        return Err(CatalogError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unrecognized backup name: {}", bak.display()),
        )));
    };
    fs::rename(&bak, &original)?;
    info!(restored = %original.display(), "backup restored");
    Ok(original)
}

fn collect_latest_bak(
    dir: &Path,
    latest: &mut Option<(SystemTime, PathBuf)>,
) -> CatalogResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_latest_bak(&path, latest)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("bak") {
            let modified = entry.metadata()?.modified()?;
            if latest.as_ref().is_none_or(|(t, _)| modified > *t) {
                *latest = Some((modified, path));
            }
        }
    }
    Ok(())
}

/// Replace `dest` with `tmp` in one rename, so a crash mid-write never leaves
/// `dest` partially written. A permission failure maps to [`CatalogError::FileLocked`].
pub fn atomic_replace(tmp: &Path, dest: &Path) -> CatalogResult<()> {
    fs::rename(tmp, dest).map_err(|err| {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            CatalogError::FileLocked(dest.to_path_buf())
        } else {
            CatalogError::Io(err)
        }
    })
}
