//! Zip extraction into the projects root.
//!
//! Every entry path is checked before anything is written. Entries are
//! unpacked into a staging directory inside the root and only moved into
//! place once the whole archive has been written, so a failed upload leaves
//! the root as it was.

use crate::errors::ExtractError;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Default, PartialEq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

/// Removes the staging directory whatever happens to the extraction
struct StagingDir(PathBuf);

impl StagingDir {
    fn create(root: &Path) -> Result<StagingDir, ExtractError> {
        let path = root.join(format!("{}{}", STAGING_PREFIX, nanoid::nanoid!()));
        fs::create_dir(&path).map_err(ExtractError::io(&path))?;
        Ok(StagingDir(path))
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Could not remove staging dir {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Extract every entry of `bytes` under `root`, creating it if needed.
/// Fails without touching the root's existing content when an entry escapes
/// the root or the archive expands past `max_bytes`.
pub fn extract_archive(bytes: &[u8], root: &Path, max_bytes: u64) -> Result<ExtractSummary, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let plan = plan_entries(&mut archive, max_bytes)?;

    fs::create_dir_all(root).map_err(ExtractError::io(root))?;
    let staging = StagingDir::create(root)?;

    let mut summary = ExtractSummary::default();
    for entry in &plan {
        let out_path = staging.0.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&out_path).map_err(ExtractError::io(&out_path))?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(ExtractError::io(parent))?;
        }
        let mut file = archive.by_index(entry.index)?;
        // Declared sizes can lie, so cap what is actually inflated
        let remaining = max_bytes - summary.bytes;
        let output = File::create(&out_path).map_err(ExtractError::io(&out_path))?;
        let mut writer = BufWriter::new(output);
        let written = std::io::copy(&mut (&mut file).take(remaining.saturating_add(1)), &mut writer)
            .map_err(ExtractError::io(&out_path))?;
        if written > remaining {
            return Err(ExtractError::TooLarge {
                size: summary.bytes + written,
                limit: max_bytes,
            });
        }
        writer.flush().map_err(ExtractError::io(&out_path))?;
        summary.bytes += written;
        summary.files += 1;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            // Never keep setuid/setgid/sticky bits from an upload
            let permissions = fs::Permissions::from_mode(mode & 0o777);
            if let Err(e) = fs::set_permissions(&out_path, permissions) {
                log::warn!("Could not set mode on {}: {}", out_path.display(), e);
            }
        }
    }

    promote(&staging.0, root)?;
    Ok(summary)
}

/// Resolve every entry path and check the declared total size.
fn plan_entries<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    max_bytes: u64,
) -> Result<Vec<PlannedEntry>, ExtractError> {
    let mut plan = Vec::with_capacity(archive.len());
    let mut declared: u64 = 0;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafePath(entry.name().to_string()))?;
        declared = declared.saturating_add(entry.size());
        if declared > max_bytes {
            return Err(ExtractError::TooLarge {
                size: declared,
                limit: max_bytes,
            });
        }
        plan.push(PlannedEntry {
            index,
            relative,
            is_dir: entry.is_dir(),
        });
    }

    Ok(plan)
}

/// Move the staged tree into `root`, merging directories and replacing files.
/// A target of the wrong kind (a directory where the archive has a file, or
/// the other way round) is cleared before the first rename.
fn promote(staging: &Path, root: &Path) -> Result<(), ExtractError> {
    // Collect first so renames don't race the directory walk
    let entries = WalkDir::new(staging)
        .min_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ExtractError::Io {
            path: staging.to_path_buf(),
            source: e.into(),
        })?;

    let mut moves = Vec::with_capacity(entries.len());
    for entry in &entries {
        let relative = entry
            .path()
            .strip_prefix(staging)
            .map_err(|_| ExtractError::UnsafePath(entry.path().display().to_string()))?;
        moves.push((entry, root.join(relative)));
    }

    for (entry, target) in &moves {
        clear_conflict(target, entry.file_type().is_dir())?;
    }

    for (entry, target) in &moves {
        if entry.file_type().is_dir() {
            fs::create_dir_all(target).map_err(ExtractError::io(target))?;
        } else {
            fs::rename(entry.path(), target).map_err(ExtractError::io(target))?;
        }
    }

    Ok(())
}

/// Remove whatever sits at `target` if it can't take a staged entry of this kind.
/// Symlinks are never followed.
fn clear_conflict(target: &Path, staged_dir: bool) -> Result<(), ExtractError> {
    let existing = match fs::symlink_metadata(target) {
        Ok(meta) => meta.file_type(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ExtractError::Io { path: target.to_path_buf(), source: e }),
    };

    if staged_dir && !existing.is_dir() {
        fs::remove_file(target).map_err(ExtractError::io(target))?;
    } else if !staged_dir && existing.is_dir() {
        fs::remove_dir_all(target).map_err(ExtractError::io(target))?;
    }
    Ok(())
}
