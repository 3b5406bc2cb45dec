//! Archive extraction for downloaded ltex-ls-plus releases.
//!
//! This module handles extracting zip and tar.gz archives and setting
//! executable permissions on Unix systems. Entries that would land outside the
//! destination directory are skipped. Links are recreated only when their
//! target stays inside it (bundled JREs rely on relative in-tree links).

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::types::ArchiveKind;
use crate::error::{AcquisitionError, AcquisitionResult};

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive to a destination directory.
///
/// # Arguments
///
/// * `archive_path` - Path to the archive file.
/// * `kind` - The archive format.
/// * `dest_dir` - Directory to extract into.
///
/// # Errors
///
/// `Archive` if the archive is corrupt, `Io` if writing fails.
pub fn extract_archive(
    archive_path: &Path,
    kind: ArchiveKind,
    dest_dir: &Path,
) -> AcquisitionResult<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        kind,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir).map_err(|e| AcquisitionError::io(dest_dir, e))?;

    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dest_dir),
        ArchiveKind::TarGz => extract_tar_gz(archive_path, dest_dir),
    }
}

/// Runs [`extract_archive`] on the blocking pool.
pub async fn extract(
    archive_path: &Path,
    kind: ArchiveKind,
    dest_dir: &Path,
) -> AcquisitionResult<()> {
    let archive: PathBuf = archive_path.to_path_buf();
    let dest = dest_dir.to_path_buf();

    tokio::task::spawn_blocking(move || extract_archive(&archive, kind, &dest))
        .await
        .map_err(|e| AcquisitionError::Archive {
            path: archive_path.to_path_buf(),
            reason: format!("extraction task failed: {}", e),
        })?
}

fn archive_error(archive_path: &Path, reason: impl ToString) -> AcquisitionError {
    AcquisitionError::Archive {
        path: archive_path.to_path_buf(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> AcquisitionResult<()> {
    let file = File::open(archive_path).map_err(|e| AcquisitionError::io(archive_path, e))?;

    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| archive_error(archive_path, e))?;
    let dest_dir_canonical = dest_dir
        .canonicalize()
        .unwrap_or_else(|_| dest_dir.to_path_buf());

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(archive_path, e))?;

        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe path in zip: {}", entry.name());
                continue;
            }
        };

        let dest_path = dest_dir.join(&entry_path);

        // Earlier links must not redirect this entry outside dest_dir
        if escapes(&dest_path, &dest_dir_canonical)? {
            warn!("Skipping path that escapes dest_dir: {}", entry.name());
            continue;
        }

        let is_symlink = entry
            .unix_mode()
            .map(|mode| mode & 0o170000 == 0o120000)
            .unwrap_or(false);

        if is_symlink {
            // The entry body is the link target
            let mut target = String::new();
            entry
                .read_to_string(&mut target)
                .map_err(|e| archive_error(archive_path, e))?;
            let target = PathBuf::from(target);

            if resolves_inside(parent_of(&entry_path), &target) {
                create_symlink(&target, &dest_path)?;
            } else {
                warn!(
                    "Skipping symlink that escapes dest_dir: {} -> {}",
                    entry.name(),
                    target.display()
                );
            }
        } else if entry.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| AcquisitionError::io(&dest_path, e))?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
            }

            let mut outfile =
                File::create(&dest_path).map_err(|e| AcquisitionError::io(&dest_path, e))?;

            io::copy(&mut entry, &mut outfile).map_err(|e| archive_error(archive_path, e))?;

            #[cfg(unix)]
            set_unix_permissions(&dest_path, entry.unix_mode())?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR.GZ Extraction
// ============================================================================

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> AcquisitionResult<()> {
    let file = File::open(archive_path).map_err(|e| AcquisitionError::io(archive_path, e))?;

    let reader = BufReader::new(file);
    let decoder = flate2::read::GzDecoder::new(reader);
    extract_tar(decoder, archive_path, dest_dir)
}

fn extract_tar<R: Read>(reader: R, archive_path: &Path, dest_dir: &Path) -> AcquisitionResult<()> {
    let mut archive = tar::Archive::new(reader);
    let dest_dir_canonical = dest_dir
        .canonicalize()
        .unwrap_or_else(|_| dest_dir.to_path_buf());

    let entries = archive
        .entries()
        .map_err(|e| archive_error(archive_path, e))?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| archive_error(archive_path, e))?;
        let entry_type = entry.header().entry_type();

        let path = entry
            .path()
            .map_err(|e| archive_error(archive_path, e))?
            .into_owned();

        // Security: skip absolute paths and paths with ..
        if path.is_absolute()
            || path
                .components()
                .any(|c| c == std::path::Component::ParentDir)
        {
            warn!("Skipping unsafe path in tar: {:?}", path);
            continue;
        }

        let dest_path = dest_dir.join(&path);

        // Security: Verify destination is within dest_dir
        if escapes(&dest_path, &dest_dir_canonical)? {
            warn!("Skipping path that escapes dest_dir: {:?}", path);
            continue;
        }

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            let target = entry
                .link_name()
                .map_err(|e| archive_error(archive_path, e))?
                .map(|target| target.into_owned());

            match target {
                // Symlink targets are relative to the link, hardlink targets to the archive root
                Some(target)
                    if entry_type.is_symlink() && resolves_inside(parent_of(&path), &target) =>
                {
                    create_symlink(&target, &dest_path)?;
                }
                Some(target)
                    if entry_type.is_hard_link()
                        && resolves_inside(Path::new(""), &target)
                        && !escapes(&dest_dir.join(&target), &dest_dir_canonical)? =>
                {
                    create_hard_link(&dest_dir.join(&target), &dest_path)?;
                }
                target => {
                    warn!(
                        "Skipping link that escapes dest_dir: {:?} -> {:?}",
                        path, target
                    );
                }
            }
        } else if entry_type.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| AcquisitionError::io(&dest_path, e))?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
            }

            let mut outfile =
                File::create(&dest_path).map_err(|e| AcquisitionError::io(&dest_path, e))?;
            io::copy(&mut entry, &mut outfile).map_err(|e| archive_error(archive_path, e))?;
            outfile
                .flush()
                .map_err(|e| AcquisitionError::io(&dest_path, e))?;

            #[cfg(unix)]
            {
                if let Ok(mode) = entry.header().mode() {
                    set_unix_permissions(&dest_path, Some(mode))?;
                }
            }
        }
    }

    debug!("TAR extraction complete");
    Ok(())
}

// ============================================================================
// Links
// ============================================================================

/// Checks that `target`, taken relative to the archive directory `base_dir`,
/// does not climb above the extraction root.
fn resolves_inside(base_dir: &Path, target: &Path) -> bool {
    let mut depth = base_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}

/// Whether `dest_path`, with links on disk resolved, lies outside `root`.
///
/// The nearest existing ancestor decides; the remaining components are plain
/// names, so nothing below it can climb out again.
fn escapes(dest_path: &Path, root: &Path) -> AcquisitionResult<bool> {
    let mut existing = dest_path;
    while !existing.exists() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => return Ok(true),
        }
    }
    let canonical = existing
        .canonicalize()
        .map_err(|e| AcquisitionError::io(existing, e))?;
    Ok(!canonical.starts_with(root))
}

/// Replaces whatever is at `dest_path` with a symlink to `target`.
#[cfg(unix)]
fn create_symlink(target: &Path, dest_path: &Path) -> AcquisitionResult<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
    }
    if fs::symlink_metadata(dest_path).is_ok() {
        fs::remove_file(dest_path).map_err(|e| AcquisitionError::io(dest_path, e))?;
    }
    std::os::unix::fs::symlink(target, dest_path).map_err(|e| AcquisitionError::io(dest_path, e))?;
    debug!("Linked {} -> {}", dest_path.display(), target.display());
    Ok(())
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, dest_path: &Path) -> AcquisitionResult<()> {
    warn!(
        "Skipping symlink {} -> {}, not supported on this platform",
        dest_path.display(),
        target.display()
    );
    Ok(())
}

/// Hard-links `source` to `dest_path`, copying when linking is not possible.
fn create_hard_link(source: &Path, dest_path: &Path) -> AcquisitionResult<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| AcquisitionError::io(parent, e))?;
    }
    if fs::symlink_metadata(dest_path).is_ok() {
        fs::remove_file(dest_path).map_err(|e| AcquisitionError::io(dest_path, e))?;
    }
    if let Err(e) = fs::hard_link(source, dest_path) {
        debug!("Hard link failed ({}), copying {}", e, source.display());
        fs::copy(source, dest_path).map_err(|e| AcquisitionError::io(dest_path, e))?;
    }
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn set_unix_permissions(path: &Path, mode: Option<u32>) -> AcquisitionResult<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        if mode & 0o111 != 0 {
            let permissions = fs::Permissions::from_mode((mode & 0o7777) | 0o755);
            fs::set_permissions(path, permissions).map_err(|e| AcquisitionError::io(path, e))?;
        }
    }

    Ok(())
}
