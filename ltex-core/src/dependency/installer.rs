//! Moves an extracted release from its scratch directory into `lib`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{AcquisitionError, AcquisitionResult};

/// What to do when an archive unpacks into several top-level directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtraDirectoryPolicy {
    /// Treat the archive as malformed.
    #[default]
    Reject,
    /// Install the first directory by name and ignore the rest.
    KeepFirst,
}

/// Installs the payload directory found in `scratch_dir` into `lib_dir`.
///
/// Stray files next to the payload (including the downloaded archive) are
/// deleted. If `lib_dir` already holds a directory with the same name it is
/// kept as-is. The scratch directory is removed afterwards.
///
/// # Returns
///
/// The installed directory `lib_dir/<basename>`.
///
/// # Errors
///
/// `Layout` if the scratch directory holds no directory, or several under
/// [`ExtraDirectoryPolicy::Reject`]; `Io` if listing or renaming fails.
pub fn install(
    scratch_dir: &Path,
    lib_dir: &Path,
    policy: ExtraDirectoryPolicy,
) -> AcquisitionResult<PathBuf> {
    // `file_type` does not follow symlinks, so a linked directory counts as stray
    let mut children: Vec<(PathBuf, bool)> = fs::read_dir(scratch_dir)
        .map_err(|e| AcquisitionError::io(scratch_dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (entry.path(), is_dir)
        })
        .collect();
    children.sort();

    let mut directories = Vec::new();
    for (child, is_dir) in children {
        if is_dir {
            directories.push(child);
        } else {
            match fs::remove_file(&child) {
                Ok(()) => debug!("Deleted stray file {}", child.display()),
                Err(e) => warn!("Could not delete {}: {}", child.display(), e),
            }
        }
    }

    let source = match directories.as_slice() {
        [] => {
            return Err(AcquisitionError::Layout(format!(
                "could not find a directory in {}",
                scratch_dir.display()
            )))
        }
        [only] => only.clone(),
        [first, rest @ ..] => match policy {
            ExtraDirectoryPolicy::Reject => {
                let names: Vec<String> = directories
                    .iter()
                    .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .collect();
                return Err(AcquisitionError::Layout(format!(
                    "expected one directory in {}, found {}",
                    scratch_dir.display(),
                    names.join(", ")
                )));
            }
            ExtraDirectoryPolicy::KeepFirst => {
                for extra in rest {
                    warn!("Ignoring extra directory {}", extra.display());
                }
                first.clone()
            }
        },
    };

    let name = source.file_name().ok_or_else(|| {
        AcquisitionError::Layout(format!("invalid directory name {}", source.display()))
    })?;

    fs::create_dir_all(lib_dir).map_err(|e| AcquisitionError::io(lib_dir, e))?;
    let destination = lib_dir.join(name);

    if destination.exists() {
        warn!(
            "Could not move {} to {} as the destination already exists, keeping the existing directory",
            source.display(),
            destination.display()
        );
    } else {
        info!("Moving {} to {}", source.display(), destination.display());
        fs::rename(&source, &destination).map_err(|e| AcquisitionError::io(&destination, e))?;
    }

    remove_scratch_dir(scratch_dir);
    Ok(destination)
}

/// Removes a scratch directory, logging instead of failing.
pub fn remove_scratch_dir(scratch_dir: &Path) {
    if !scratch_dir.exists() {
        return;
    }
    match fs::remove_dir_all(scratch_dir) {
        Ok(()) => debug!("Removed {}", scratch_dir.display()),
        Err(e) => warn!("Could not remove {}: {}", scratch_dir.display(), e),
    }
}
