//! Installation-root layout and ltex-ls path resolution.
//!
//! Everything lives below a host-owned root directory:
//!
//! - `{root}/lib/ltex-ls-plus-{version}/`: installed versions
//! - `{root}/tmp-{uuid}/`: scratch directories for downloads in flight
//!
//! Scratch directories are siblings of `lib` so an installed version can be
//! moved into place with a single rename on the same filesystem.

use std::path::{Path, PathBuf};

use semver::Version;
use tracing::debug;

use super::catalog::PACKAGE_PREFIX;
use crate::error::{AcquisitionError, AcquisitionResult};

/// Name of the directory that holds installed versions.
const LIB_DIR_NAME: &str = "lib";

/// Prefix of scratch directories.
const SCRATCH_PREFIX: &str = "tmp-";

// ============================================================================
// Layout
// ============================================================================

/// Returns `{root}/lib`.
pub fn lib_dir(root: &Path) -> PathBuf {
    root.join(LIB_DIR_NAME)
}

/// Creates `{root}/lib` if needed and returns it.
pub fn ensure_lib_dir(root: &Path) -> AcquisitionResult<PathBuf> {
    let dir = lib_dir(root);
    std::fs::create_dir_all(&dir).map_err(|e| AcquisitionError::io(&dir, e))?;
    Ok(dir)
}

/// Creates a fresh, uniquely named scratch directory `{root}/tmp-{uuid}`.
pub fn create_scratch_dir(root: &Path) -> AcquisitionResult<PathBuf> {
    std::fs::create_dir_all(root).map_err(|e| AcquisitionError::io(root, e))?;
    let dir = root.join(format!("{}{}", SCRATCH_PREFIX, uuid::Uuid::new_v4()));
    std::fs::create_dir(&dir).map_err(|e| AcquisitionError::io(&dir, e))?;
    debug!("Created scratch directory {}", dir.display());
    Ok(dir)
}

/// Returns the launcher script inside an ltex-ls directory.
///
/// - Linux/macOS: `{dir}/bin/ltex-ls-plus`
/// - Windows: `{dir}/bin/ltex-ls-plus.bat`
pub fn executable_path(ltex_ls_dir: &Path) -> PathBuf {
    #[cfg(windows)]
    let name = "ltex-ls-plus.bat";

    #[cfg(not(windows))]
    let name = "ltex-ls-plus";

    ltex_ls_dir.join("bin").join(name)
}

// ============================================================================
// Path Resolution
// ============================================================================

/// Expands a leading `~` and drops empty values.
///
/// Only `~` on its own or followed by a path separator is expanded; `~user`
/// is left untouched.
pub fn normalize_path(path: &str) -> Option<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') {
            if let Some(home) = dirs::home_dir() {
                let rest = rest.trim_start_matches(['/', '\\']);
                return Some(if rest.is_empty() { home } else { home.join(rest) });
            }
        }
    }

    Some(PathBuf::from(path))
}

/// Parses the version out of an `ltex-ls-plus-{semver}` directory name.
pub fn parse_installed_version(name: &str) -> Option<Version> {
    name.strip_prefix(PACKAGE_PREFIX)
        .and_then(|version| Version::parse(version).ok())
}

/// Finds the installed version with the highest semver precedence.
///
/// Entries whose name does not parse are ignored. A missing or unreadable
/// directory yields `None`.
pub fn find_installed(lib_dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(lib_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", lib_dir.display(), e);
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name();
            let version = parse_installed_version(name.to_str()?)?;
            Some((version, entry.path()))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path)
}

/// Where a resolved ltex-ls directory came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// `ltex-ls.path` from the settings; may not exist.
    Configured(PathBuf),
    /// Newest version found under `{root}/lib`.
    Installed(PathBuf),
}

impl ResolvedPath {
    pub fn path(&self) -> &Path {
        match self {
            Self::Configured(path) | Self::Installed(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Configured(path) | Self::Installed(path) => path,
        }
    }
}

/// Picks the ltex-ls directory to use.
///
/// A non-empty configured path always wins (existence is checked by the
/// caller); otherwise the newest installed version under `lib_dir`.
pub fn resolve(configured: Option<&str>, lib_dir: &Path) -> Option<ResolvedPath> {
    if let Some(path) = configured.and_then(normalize_path) {
        return Some(ResolvedPath::Configured(path));
    }
    find_installed(lib_dir).map(ResolvedPath::Installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    #[test]
    fn test_highest_semver_wins() {
        let temp_dir = TempDir::new().unwrap();
        mkdirs(
            temp_dir.path(),
            &["ltex-ls-plus-1.0.0", "ltex-ls-plus-2.3.1", "not-a-version"],
        );

        let found = find_installed(temp_dir.path()).unwrap();
        assert!(found.ends_with("ltex-ls-plus-2.3.1"));
    }

    #[test]
    fn test_semver_not_lexicographic() {
        let temp_dir = TempDir::new().unwrap();
        mkdirs(
            temp_dir.path(),
            &[
                "ltex-ls-plus-9.0.0",
                "ltex-ls-plus-10.0.0",
                "ltex-ls-plus-10.0.0-beta.1",
            ],
        );

        let found = find_installed(temp_dir.path()).unwrap();
        assert!(found.ends_with("ltex-ls-plus-10.0.0"));
    }

    #[test]
    fn test_unparseable_entries_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        mkdirs(temp_dir.path(), &["ltex-ls-plus-latest", "ltex-ls-1.0.0"]);
        std::fs::write(temp_dir.path().join("ltex-ls-plus-3.0.0"), b"file").unwrap();

        assert!(find_installed(temp_dir.path()).is_none());
        // Nothing is pruned.
        assert!(temp_dir.path().join("ltex-ls-plus-latest").exists());
    }

    #[test]
    fn test_missing_root_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_installed(&temp_dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_configured_path_wins() {
        let temp_dir = TempDir::new().unwrap();
        mkdirs(temp_dir.path(), &["ltex-ls-plus-2.3.1"]);

        let resolved = resolve(Some("/opt/ltex-ls"), temp_dir.path()).unwrap();
        assert_eq!(resolved, ResolvedPath::Configured(PathBuf::from("/opt/ltex-ls")));

        let resolved = resolve(Some("   "), temp_dir.path()).unwrap();
        assert!(matches!(resolved, ResolvedPath::Installed(_)));
        assert!(resolved.path().ends_with("ltex-ls-plus-2.3.1"));
    }

    #[test]
    fn test_nothing_to_resolve() {
        let temp_dir = TempDir::new().unwrap();
        mkdirs(temp_dir.path(), &["not-a-version"]);
        assert!(resolve(None, temp_dir.path()).is_none());
    }

    #[test]
    fn test_normalize_home() {
        let home = match dirs::home_dir() {
            Some(home) => home,
            None => return,
        };

        assert_eq!(normalize_path("~"), Some(home.clone()));
        assert_eq!(normalize_path("~/ltex"), Some(home.join("ltex")));
        assert_eq!(normalize_path("~\\ltex"), Some(home.join("ltex")));
        assert_eq!(normalize_path("~other/ltex"), Some(PathBuf::from("~other/ltex")));
        assert_eq!(normalize_path(""), None);
    }

    #[test]
    fn test_scratch_dirs_are_unique_siblings_of_lib() {
        let temp_dir = TempDir::new().unwrap();
        let lib = ensure_lib_dir(temp_dir.path()).unwrap();
        let a = create_scratch_dir(temp_dir.path()).unwrap();
        let b = create_scratch_dir(temp_dir.path()).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent(), lib.parent());
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
    }

    #[test]
    fn test_executable_path() {
        let exe = executable_path(Path::new("/opt/ltex-ls-plus-18.4.0"));
        assert!(exe.starts_with("/opt/ltex-ls-plus-18.4.0/bin"));

        #[cfg(windows)]
        assert!(exe.to_string_lossy().ends_with("ltex-ls-plus.bat"));

        #[cfg(not(windows))]
        assert!(exe.ends_with("bin/ltex-ls-plus"));
    }
}
