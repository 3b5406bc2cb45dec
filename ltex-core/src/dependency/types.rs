//! Core types for dependency acquisition.
//!
//! This module defines the foundational types used across the acquisition
//! pipeline: platform and architecture detection, archive kinds, release
//! descriptors, and the resolved dependency handed back to the host.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Platform Detection
// ============================================================================

/// Operating system family a release is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Mac,
    Windows,
}

impl Platform {
    /// Returns all platforms with published releases.
    pub fn all() -> &'static [Platform] {
        &[Self::Linux, Self::Mac, Self::Windows]
    }

    /// Maps a `std::env::consts::OS` value to a platform.
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::Mac),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Detects the platform of the running build.
    pub fn detect() -> Option<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Returns the token used in release archive names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
        }
    }

    /// Returns the archive kind published for this platform.
    pub fn archive_kind(&self) -> ArchiveKind {
        match self {
            Self::Windows => ArchiveKind::Zip,
            Self::Linux | Self::Mac => ArchiveKind::TarGz,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CPU architecture a release is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    Aarch64,
}

impl Architecture {
    /// Returns all architectures with published releases.
    pub fn all() -> &'static [Architecture] {
        &[Self::X64, Self::Aarch64]
    }

    /// Maps a `std::env::consts::ARCH` value to an architecture.
    pub fn from_arch(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" => Some(Self::X64),
            "aarch64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    /// Detects the architecture of the running build.
    pub fn detect() -> Option<Self> {
        Self::from_arch(std::env::consts::ARCH)
    }

    /// Returns the token used in release archive names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Archive Kinds
// ============================================================================

/// Archive format of a downloaded release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    /// Gzip-compressed tar archive (.tar.gz)
    TarGz,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveKind {
    /// Infers the archive kind from a file name.
    ///
    /// `.zip` selects the zip decoder; every other name is treated as a
    /// gzip-compressed tarball.
    pub fn from_file_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".zip") {
            Self::Zip
        } else {
            Self::TarGz
        }
    }

    /// Returns the file extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

// ============================================================================
// Release Descriptor
// ============================================================================

/// Metadata identifying one downloadable build.
///
/// Catalog entries borrow static strings; tests and mirrors can build owned
/// descriptors with [`ReleaseDescriptor::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Target OS, or `None` for the platform-independent archive.
    pub platform: Option<Platform>,
    /// Target CPU, or `None` for the platform-independent archive.
    pub architecture: Option<Architecture>,
    pub archive_kind: ArchiveKind,
    /// Release tag used in the download URL path.
    pub tag: Cow<'static, str>,
    /// Semantic version of the packaged server.
    pub version: Cow<'static, str>,
    pub archive_file_name: Cow<'static, str>,
    /// Expected SHA-256 of the archive (lowercase hex).
    pub expected_digest: Cow<'static, str>,
}

impl ReleaseDescriptor {
    /// Creates an owned descriptor, deriving the archive kind from the file name.
    pub fn new(
        platform: Option<Platform>,
        architecture: Option<Architecture>,
        tag: impl Into<String>,
        version: impl Into<String>,
        archive_file_name: impl Into<String>,
        expected_digest: impl Into<String>,
    ) -> Self {
        let archive_file_name = archive_file_name.into();
        Self {
            platform,
            architecture,
            archive_kind: ArchiveKind::from_file_name(&archive_file_name),
            tag: Cow::Owned(tag.into()),
            version: Cow::Owned(version.into()),
            archive_file_name: Cow::Owned(archive_file_name),
            expected_digest: Cow::Owned(expected_digest.into()),
        }
    }

    /// Builds the download URL below a release base URL.
    ///
    /// `{base}/{tag}/{archive_file_name}`
    pub fn download_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.tag,
            self.archive_file_name
        )
    }

    /// Human-readable name used in progress labels and logs.
    pub fn display_name(&self) -> String {
        format!("ltex-ls-plus {}", self.version)
    }
}

// ============================================================================
// Resolved Dependency
// ============================================================================

/// A validated, runnable local copy of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    /// Root directory of the server (contains `bin/`).
    pub ltex_ls_path: PathBuf,
    /// Java home to launch with, when configured.
    pub java_path: Option<PathBuf>,
    /// Version the server reported about itself.
    pub ltex_ls_version: Option<String>,
    /// Java version the server reported.
    pub java_version: Option<String>,
    /// Normalized Java major version (`1.8` becomes `8`).
    pub java_major_version: Option<u32>,
}

impl ResolvedDependency {
    /// Returns `ltex-ls <version>, Java <version>` for display.
    pub fn version_summary(&self) -> String {
        format!(
            "ltex-ls {}, Java {}",
            self.ltex_ls_version.as_deref().unwrap_or("n/a"),
            self.java_version.as_deref().unwrap_or("n/a")
        )
    }
}
