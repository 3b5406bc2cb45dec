//! Release catalog with hardcoded ltex-ls-plus builds.
//!
//! This module contains the static descriptors for every published
//! (platform, architecture) archive of the pinned release, including the
//! expected SHA-256 digests.

use std::borrow::Cow;

use super::types::{Architecture, ArchiveKind, Platform, ReleaseDescriptor};

/// Base URL that release tags are appended to.
pub const RELEASE_BASE_URL: &str = "https://github.com/ltex-plus/ltex-ls-plus/releases/download";

/// Name prefix shared by archives and installed directories.
pub const PACKAGE_PREFIX: &str = "ltex-ls-plus-";

const LTEX_LS_TAG: &str = "18.4.0";
const LTEX_LS_VERSION: &str = "18.4.0";

// ============================================================================
// Naming Template
// ============================================================================

/// Builds the archive file name for a build.
///
/// `ltex-ls-plus-{version}-{platform}-{arch}.{ext}`, or
/// `ltex-ls-plus-{version}.tar.gz` for the platform-independent archive.
pub fn archive_file_name(
    version: &str,
    target: Option<(Platform, Architecture)>,
    kind: ArchiveKind,
) -> String {
    match target {
        Some((platform, arch)) => format!(
            "{}{}-{}-{}.{}",
            PACKAGE_PREFIX,
            version,
            platform.as_str(),
            arch.as_str(),
            kind.extension()
        ),
        None => format!("{}{}.{}", PACKAGE_PREFIX, version, kind.extension()),
    }
}

// ============================================================================
// Catalog Entries
// ============================================================================

const fn release(
    platform: Platform,
    architecture: Architecture,
    archive_kind: ArchiveKind,
    archive_file_name: &'static str,
    expected_digest: &'static str,
) -> ReleaseDescriptor {
    ReleaseDescriptor {
        platform: Some(platform),
        architecture: Some(architecture),
        archive_kind,
        tag: Cow::Borrowed(LTEX_LS_TAG),
        version: Cow::Borrowed(LTEX_LS_VERSION),
        archive_file_name: Cow::Borrowed(archive_file_name),
        expected_digest: Cow::Borrowed(expected_digest),
    }
}

static RELEASES: [ReleaseDescriptor; 6] = [
    release(
        Platform::Linux,
        Architecture::Aarch64,
        ArchiveKind::TarGz,
        "ltex-ls-plus-18.4.0-linux-aarch64.tar.gz",
        "a0499f8d6afd2c6570f6e37d4ee3b2a36050015a0bad88c4176217f068f54d84",
    ),
    release(
        Platform::Linux,
        Architecture::X64,
        ArchiveKind::TarGz,
        "ltex-ls-plus-18.4.0-linux-x64.tar.gz",
        "bcab2f049a7b5854c574eff81eb747182c68410d7c0af3a51e1f581c52b8cd25",
    ),
    release(
        Platform::Mac,
        Architecture::Aarch64,
        ArchiveKind::TarGz,
        "ltex-ls-plus-18.4.0-mac-aarch64.tar.gz",
        "126de7017c53c2a2058aecbe5ca308a2a42f4a521dfc44144de2aea28b1d3432",
    ),
    release(
        Platform::Mac,
        Architecture::X64,
        ArchiveKind::TarGz,
        "ltex-ls-plus-18.4.0-mac-x64.tar.gz",
        "f678e31b77b7fe5e109bcd00ceebd9ad351cde078e90f3158ab66f3388c183b1",
    ),
    release(
        Platform::Windows,
        Architecture::Aarch64,
        ArchiveKind::Zip,
        "ltex-ls-plus-18.4.0-windows-aarch64.zip",
        "a5ac34d2d4bde14574096082200a9fb93d46d25d25fde394416e3b9b0996b1e9",
    ),
    release(
        Platform::Windows,
        Architecture::X64,
        ArchiveKind::Zip,
        "ltex-ls-plus-18.4.0-windows-x64.zip",
        "6e4228dfa06d4855ae53cf41ab32f64cae6dcbd307e0b08b6892d10b117efba5",
    ),
];

/// Archive without a bundled Java runtime; needs `java.path`.
static PLATFORM_INDEPENDENT: ReleaseDescriptor = ReleaseDescriptor {
    platform: None,
    architecture: None,
    archive_kind: ArchiveKind::TarGz,
    tag: Cow::Borrowed(LTEX_LS_TAG),
    version: Cow::Borrowed(LTEX_LS_VERSION),
    archive_file_name: Cow::Borrowed("ltex-ls-plus-18.4.0.tar.gz"),
    expected_digest: Cow::Borrowed(
        "06454f2edc85eb691e0c3127113f3317b83416a0f3e94903588e8133c5b6a8c4",
    ),
};

// ============================================================================
// Lookup
// ============================================================================

/// Returns all platform-specific descriptors.
pub fn get_all_releases() -> &'static [ReleaseDescriptor] {
    &RELEASES
}

/// Looks up the descriptor for a (platform, architecture) pair.
pub fn get_release(
    platform: Platform,
    architecture: Architecture,
) -> Option<&'static ReleaseDescriptor> {
    RELEASES
        .iter()
        .find(|r| r.platform == Some(platform) && r.architecture == Some(architecture))
}

/// Returns the platform-independent descriptor.
pub fn platform_independent_release() -> &'static ReleaseDescriptor {
    &PLATFORM_INDEPENDENT
}

/// Returns the descriptor for the running build.
///
/// Falls back to the platform-independent archive when the running OS or CPU
/// has no dedicated build.
pub fn release_for_current_platform() -> &'static ReleaseDescriptor {
    match (Platform::detect(), Architecture::detect()) {
        (Some(platform), Some(arch)) => {
            get_release(platform, arch).unwrap_or(&PLATFORM_INDEPENDENT)
        }
        _ => &PLATFORM_INDEPENDENT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_release_per_pair() {
        for platform in Platform::all() {
            for arch in Architecture::all() {
                let count = get_all_releases()
                    .iter()
                    .filter(|r| r.platform == Some(*platform) && r.architecture == Some(*arch))
                    .count();
                assert_eq!(count, 1, "{} {} should have one release", platform, arch);
            }
        }
    }

    #[test]
    fn test_file_names_match_template() {
        for platform in Platform::all() {
            for arch in Architecture::all() {
                let release = get_release(*platform, *arch).unwrap();
                let expected = archive_file_name(
                    &release.version,
                    Some((*platform, *arch)),
                    release.archive_kind,
                );
                assert_eq!(release.archive_file_name, expected);
                assert_eq!(release.archive_kind, platform.archive_kind());

                let url = release.download_url(RELEASE_BASE_URL);
                assert!(url.ends_with(&format!("/{}/{}", release.tag, expected)));
            }
        }
    }

    #[test]
    fn test_platform_independent_name() {
        let release = platform_independent_release();
        assert_eq!(
            release.archive_file_name,
            archive_file_name(&release.version, None, ArchiveKind::TarGz)
        );
        assert!(release.platform.is_none());
    }

    #[test]
    fn test_digests_are_lowercase_sha256_hex() {
        for release in get_all_releases()
            .iter()
            .chain(std::iter::once(platform_independent_release()))
        {
            assert_eq!(release.expected_digest.len(), 64);
            assert!(release
                .expected_digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_release_for_current_platform_resolves() {
        let release = release_for_current_platform();
        assert!(release.archive_file_name.starts_with(PACKAGE_PREFIX));
    }
}
