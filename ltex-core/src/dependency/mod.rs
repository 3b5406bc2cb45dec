//! Acquisition of the ltex-ls-plus language server.
//!
//! ltex-ls-plus ships as a per-platform archive with a bundled Java runtime.
//! This module finds an existing copy or downloads, verifies, unpacks and
//! installs one, then runs it once to make sure it actually starts.
//!
//! # Architecture
//!
//! - `types`: Core types (Platform, Architecture, ReleaseDescriptor, ResolvedDependency)
//! - `catalog`: Static release table with expected digests
//! - `paths`: Installation-root layout and path resolution
//! - `downloader`: Async download with manual redirects and cancellation
//! - `verify`: SHA-256 verification
//! - `extractor`: Archive extraction (zip, tar.gz)
//! - `installer`: Moves the extracted directory into place
//! - `validator`: `--version` check and output parsing
//! - `launch`: Command and environment for starting ltex-ls
//! - `manager`: High-level acquisition loop
//!
//! # Example
//!
//! ```ignore
//! use ltex_core::dependency::{AcquisitionController, AcquisitionOptions, Session};
//!
//! let controller = AcquisitionController::new(AcquisitionOptions::default(), settings)?;
//! let mut session = Session::new();
//! let dependency = controller.acquire(&mut session).await?;
//! let launch = controller.launch_descriptor(&dependency)?;
//! ```

pub mod catalog;
pub mod downloader;
pub mod extractor;
pub mod installer;
pub mod launch;
pub mod manager;
pub mod paths;
pub mod types;
pub mod validator;
pub mod verify;

// Re-export commonly used types
pub use catalog::{get_all_releases, get_release, release_for_current_platform};
pub use downloader::{CancelToken, DownloadPolicy, Downloader};
pub use installer::ExtraDirectoryPolicy;
pub use launch::LaunchDescriptor;
pub use manager::{
    default_root, AcquisitionController, AcquisitionOptions, AcquisitionState, FailureChoice,
    FailurePrompt, NoPrompt, Session, OFFLINE_INSTRUCTIONS_URL,
};
pub use types::{Architecture, ArchiveKind, Platform, ReleaseDescriptor, ResolvedDependency};
pub use validator::{FailureReason, ValidationFailure, VersionReport};
