//! LTeX core library
//!
//! This crate locates, downloads, verifies and validates the ltex-ls-plus
//! language server used by LTeX+. It includes:
//!
//! - A release catalog with expected SHA-256 digests per platform
//! - Path resolution for configured and installed copies
//! - Download with redirect handling, progress reporting and cancellation
//! - Zip and tar.gz extraction and atomic installation
//! - A `--version` run that checks the installed server actually runs
//! - Settings loading and launch descriptors for the host

pub mod config;
pub mod dependency;
pub mod error;
pub mod progress;
pub mod status;

// Re-exports for convenience
pub use config::{ConfigStore, Enabled, JsonConfigStore, Settings};
pub use error::{AcquisitionError, AcquisitionResult};
pub use progress::{NoopProgress, ProgressSink, ProgressStack, ProgressTask};
pub use status::StatusReport;

// Re-export the acquisition API
pub use dependency::{
    AcquisitionController, AcquisitionOptions, AcquisitionState, CancelToken, FailureChoice,
    FailurePrompt, LaunchDescriptor, ResolvedDependency, Session, OFFLINE_INSTRUCTIONS_URL,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
