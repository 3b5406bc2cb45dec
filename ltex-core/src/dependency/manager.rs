//! Acquisition controller for the ltex-ls dependency.
//!
//! The `AcquisitionController` is the main entry point. It resolves a usable
//! ltex-ls directory (configured, already installed, or freshly downloaded),
//! validates it by running it once, and asks the host what to do when any of
//! that fails.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::catalog::{release_for_current_platform, RELEASE_BASE_URL};
use super::downloader::{
    CancelToken, DownloadPolicy, Downloader, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT,
};
use super::extractor::extract;
use super::installer::{install, remove_scratch_dir, ExtraDirectoryPolicy};
use super::launch::{host_env, LaunchDescriptor};
use super::paths::{self, ResolvedPath};
use super::types::{ReleaseDescriptor, ResolvedDependency};
use super::validator::{validate, DEFAULT_VALIDATION_TIMEOUT};
use super::verify::verify;
use crate::config::Settings;
use crate::error::{AcquisitionError, AcquisitionResult};
use crate::progress::{NoopProgress, ProgressSink, ProgressStack};

/// Where users learn how to install ltex-ls by hand.
pub const OFFLINE_INSTRUCTIONS_URL: &str = "https://ltex-plus.github.io/ltex-plus/vscode-ltex-plus/installation-usage-vscode-ltex-plus.html#offline-installation";

/// Label of the progress task covering download, verification and extraction.
pub const PROGRESS_TASK_NAME: &str = "Downloading and extracting ltex-ls-plus";

/// Attempts made before giving up, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ============================================================================
// States
// ============================================================================

/// Steps of an acquisition, recorded in [`Session::history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionState {
    ResolvingPath,
    UsingConfigured,
    UsingBundled,
    Downloading,
    Verifying,
    Extracting,
    Installing,
    Validating,
    Ready,
    Failed,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ResolvingPath => "resolving path",
            Self::UsingConfigured => "using configured ltex-ls",
            Self::UsingBundled => "using installed ltex-ls",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Installing => "installing",
            Self::Validating => "validating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Acquisition context owned by the host.
///
/// Holds the dependency once it is ready; later acquisitions on the same
/// session return it without touching disk or network.
#[derive(Debug, Default)]
pub struct Session {
    dependency: Option<ResolvedDependency>,
    history: Vec<AcquisitionState>,
    attempts: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The validated dependency, if acquisition succeeded.
    pub fn dependency(&self) -> Option<&ResolvedDependency> {
        self.dependency.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.dependency.is_some()
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[AcquisitionState] {
        &self.history
    }

    /// Number of attempts made in this session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forgets the dependency so the next acquisition starts over.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn enter(&mut self, state: AcquisitionState) {
        debug!("Acquisition state: {}", state);
        self.history.push(state);
    }
}

// ============================================================================
// Failure Prompt
// ============================================================================

/// Answer of the host after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureChoice {
    Retry,
    /// Stop; the host shows [`OFFLINE_INSTRUCTIONS_URL`].
    OfflineInstructions,
    Exit,
}

/// Asks the user how to continue after a failed attempt.
#[async_trait]
pub trait FailurePrompt: Send + Sync {
    async fn on_failure(&self, error: &AcquisitionError, attempt: u32) -> FailureChoice;
}

/// Prompt for non-interactive hosts; never retries.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

#[async_trait]
impl FailurePrompt for NoPrompt {
    async fn on_failure(&self, _error: &AcquisitionError, _attempt: u32) -> FailureChoice {
        FailureChoice::Exit
    }
}

// ============================================================================
// Options
// ============================================================================

/// Tunables of the acquisition pipeline.
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Installation root; versions go to `{root}/lib`.
    pub root: PathBuf,
    /// Release to download; `None` picks the build for the running platform.
    pub release: Option<ReleaseDescriptor>,
    pub base_url: String,
    pub user_agent: String,
    pub download_policy: DownloadPolicy,
    pub max_redirects: usize,
    pub max_attempts: u32,
    pub extra_directory_policy: ExtraDirectoryPolicy,
    pub validation_timeout: Duration,
}

impl AcquisitionOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            release: None,
            base_url: RELEASE_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            download_policy: DownloadPolicy::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            extra_directory_policy: ExtraDirectoryPolicy::default(),
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self::new(default_root())
    }
}

/// Per-user installation root, e.g. `~/.local/share/ltex-plus` on Linux.
pub fn default_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ltex-plus")
}

// ============================================================================
// Controller
// ============================================================================

pub struct AcquisitionController {
    options: AcquisitionOptions,
    settings: Settings,
    downloader: Downloader,
    prompt: Arc<dyn FailurePrompt>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl AcquisitionController {
    /// Creates a controller without prompt or progress reporting.
    pub fn new(options: AcquisitionOptions, settings: Settings) -> AcquisitionResult<Self> {
        let downloader = Downloader::with_policy(
            &options.user_agent,
            options.download_policy.clone(),
            options.max_redirects,
        )?;

        info!(
            "AcquisitionController initialized. Root: {}",
            options.root.display()
        );

        Ok(Self {
            options,
            settings,
            downloader,
            prompt: Arc::new(NoPrompt),
            progress: Arc::new(NoopProgress),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn FailurePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels a running download.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &AcquisitionOptions {
        &self.options
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Release the download branch fetches.
    pub fn release(&self) -> &ReleaseDescriptor {
        self.options
            .release
            .as_ref()
            .unwrap_or_else(|| release_for_current_platform())
    }

    /// Launch descriptor for a dependency, using this controller's settings.
    pub fn launch_descriptor(
        &self,
        dependency: &ResolvedDependency,
    ) -> AcquisitionResult<LaunchDescriptor> {
        LaunchDescriptor::for_dependency(dependency, &self.settings, host_env())
    }

    // ========================================================================
    // Acquisition
    // ========================================================================

    /// Produces a validated ltex-ls, retrying as long as the prompt asks for
    /// it and `max_attempts` allows.
    ///
    /// # Errors
    ///
    /// The error of the last attempt. Cancellation ends the loop without
    /// prompting and rearms the cancel token for the next call.
    pub async fn acquire(&self, session: &mut Session) -> AcquisitionResult<ResolvedDependency> {
        if let Some(dependency) = session.dependency() {
            debug!("Session already has ltex-ls at {}", dependency.ltex_ls_path.display());
            return Ok(dependency.clone());
        }

        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            session.attempts += 1;

            let error = match self.attempt(session).await {
                Ok(dependency) => {
                    session.enter(AcquisitionState::Ready);
                    info!("Using ltex-ls from {}", dependency.ltex_ls_path.display());
                    session.dependency = Some(dependency.clone());
                    return Ok(dependency);
                }
                Err(e) => e,
            };

            session.enter(AcquisitionState::Failed);

            if error.is_canceled() {
                info!("Acquisition canceled");
                // The cancel request is used up; the next acquisition may run.
                self.cancel.reset();
                return Err(error);
            }

            error!("Acquisition attempt {} failed: {}", attempt, error);
            if let Some((stdout, stderr)) = error.process_output() {
                error!("ltex-ls stdout output: {}", stdout);
                error!("ltex-ls stderr output: {}", stderr);
            }

            if attempt >= max_attempts {
                error!("Giving up after {} attempts", attempt);
                return Err(error);
            }

            match self.prompt.on_failure(&error, attempt).await {
                FailureChoice::Retry => {
                    info!("Retrying acquisition");
                }
                FailureChoice::OfflineInstructions => {
                    info!("Offline installation: {}", OFFLINE_INSTRUCTIONS_URL);
                    return Err(error);
                }
                FailureChoice::Exit => return Err(error),
            }
        }
    }

    async fn attempt(&self, session: &mut Session) -> AcquisitionResult<ResolvedDependency> {
        session.enter(AcquisitionState::ResolvingPath);
        let lib_dir = paths::ensure_lib_dir(&self.options.root)?;

        let ltex_ls_path = match paths::resolve(self.settings.ltex_ls_path.as_deref(), &lib_dir) {
            Some(ResolvedPath::Configured(configured)) => {
                session.enter(AcquisitionState::UsingConfigured);
                if !configured.is_dir() {
                    return Err(AcquisitionError::Config(format!(
                        "ltex-ls.path is set to {}, which does not exist",
                        configured.display()
                    )));
                }
                configured
            }
            Some(ResolvedPath::Installed(installed)) => {
                session.enter(AcquisitionState::UsingBundled);
                installed
            }
            None => {
                let installed = self.download_and_install(session, &lib_dir).await?;
                paths::resolve(None, &lib_dir)
                    .map(ResolvedPath::into_path)
                    .unwrap_or(installed)
            }
        };

        session.enter(AcquisitionState::Validating);

        let mut dependency = ResolvedDependency {
            ltex_ls_path,
            java_path: self
                .settings
                .java_path
                .as_deref()
                .and_then(paths::normalize_path),
            ltex_ls_version: None,
            java_version: None,
            java_major_version: None,
        };

        let launch = self.launch_descriptor(&dependency)?;
        let report = validate(&launch, self.options.validation_timeout).await?;

        dependency.ltex_ls_version = Some(report.ltex_ls_version);
        dependency.java_version = Some(report.java_version);
        dependency.java_major_version = report.java_major_version;
        Ok(dependency)
    }

    async fn download_and_install(
        &self,
        session: &mut Session,
        lib_dir: &Path,
    ) -> AcquisitionResult<PathBuf> {
        let release = self.release();
        info!("Downloading and installing {}", release.display_name());

        let mut progress = ProgressStack::new(PROGRESS_TASK_NAME, self.progress.clone());
        let scratch = paths::create_scratch_dir(&self.options.root)?;

        let result = self
            .download_into(session, release, &scratch, lib_dir, &mut progress)
            .await;

        if result.is_err() {
            remove_scratch_dir(&scratch);
        }
        result
    }

    async fn download_into(
        &self,
        session: &mut Session,
        release: &ReleaseDescriptor,
        scratch: &Path,
        lib_dir: &Path,
        progress: &mut ProgressStack,
    ) -> AcquisitionResult<PathBuf> {
        progress.start_task(0.1, "Preparing").finish();

        let url = release.download_url(&self.options.base_url);
        let archive = scratch.join(&*release.archive_file_name);

        session.enter(AcquisitionState::Downloading);
        {
            let mut task =
                progress.start_task(0.7, format!("Downloading {}", release.display_name()));
            self.downloader
                .download(&url, &archive, &mut task, &self.cancel)
                .await?;
            task.finish();
        }

        session.enter(AcquisitionState::Verifying);
        {
            let task =
                progress.start_task(0.1, format!("Verifying {}", release.archive_file_name));
            verify(&archive, &release.expected_digest).await?;
            task.finish();
        }

        session.enter(AcquisitionState::Extracting);
        let mut task =
            progress.start_task(0.1, format!("Extracting {}", release.archive_file_name));
        extract(&archive, release.archive_kind, scratch).await?;

        session.enter(AcquisitionState::Installing);
        task.update_task(0.5, Some(&format!("Installing {}", release.display_name())));
        let installed = install(scratch, lib_dir, self.options.extra_directory_policy)?;
        task.finish();

        info!("{} installed to {}", release.display_name(), installed.display());
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Returns a fixed choice and counts how often it was asked.
    struct ScriptedPrompt {
        choice: FailureChoice,
        calls: AtomicU32,
    }

    impl ScriptedPrompt {
        fn new(choice: FailureChoice) -> Arc<Self> {
            Arc::new(Self {
                choice,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl FailurePrompt for ScriptedPrompt {
        async fn on_failure(&self, _error: &AcquisitionError, _attempt: u32) -> FailureChoice {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.choice
        }
    }

    fn settings_with_path(path: &Path) -> Settings {
        Settings {
            ltex_ls_path: Some(path.to_string_lossy().into_owned()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_missing_configured_path_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new(FailureChoice::Exit);
        let controller = AcquisitionController::new(
            AcquisitionOptions::new(temp_dir.path()),
            settings_with_path(&temp_dir.path().join("missing")),
        )
        .unwrap()
        .with_prompt(prompt.clone());

        let mut session = Session::new();
        let err = controller.acquire(&mut session).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::Config(_)), "{err}");
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.history(),
            &[
                AcquisitionState::ResolvingPath,
                AcquisitionState::UsingConfigured,
                AcquisitionState::Failed,
            ]
        );
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new(FailureChoice::Retry);
        let mut options = AcquisitionOptions::new(temp_dir.path());
        options.max_attempts = 3;

        let controller = AcquisitionController::new(
            options,
            settings_with_path(&temp_dir.path().join("missing")),
        )
        .unwrap()
        .with_prompt(prompt.clone());

        let mut session = Session::new();
        assert!(controller.acquire(&mut session).await.is_err());

        assert_eq!(session.attempts(), 3);
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_offline_instructions_ends_acquisition() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = ScriptedPrompt::new(FailureChoice::OfflineInstructions);
        let controller = AcquisitionController::new(
            AcquisitionOptions::new(temp_dir.path()),
            settings_with_path(&temp_dir.path().join("missing")),
        )
        .unwrap()
        .with_prompt(prompt.clone());

        let mut session = Session::new();
        assert!(controller.acquire(&mut session).await.is_err());
        assert_eq!(session.attempts(), 1);
    }

    #[tokio::test]
    async fn test_ready_session_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        let controller =
            AcquisitionController::new(AcquisitionOptions::new(temp_dir.path()), Settings::default())
                .unwrap();

        let dependency = ResolvedDependency {
            ltex_ls_path: PathBuf::from("/opt/ltex-ls-plus-18.4.0"),
            java_path: None,
            ltex_ls_version: Some("18.4.0".to_string()),
            java_version: Some("21.0.2".to_string()),
            java_major_version: Some(21),
        };
        let mut session = Session {
            dependency: Some(dependency.clone()),
            ..Session::default()
        };

        assert_eq!(controller.acquire(&mut session).await.unwrap(), dependency);
        assert_eq!(session.attempts(), 0);
        assert!(session.history().is_empty());

        session.reset();
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_failed_download_removes_scratch_dir() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut options = AcquisitionOptions::new(temp_dir.path());
        options.base_url = server.uri();
        options.download_policy = DownloadPolicy::unrestricted();
        options.max_attempts = 1;

        let controller = AcquisitionController::new(options, Settings::default()).unwrap();
        let mut session = Session::new();
        let err = controller.acquire(&mut session).await.unwrap_err();

        assert!(matches!(err, AcquisitionError::HttpStatus { status: 404, .. }));
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("lib")]);
        assert_eq!(
            session.history(),
            &[
                AcquisitionState::ResolvingPath,
                AcquisitionState::Downloading,
                AcquisitionState::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_does_not_poison_later_acquisitions() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut options = AcquisitionOptions::new(temp_dir.path());
        options.base_url = server.uri();
        options.download_policy = DownloadPolicy::unrestricted();
        options.max_attempts = 1;

        let controller = AcquisitionController::new(options, Settings::default()).unwrap();
        controller.cancel_token().cancel();

        let err = controller.acquire(&mut Session::new()).await.unwrap_err();
        assert!(err.is_canceled(), "{err}");
        assert!(!controller.cancel_token().is_canceled());

        let err = controller.acquire(&mut Session::new()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::HttpStatus { status: 404, .. }), "{err}");
    }

    #[cfg(unix)]
    fn write_launcher(dir: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let exe = paths::executable_path(dir);
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installed_version_is_validated() {
        let temp_dir = TempDir::new().unwrap();
        let installed = temp_dir.path().join("lib/ltex-ls-plus-18.4.0");
        write_launcher(
            &installed,
            r#"echo '{"ltex-ls":"18.4.0","java":"21.0.2"}'"#,
        );

        let controller =
            AcquisitionController::new(AcquisitionOptions::new(temp_dir.path()), Settings::default())
                .unwrap();
        let mut session = Session::new();
        let dependency = controller.acquire(&mut session).await.unwrap();

        assert_eq!(dependency.ltex_ls_path, installed);
        assert_eq!(dependency.ltex_ls_version.as_deref(), Some("18.4.0"));
        assert_eq!(dependency.java_major_version, Some(21));
        assert_eq!(
            session.history(),
            &[
                AcquisitionState::ResolvingPath,
                AcquisitionState::UsingBundled,
                AcquisitionState::Validating,
                AcquisitionState::Ready,
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_configured_path_skips_installed_versions() {
        let temp_dir = TempDir::new().unwrap();
        write_launcher(
            &temp_dir.path().join("lib/ltex-ls-plus-18.4.0"),
            "exit 1",
        );
        let custom = temp_dir.path().join("custom-ltex");
        write_launcher(&custom, r#"echo '{"ltex-ls":"17.0.0","java":"1.8.0_392"}'"#);

        let controller = AcquisitionController::new(
            AcquisitionOptions::new(temp_dir.path()),
            settings_with_path(&custom),
        )
        .unwrap();
        let mut session = Session::new();
        let dependency = controller.acquire(&mut session).await.unwrap();

        assert_eq!(dependency.ltex_ls_path, custom);
        assert_eq!(dependency.java_major_version, Some(8));
        assert_eq!(session.history()[1], AcquisitionState::UsingConfigured);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_validation_failure_keeps_output() {
        let temp_dir = TempDir::new().unwrap();
        write_launcher(
            &temp_dir.path().join("lib/ltex-ls-plus-18.4.0"),
            "echo 'Error: JAVA_HOME is invalid' >&2\nexit 1",
        );

        let controller =
            AcquisitionController::new(AcquisitionOptions::new(temp_dir.path()), Settings::default())
                .unwrap();
        let err = controller.acquire(&mut Session::new()).await.unwrap_err();

        let (_, stderr) = err.process_output().unwrap();
        assert!(stderr.contains("JAVA_HOME is invalid"));
    }
}
