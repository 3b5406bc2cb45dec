//! Runs ltex-ls once with `--version` to check that it starts.
//!
//! The output of the child process is untrusted. [`parse_version_output`]
//! turns it into a [`VersionReport`] or a typed [`FailureReason`]; nothing in
//! here panics on unexpected output.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::launch::LaunchDescriptor;

/// Time the `--version` check may take before the child is killed.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Marker that must appear in the output of a real ltex-ls.
const LTEX_LS_MARKER: &str = "ltex-ls";

// ============================================================================
// Results
// ============================================================================

/// Versions reported by a working ltex-ls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReport {
    pub ltex_ls_version: String,
    pub java_version: String,
    /// `None` if the Java version does not start with a number.
    pub java_major_version: Option<u32>,
}

/// Why validation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    SpawnFailed(String),
    TimedOut(Duration),
    NonZeroExit(i32),
    /// Terminated by a signal (Unix).
    Signal(i32),
    /// Exited without any code or signal.
    UnknownExit,
    /// Output does not mention ltex-ls.
    MissingMarker,
    MalformedOutput(String),
    MissingField(&'static str),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(e) => write!(f, "could not start ltex-ls: {}", e),
            Self::TimedOut(after) => {
                write!(f, "ltex-ls did not finish within {}s", after.as_secs())
            }
            Self::NonZeroExit(code) => write!(f, "ltex-ls terminated with non-zero exit code {}", code),
            Self::Signal(signal) => write!(f, "ltex-ls terminated due to signal {}", signal),
            Self::UnknownExit => write!(f, "ltex-ls terminated without exit code"),
            Self::MissingMarker => write!(f, "ltex-ls did not print expected version information"),
            Self::MalformedOutput(e) => write!(f, "could not parse ltex-ls version output: {}", e),
            Self::MissingField(field) => write!(f, "ltex-ls version output lacks \"{}\"", field),
        }
    }
}

/// A failed validation with the raw process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub reason: FailureReason,
    pub stdout: String,
    pub stderr: String,
}

impl ValidationFailure {
    fn new(reason: FailureReason, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            reason,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ValidationFailure {}

// ============================================================================
// Parsing
// ============================================================================

fn java_version_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)(?:\.(\d+))?").ok())
        .as_ref()
}

/// Extracts the Java major version, mapping legacy `1.x` to `x`.
pub fn parse_java_major(version: &str) -> Option<u32> {
    let captures = java_version_regex()?.captures(version)?;
    let major: u32 = captures.get(1)?.as_str().parse().ok()?;
    if major == 1 {
        if let Some(minor) = captures.get(2) {
            return minor.as_str().parse().ok();
        }
    }
    Some(major)
}

/// Parses the `--version` output of ltex-ls.
///
/// Expects a JSON object with non-empty string fields `ltex-ls` and `java`.
pub fn parse_version_output(stdout: &str) -> Result<VersionReport, FailureReason> {
    if !stdout.contains(LTEX_LS_MARKER) {
        return Err(FailureReason::MissingMarker);
    }

    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| FailureReason::MalformedOutput(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| FailureReason::MalformedOutput("expected a JSON object".to_string()))?;

    let field = |name: &'static str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(FailureReason::MissingField(name))
    };

    let ltex_ls_version = field("ltex-ls")?;
    let java_version = field("java")?;
    let java_major_version = parse_java_major(&java_version);

    Ok(VersionReport {
        ltex_ls_version,
        java_version,
        java_major_version,
    })
}

// ============================================================================
// Process Check
// ============================================================================

/// Runs `<launch> --version` and checks its output.
pub async fn validate(
    launch: &LaunchDescriptor,
    limit: Duration,
) -> Result<VersionReport, ValidationFailure> {
    info!("Testing ltex-ls...");
    debug!("Running {} --version", launch.command_line());

    let mut child = launch
        .to_command(&["--version"])
        .spawn()
        .map_err(|e| ValidationFailure::new(FailureReason::SpawnFailed(e.to_string()), "", ""))?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Buffers outlive the timed future so a hung child still reports its output
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let outcome = {
        let run = async {
            tokio::join!(
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr)
            );
            child.wait().await
        };
        timeout(limit, run).await
    };

    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    let stderr = String::from_utf8_lossy(&stderr).into_owned();

    let status = match outcome {
        Ok(status) => status,
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!("Could not kill timed out ltex-ls: {}", e);
            }
            return Err(ValidationFailure::new(
                FailureReason::TimedOut(limit),
                stdout,
                stderr,
            ));
        }
    };

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return Err(ValidationFailure::new(
                FailureReason::SpawnFailed(e.to_string()),
                stdout,
                stderr,
            ))
        }
    };

    if !status.success() {
        let reason = match status.code() {
            Some(code) => FailureReason::NonZeroExit(code),
            None => exit_signal(&status)
                .map(FailureReason::Signal)
                .unwrap_or(FailureReason::UnknownExit),
        };
        return Err(ValidationFailure::new(reason, stdout, stderr));
    }

    match parse_version_output(&stdout) {
        Ok(report) => {
            info!(
                "ltex-ls {} is working (Java {})",
                report.ltex_ls_version, report.java_version
            );
            Ok(report)
        }
        Err(reason) => Err(ValidationFailure::new(reason, stdout, stderr)),
    }
}

/// Reads `pipe` to the end, keeping every chunk read before cancellation.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>, buf: &mut Vec<u8>) {
    let Some(pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let report = parse_version_output(r#"{"ltex-ls":"1.2.3","java":"1.8.0"}"#).unwrap();
        assert_eq!(report.ltex_ls_version, "1.2.3");
        assert_eq!(report.java_version, "1.8.0");
        assert_eq!(report.java_major_version, Some(8));
    }

    #[test]
    fn test_parse_java_major() {
        assert_eq!(parse_java_major("1.8.0_292"), Some(8));
        assert_eq!(parse_java_major("21.0.2"), Some(21));
        assert_eq!(parse_java_major("17"), Some(17));
        assert_eq!(parse_java_major("1"), Some(1));
        assert_eq!(parse_java_major("unknown"), None);
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            parse_version_output("Error: could not find java"),
            Err(FailureReason::MissingMarker)
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_version_output("ltex-ls 18.4.0"),
            Err(FailureReason::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_version_output(r#"["ltex-ls"]"#),
            Err(FailureReason::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_version_output(r#"{"ltex-ls":"18.4.0"}"#),
            Err(FailureReason::MissingField("java"))
        );
        assert_eq!(
            parse_version_output(r#"{"ltex-ls":"","java":"21"}"#),
            Err(FailureReason::MissingField("ltex-ls"))
        );
        assert_eq!(
            parse_version_output(r#"{"ltex-ls":18,"java":"21"}"#),
            Err(FailureReason::MissingField("ltex-ls"))
        );
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::collections::BTreeMap;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use tempfile::TempDir;

        fn script(dir: &Path, body: &str) -> LaunchDescriptor {
            let path = dir.join("ltex-ls-plus");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            LaunchDescriptor {
                command: path,
                args: Vec::new(),
                working_dir: None,
                env: BTreeMap::new(),
                shell: false,
            }
        }

        #[tokio::test]
        async fn test_validate_success() {
            let temp_dir = TempDir::new().unwrap();
            let launch = script(
                temp_dir.path(),
                r#"echo '{"ltex-ls":"1.2.3","java":"1.8.0"}'"#,
            );

            let report = validate(&launch, DEFAULT_VALIDATION_TIMEOUT).await.unwrap();
            assert_eq!(report.java_major_version, Some(8));
        }

        #[tokio::test]
        async fn test_validate_non_zero_exit_keeps_output() {
            let temp_dir = TempDir::new().unwrap();
            let launch = script(
                temp_dir.path(),
                "echo 'ltex-ls starting'\necho 'no java' >&2\nexit 3",
            );

            let failure = validate(&launch, DEFAULT_VALIDATION_TIMEOUT)
                .await
                .unwrap_err();
            assert_eq!(failure.reason, FailureReason::NonZeroExit(3));
            assert_eq!(failure.stdout.trim(), "ltex-ls starting");
            assert_eq!(failure.stderr.trim(), "no java");
        }

        #[tokio::test]
        async fn test_validate_malformed_stdout() {
            let temp_dir = TempDir::new().unwrap();
            let launch = script(temp_dir.path(), "echo 'ltex-ls version unknown'");

            let failure = validate(&launch, DEFAULT_VALIDATION_TIMEOUT)
                .await
                .unwrap_err();
            assert!(matches!(failure.reason, FailureReason::MalformedOutput(_)));
            assert_eq!(failure.stdout.trim(), "ltex-ls version unknown");
        }

        #[tokio::test]
        async fn test_validate_timeout() {
            let temp_dir = TempDir::new().unwrap();
            let launch = script(temp_dir.path(), "exec sleep 5");

            let failure = validate(&launch, Duration::from_millis(200))
                .await
                .unwrap_err();
            assert!(matches!(failure.reason, FailureReason::TimedOut(_)));
        }

        #[tokio::test]
        async fn test_validate_timeout_keeps_partial_output() {
            let temp_dir = TempDir::new().unwrap();
            let launch = script(
                temp_dir.path(),
                "echo 'ltex-ls partial'\necho 'JVM hang' >&2\nexec sleep 5",
            );

            let failure = validate(&launch, Duration::from_millis(1500))
                .await
                .unwrap_err();
            assert_eq!(
                failure.reason,
                FailureReason::TimedOut(Duration::from_millis(1500))
            );
            assert_eq!(failure.stdout.trim(), "ltex-ls partial");
            assert_eq!(failure.stderr.trim(), "JVM hang");
        }

        #[tokio::test]
        async fn test_validate_missing_executable() {
            let launch = LaunchDescriptor {
                command: PathBuf::from("/nonexistent/bin/ltex-ls-plus"),
                args: Vec::new(),
                working_dir: None,
                env: BTreeMap::new(),
                shell: false,
            };

            let failure = validate(&launch, DEFAULT_VALIDATION_TIMEOUT)
                .await
                .unwrap_err();
            assert!(matches!(failure.reason, FailureReason::SpawnFailed(_)));
        }
    }
}
