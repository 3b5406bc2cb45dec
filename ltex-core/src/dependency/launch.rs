//! Launch description for a resolved ltex-ls directory.
//!
//! The launcher script reads `JAVA_HOME` and `JAVA_OPTS`; everything else is
//! inherited from the host environment.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::warn;

use super::paths::executable_path;
use super::types::ResolvedDependency;
use crate::config::Settings;
use crate::error::{AcquisitionError, AcquisitionResult};

/// Everything needed to start ltex-ls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Complete environment of the child process.
    pub env: BTreeMap<String, String>,
    /// Run through the platform shell (needed for `.bat` launchers).
    pub shell: bool,
}

impl LaunchDescriptor {
    /// Builds the descriptor for a resolved dependency.
    ///
    /// `base_env` is usually `std::env::vars()`. Any inherited `JAVA_HOME` is
    /// dropped so the bundled runtime wins unless `java_path` is set.
    ///
    /// # Errors
    ///
    /// `Config` if the dependency has no ltex-ls path.
    pub fn for_dependency<I>(
        dependency: &ResolvedDependency,
        settings: &Settings,
        base_env: I,
    ) -> AcquisitionResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if dependency.ltex_ls_path.as_os_str().is_empty() {
            return Err(AcquisitionError::Config(
                "no ltex-ls path to launch".to_string(),
            ));
        }

        let mut env: BTreeMap<String, String> = base_env
            .into_iter()
            .filter(|(key, _)| key != "JAVA_HOME")
            .collect();

        if let Some(java_path) = &dependency.java_path {
            env.insert(
                "JAVA_HOME".to_string(),
                java_path.to_string_lossy().into_owned(),
            );
        }

        env.insert("JAVA_OPTS".to_string(), settings.java_opts());

        Ok(Self {
            command: executable_path(&dependency.ltex_ls_path),
            args: Vec::new(),
            working_dir: None,
            env,
            shell: cfg!(windows),
        })
    }

    /// Creates a command with `extra_args` appended, stdio piped.
    pub fn to_command(&self, extra_args: &[&str]) -> Command {
        let mut cmd = if self.shell {
            shell_command(self, extra_args)
        } else {
            let mut cmd = Command::new(&self.command);
            cmd.args(&self.args).args(extra_args);
            cmd
        };

        cmd.env_clear();
        cmd.envs(&self.env);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Renders the command line for display.
    pub fn command_line(&self) -> String {
        std::iter::once(quote(&self.command.to_string_lossy()))
            .chain(self.args.iter().map(|arg| quote(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The current process environment, minus entries that are not valid UTF-8.
pub fn host_env() -> impl Iterator<Item = (String, String)> {
    utf8_env(std::env::vars_os())
}

fn utf8_env<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                let key = key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                warn!("Not passing non-UTF-8 environment variable {} to ltex-ls", key);
                None
            }
        })
}

#[cfg(windows)]
fn shell_command(descriptor: &LaunchDescriptor, extra_args: &[&str]) -> Command {
    let line = std::iter::once(descriptor.command_line())
        .chain(extra_args.iter().map(|arg| quote(arg)))
        .collect::<Vec<_>>()
        .join(" ");
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").raw_arg(format!("\"{}\"", line));
    cmd
}

#[cfg(not(windows))]
fn shell_command(descriptor: &LaunchDescriptor, extra_args: &[&str]) -> Command {
    let line = std::iter::once(descriptor.command_line())
        .chain(extra_args.iter().map(|arg| quote(arg)))
        .collect::<Vec<_>>()
        .join(" ");
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

/// Double-quotes values containing whitespace.
fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}
