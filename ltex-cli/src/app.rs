//! Command-line interface and command dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ltex_core::dependency::{default_root, AcquisitionOptions, ExtraDirectoryPolicy};
use ltex_core::{
    AcquisitionController, ConfigStore, JsonConfigStore, ResolvedDependency, Session, Settings,
    StatusReport,
};

use crate::ui::{progress::ProgressBarSink, prompt::TerminalPrompt};

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "ltex-setup")]
#[command(version)]
#[command(about = "Install and check the ltex-ls-plus language server", long_about = None)]
pub struct Cli {
    /// Installation root (versions are kept in <root>/lib)
    #[arg(long, env = "LTEX_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// JSON settings file (keys: ltex-ls.path, java.path, java.initialHeapSize, ...)
    #[arg(long, env = "LTEX_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Attempts before giving up
    #[arg(long, default_value_t = ltex_core::dependency::manager::DEFAULT_MAX_ATTEMPTS, global = true)]
    pub max_attempts: u32,

    /// Install the first directory when an archive contains several
    #[arg(long, global = true)]
    pub keep_first_directory: bool,

    /// Never prompt; fail on the first error
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
pub enum Command {
    /// Make sure a working ltex-ls is installed (default)
    Install,
    /// Print versions and paths of the ltex-ls in use
    Status,
    /// Print how to start ltex-ls as JSON
    Launch,
}

// =============================================================================
// Commands
// =============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;
    let controller = build_controller(&cli, settings)?;

    // Ctrl-C cancels a running download instead of killing the process
    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, canceling");
            cancel.cancel();
        }
    });

    let mut session = Session::new();
    let dependency = controller.acquire(&mut session).await.with_context(|| {
        format!(
            "Could not provide a working ltex-ls after {} attempt(s)",
            session.attempts()
        )
    })?;

    match cli.command.unwrap_or(Command::Install) {
        Command::Install => {
            println!("{}", dependency.version_summary());
        }
        Command::Status => {
            println!("{}", StatusReport::new(ltex_core::VERSION, Some(&dependency)));
        }
        Command::Launch => {
            print_launch(&controller, &dependency)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&std::path::Path>) -> Result<Settings> {
    let store: Box<dyn ConfigStore> = match path {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            Box::new(JsonConfigStore::from_file(path)?)
        }
        None => Box::new(JsonConfigStore::new()),
    };

    let settings = Settings::load(store.as_ref());
    if !settings.enabled.is_enabled() {
        warn!("LTeX is disabled for all languages in the settings");
    }
    Ok(settings)
}

fn build_controller(cli: &Cli, settings: Settings) -> Result<AcquisitionController> {
    let mut options = AcquisitionOptions::new(cli.root.clone().unwrap_or_else(default_root));
    options.max_attempts = cli.max_attempts;
    if cli.keep_first_directory {
        options.extra_directory_policy = ExtraDirectoryPolicy::KeepFirst;
    }

    let mut controller = AcquisitionController::new(options, settings)?
        .with_progress(Arc::new(ProgressBarSink::new()));
    if !cli.non_interactive {
        controller = controller.with_prompt(Arc::new(TerminalPrompt));
    }
    Ok(controller)
}

fn print_launch(controller: &AcquisitionController, dependency: &ResolvedDependency) -> Result<()> {
    let launch = controller.launch_descriptor(dependency)?;
    let output = serde_json::json!({
        "command": launch.command,
        "args": launch.args,
        "shell": launch.shell,
        "env": {
            "JAVA_HOME": launch.env.get("JAVA_HOME"),
            "JAVA_OPTS": launch.env.get("JAVA_OPTS"),
        },
        "ltexLsVersion": dependency.ltex_ls_version,
        "javaVersion": dependency.java_version,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_and_flags() {
        let cli = Cli::parse_from(["ltex-setup", "--root", "/tmp/ltex", "--non-interactive"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/ltex")));
        assert!(cli.non_interactive);
        assert_eq!(cli.max_attempts, 3);
    }

    #[test]
    fn test_subcommand_with_global_flag() {
        let cli = Cli::parse_from(["ltex-setup", "launch", "--max-attempts", "1"]);
        assert!(matches!(cli.command, Some(Command::Launch)));
        assert_eq!(cli.max_attempts, 1);
    }

    #[test]
    fn test_missing_settings_file_is_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        assert!(load_settings(Some(&temp_dir.path().join("missing.json"))).is_err());
        assert_eq!(load_settings(None).unwrap(), Settings::default());
    }
}
