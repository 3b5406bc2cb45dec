//! ltex-setup
//!
//! Installs and checks the ltex-ls-plus language server from the terminal.

mod app;
mod ui;

use clap::Parser;

use crate::app::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    if cli.verbose {
        filter = filter
            .add_directive("ltex_core=debug".parse::<tracing_subscriber::filter::Directive>()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting ltex-setup v{}", ltex_core::VERSION);

    app::run(cli).await
}
