//! agent-desktop install hook: fetches the native executable after
//! `npm install`.

use std::process::ExitCode;

use clap::Parser;
use shim_cli::PostinstallCli;
use shim_core::{Installer, Reporter, StderrReporter};

#[tokio::main]
async fn main() -> ExitCode {
    shim_cli::init_tracing();

    let cli = PostinstallCli::parse();
    let reporter = StderrReporter;

    let config = match cli.install_config(|k| std::env::var(k).ok()) {
        Ok(config) => config,
        Err(e) => {
            reporter.error(&format!("{e:#}"));
            return if cli.strict {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing::debug!(?config, "starting install");
    let outcome = Installer::new(config, reporter).run().await;
    tracing::debug!(?outcome, "install finished");

    ExitCode::from(outcome.exit_code(cli.strict).clamp(0, 255) as u8)
}
