mod cli;

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use rulehunter_core::config::load_dotenv;
use rulehunter_core::{Config, QuitSignal};
use rulehunter_experiment::{State, Supervisor};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    if args.action() == Command::Version {
        println!("rulehunter {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    config.log_summary();

    let quit = QuitSignal::new();
    {
        let quit = quit.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received, stopping after the current stage");
            quit.raise();
        });
    }

    let supervisor = Supervisor::new(config, quit).context("failed to start supervisor")?;

    if let Some(file) = &args.file {
        supervisor
            .run_file(file)
            .await
            .with_context(|| format!("failed to process {}", file.display()))?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(status) = supervisor.monitor().status(&name) {
            if status.state == State::Error {
                bail!("experiment {} failed: {}", name, status.msg);
            }
        }
        return Ok(());
    }

    match args.action() {
        Command::Run => supervisor.run_once().await?,
        Command::Serve => supervisor.serve().await?,
        Command::Version => {}
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = sigterm.recv() => {},
            }
            return;
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "couldn't listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
