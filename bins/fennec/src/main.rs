//! fennec cli
mod command;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use command::Cli;
use fennec_core::emu::Emu;
use fennec_core::primitives::constants::RAM_SIZE;
use std::fs;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logger with a nice formatted output
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt::fmt().with_env_filter(filter).with_target(false).init();
}

fn boot(cli: &Cli) -> Result<Emu> {
    let kernel = fs::read(&cli.kernel)
        .with_context(|| format!("open raw kernel image {}", cli.kernel.display()))?;
    ensure!(
        kernel.len() as u64 <= RAM_SIZE,
        "kernel image does not fit into the {} MiB of RAM",
        RAM_SIZE / (1024 * 1024),
    );

    let disk = match &cli.disk {
        Some(path) => Some(
            fs::read(path).with_context(|| format!("open disk image {}", path.display()))?,
        ),
        None => None,
    };

    info!(kernel = %cli.kernel.display(), "booting");
    Ok(Emu::new(&kernel, disk))
}

fn main() -> Result<ExitCode> {
    init_logger();

    let cli = Cli::parse();
    let mut emu = boot(&cli)?;

    // The pump only comes back when the guest has faulted beyond recovery.
    let e = emu.run();
    error!("fatal exception while running the guest: {e}");
    Ok(ExitCode::FAILURE)
}
