//! CLI arguments for the fennec machine.
use clap::Parser;
use std::path::PathBuf;

/// RV64 system emulator
#[derive(Parser)]
#[clap(name = "fennec", version, about, long_about = None)]
pub struct Cli {
    /// Raw kernel image, loaded verbatim at the base of RAM
    pub kernel: PathBuf,

    /// Raw disk image backing the block device
    pub disk: Option<PathBuf>,
}
