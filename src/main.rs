//! Binary entry point for the packing solver

use clap::Parser;
use tetrapack::io::cli::{self, Cli};

fn main() -> tetrapack::Result<()> {
    let cli = Cli::parse();
    cli::run(&cli)
}
