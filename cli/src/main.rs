use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use eigen::{export, pca};

/// Fit a PCA basis over random 3x8x8 image blocks and emit it as C constants
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory of training PNGs
    #[arg(long, default_value = "data")]
    train_dir: PathBuf,

    /// Blocks sampled from each image
    #[arg(long, default_value_t = 1024)]
    n_per_image: i64,

    /// Seed for the block position generator
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of eigen vectors to export
    #[arg(short, long, default_value_t = 8)]
    k: usize,

    /// Path of the generated C file
    #[arg(long, default_value = "nanostream_eigen.c")]
    output: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let (mean, basis) = pca::fit(&cli.train_dir, cli.n_per_image, cli.seed)?;
    export::write_eigen_source(&cli.output, &mean, &basis.vectors, cli.k)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
