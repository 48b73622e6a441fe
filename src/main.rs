//! repack command-line front end.
//!
//! Usage: repack <CONFIG> [OPTIONS]

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use repack::{RepackConfig, Repacker, Result};

#[derive(Parser)]
#[command(name = "repack")]
#[command(version)]
#[command(
    about = "Repack ExoMol/HITRAN line-transition catalogs into dominant-line LBL data plus a weak-line continuum table",
    long_about = None
)]
struct Cli {
    /// Configuration file with a [REPACK] section
    config: PathBuf,

    /// Number of threads for the continuum accumulation (default: number of CPUs)
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Only log warnings and errors
    #[arg(long, short = 'q')]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("Failed to initialize thread pool");
    }

    if let Err(e) = run(&cli.config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config_path: &Path) -> Result<()> {
    let config = RepackConfig::from_file(config_path)?;
    let repacker = Repacker::new(config)?;
    repacker.run()?;
    Ok(())
}
