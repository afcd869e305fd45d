use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use ztr_lib::cli::{InspectConfig, Preset as LibPreset, RecompressConfig};

#[derive(Parser)]
#[command(name = "ztr")]
#[command(author = "ZTR Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ZTR trace chromatogram codec", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the chunks of a ZTR file and their transform stacks
    Inspect(InspectArgs),
    /// Decode ZTR files and re-encode them with another preset
    Recompress(RecompressArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum CliPreset {
    /// io_lib transform chains
    Reference,
    /// No transforms
    Raw,
}

#[derive(Parser)]
struct InspectArgs {
    /// Input ZTR file
    #[arg(short, long, value_name = "FILE", required = true)]
    input: PathBuf,
}

#[derive(Parser)]
struct RecompressArgs {
    /// Input ZTR file(s)
    #[arg(short, long, value_name = "FILE", required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", required = true)]
    output_dir: PathBuf,

    /// Transform preset
    #[arg(short, long, value_enum, default_value = "reference")]
    preset: CliPreset,

    /// Number of threads (0 = auto-detect)
    #[arg(short = 't', long, default_value = "0")]
    threads: usize,

    /// Compression level for every zlib stage (0-9)
    #[arg(long, value_name = "LEVEL")]
    zlib_level: Option<u32>,
}

impl InspectArgs {
    fn into_config(self) -> InspectConfig {
        InspectConfig { input: self.input }
    }
}

impl RecompressArgs {
    fn into_config(self) -> RecompressConfig {
        let preset = match self.preset {
            CliPreset::Reference => LibPreset::Reference,
            CliPreset::Raw => LibPreset::Raw,
        };
        RecompressConfig {
            input: self.input,
            output_dir: self.output_dir,
            threads: self.threads,
            preset,
            zlib_level: self.zlib_level,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if std::env::var("ZTR_NO_BANNER").is_err() {
        eprintln!("ZTR v{} - trace chromatogram codec", env!("CARGO_PKG_VERSION"));
        eprintln!("Format: ZTR 1.2 (delta/run-length/shrink/follow/zlib chunks)");
        eprintln!();
    }

    match cli.command {
        Commands::Inspect(args) => {
            let config = args.into_config();
            let summaries = ztr_lib::compression::inspect(&config)?;
            for summary in &summaries {
                println!("{}", summary);
            }
            info!("{} chunks in {:?}", summaries.len(), config.input);
        }
        Commands::Recompress(args) => {
            info!("Starting recompression...");
            let config = args.into_config();
            ztr_lib::compression::recompress(&config)?;
            info!("Recompression complete!");
        }
    }

    Ok(())
}
