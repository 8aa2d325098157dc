//! chesscal CLI: calibrate a camera from a manifest of chessboard images.

use std::path::PathBuf;
use std::process::ExitCode;

use chesscal::{pipeline, CalibrationConfig, ChessPatternDetector, DirectoryPreview, NoPreview, PreviewSink};
use clap::Parser;
use log::{error, LevelFilter};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "chesscal")]
#[command(about = "Calibrate a camera from chessboard images and undistort a sample image")]
#[command(version)]
struct Cli {
    /// JSON config; fields left out keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the manifest listing calibration images.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Override the report output path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Override the image to undistort.
    #[arg(long)]
    sample: Option<PathBuf>,

    /// Override the rectified image output path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write corner overlays and the rectified image into this directory.
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Log verbosity (off, error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> CliResult<CalibrationConfig> {
    let mut config = match &cli.config {
        Some(path) => CalibrationConfig::from_json_file(path)?,
        None => CalibrationConfig::default(),
    };
    if let Some(p) = &cli.manifest {
        config.manifest_path = p.clone();
    }
    if let Some(p) = &cli.report {
        config.report_path = p.clone();
    }
    if let Some(p) = &cli.sample {
        config.sample_image_path = p.clone();
    }
    if let Some(p) = &cli.output {
        config.output_image_path = p.clone();
    }
    Ok(config)
}

fn run(cli: &Cli) -> CliResult<()> {
    let config = load_config(cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut preview: Box<dyn PreviewSink> = match &cli.preview_dir {
        Some(dir) => Box::new(DirectoryPreview::new(dir)?),
        None => Box::new(NoPreview),
    };
    let mut detector = ChessPatternDetector::new(config.chessboard.clone());

    let session = pipeline::calibrate(&config, &mut detector, preview.as_mut())?;
    print!("{}", session.report);
    pipeline::rectify(&config, &session, preview.as_mut())?;
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    chesscal::core::init_with_level(cli.log_level)
}

#[cfg(feature = "tracing")]
fn init_logging(_cli: &Cli) -> Result<(), log::SetLoggerError> {
    chesscal::core::init_tracing(false);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("calibration failed: {e}");
            ExitCode::FAILURE
        }
    }
}
