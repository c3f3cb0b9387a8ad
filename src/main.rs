mod aggregate;
mod cli;
mod compare;
mod config;
mod error;
mod frame;
mod metrics;
mod report;
mod source;

use crate::cli::CliArgs;
use crate::config::CompareConfig;
use crate::error::Result;
use chrono::Local;
use log::{error, info, warn, LevelFilter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let start_time = Instant::now();

    // Parse arguments first to potentially setup logging based on them
    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting vqcmp comparison...");
    info!("Arguments: {:?}", args);

    match run(&args) {
        Ok(()) => {
            let duration = start_time.elapsed();
            info!("Comparison completed successfully in {:.2?}", duration);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let duration = start_time.elapsed();
            error!("Comparison failed after {:.2?}: {}", duration, e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up logging to console and optionally to a file next to the result file.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("vqcmp", LevelFilter::Debug);

    // Progress lines own stdout; diagnostics go to stderr.
    let console_config = fern::Dispatch::new()
        .level(LevelFilter::Info)
        .chain(std::io::stderr());

    let mut logger = base_config.chain(console_config);

    let mut log_path = None;
    if args.log {
        let dir = log_dir(&args.output);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        let path = dir.join(format!("vqcmp_{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&path)?));
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

fn log_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Main application logic
fn run(args: &CliArgs) -> Result<()> {
    let config = CompareConfig::try_from(args)?;
    info!("Reference: {}", config.reference_path.display());
    info!("Test: {}", config.test_path.display());
    info!(
        "Sampling every {} frame(s), advancing source by {} and test by {}, SSIM {}",
        config.sampling.sample_interval,
        config.sampling.source_advance,
        config.sampling.test_advance,
        if config.sampling.compute_ssim { "on" } else { "off" }
    );

    let summary = match compare::compare_files(&config, None) {
        Ok(summary) => summary,
        Err(e) => {
            if config.output_path.exists() {
                warn!("Incomplete results left in {}", config.output_path.display());
            }
            return Err(e);
        }
    };

    info!(
        "{} frames sampled up to frame {}: average PSNR {:.3}, average RMSE {:.3}",
        summary.sample_count, summary.last_frame, summary.average_psnr, summary.average_rmse
    );
    if let Some(ssim) = summary.average_ssim {
        info!("Average MSSIM: R {:.2}, G {:.2}, B {:.2}", ssim.r, ssim.g, ssim.b);
    }
    println!("Results can be found in {}", config.output_path.display());
    Ok(())
}
