//! ndtiff - create and inspect NDTiff microscopy datasets.
//!
//! This binary is a thin front end over the storage engine for scripting
//! and smoke-testing; real acquisition software links against the crate
//! directly and drives `put_image`/`put_tile`/`finished_writing` itself.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ndtiff::config::{Cli, Command, CreateConfig, FinishConfig, InfoConfig, PutDemoImageConfig};
use ndtiff::{Coordinate, NdTiffStorage, OwnedImage, PixelType};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Create(config) => run_create(config),
        Command::PutDemoImage(config) => run_put_demo_image(config),
        Command::Info(config) => run_info(config),
        Command::Finish(config) => run_finish(config),
    }
}

// =============================================================================
// Create Command
// =============================================================================

fn run_create(config: CreateConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Creating dataset at {}", config.dataset.dir);
    info!("  prefix: {}", config.prefix);

    let storage = match NdTiffStorage::create(
        &config.dataset.dir,
        config.prefix,
        config.summary_metadata.into_bytes(),
        None,
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = storage.finished_writing() {
        error!("Failed to finalize empty dataset: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Dataset created.");
    ExitCode::SUCCESS
}

// =============================================================================
// Put-Demo-Image Command
// =============================================================================

fn run_put_demo_image(config: PutDemoImageConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let storage = match NdTiffStorage::create(&config.dataset.dir, config.prefix, b"{}".to_vec(), None)
    {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pixel_count = (config.width * config.height) as usize;
    let image = OwnedImage {
        width: config.width,
        height: config.height,
        pixel_type: PixelType::Gray8,
        pixels: vec![config.fill; pixel_count],
        metadata_json: b"{}".to_vec(),
        pixel_size_um: None,
    };
    let coord = Coordinate::from_pairs([("time", config.time.into())]);

    if let Err(e) = storage.put_image(coord, image) {
        error!("Failed to write demo image: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = storage.finished_writing() {
        error!("Failed to finalize dataset: {}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "Wrote a {}x{} demo image at time={}",
        config.width, config.height, config.time
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    let storage = match NdTiffStorage::load(&config.dataset.dir) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level_count = match storage.level_count() {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to read dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Dataset: {}", config.dataset.dir);
    println!("Resolution levels: {level_count}");
    for level in 0..level_count {
        match storage.image_count(level) {
            Ok(count) => println!("  level {level}: {count} image(s)"),
            Err(e) => println!("  level {level}: error reading image count ({e})"),
        }
    }
    match storage.display_settings() {
        Ok(Some(bytes)) => println!("Display settings: {} byte(s)", bytes.len()),
        Ok(None) => println!("Display settings: none"),
        Err(e) => println!("Display settings: error reading ({e})"),
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Finish Command
// =============================================================================

/// A dataset is only ever left mid-write within the process that is
/// actively writing it — `putImage`/`finishedWriting` share one
/// `NdTiffStorage` handle and its in-memory write-pending state, which does
/// not survive across process boundaries. This subcommand instead confirms
/// that a dataset on disk is already in the finished state and reports its
/// final shape, the operation an operator actually needs after an
/// acquisition process exits.
fn run_finish(config: FinishConfig) -> ExitCode {
    let storage = match NdTiffStorage::load(&config.dataset.dir) {
        Ok(s) => s,
        Err(e) => {
            error!("Dataset is not in a finished, loadable state: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match storage.level_count() {
        Ok(level_count) => {
            info!("Dataset already finalized with {} resolution level(s).", level_count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to read dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "ndtiff=debug" } else { "ndtiff=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
