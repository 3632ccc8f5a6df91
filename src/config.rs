//! Configuration for the `ndtiff` command-line tool.
//!
//! A `clap`-derived `Cli` with one subcommand per operation, each taking
//! its own `*Config` struct, all overridable via environment variables
//! under the `NDTIFF_` prefix.
//!
//! # Environment Variables
//!
//! - `NDTIFF_DIR` - dataset directory (default: current directory)
//! - `NDTIFF_PREFIX` - container filename prefix (default: "Dataset")
//! - `NDTIFF_RECYCLE_MIN_SIZE` - smallest buffer size the pool will recycle
//! - `NDTIFF_POOL_SIZE_PER_CAPACITY` - buffers kept per size class

use clap::{Parser, Subcommand};

// =============================================================================
// Default Values
// =============================================================================

/// Default dataset directory.
pub const DEFAULT_DIR: &str = ".";

/// Default container filename prefix.
pub const DEFAULT_PREFIX: &str = "Dataset";

/// Default smallest buffer size the pool will recycle (see
/// [`crate::bufferpool::RECYCLE_MIN_SIZE`]).
pub const DEFAULT_RECYCLE_MIN_SIZE: usize = 4096;

/// Default number of buffers retained per size class (see
/// [`crate::bufferpool::POOL_SIZE_PER_CAPACITY`]).
pub const DEFAULT_POOL_SIZE_PER_CAPACITY: usize = 3;

/// Default demo tile width/height for `put-demo-image`.
pub const DEFAULT_DEMO_TILE_SIZE: u32 = 64;

// =============================================================================
// CLI Arguments
// =============================================================================

/// ndtiff - create and inspect NDTiff microscopy datasets.
///
/// A small command-line front end over the storage engine, useful for
/// scripting dataset creation and for poking at a dataset without writing
/// Rust.
#[derive(Parser, Debug, Clone)]
#[command(name = "ndtiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new, empty dataset directory.
    Create(CreateConfig),
    /// Write one synthetic grayscale image into a dataset, for smoke-testing.
    PutDemoImage(PutDemoImageConfig),
    /// Print summary information about an existing dataset.
    Info(InfoConfig),
    /// Finalize a dataset: flush pending pyramid tiles and close its files.
    Finish(FinishConfig),
}

/// Configuration shared by every subcommand that operates on a dataset
/// directory.
#[derive(Parser, Debug, Clone)]
pub struct DatasetPathConfig {
    /// Dataset directory.
    #[arg(long, default_value = DEFAULT_DIR, env = "NDTIFF_DIR")]
    pub dir: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CreateConfig {
    #[command(flatten)]
    pub dataset: DatasetPathConfig,

    /// Container filename prefix.
    #[arg(long, default_value = DEFAULT_PREFIX, env = "NDTIFF_PREFIX")]
    pub prefix: String,

    /// Summary metadata, as a JSON object literal.
    #[arg(long, default_value = "{}")]
    pub summary_metadata: String,

    #[command(flatten)]
    pub buffer_pool: BufferPoolConfig,
}

#[derive(Parser, Debug, Clone)]
pub struct PutDemoImageConfig {
    #[command(flatten)]
    pub dataset: DatasetPathConfig,

    /// Container filename prefix (must match the prefix used at creation).
    #[arg(long, default_value = DEFAULT_PREFIX, env = "NDTIFF_PREFIX")]
    pub prefix: String,

    /// Time index to write the demo image at.
    #[arg(long, default_value_t = 0)]
    pub time: i32,

    /// Image width in pixels.
    #[arg(long, default_value_t = DEFAULT_DEMO_TILE_SIZE)]
    pub width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = DEFAULT_DEMO_TILE_SIZE)]
    pub height: u32,

    /// Fill value for every pixel (0-255).
    #[arg(long, default_value_t = 128)]
    pub fill: u8,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoConfig {
    #[command(flatten)]
    pub dataset: DatasetPathConfig,
}

#[derive(Parser, Debug, Clone)]
pub struct FinishConfig {
    #[command(flatten)]
    pub dataset: DatasetPathConfig,
}

// =============================================================================
// Buffer Pool Configuration
// =============================================================================

/// Tunables for [`crate::bufferpool::BufferPool`].
///
/// The pool itself currently uses fixed constants (see
/// [`crate::bufferpool`]); this config exists so the CLI can surface and
/// validate the values a future pool-sizing knob would take.
#[derive(Parser, Debug, Clone)]
pub struct BufferPoolConfig {
    /// Smallest buffer size, in bytes, that gets pooled instead of
    /// allocated fresh on every request.
    #[arg(long, default_value_t = DEFAULT_RECYCLE_MIN_SIZE, env = "NDTIFF_RECYCLE_MIN_SIZE")]
    pub recycle_min_size: usize,

    /// Number of buffers retained per size class before further recycles
    /// are dropped.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE_PER_CAPACITY, env = "NDTIFF_POOL_SIZE_PER_CAPACITY")]
    pub pool_size_per_capacity: usize,
}

impl BufferPoolConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.recycle_min_size == 0 {
            return Err("recycle_min_size must be greater than 0".to_string());
        }
        if self.pool_size_per_capacity == 0 {
            return Err("pool_size_per_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl CreateConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("prefix must not be empty".to_string());
        }
        if serde_json::from_str::<serde_json::Value>(&self.summary_metadata).is_err() {
            return Err("summary_metadata must be valid JSON".to_string());
        }
        self.buffer_pool.validate()
    }
}

impl PutDemoImageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        Ok(())
    }
}
