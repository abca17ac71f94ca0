//! Command line argument parsing for the Xiphos CLI using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Xiphos - a segmented inverted-index document search engine
#[derive(Parser, Debug, Clone)]
#[command(name = "xiphos")]
#[command(about = "A segmented inverted-index document search engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct XiphosArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl XiphosArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }

    /// Map the effective verbosity to a log level filter
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity() {
            0 => log::LevelFilter::Error, // Quiet mode
            1 => log::LevelFilter::Warn,  // Default
            2 => log::LevelFilter::Info,  // Verbose
            _ => log::LevelFilter::Debug, // Very verbose (3+)
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build body and title indexes from a JSONL corpus
    Build(BuildArgs),

    /// Search a built index
    Search(SearchArgs),

    /// Show index statistics
    Stats(StatsArgs),
}

/// Arguments for building an index
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Corpus file: one JSON document per line with "id", "title", "body"
    #[arg(value_name = "DOCS_FILE")]
    pub docs_file: PathBuf,

    /// Output index directory
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,

    /// Free-text query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results
    #[arg(short, long, default_value = "100")]
    pub limit: usize,

    /// Weight of the body BM25 score in the fused ranking
    #[arg(long, default_value = "0.5")]
    pub body_weight: f64,

    /// Weight of the title BM25 score in the fused ranking
    #[arg(long, default_value = "0.5")]
    pub title_weight: f64,
}

/// Arguments for showing statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,
}
