use clap::{Parser, Subcommand};
use std::path::PathBuf;

use abr_core::config::DEFAULT_PROFILE;

#[derive(Parser)]
#[command(name = "abrhls")]
#[command(author, version, about = "Adaptive-bitrate HLS packaging for media libraries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve packaged output over HTTP and watch the library
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Package one item now
    Pack {
        /// Source file path or item id
        #[arg(required = true)]
        target: String,

        /// Ladder to package with
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
    },

    /// Show the planned renditions and encoder arguments without running
    Plan {
        /// Source file path or item id
        #[arg(required = true)]
        target: String,

        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the renditions already packaged for an item
    Levels {
        /// Source file path or item id
        #[arg(required = true)]
        target: String,

        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
