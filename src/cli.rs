use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qpilot")]
#[command(about = "Bitrate-targeting batch transcoder for quality-knob encoders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a file, or every video under a directory, to its target bitrate
    Run {
        /// File or directory (falls back to the configured default, then ".")
        path: Option<PathBuf>,

        /// Target bitrate in Mbps for every asset (default: by source height)
        #[arg(long, value_name = "MBPS")]
        target_mbps: Option<f64>,

        /// Acceptance band around the target, as a fraction
        #[arg(long)]
        tolerance: Option<f64>,

        /// Re-encode files whose output already exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Scan a directory and list the batch without encoding
    Scan {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,

        /// Include files that already have output files (re-encode)
        #[arg(long)]
        overwrite: bool,
    },

    /// Show the sample windows and target the search would use for a file
    Plan {
        /// Path to the video file
        file: PathBuf,

        /// Target bitrate in Mbps (default: by source height)
        #[arg(long, value_name = "MBPS")]
        target_mbps: Option<f64>,
    },

    /// Probe a video file and print its height, duration and bitrate
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Check that ffmpeg and ffprobe are installed and the encoder exists
    CheckFfmpeg,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
