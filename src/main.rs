// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use isp_pipeline::PipelineConfig;
use isp_pipeline::constants::app_info;
use std::path::PathBuf;
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "isp-pipeline")]
#[command(about = "Pipeline handler for sensor → CSI-2 receiver → ISP camera pipelines")]
#[command(version = app_info::version())]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a simulated rkisp1 device and list its cameras
    List {
        /// Sensors attached to the simulated receiver
        #[arg(short, long, value_delimiter = ',', default_value = "imx219,ov5695")]
        sensors: Vec<String>,
    },

    /// Stream frames from a camera of a simulated rkisp1 device
    Capture {
        /// Camera index to use (from 'isp-pipeline list')
        #[arg(short, long, default_value = "0")]
        camera: usize,

        /// Output size (default: full sensor resolution)
        #[arg(long)]
        size: Option<String>,

        /// Number of frames to capture
        #[arg(short, long, default_value = "10")]
        frames: u32,

        /// Sensors attached to the simulated receiver
        #[arg(short, long, value_delimiter = ',', default_value = "imx219,ov5695")]
        sensors: Vec<String>,

        /// Scene brightness seen by the simulated sensor (0.0 - 1.0)
        #[arg(long, default_value = "0.05")]
        scene: f64,
    },

    /// Report media controller devices present on this system
    Probe,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=isp_pipeline=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    info!(version = app_info::version(), "isp-pipeline starting");

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::List { sensors } => cli::list_cameras(config, &sensors),
        Commands::Capture {
            camera,
            size,
            frames,
            sensors,
            scene,
        } => cli::capture(
            config,
            &sensors,
            cli::CaptureOptions {
                camera,
                size,
                frames,
                scene,
            },
        ),
        Commands::Probe => cli::probe_devices(&config),
    }
}
