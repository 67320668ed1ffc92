//! `meshcut` command line: check a model against a build volume or split it
//! into printable parts.

use clap::{Parser, Subcommand};
use meshcut::config::{BuildVolume, HollowStrategy, JointType, SegmentationConfig};
use meshcut::float_types::Real;
use meshcut::{check_file, segment_file};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshcut")]
#[command(about = "Split oversized 3D models into parts that fit a printer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a model fits the build volume
    Check {
        /// Input model (.stl or .3mf)
        model: PathBuf,

        /// Build volume in millimetres
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
        build: Option<Vec<Real>>,
    },

    /// Cut a model into parts, add joints and write 3MF files
    Segment {
        /// Input model (.stl or .3mf)
        model: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// JSON configuration; flags override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Build volume in millimetres
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
        build: Option<Vec<Real>>,

        /// Joint type: dowel, integrated, pyramid, dovetail or none
        #[arg(long)]
        joint: Option<JointType>,

        /// Hollowing: none, hollow-then-segment, segment-then-hollow or surface-shell
        #[arg(long)]
        hollow: Option<HollowStrategy>,

        /// Wall thickness for hollowing, in millimetres
        #[arg(long)]
        wall: Option<Real>,

        /// Use the single-path greedy search instead of beam search
        #[arg(long)]
        greedy: bool,

        /// Also write an STL for every part
        #[arg(long)]
        stl: bool,
    },
}

fn build_volume(values: &[Real]) -> Option<BuildVolume> {
    match values {
        [x, y, z] => Some(BuildVolume::new(*x, *y, *z)),
        _ => None,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Check { model, build } => {
            let build = build
                .as_deref()
                .and_then(build_volume)
                .unwrap_or_default();
            let report = check_file(&model, &build).map_err(|e| e.to_string())?;
            print_json(&report)
        },
        Commands::Segment {
            model,
            out,
            config,
            build,
            joint,
            hollow,
            wall,
            greedy,
            stl,
        } => {
            let mut settings = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                    SegmentationConfig::from_json(&text).map_err(|e| e.to_string())?
                },
                None => SegmentationConfig::default(),
            };
            if let Some(volume) = build.as_deref().and_then(build_volume) {
                settings.build_volume = volume;
            }
            if let Some(joint) = joint {
                settings = settings.with_joint(joint);
            }
            if let Some(strategy) = hollow {
                settings = settings.with_hollowing(strategy);
            }
            if let Some(wall) = wall {
                settings = settings.with_wall_thickness(wall);
            }
            if greedy {
                settings = settings.with_greedy_search();
            }
            settings.export_stl |= stl;

            let result = segment_file(&model, &out, &settings).map_err(|e| e.to_string())?;
            print_json(&result)
        },
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        },
    }
}
