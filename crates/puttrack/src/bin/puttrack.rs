//! Command-line front end: write a default config, calibrate from a marker
//! frame, or replay a sequence of frames and print one JSON report per line.

use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use nalgebra::Point2;
use puttrack::{CameraPose, ConfigError, PuttrackConfig, PuttrackError, Session};
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "puttrack", version, about = "Planar ball positioning and mini-golf")]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", value_parser = parse_level)]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration as JSON.
    DefaultConfig {
        #[arg(long)]
        out: PathBuf,
    },
    /// Calibrate from the corner markers in one image and print the result.
    Calibrate {
        #[arg(long)]
        config: PathBuf,
        image: PathBuf,
    },
    /// Process frames in order and print a JSON report per frame.
    Replay {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Image corners of the play area as u,v pairs in TL,TR,BR,BL order.
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        corners: Option<Vec<f64>>,
        /// Calibrate from the corner markers of the first frame.
        #[arg(long, conflicts_with = "corners")]
        markers: bool,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Puttrack(#[from] PuttrackError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Usage(String),
}

#[derive(Serialize)]
struct CalibrationReport {
    mapping: puttrack::PlanarMapping,
    pose: Option<CameraPose>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = puttrack::core::init_with_level(cli.log_level) {
        eprintln!("logger: {e}");
    }
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::DefaultConfig { out } => {
            PuttrackConfig::default().write_json(&out)?;
            info!("default config written to {}", out.display());
            Ok(())
        }
        Command::Calibrate { config, image } => {
            let mut session = Session::new(PuttrackConfig::load_json(config)?)?;
            let frame = image::open(image)?.to_rgb8();
            session
                .calibrate_from_frame(&frame)
                .map_err(PuttrackError::from)?;
            let report = CalibrationReport {
                mapping: *session
                    .positioner()
                    .mapping()
                    .ok_or_else(|| CliError::Usage("calibration produced no mapping".into()))?,
                pose: session.positioner().pose().copied(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Replay {
            config,
            corners,
            markers,
            fps,
            frames,
        } => {
            if !(fps > 0.0 && fps.is_finite()) {
                return Err(CliError::Usage(format!("fps must be positive, got {fps}")));
            }
            let cfg = match config {
                Some(path) => PuttrackConfig::load_json(path)?,
                None => PuttrackConfig::default(),
            };
            let mut session = Session::new(cfg)?;
            if let Some(c) = corners {
                let pts = parse_corners(&c)?;
                session
                    .calibrate_points(pts)
                    .map_err(PuttrackError::from)?;
            }

            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for (i, path) in frames.iter().enumerate() {
                let frame = image::open(path)?.to_rgb8();
                if i == 0 && markers {
                    session
                        .calibrate_from_frame(&frame)
                        .map_err(PuttrackError::from)?;
                }
                if i == 0 && !session.positioner().is_calibrated() {
                    warn!("replaying without calibration, plane positions stay empty");
                }
                let now = Duration::from_secs_f64(i as f64 / fps);
                let report = session.process_frame(&frame, now);
                serde_json::to_writer(&mut out, &report)?;
                writeln!(out)?;
            }
            out.flush()?;
            Ok(())
        }
    }
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse().map_err(|_| format!("unknown log level {s:?}"))
}

fn parse_corners(values: &[f64]) -> Result<[Point2<f64>; 4], CliError> {
    if values.len() != 8 {
        return Err(CliError::Usage(format!(
            "--corners takes 8 numbers, got {}",
            values.len()
        )));
    }
    Ok(std::array::from_fn(|k| {
        Point2::new(values[2 * k], values[2 * k + 1])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_arguments_parse() {
        let cli = Cli::try_parse_from([
            "puttrack",
            "replay",
            "--corners",
            "10,20,600,22,610,450,5,440",
            "--fps",
            "25",
            "a.png",
            "b.png",
        ])
        .expect("parse");
        let Command::Replay {
            corners, fps, frames, ..
        } = cli.command
        else {
            panic!("expected replay");
        };
        let pts = parse_corners(&corners.expect("corners")).expect("pts");
        assert_eq!(pts[2], Point2::new(610.0, 450.0));
        assert_eq!(fps, 25.0);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn corners_and_markers_conflict() {
        let res = Cli::try_parse_from([
            "puttrack",
            "replay",
            "--markers",
            "--corners",
            "0,0,1,0,1,1,0,1",
            "a.png",
        ]);
        assert!(res.is_err());
    }
}
