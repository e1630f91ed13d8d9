use std::{path::PathBuf, time::Duration};

use clap::Parser;
use geohunt_logic::{LandmarkSet, WatchSettings};
use geohunt_sim::{ManualPosition, SimConfig, Simulation, load_track, prelude::*};
use log::{error, info};

#[derive(Parser)]
/// Replay a recorded GPS track against a landmark hunt
struct Cli {
    /// JSON file with the list of landmarks, in hunt order
    landmarks: PathBuf,

    /// JSON lines file with provider samples and errors
    track: PathBuf,

    /// JSON file with watcher settings, missing keys use the defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Radius in meters for the nearby landmark list
    #[arg(long, default_value_t = 1000.0)]
    max_distance: f64,

    /// Milliseconds between marker smoothing frames
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Simulate a device with no location capability
    #[arg(long)]
    no_gps: bool,

    /// Debug position to apply after the track, as LAT,LNG[,ACC]
    #[arg(long, allow_hyphen_values = true)]
    manual: Option<ManualPosition>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let landmarks = LandmarkSet::load(&cli.landmarks)?;
    let track = load_track(&cli.track)?;
    let settings = cli
        .settings
        .as_ref()
        .map(WatchSettings::load)
        .transpose()?
        .unwrap_or_default();

    if cli.frame_ms == 0 {
        bail!("--frame-ms must be greater than 0");
    }

    info!(
        "Replaying {} track entries against {} landmarks",
        track.len(),
        landmarks.len()
    );

    let config = SimConfig {
        settings,
        max_distance_meters: cli.max_distance,
        frame_interval: Duration::from_millis(cli.frame_ms),
        gps_available: !cli.no_gps,
        manual: cli.manual,
    };

    let report = tokio::select! {
        res = Simulation::new(config, landmarks).run(track) => res?,
        Ok(_) = tokio::signal::ctrl_c() => {
            error!("Interrupted");
            return Ok(());
        }
    };

    if cli.json {
        let encoded = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{encoded}");
    } else {
        println!("{report}");
    }

    Ok(())
}
