mod sim;

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr, time::Duration};

use geohunt_logic::{Fix, GeoStatus, ProviderError, ProviderSample, SmoothedPosition};
use serde::{Deserialize, Serialize};

pub use sim::{SimConfig, Simulation};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

/// One line of a recorded track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackEntry {
    #[serde(rename_all = "camelCase")]
    Sample {
        lat: f64,
        lng: f64,
        accuracy: f64,
        /// Wall-clock time is used when missing
        #[serde(default)]
        timestamp: Option<i64>,
        /// Wait this long before delivering
        #[serde(default)]
        delay_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        code: u16,
        #[serde(default)]
        message: String,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl TrackEntry {
    pub fn delay(&self) -> Duration {
        match self {
            Self::Sample { delay_ms, .. } | Self::Error { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            }
        }
    }

    pub fn into_sample(self, now_ms: i64) -> ProviderSample {
        match self {
            Self::Sample {
                lat,
                lng,
                accuracy,
                timestamp,
                ..
            } => ProviderSample::Position(Fix::new(
                lat,
                lng,
                accuracy,
                timestamp.unwrap_or(now_ms),
            )),
            Self::Error { code, message, .. } => {
                ProviderSample::Error(ProviderError::new(code, message))
            }
        }
    }
}

/// Hand-entered debug position, written as `LAT,LNG[,ACC]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

impl FromStr for ManualPosition {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let parts = raw.split(',').map(str::trim).collect::<Vec<_>>();
        let (lat, lng, accuracy) = match parts.as_slice() {
            [lat, lng] => (*lat, *lng, None),
            [lat, lng, accuracy] => (*lat, *lng, Some(*accuracy)),
            _ => bail!("Expected LAT,LNG[,ACC], got \"{raw}\""),
        };
        let parse = |what: &str, value: &str| {
            value
                .parse::<f64>()
                .with_context(|| format!("Invalid {what} \"{value}\""))
        };
        Ok(Self {
            latitude: parse("latitude", lat)?,
            longitude: parse("longitude", lng)?,
            accuracy_meters: accuracy.map(|a| parse("accuracy", a)).transpose()?,
        })
    }
}

/// Parse a track in JSON lines format, blank lines and lines starting with `#` are skipped
pub fn parse_track(raw: &str) -> Result<Vec<TrackEntry>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid track entry on line {}", i + 1))
        })
        .collect()
}

pub fn load_track(path: impl AsRef<Path>) -> Result<Vec<TrackEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read track from {}", path.display()))?;
    parse_track(&raw)
}

/// Summary of a finished simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimReport {
    pub entries_sent: usize,
    pub fixes_accepted: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub final_status: Option<GeoStatus>,
    pub last_fix: Option<Fix>,
    pub final_position: Option<SmoothedPosition>,
    pub landmarks_completed: usize,
    pub landmarks_total: usize,
    pub frames: usize,
    /// GPS ended in a state where the player would be offered a retry
    pub retry_suggested: bool,
}

impl SimReport {
    pub fn count_status(&mut self, status: GeoStatus) {
        *self
            .status_counts
            .entry(status.label().to_string())
            .or_default() += 1;
    }

    pub fn status_count(&self, status: GeoStatus) -> usize {
        self.status_counts
            .get(status.label())
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Track entries sent: {}", self.entries_sent)?;
        writeln!(f, "Fixes accepted: {}", self.fixes_accepted)?;
        for (status, count) in self.status_counts.iter() {
            writeln!(f, "  {status}: {count}")?;
        }
        if let Some(status) = self.final_status {
            writeln!(f, "Final status: {}", status.label())?;
        }
        if self.retry_suggested {
            writeln!(f, "Retry GPS suggested")?;
        }
        match self.last_fix {
            Some(fix) => writeln!(
                f,
                "Last fix: {:.6}, {:.6} ({}m)",
                fix.latitude,
                fix.longitude,
                fix.accuracy_meters.round()
            )?,
            None => writeln!(f, "Last fix: --")?,
        }
        if let Some(pos) = self.final_position {
            writeln!(f, "Marker: {:.6}, {:.6}", pos.latitude, pos.longitude)?;
        }
        write!(
            f,
            "Landmarks completed: {}/{}",
            self.landmarks_completed, self.landmarks_total
        )
    }
}
