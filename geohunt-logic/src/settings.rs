use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Options handed to a [crate::LocationProvider] when a watch begins
pub struct WatchOptions {
    /// Ask the provider for its most precise positioning method
    pub enable_high_accuracy: bool,
    /// How long the provider may go without a sample before reporting a timeout
    pub timeout: Duration,
    /// How old a cached sample may be and still be served
    pub maximum_age: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchSettings::default().watch_options()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
#[serde(rename_all = "camelCase", default)]
/// Tunables for the fix pipeline, every key is optional when loading
pub struct WatchSettings {
    /// Samples less accurate than this are treated as noise
    pub accuracy_threshold_meters: f64,
    /// Passed to the provider as [WatchOptions::timeout]
    pub sampling_timeout_ms: u64,
    /// Passed to the provider as [WatchOptions::maximum_age]
    pub max_sample_age_ms: u64,
    /// Time constant for [crate::PositionSmoother]
    pub smoothing_window_ms: u64,
    pub enable_high_accuracy: bool,
}

impl WatchSettings {
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            enable_high_accuracy: self.enable_high_accuracy,
            timeout: Duration::from_millis(self.sampling_timeout_ms),
            maximum_age: Duration::from_millis(self.max_sample_age_ms),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw).context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn validate(&self) -> Result {
        if !self.accuracy_threshold_meters.is_finite() || self.accuracy_threshold_meters < 0.0 {
            bail!(
                "accuracyThresholdMeters must be a non-negative number, got {}",
                self.accuracy_threshold_meters
            );
        }
        if self.smoothing_window_ms == 0 {
            bail!("smoothingWindowMs must be greater than 0");
        }
        Ok(())
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            accuracy_threshold_meters: 50.0,
            sampling_timeout_ms: 10_000,
            max_sample_age_ms: 1_000,
            smoothing_window_ms: 300,
            enable_high_accuracy: true,
        }
    }
}
