use serde::{Deserialize, Serialize};

use crate::fix::{Coordinate, Fix, LocationComponent, Positioned, TimestampMs};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, specta::Type)]
/// Position to draw the player marker at, never used for gameplay
pub struct SmoothedPosition {
    #[serde(rename = "lat")]
    pub latitude: LocationComponent,
    #[serde(rename = "lng")]
    pub longitude: LocationComponent,
}

impl From<&Fix> for SmoothedPosition {
    fn from(fix: &Fix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }
}

impl Positioned for SmoothedPosition {
    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Eases the displayed position toward the latest fix so the marker glides between irregular
/// samples instead of jumping. Meant to be driven from a frame callback.
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    window_ms: f64,
    current: Option<SmoothedPosition>,
    target: Option<SmoothedPosition>,
    last_update_ms: Option<TimestampMs>,
}

impl PositionSmoother {
    /// `window_ms` is clamped to at least 1ms
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms: window_ms.max(1) as f64,
            current: None,
            target: None,
            last_update_ms: None,
        }
    }

    /// Start already sitting on `fix`
    pub fn with_initial(fix: &Fix, window_ms: u64) -> Self {
        let mut smoother = Self::new(window_ms);
        smoother.set_target(fix);
        smoother
    }

    pub fn set_target(&mut self, fix: &Fix) {
        let target = SmoothedPosition::from(fix);
        self.target = Some(target);
        if self.current.is_none() {
            self.current = Some(target);
        }
    }

    /// Advance toward the target by the time elapsed since the previous call and return where
    /// the marker should be drawn
    pub fn update(&mut self, now_ms: TimestampMs) -> Option<SmoothedPosition> {
        let elapsed = self
            .last_update_ms
            .map(|last| now_ms.saturating_sub(last).max(0))
            .unwrap_or(0);
        self.last_update_ms = Some(now_ms);

        let target = self.target?;
        let current = self.current.get_or_insert(target);

        let alpha = (elapsed as f64 / self.window_ms).min(1.0);
        current.latitude += (target.latitude - current.latitude) * alpha;
        current.longitude += (target.longitude - current.longitude) * alpha;

        Some(*current)
    }

    pub fn current(&self) -> Option<SmoothedPosition> {
        self.current
    }

    pub fn target(&self) -> Option<SmoothedPosition> {
        self.target
    }
}
