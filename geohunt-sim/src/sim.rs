use std::time::Duration;

use chrono::Utc;
use geohunt_logic::{
    ChannelProvider, GeoEvent, GeoStatus, GeoWatcher, Hunt, LandmarkSet, PositionSmoother,
    SampleTx, TaskRegistry, WatchSettings, nearby,
};
use log::{debug, info, trace, warn};
use tokio::{
    task::yield_now,
    time::{Instant, MissedTickBehavior},
};

use crate::{ManualPosition, SimReport, TrackEntry, prelude::*};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub settings: WatchSettings,
    /// Radius for the nearby landmark list
    pub max_distance_meters: f64,
    /// How often the smoothed marker position is recomputed
    pub frame_interval: Duration,
    /// Pretend the device has no location capability
    pub gps_available: bool,
    /// Debug position applied once the track has been replayed
    pub manual: Option<ManualPosition>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            settings: WatchSettings::default(),
            max_distance_meters: 1000.0,
            frame_interval: Duration::from_millis(16),
            gps_available: true,
            manual: None,
        }
    }
}

/// Replays a recorded track through the whole fix pipeline: watcher, smoother, proximity checks
/// and hunt progression.
pub struct Simulation {
    config: SimConfig,
    hunt: Hunt,
    registry: TaskRegistry,
    smoother: PositionSmoother,
    started: Instant,
    report: SimReport,
}

async fn feed(track: Vec<TrackEntry>, tx: SampleTx) -> (usize, SampleTx) {
    let mut sent = 0;
    for entry in track {
        tokio::time::sleep(entry.delay()).await;
        let sample = entry.into_sample(Utc::now().timestamp_millis());
        if tx.send(sample).await.is_err() {
            break;
        }
        sent += 1;
    }
    (sent, tx)
}

impl Simulation {
    pub fn new(config: SimConfig, landmarks: LandmarkSet) -> Self {
        let smoother = PositionSmoother::new(config.settings.smoothing_window_ms);
        let report = SimReport {
            landmarks_total: landmarks.len(),
            ..Default::default()
        };
        Self {
            config,
            hunt: Hunt::new(landmarks),
            registry: TaskRegistry::with_builtin_apps(),
            smoother,
            started: Instant::now(),
            report,
        }
    }

    fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn handle_event(&mut self, event: GeoEvent) {
        match event {
            GeoEvent::Status(status) => {
                info!("GPS: {}", status.display_text());
                if status.status.retryable() {
                    warn!("GPS gave up ({}), retry with stop and start", status.status.label());
                }
                self.report.count_status(status.status);
                self.report.final_status = Some(status.status);
            }
            GeoEvent::Fix(fix) => {
                self.report.fixes_accepted += 1;
                self.report.last_fix = Some(fix);
                self.smoother.set_target(&fix);
                debug!(
                    "Fix {:.6}, {:.6} ({}m)",
                    fix.latitude,
                    fix.longitude,
                    fix.accuracy_meters.round()
                );

                let close = nearby(&fix, self.hunt.landmarks(), self.config.max_distance_meters);
                if close.is_empty() {
                    debug!("No nearby landmarks");
                }
                for n in close {
                    debug!("  {} · {}m", n.landmark.name, n.distance_meters.round());
                }

                // Several landmarks may share a spot, resolve all of them
                while let Some(opened) = self.hunt.open_task(&fix, &self.registry) {
                    let name = &self.hunt.landmarks()[opened.index].name;
                    info!("Reached {name}: {}", opened.title);
                    info!("{}", opened.message);
                    // The simulated player acknowledges tasks their app didn't complete itself
                    let advance = match opened.advance {
                        Some(advance) => Some(advance),
                        None => self.hunt.resolve_current(),
                    };
                    if let Some(advance) = advance {
                        info!("{}", advance.message());
                    }
                }

                if let Some(distance) = self.hunt.active_distance(&fix) {
                    debug!("Next landmark is {}m away", distance.round());
                }
            }
        }
    }

    fn frame(&mut self) {
        self.report.frames += 1;
        let now = self.now_ms();
        if let Some(pos) = self.smoother.update(now) {
            trace!("Marker at {:.6}, {:.6}", pos.latitude, pos.longitude);
        }
    }

    /// Run the track to completion (or until the provider gives up for good)
    pub async fn run(mut self, track: Vec<TrackEntry>) -> Result<SimReport> {
        self.started = Instant::now();

        let (provider, tx) = ChannelProvider::new(self.config.gps_available);
        let watcher = GeoWatcher::new(provider, self.config.settings);
        let (sub, mut events) = watcher.event_stream();

        let mut feeder = tokio::spawn(feed(track, tx));
        let mut frames = tokio::time::interval(self.config.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        watcher.start();

        let fed = 'sim: loop {
            tokio::select! {
                biased;

                Some(event) = events.recv() => {
                    self.handle_event(event);
                    if !watcher.is_active() {
                        warn!("Location session ended, stopping early");
                        feeder.abort();
                        break 'sim None;
                    }
                }

                res = &mut feeder => {
                    break 'sim Some(res.context("Track feeder failed")?);
                }

                _ = frames.tick() => self.frame(),
            }
        };

        if let Some((sent, tx)) = fed {
            self.report.entries_sent = sent;
            // Let the provider work through whatever is still queued
            while watcher.is_active() && tx.capacity() < tx.max_capacity() {
                yield_now().await;
            }
            yield_now().await;
        }

        if let Some(manual) = self.config.manual {
            watcher.apply_manual(
                manual.latitude,
                manual.longitude,
                manual.accuracy_meters,
                Utc::now().timestamp_millis(),
            );
        }

        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
        }

        // Unsubscribe first, the report keeps the status the track ended on rather than idle
        sub.unsubscribe();
        watcher.stop();

        // Let the marker settle on the last fix
        let settle_at = self.now_ms() + self.config.settings.smoothing_window_ms as i64;
        self.report.final_position = self.smoother.update(settle_at);

        let (completed, total) = self.hunt.progress();
        self.report.landmarks_completed = completed;
        self.report.landmarks_total = total;
        self.report.retry_suggested = self.report.final_status.is_some_and(|s| s.retryable());

        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geohunt_logic::LandmarkSet;
    use tokio::test;

    use super::*;
    use crate::parse_track;

    const LANDMARKS: &str = r#"[
        {
            "id": "sf",
            "name": "Market Street",
            "lat": 37.7750,
            "lng": -122.4195,
            "radiusMeters": 30,
            "task": {
                "app": "showMessage",
                "payload": "You made it",
                "title": "First stop",
                "hint": { "type": "text", "value": "Start downtown" }
            }
        },
        {
            "id": "north",
            "name": "Up the hill",
            "lat": 37.8000,
            "lng": -122.4194,
            "radiusMeters": 30,
            "task": {
                "app": "askPuzzle",
                "payload": { "question": "?", "answer": "!" },
                "title": "Second stop",
                "hint": { "type": "text", "value": "Go north" }
            }
        }
    ]"#;

    fn config() -> SimConfig {
        SimConfig {
            frame_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[test]
    async fn walks_the_hunt() {
        tokio::time::pause();
        let landmarks = LandmarkSet::from_json(LANDMARKS).unwrap();
        let track = parse_track(
            r#"
{"type": "sample", "lat": 37.7749, "lng": -122.4194, "accuracy": 10, "timestamp": 1000}
{"type": "sample", "lat": 37.7800, "lng": -122.4194, "accuracy": 90, "timestamp": 2000, "delayMs": 1000}
{"type": "sample", "lat": 37.8000, "lng": -122.4194, "accuracy": 8, "timestamp": 3000, "delayMs": 1000}
"#,
        )
        .unwrap();

        let report = Simulation::new(config(), landmarks).run(track).await.unwrap();

        assert_eq!(report.entries_sent, 3);
        assert_eq!(report.fixes_accepted, 2);
        assert_eq!(report.landmarks_completed, 2);
        assert_eq!(report.landmarks_total, 2);
        assert_eq!(report.status_count(GeoStatus::Watching), 2);
        // Initial wait plus the noisy sample
        assert_eq!(report.status_count(GeoStatus::Waiting), 2);
        assert_eq!(report.final_status, Some(GeoStatus::Watching));
        assert!(!report.retry_suggested);

        let pos = report.final_position.unwrap();
        assert!((pos.latitude - 37.8).abs() < 1e-9, "{pos:?}");
        assert!(report.frames > 0);
    }

    #[test]
    async fn no_gps_stops_early() {
        tokio::time::pause();
        let landmarks = LandmarkSet::from_json(LANDMARKS).unwrap();
        let track = parse_track(
            r#"{"type": "sample", "lat": 37.7749, "lng": -122.4194, "accuracy": 10}"#,
        )
        .unwrap();
        let config = SimConfig {
            gps_available: false,
            ..config()
        };

        let report = Simulation::new(config, landmarks).run(track).await.unwrap();

        assert_eq!(report.fixes_accepted, 0);
        assert_eq!(report.status_count(GeoStatus::Unavailable), 1);
        assert_eq!(report.final_status, Some(GeoStatus::Unavailable));
        assert_eq!(report.landmarks_completed, 0);
        assert_eq!(report.final_position, None);
    }

    #[test]
    async fn denied_mid_track() {
        tokio::time::pause();
        let landmarks = LandmarkSet::from_json(LANDMARKS).unwrap();
        let track = parse_track(
            r#"
{"type": "sample", "lat": 37.7, "lng": -122.4, "accuracy": 10, "timestamp": 1}
{"type": "error", "code": 1, "delayMs": 100}
{"type": "sample", "lat": 37.7750, "lng": -122.4195, "accuracy": 10, "timestamp": 2, "delayMs": 100}
"#,
        )
        .unwrap();

        let report = Simulation::new(config(), landmarks).run(track).await.unwrap();

        assert_eq!(report.fixes_accepted, 1);
        assert_eq!(report.final_status, Some(GeoStatus::Denied));
        assert_eq!(report.landmarks_completed, 0);
        assert!(report.retry_suggested);
    }

    #[test]
    async fn manual_position_completes_landmark_without_gps() {
        tokio::time::pause();
        let landmarks = LandmarkSet::from_json(LANDMARKS).unwrap();
        let config = SimConfig {
            gps_available: false,
            manual: Some(ManualPosition {
                latitude: 37.7750,
                longitude: -122.4195,
                accuracy_meters: None,
            }),
            ..config()
        };

        let report = Simulation::new(config, landmarks).run(Vec::new()).await.unwrap();

        assert_eq!(report.fixes_accepted, 1);
        assert_eq!(report.last_fix.unwrap().accuracy_meters, 10.0);
        assert_eq!(report.status_count(GeoStatus::Unavailable), 1);
        assert_eq!(report.final_status, Some(GeoStatus::Watching));
        assert!(!report.retry_suggested);
        assert_eq!(report.landmarks_completed, 1);
    }
}
