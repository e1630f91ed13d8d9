use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    time::Instant,
};

use crate::{
    fix::Fix,
    settings::WatchOptions,
    status::ProviderError,
    watcher::{LocationProvider, SampleSink},
};

/// Something a location source can report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProviderSample {
    Position(Fix),
    Error(ProviderError),
}

type SampleRx = mpsc::Receiver<ProviderSample>;
pub type SampleTx = mpsc::Sender<ProviderSample>;

/// [LocationProvider] fed by a channel, for platforms that push samples from another task (or
/// for replaying recorded tracks). Must be used from within a tokio runtime.
pub struct ChannelProvider {
    available: bool,
    rx: Arc<AsyncMutex<SampleRx>>,
    cached: Arc<Mutex<Option<(Instant, Fix)>>>,
}

impl ChannelProvider {
    pub fn new(available: bool) -> (Self, SampleTx) {
        let (tx, rx) = mpsc::channel(32);
        let provider = Self {
            available,
            rx: Arc::new(AsyncMutex::new(rx)),
            cached: Arc::new(Mutex::new(None)),
        };
        (provider, tx)
    }
}

impl LocationProvider for ChannelProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn watch_position(&self, options: &WatchOptions, sink: SampleSink) {
        let rx = self.rx.clone();
        let cached = self.cached.clone();
        let options = *options;

        tokio::spawn(async move {
            let recent = cached
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .filter(|(at, _)| at.elapsed() <= options.maximum_age);
            if let Some((_, fix)) = recent {
                debug!("Serving cached sample");
                sink.position(fix);
            }

            // A previous watch may still be winding down, wait our turn
            let mut rx = tokio::select! {
                biased;
                _ = sink.closed() => return,
                rx = rx.lock() => rx,
            };

            loop {
                tokio::select! {
                    biased;

                    _ = sink.closed() => break,

                    res = tokio::time::timeout(options.timeout, rx.recv()) => match res {
                        Ok(Some(ProviderSample::Position(fix))) => {
                            *cached.lock().unwrap_or_else(PoisonError::into_inner) =
                                Some((Instant::now(), fix));
                            sink.position(fix);
                        }
                        Ok(Some(ProviderSample::Error(err))) => sink.error(err),
                        Ok(None) => {
                            debug!("Sample channel closed");
                            break;
                        }
                        Err(_) => sink.error(ProviderError::timeout()),
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{task::yield_now, test};

    use super::*;
    use crate::{GeoEvent, GeoStatus, GeoWatcher, WatchSettings, tests::EventLog};

    async fn settle() {
        for _ in 0..10 {
            yield_now().await;
        }
    }

    fn statuses(log: &EventLog) -> Vec<GeoStatus> {
        log.events()
            .iter()
            .filter_map(|e| e.as_status().map(|s| s.status))
            .collect()
    }

    #[test]
    async fn forwards_samples_and_errors() {
        tokio::time::pause();
        let (provider, tx) = ChannelProvider::new(true);
        let watcher = GeoWatcher::new(provider, WatchSettings::default());
        let log = EventLog::default();
        log.attach(&watcher);

        watcher.start();
        settle().await;

        let fix = Fix::new(37.7749, -122.4194, 8.0, 10);
        tx.send(ProviderSample::Position(fix)).await.unwrap();
        tx.send(ProviderSample::Error(ProviderError::new(99, "Glitch")))
            .await
            .unwrap();
        settle().await;

        assert_eq!(log.fixes(), [fix]);
        assert_eq!(
            statuses(&log),
            [GeoStatus::Waiting, GeoStatus::Watching, GeoStatus::Error]
        );
    }

    #[test]
    async fn reports_timeout_and_keeps_going() {
        tokio::time::pause();
        let (provider, tx) = ChannelProvider::new(true);
        let settings = WatchSettings {
            sampling_timeout_ms: 500,
            ..Default::default()
        };
        let watcher = GeoWatcher::new(provider, settings);
        let log = EventLog::default();
        log.attach(&watcher);

        watcher.start();
        settle().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;

        assert_eq!(statuses(&log), [GeoStatus::Waiting, GeoStatus::Timeout]);
        assert!(watcher.is_active());

        tx.send(ProviderSample::Position(Fix::new(1.0, 1.0, 1.0, 0)))
            .await
            .unwrap();
        settle().await;
        assert_eq!(log.fixes().len(), 1);
    }

    #[test]
    async fn stop_releases_channel_for_next_session() {
        tokio::time::pause();
        let (provider, tx) = ChannelProvider::new(true);
        let watcher = GeoWatcher::new(provider, WatchSettings::default());
        let log = EventLog::default();
        log.attach(&watcher);

        watcher.start();
        settle().await;
        watcher.stop();
        settle().await;

        // Nobody is watching, sample sits in the channel
        let first = Fix::new(1.0, 1.0, 1.0, 0);
        tx.send(ProviderSample::Position(first)).await.unwrap();
        settle().await;
        assert!(log.fixes().is_empty());

        watcher.start();
        settle().await;
        assert_eq!(log.fixes(), [first]);
    }

    #[test]
    async fn serves_recent_cached_sample_on_restart() {
        tokio::time::pause();
        let (provider, tx) = ChannelProvider::new(true);
        let watcher = GeoWatcher::new(provider, WatchSettings::default());
        let log = EventLog::default();

        watcher.start();
        settle().await;
        let fix = Fix::new(5.0, 5.0, 3.0, 0);
        tx.send(ProviderSample::Position(fix)).await.unwrap();
        settle().await;
        watcher.stop();

        log.attach(&watcher);
        watcher.start();
        settle().await;
        assert_eq!(log.fixes(), [fix]);

        watcher.stop();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        log.clear();
        watcher.start();
        settle().await;
        assert!(log.fixes().is_empty(), "Stale sample was served");
    }

    #[test]
    async fn unavailable_never_watches() {
        let (provider, _tx) = ChannelProvider::new(false);
        let watcher = GeoWatcher::new(provider, WatchSettings::default());
        let log = EventLog::default();
        log.attach(&watcher);

        watcher.start();
        settle().await;

        assert_eq!(
            log.events(),
            [GeoEvent::status(
                GeoStatus::Unavailable,
                "Geolocation unavailable"
            )]
        );
    }
}
