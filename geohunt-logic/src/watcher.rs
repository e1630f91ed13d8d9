use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, warn};
use parking_lot::ReentrantMutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    fix::{Fix, LocationComponent, TimestampMs, check_coordinates},
    settings::{WatchOptions, WatchSettings},
    status::{GeoError, GeoEvent, GeoStatus, ProviderError, StatusEvent},
};

/// Source of position samples, e.g. a platform geolocation API
pub trait LocationProvider {
    /// Whether the device has any way of producing a position
    fn is_available(&self) -> bool {
        true
    }

    /// Begin delivering samples and errors to `sink` until it's closed. Implementations are
    /// expected to stop their work once [SampleSink::is_closed] is true, but anything delivered
    /// after that is ignored anyway.
    fn watch_position(&self, options: &WatchOptions, sink: SampleSink);
}

pub type Listener = Arc<dyn Fn(&GeoEvent) + Send + Sync>;

type ListenerId = u64;

#[derive(Default)]
struct Listeners {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Listener)>,
}

struct Session {
    token: CancellationToken,
    last_timestamp: Option<TimestampMs>,
}

struct WatchState {
    status: StatusEvent,
    last_fix: Option<Fix>,
    session: Option<Session>,
}

struct Shared {
    accuracy_threshold_meters: f64,
    listeners: Mutex<Listeners>,
    state: Mutex<WatchState>,
    /// Held while deciding to deliver and delivering, so `stop` can't slip in between a
    /// session check and the events it allowed. Reentrant so listeners may call back in.
    dispatch: ReentrantMutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn emit(&self, event: &GeoEvent) {
        // Snapshot so listeners can (un)subscribe or stop the watcher from inside a callback
        let listeners = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, l)| l.clone())
            .collect::<Vec<_>>();

        for listener in listeners {
            listener(event);
        }
    }

    fn stop(&self) {
        let _dispatch = self.dispatch.lock();
        let mut state = lock(&self.state);
        if let Some(session) = state.session.take() {
            session.token.cancel();
            info!("Stopped watching position");
        }
        state.status = StatusEvent::bare(GeoStatus::Idle);
        drop(state);
        self.emit(&GeoEvent::Status(StatusEvent::bare(GeoStatus::Idle)));
    }

    fn current_session<'a>(
        state: &'a mut WatchState,
        token: &CancellationToken,
    ) -> Option<&'a mut Session> {
        if token.is_cancelled() {
            return None;
        }
        state.session.as_mut()
    }

    fn handle_position(&self, token: &CancellationToken, fix: Fix) {
        let _dispatch = self.dispatch.lock();
        let mut state = lock(&self.state);
        let Some(session) = Self::current_session(&mut state, token) else {
            return;
        };

        if let Err(err) = fix.check_well_formed() {
            warn!("Dropping malformed position sample: {err}");
            return;
        }

        if let Some(last) = session.last_timestamp.filter(|last| fix.timestamp_ms < *last) {
            debug!(
                "Dropping out-of-order sample ({} < {last})",
                fix.timestamp_ms
            );
            return;
        }

        let events = if fix.accuracy_meters > self.accuracy_threshold_meters {
            debug!("Filtered noisy sample ({}m)", fix.accuracy_meters);
            let ev = GeoError::LowAccuracy {
                accuracy: fix.accuracy_meters,
            }
            .as_event();
            vec![ev]
        } else {
            session.last_timestamp = Some(fix.timestamp_ms);
            state.last_fix = Some(fix);
            vec![
                GeoEvent::Fix(fix),
                GeoEvent::status(GeoStatus::Watching, "GPS OK"),
            ]
        };

        if let Some(GeoEvent::Status(status)) = events.last() {
            state.status = status.clone();
        }
        drop(state);

        for event in events {
            // A listener may have stopped us in response to an earlier event
            if token.is_cancelled() {
                break;
            }
            self.emit(&event);
        }
    }

    fn handle_error(&self, token: &CancellationToken, err: ProviderError) {
        let _dispatch = self.dispatch.lock();
        let mut state = lock(&self.state);
        if Self::current_session(&mut state, token).is_none() {
            return;
        }

        let err = GeoError::from(err);
        let event = err.as_event();
        let status = err.status();
        warn!("Location provider error: {err}");

        if let GeoEvent::Status(ev) = &event {
            state.status = ev.clone();
        }

        if status.ends_session() {
            if let Some(session) = state.session.take() {
                session.token.cancel();
            }
            info!("Session ended by provider ({})", status.label());
        }
        drop(state);

        self.emit(&event);
    }
}

/// Handle given to a [LocationProvider] for one watch session. Every sink is tied to the session
/// it was created for: once that session is stopped (or replaced) deliveries are no-ops.
#[derive(Clone)]
pub struct SampleSink {
    shared: Arc<Shared>,
    token: CancellationToken,
}

impl SampleSink {
    /// Deliver a position sample
    pub fn position(&self, fix: Fix) {
        self.shared.handle_position(&self.token, fix);
    }

    /// Deliver a provider error
    pub fn error(&self, err: ProviderError) {
        self.shared.handle_error(&self.token, err);
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the session this sink belongs to has ended
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// Handle for removing a listener registered with [GeoWatcher::subscribe]
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Remove the listener, returns whether it was still registered
    pub fn unsubscribe(self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut listeners = lock(&shared.listeners);
        let before = listeners.entries.len();
        listeners.entries.retain(|(id, _)| *id != self.id);
        before != listeners.entries.len()
    }
}

/// Manages a single continuous position-sampling session over a [LocationProvider] and
/// republishes it as a stream of [GeoEvent]s to any number of listeners.
pub struct GeoWatcher<P: LocationProvider> {
    provider: P,
    settings: WatchSettings,
    shared: Arc<Shared>,
}

impl<P: LocationProvider> GeoWatcher<P> {
    pub fn new(provider: P, settings: WatchSettings) -> Self {
        let shared = Shared {
            accuracy_threshold_meters: settings.accuracy_threshold_meters,
            listeners: Mutex::new(Listeners::default()),
            state: Mutex::new(WatchState {
                status: StatusEvent::bare(GeoStatus::Idle),
                last_fix: None,
                session: None,
            }),
            dispatch: ReentrantMutex::new(()),
        };

        Self {
            provider,
            settings,
            shared: Arc::new(shared),
        }
    }

    /// Begin sampling, does nothing if a session is already running
    pub fn start(&self) {
        let _dispatch = self.shared.dispatch.lock();
        let mut state = lock(&self.shared.state);
        if state.session.is_some() {
            return;
        }

        if !self.provider.is_available() {
            let event = GeoError::Unavailable.as_event();
            if let GeoEvent::Status(ev) = &event {
                state.status = ev.clone();
            }
            drop(state);
            warn!("No location capability, not starting");
            self.shared.emit(&event);
            return;
        }

        let token = CancellationToken::new();
        state.session = Some(Session {
            token: token.clone(),
            last_timestamp: None,
        });
        let waiting = StatusEvent::new(GeoStatus::Waiting, "Waiting for GPS");
        state.status = waiting.clone();
        drop(state);

        info!("Started watching position");
        self.shared.emit(&GeoEvent::Status(waiting));

        // A listener may have stopped us already
        if token.is_cancelled() {
            return;
        }

        let sink = SampleSink {
            shared: self.shared.clone(),
            token,
        };
        self.provider
            .watch_position(&self.settings.watch_options(), sink);
    }

    /// End the current session (if any) and go back to idle. A delivery already running on
    /// another thread finishes first, anything the provider delivers for the old session after
    /// this returns is dropped.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Debug override: publish a hand-entered position as if it were an accurate fix. Negative
    /// accuracy is clamped to 0, a missing or non-finite one becomes 10m. Invalid coordinates
    /// surface as an error status instead. The running session (if any) is left alone and its out-of-order checks
    /// don't apply here.
    pub fn apply_manual(
        &self,
        latitude: LocationComponent,
        longitude: LocationComponent,
        accuracy_meters: Option<f64>,
        timestamp_ms: TimestampMs,
    ) -> Option<Fix> {
        let _dispatch = self.shared.dispatch.lock();
        let mut state = lock(&self.shared.state);

        if let Err(why) = check_coordinates(latitude, longitude) {
            warn!("Ignoring manual position: {why}");
            let status = StatusEvent::new(GeoStatus::Error, "Invalid debug coordinates");
            state.status = status.clone();
            drop(state);
            self.shared.emit(&GeoEvent::Status(status));
            return None;
        }

        let accuracy = accuracy_meters
            .filter(|a| a.is_finite())
            .map_or(10.0, |a| a.max(0.0));
        let fix = Fix::new(latitude, longitude, accuracy, timestamp_ms);
        let status = StatusEvent::new(GeoStatus::Watching, "Debug");
        state.last_fix = Some(fix);
        state.status = status.clone();
        drop(state);

        info!("Manual position {latitude}, {longitude} ({accuracy}m)");
        self.shared.emit(&GeoEvent::Fix(fix));
        self.shared.emit(&GeoEvent::Status(status));
        Some(fix)
    }

    /// Register a listener for all future events, delivered in registration order
    pub fn subscribe(&self, listener: impl Fn(&GeoEvent) + Send + Sync + 'static) -> Subscription {
        let mut listeners = lock(&self.shared.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribe with a channel instead of a callback, for async consumers
    pub fn event_stream(&self) -> (Subscription, mpsc::UnboundedReceiver<GeoEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = self.subscribe(move |ev| {
            tx.send(ev.clone()).ok();
        });
        (sub, rx)
    }

    pub fn status(&self) -> StatusEvent {
        lock(&self.shared.state).status.clone()
    }

    /// Most recent accurate fix, survives stopping
    pub fn last_fix(&self) -> Option<Fix> {
        lock(&self.shared.state).last_fix
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared.state).session.is_some()
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: LocationProvider> Drop for GeoWatcher<P> {
    fn drop(&mut self) {
        let _dispatch = self.shared.dispatch.lock();
        if let Some(session) = lock(&self.shared.state).session.take() {
            session.token.cancel();
        }
    }
}
