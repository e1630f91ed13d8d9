mod fix;
mod hunt;
mod landmark;
mod provider;
mod proximity;
mod settings;
mod smoothing;
mod status;
mod tasks;
mod watcher;

pub use fix::{Coordinate, Fix, LocationComponent, Positioned, TimestampMs};
pub use hunt::{Hunt, HuntAdvance, OpenedTask};
pub use landmark::{Landmark, LandmarkSet, TaskDefinition, TaskHint};
pub use provider::{ChannelProvider, ProviderSample, SampleTx};
pub use proximity::{EARTH_RADIUS_METERS, NearbyLandmark, distance_meters, is_in_range, nearby};
pub use settings::{WatchOptions, WatchSettings};
pub use smoothing::{PositionSmoother, SmoothedPosition};
pub use status::{GeoError, GeoEvent, GeoStatus, ProviderError, StatusEvent};
pub use tasks::{TaskHandler, TaskOutcome, TaskRegistry};
pub use watcher::{GeoWatcher, Listener, LocationProvider, SampleSink, Subscription};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::{Context, anyhow, bail};
}
