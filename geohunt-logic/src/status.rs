use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fix::Fix;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, specta::Type)]
#[serde(rename_all = "camelCase")]
/// Where the watcher currently is in acquiring a position
pub enum GeoStatus {
    /// No session is running
    Idle,
    /// A session is running but no usable fix is current
    Waiting,
    /// A session is running and the latest sample was accurate
    Watching,
    /// The user refused location access, the session was ended
    Denied,
    /// The device can't provide a position, the session was ended (or never started)
    Unavailable,
    /// The provider gave up waiting for a sample, the session continues
    Timeout,
    /// Any other provider failure, the session continues
    Error,
}

impl GeoStatus {
    /// Short label suitable for display without any message
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Waiting => "Waiting",
            Self::Watching => "GPS OK",
            Self::Denied => "Permission denied",
            Self::Unavailable => "Unavailable",
            Self::Timeout => "Timeout",
            Self::Error => "Error",
        }
    }

    /// Whether reaching this status from a provider error ends the session
    pub fn ends_session(self) -> bool {
        matches!(self, Self::Denied | Self::Unavailable)
    }

    /// Whether a UI should offer a manual retry (stop + start) in this status
    pub fn retryable(self) -> bool {
        matches!(self, Self::Denied | Self::Unavailable | Self::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
pub struct StatusEvent {
    pub status: GeoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn new(status: GeoStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    pub fn bare(status: GeoStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    /// Label with the message appended, if there is one
    pub fn display_text(&self) -> String {
        match self.message.as_deref() {
            Some(msg) if !msg.is_empty() => format!("{} · {msg}", self.status.label()),
            _ => self.status.label().to_string(),
        }
    }
}

/// An event emitted by [crate::GeoWatcher] to its listeners
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GeoEvent {
    /// The watcher's status changed (or was re-affirmed)
    Status(StatusEvent),
    /// A new accurate fix is available
    Fix(Fix),
}

impl GeoEvent {
    pub fn status(status: GeoStatus, message: impl Into<String>) -> Self {
        Self::Status(StatusEvent::new(status, message))
    }

    pub fn as_status(&self) -> Option<&StatusEvent> {
        match self {
            Self::Status(ev) => Some(ev),
            Self::Fix(_) => None,
        }
    }

    pub fn as_fix(&self) -> Option<&Fix> {
        match self {
            Self::Fix(fix) => Some(fix),
            Self::Status(_) => None,
        }
    }
}

/// Raw error reported by a location provider, codes follow the W3C Geolocation API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderError {
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

impl ProviderError {
    pub const PERMISSION_DENIED: u16 = 1;
    pub const POSITION_UNAVAILABLE: u16 = 2;
    pub const TIMEOUT: u16 = 3;

    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(Self::TIMEOUT, "Timeout expired")
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
/// Everything that can go wrong while acquiring a position
pub enum GeoError {
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("GPS timeout")]
    Timeout,
    /// The device has no location capability at all
    #[error("Geolocation unavailable")]
    Unavailable,
    #[error("{0}")]
    Provider(String),
    /// Not fatal, the sample is filtered out
    #[error("Low accuracy ({}m)", .accuracy.round())]
    LowAccuracy { accuracy: f64 },
    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

impl GeoError {
    /// Status the watcher should surface for this error
    pub fn status(&self) -> GeoStatus {
        match self {
            Self::PermissionDenied => GeoStatus::Denied,
            Self::PositionUnavailable | Self::Unavailable => GeoStatus::Unavailable,
            Self::Timeout => GeoStatus::Timeout,
            Self::Provider(_) => GeoStatus::Error,
            Self::LowAccuracy { .. } | Self::InvalidSample(_) => GeoStatus::Waiting,
        }
    }

    pub fn as_event(&self) -> GeoEvent {
        GeoEvent::status(self.status(), self.to_string())
    }
}

impl From<ProviderError> for GeoError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            ProviderError::PERMISSION_DENIED => Self::PermissionDenied,
            ProviderError::POSITION_UNAVAILABLE => Self::PositionUnavailable,
            ProviderError::TIMEOUT => Self::Timeout,
            _ if err.message.is_empty() => Self::Provider(format!("Error code {}", err.code)),
            _ => Self::Provider(err.message),
        }
    }
}
