//! The child device side: a typed HTTP client and the playback time tracker.

pub mod api;
pub mod tracker;

pub use api::{ApiClient, ClientError, PinSession};
pub use tracker::{
    spawn_tracker, PlaybackState, PlaybackTracker, SessionReporter, TrackerEvent, TrackerHandle,
    UsageReporter,
};
