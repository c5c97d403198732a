//! sentrycam: detection-triggered recording for unattended edge cameras
//!
//! This crate is the recording controller of a small surveillance appliance:
//! a single-board computer with a camera and a neural accelerator watching a
//! live feed. When a watched object class crosses the score threshold, an
//! H.264 recording starts — including pre-roll footage from before the
//! trigger — and stops once detections lapse or free memory runs short.
//! Finished captures are remuxed, relocated to durable storage, and
//! opportunistically offloaded to removable media between events.
//!
//! # Architecture
//! - `source` / `detector`: narrow seams to the camera stack and the
//!   accelerator; both are external hardware
//! - `recording`: encoder seam, pre-roll ring, and session lifecycle
//! - `controller`: the detection-triggered start/extend/stop state machine
//! - `archive`: the idle-time transcode/relocate/offload sweep
//! - `shutdown`: condition-gated unattended power-off
//! - `agent`: the driver composing one frame cycle from the above
//!
//! # Usage
//! ```rust,ignore
//! use sentrycam::{Agent, AgentConfig, WatchList};
//!
//! let config = AgentConfig::load_from_file(AgentConfig::default_path())?;
//! config.validate().map_err(sentrycam::AgentError::ConfigError)?;
//! let labels = sentrycam::labels::load_labels(config.detection.labels_path.as_ref())?;
//! let watch = WatchList::resolve(&labels, &config.detection.watch)?;
//! // plug in your FrameSource / Detector / Encoder implementations
//! ```

pub mod agent;
pub mod archive;
pub mod config;
pub mod controller;
pub mod detector;
pub mod errors;
pub mod labels;
pub mod recording;
pub mod shutdown;
pub mod source;
pub mod types;

// Testing utilities - synthetic collaborators for offline runs
pub mod testing;

// Re-exports for convenience
pub use agent::{Agent, CycleOutcome};
pub use config::{AgentConfig, CameraTuning};
pub use controller::{Action, EventController, RecordingState};
pub use detector::{Detector, Inference};
pub use errors::AgentError;
pub use labels::WatchList;
pub use source::FrameSource;
pub use types::Frame;

/// Initialize logging for the agent
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "sentrycam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_metadata() {
        assert_eq!(NAME, "sentrycam");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config_validates() {
        assert!(AgentConfig::default().validate().is_ok());
    }
}
