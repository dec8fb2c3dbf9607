//! # rgbd-capture-synthetic
//!
//! Synthetic sensor backend for rgbd-capture-kit.
//!
//! Provides:
//! - `SyntheticDevice`: a `SensorDevice` producing deterministic color, infrared,
//!   depth, body index, body, face and audio data on a fixed frame clock
//! - `Scene`: the generator behind it, usable on its own to check recordings
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use rgbd_capture_core::{CaptureConfiguration, Listeners, MultiSourceSynchronizer, SourceSet};
//! use rgbd_capture_synthetic::SyntheticDevice;
//!
//! let device = Arc::new(SyntheticDevice::default());
//! let mut sync = MultiSourceSynchronizer::new(device, CaptureConfiguration::default(), Listeners::new());
//! sync.init(SourceSet::DEPTH | SourceSet::FACE)?;
//! sync.start_recording("session".as_ref())?;
//! ```

pub mod device;
pub mod scene;

pub use device::SyntheticDevice;
pub use scene::{Scene, SyntheticConfig};
