//! # rgbd-capture-core
//!
//! Platform-agnostic capture core for multi-stream RGB-D sensors.
//!
//! Provides flat record layouts for body and face data, per-stream recording
//! contexts, and the synchronized acquisition engine. Device backends implement
//! the `SensorDevice` trait family and plug into `MultiSourceSynchronizer`.
//!
//! ## Architecture
//!
//! ```text
//! rgbd-capture-core (this crate)
//! ├── traits/     ← SensorDevice, readers, frame bundles, listeners
//! ├── models/     ← CaptureError, Modality, SourceSet, states, configuration
//! ├── layout/     ← field schemas, record layouts, body and face sets
//! ├── recording/  ← RecordingContext, RecordingManager
//! ├── session/    ← MultiSourceSynchronizer, stream capture threads, face tracking
//! └── storage/    ← index lines, stream descriptions, replay
//! ```

pub mod layout;
pub mod models;
pub mod recording;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use layout::body::{BodyData, BodyFrame, BodySample, BodySet, JOINT_COUNT, MAX_BODIES};
pub use layout::face::{FaceData, FaceSample, FaceSet};
pub use layout::registry::LayoutRegistry;
pub use models::config::CaptureConfiguration;
pub use models::error::CaptureError;
pub use models::frame::{CameraIntrinsics, CaptureTimestamp, DeviceTime, FrameDescription};
pub use models::sources::{ImageFormat, Modality, SourceSet};
pub use models::state::{StreamStats, StreamThreadState, SynchronizerState};
pub use recording::context::{RecordingContext, SharedContext};
pub use recording::manager::RecordingManager;
pub use session::synchronizer::MultiSourceSynchronizer;
pub use storage::replay::{RecordedFrame, RecordedStream};
pub use traits::device::{FaceSource, FrameBundle, FrameReader, MultiSourceReader, SensorDevice, SensorFrame};
pub use traits::listeners::{
    BodyEvent, BodyListener, FaceEvent, FaceListener, FrameEvent, FrameListener, Listeners,
};
