use crate::layout::body::BodyFrame;
use crate::layout::face::FaceSample;
use crate::models::error::CaptureError;
use crate::models::frame::{CameraIntrinsics, DeviceTime, FrameDescription};
use crate::models::sources::{Modality, SourceSet};

/// An RGB-D sensor as seen by the capture engine.
///
/// Implemented once per hardware backend and once by the test mock. Every
/// method takes `&self` so a device can be shared between the acquisition
/// thread and the stream threads.
pub trait SensorDevice: Send + Sync {
    /// Open the default device. Fails with `DeviceNotAvailable` when absent.
    fn open(&self) -> Result<(), CaptureError>;

    fn close(&self);

    /// A dedicated reader for a modality that is not served by the combined reader.
    fn open_reader(&self, modality: Modality) -> Result<Box<dyn FrameReader>, CaptureError>;

    /// One reader delivering synchronized bundles for `sources`.
    fn open_multi_source_reader(&self, sources: SourceSet) -> Result<Box<dyn MultiSourceReader>, CaptureError>;

    /// Face tracker bound to hardware body `slot`.
    fn open_face_source(&self, slot: usize) -> Result<Box<dyn FaceSource>, CaptureError>;

    /// Depth camera intrinsics, once the device is open.
    fn depth_intrinsics(&self) -> Option<CameraIntrinsics> {
        None
    }
}

/// A frame handed out by a reader. Image frames carry one buffer; audio
/// frames may carry several sub-frames.
pub trait SensorFrame: Send {
    fn description(&self) -> FrameDescription;

    fn relative_time(&self) -> DeviceTime;

    fn sub_frame_count(&self) -> usize {
        1
    }

    fn sub_frame(&self, index: usize) -> Option<&[u8]>;
}

/// Per-modality frame source with a pollable arrival signal.
pub trait FrameReader: Send {
    fn subscribe(&mut self) -> Result<(), CaptureError>;

    fn unsubscribe(&mut self);

    /// Non-blocking check for a pending arrival event.
    fn poll_arrival(&mut self) -> bool;

    /// `None` is a transient miss.
    fn acquire_latest(&mut self) -> Option<Box<dyn SensorFrame>>;
}

/// One synchronized event of the combined reader.
pub trait FrameBundle: Send {
    fn frame(&self, modality: Modality) -> Option<&dyn SensorFrame>;

    fn bodies(&self) -> Option<&BodyFrame>;
}

pub trait MultiSourceReader: Send {
    fn subscribe(&mut self) -> Result<(), CaptureError>;

    fn unsubscribe(&mut self);

    fn poll_arrival(&mut self) -> bool;

    fn acquire_bundle(&mut self) -> Option<Box<dyn FrameBundle>>;
}

/// Face tracker for one body slot, driven by a body tracking id.
pub trait FaceSource: Send {
    fn set_tracking_id(&mut self, tracking_id: u64);

    fn subscribe(&mut self) -> Result<(), CaptureError>;

    fn unsubscribe(&mut self);

    fn poll_arrival(&mut self) -> bool;

    fn acquire_latest(&mut self) -> Option<FaceSample>;
}
