//! Scripted in-memory device for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::layout::body::BodyFrame;
use crate::layout::face::FaceSample;
use crate::models::error::CaptureError;
use crate::models::frame::{CameraIntrinsics, DeviceTime, FrameDescription};
use crate::models::sources::{Modality, SourceSet};
use crate::traits::device::{FaceSource, FrameBundle, FrameReader, MultiSourceReader, SensorDevice, SensorFrame};

#[derive(Debug, Clone)]
pub struct MockFrame {
    description: FrameDescription,
    relative_time: DeviceTime,
    parts: Vec<Vec<u8>>,
}

impl MockFrame {
    pub fn image(description: FrameDescription, relative_time: DeviceTime, data: Vec<u8>) -> Self {
        Self {
            description,
            relative_time,
            parts: vec![data],
        }
    }

    pub fn audio(relative_time: DeviceTime, parts: Vec<Vec<u8>>) -> Self {
        Self {
            description: FrameDescription::default(),
            relative_time,
            parts,
        }
    }
}

impl SensorFrame for MockFrame {
    fn description(&self) -> FrameDescription {
        self.description
    }

    fn relative_time(&self) -> DeviceTime {
        self.relative_time
    }

    fn sub_frame_count(&self) -> usize {
        self.parts.len()
    }

    fn sub_frame(&self, index: usize) -> Option<&[u8]> {
        self.parts.get(index).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBundle {
    frames: HashMap<Modality, MockFrame>,
    bodies: Option<BodyFrame>,
}

impl MockBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, modality: Modality, frame: MockFrame) -> Self {
        self.frames.insert(modality, frame);
        self
    }

    pub fn with_bodies(mut self, bodies: BodyFrame) -> Self {
        self.bodies = Some(bodies);
        self
    }
}

impl FrameBundle for MockBundle {
    fn frame(&self, modality: Modality) -> Option<&dyn SensorFrame> {
        self.frames.get(&modality).map(|f| f as &dyn SensorFrame)
    }

    fn bodies(&self) -> Option<&BodyFrame> {
        self.bodies.as_ref()
    }
}

#[derive(Default)]
struct MockState {
    is_open: bool,
    open_fails: bool,
    open_delay: Duration,
    close_count: usize,
    failing_readers: HashSet<Modality>,
    frames: HashMap<Modality, VecDeque<MockFrame>>,
    bundles: VecDeque<MockBundle>,
    multi_source: Option<SourceSet>,
    faces: HashMap<usize, VecDeque<FaceSample>>,
    face_ids: HashMap<usize, Vec<u64>>,
    intrinsics: Option<CameraIntrinsics>,
}

/// Device whose frames are queued by the test.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(&self) {
        self.state.lock().open_fails = true;
    }

    /// Make `open` block for `delay` before succeeding.
    pub fn delay_open(&self, delay: Duration) {
        self.state.lock().open_delay = delay;
    }

    pub fn fail_reader(&self, modality: Modality) {
        self.state.lock().failing_readers.insert(modality);
    }

    pub fn set_intrinsics(&self, intrinsics: CameraIntrinsics) {
        self.state.lock().intrinsics = Some(intrinsics);
    }

    pub fn push_frame(&self, modality: Modality, frame: MockFrame) {
        self.state.lock().frames.entry(modality).or_default().push_back(frame);
    }

    pub fn push_bundle(&self, bundle: MockBundle) {
        self.state.lock().bundles.push_back(bundle);
    }

    pub fn push_face(&self, slot: usize, sample: FaceSample) {
        self.state.lock().faces.entry(slot).or_default().push_back(sample);
    }

    pub fn pending_bundles(&self) -> usize {
        self.state.lock().bundles.len()
    }

    /// Tracking ids handed to the face source of `slot`, in order.
    pub fn face_ids(&self, slot: usize) -> Vec<u64> {
        self.state.lock().face_ids.get(&slot).cloned().unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_open
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    pub fn multi_source(&self) -> Option<SourceSet> {
        self.state.lock().multi_source
    }
}

impl SensorDevice for MockDevice {
    fn open(&self) -> Result<(), CaptureError> {
        let delay = self.state.lock().open_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state.lock();
        if state.open_fails {
            return Err(CaptureError::DeviceNotAvailable);
        }
        state.is_open = true;
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.is_open = false;
        state.close_count += 1;
    }

    fn open_reader(&self, modality: Modality) -> Result<Box<dyn FrameReader>, CaptureError> {
        if self.state.lock().failing_readers.contains(&modality) {
            return Err(CaptureError::ReaderUnavailable(modality.to_string()));
        }
        Ok(Box::new(MockReader {
            state: Arc::clone(&self.state),
            modality,
        }))
    }

    fn open_multi_source_reader(&self, sources: SourceSet) -> Result<Box<dyn MultiSourceReader>, CaptureError> {
        let mut state = self.state.lock();
        if sources.iter().any(|m| state.failing_readers.contains(&m)) {
            return Err(CaptureError::ReaderUnavailable(sources.to_string()));
        }
        state.multi_source = Some(sources);
        Ok(Box::new(MockMultiReader {
            state: Arc::clone(&self.state),
        }))
    }

    fn open_face_source(&self, slot: usize) -> Result<Box<dyn FaceSource>, CaptureError> {
        if self.state.lock().failing_readers.contains(&Modality::Face) {
            return Err(CaptureError::ReaderUnavailable(format!("face slot {}", slot)));
        }
        Ok(Box::new(MockFaceSource {
            state: Arc::clone(&self.state),
            slot,
        }))
    }

    fn depth_intrinsics(&self) -> Option<CameraIntrinsics> {
        self.state.lock().intrinsics
    }
}

struct MockReader {
    state: Arc<Mutex<MockState>>,
    modality: Modality,
}

impl FrameReader for MockReader {
    fn subscribe(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn unsubscribe(&mut self) {}

    fn poll_arrival(&mut self) -> bool {
        self.state.lock().frames.get(&self.modality).is_some_and(|q| !q.is_empty())
    }

    fn acquire_latest(&mut self) -> Option<Box<dyn SensorFrame>> {
        let frame = self.state.lock().frames.get_mut(&self.modality)?.pop_front()?;
        Some(Box::new(frame))
    }
}

struct MockMultiReader {
    state: Arc<Mutex<MockState>>,
}

impl MultiSourceReader for MockMultiReader {
    fn subscribe(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn unsubscribe(&mut self) {}

    fn poll_arrival(&mut self) -> bool {
        !self.state.lock().bundles.is_empty()
    }

    fn acquire_bundle(&mut self) -> Option<Box<dyn FrameBundle>> {
        let bundle = self.state.lock().bundles.pop_front()?;
        Some(Box::new(bundle))
    }
}

struct MockFaceSource {
    state: Arc<Mutex<MockState>>,
    slot: usize,
}

impl FaceSource for MockFaceSource {
    fn set_tracking_id(&mut self, tracking_id: u64) {
        self.state.lock().face_ids.entry(self.slot).or_default().push(tracking_id);
    }

    fn subscribe(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn unsubscribe(&mut self) {}

    fn poll_arrival(&mut self) -> bool {
        self.state.lock().faces.get(&self.slot).is_some_and(|q| !q.is_empty())
    }

    fn acquire_latest(&mut self) -> Option<FaceSample> {
        self.state.lock().faces.get_mut(&self.slot)?.pop_front()
    }
}
