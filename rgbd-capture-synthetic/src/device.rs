//! Synthetic sensor implementing the full device trait family.
//!
//! Frames appear on a fixed clock started by `open`. Every reader hands out
//! at most one frame per tick, like a hardware reader that only keeps the
//! latest frame.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use rgbd_capture_core::{
    BodyFrame, CameraIntrinsics, CaptureError, DeviceTime, FaceSample, FaceSource, FrameBundle, FrameDescription,
    FrameReader, Modality, MultiSourceReader, SensorDevice, SensorFrame, SourceSet,
};

use crate::scene::{Scene, SyntheticConfig};

struct DeviceState {
    open: bool,
    started: Instant,
}

struct Shared {
    scene: Scene,
    state: Mutex<DeviceState>,
}

impl Shared {
    /// Current tick, or `None` while the device is closed.
    fn current_tick(&self) -> Option<u64> {
        let state = self.state.lock();
        state.open.then(|| self.scene.tick_at(state.started.elapsed()))
    }

    fn check_available(&self, modality: Modality) -> Result<(), CaptureError> {
        if !self.state.lock().open {
            return Err(CaptureError::DeviceNotAvailable);
        }
        if self.scene.config().unavailable.contains(modality) {
            return Err(CaptureError::ReaderUnavailable(modality.to_string()));
        }
        Ok(())
    }
}

/// Delivers each tick at most once.
#[derive(Default)]
struct TickCursor {
    subscribed: bool,
    last: Option<u64>,
}

impl TickCursor {
    fn pending(&self, shared: &Shared) -> bool {
        self.subscribed && shared.current_tick().is_some_and(|tick| self.last != Some(tick))
    }

    fn take(&mut self, shared: &Shared) -> Option<u64> {
        if !self.subscribed {
            return None;
        }
        let tick = shared.current_tick()?;
        if self.last == Some(tick) {
            return None;
        }
        self.last = Some(tick);
        Some(tick)
    }
}

/// In-process stand-in for an RGB-D sensor.
#[derive(Clone)]
pub struct SyntheticDevice {
    shared: Arc<Shared>,
}

impl SyntheticDevice {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                scene: Scene::new(config),
                state: Mutex::new(DeviceState {
                    open: false,
                    started: Instant::now(),
                }),
            }),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.shared.scene
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl SensorDevice for SyntheticDevice {
    fn open(&self) -> Result<(), CaptureError> {
        let mut state = self.shared.state.lock();
        if !state.open {
            state.open = true;
            state.started = Instant::now();
            log::info!(
                "synthetic sensor open ({:?} per frame)",
                self.shared.scene.config().frame_interval
            );
        }
        Ok(())
    }

    fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.open {
            state.open = false;
            log::info!("synthetic sensor closed");
        }
    }

    fn open_reader(&self, modality: Modality) -> Result<Box<dyn FrameReader>, CaptureError> {
        self.shared.check_available(modality)?;
        if matches!(modality, Modality::Body | Modality::Face) {
            return Err(CaptureError::ReaderUnavailable(format!("{} has no frame reader", modality)));
        }
        Ok(Box::new(SyntheticReader {
            shared: Arc::clone(&self.shared),
            modality,
            cursor: TickCursor::default(),
        }))
    }

    fn open_multi_source_reader(&self, sources: SourceSet) -> Result<Box<dyn MultiSourceReader>, CaptureError> {
        for modality in sources.iter() {
            self.shared.check_available(modality)?;
        }
        log::debug!("synthetic multi-source reader for {}", sources);
        Ok(Box::new(SyntheticMultiReader {
            shared: Arc::clone(&self.shared),
            sources,
            cursor: TickCursor::default(),
        }))
    }

    fn open_face_source(&self, slot: usize) -> Result<Box<dyn FaceSource>, CaptureError> {
        self.shared.check_available(Modality::Face)?;
        Ok(Box::new(SyntheticFaceSource {
            shared: Arc::clone(&self.shared),
            slot,
            tracking_id: 0,
            cursor: TickCursor::default(),
        }))
    }

    fn depth_intrinsics(&self) -> Option<CameraIntrinsics> {
        self.is_open().then(|| self.shared.scene.depth_intrinsics())
    }
}

struct SyntheticFrame {
    description: FrameDescription,
    relative_time: DeviceTime,
    parts: Vec<Vec<u8>>,
}

impl SensorFrame for SyntheticFrame {
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

fn build_frame(scene: &Scene, modality: Modality, tick: u64) -> Option<SyntheticFrame> {
    let relative_time = scene.device_time(tick);
    if modality == Modality::Audio {
        return Some(SyntheticFrame {
            description: FrameDescription::default(),
            relative_time,
            parts: scene.audio(tick),
        });
    }
    let (description, data) = scene.image(modality, tick)?;
    Some(SyntheticFrame {
        description,
        relative_time,
        parts: vec![data],
    })
}

struct SyntheticReader {
    shared: Arc<Shared>,
    modality: Modality,
    cursor: TickCursor,
}

impl FrameReader for SyntheticReader {
    fn subscribe(&mut self) -> Result<(), CaptureError> {
        self.cursor.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.cursor.subscribed = false;
    }

    fn poll_arrival(&mut self) -> bool {
        self.cursor.pending(&self.shared)
    }

    fn acquire_latest(&mut self) -> Option<Box<dyn SensorFrame>> {
        let tick = self.cursor.take(&self.shared)?;
        let frame = build_frame(&self.shared.scene, self.modality, tick)?;
        Some(Box::new(frame))
    }
}

struct SyntheticBundle {
    frames: Vec<(Modality, SyntheticFrame)>,
    bodies: Option<BodyFrame>,
}

impl FrameBundle for SyntheticBundle {
    fn frame(&self, modality: Modality) -> Option<&dyn SensorFrame> {
        self.frames
            .iter()
            .find(|(m, _)| *m == modality)
            .map(|(_, frame)| frame as &dyn SensorFrame)
    }

    fn bodies(&self) -> Option<&BodyFrame> {
        self.bodies.as_ref()
    }
}

struct SyntheticMultiReader {
    shared: Arc<Shared>,
    sources: SourceSet,
    cursor: TickCursor,
}

impl MultiSourceReader for SyntheticMultiReader {
    fn subscribe(&mut self) -> Result<(), CaptureError> {
        self.cursor.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.cursor.subscribed = false;
    }

    fn poll_arrival(&mut self) -> bool {
        self.cursor.pending(&self.shared)
    }

    fn acquire_bundle(&mut self) -> Option<Box<dyn FrameBundle>> {
        let tick = self.cursor.take(&self.shared)?;
        let scene = &self.shared.scene;
        let frames = self
            .sources
            .iter()
            .filter_map(|m| build_frame(scene, m, tick).map(|frame| (m, frame)))
            .collect();
        let bodies = self.sources.contains(Modality::Body).then(|| scene.bodies(tick));
        Some(Box::new(SyntheticBundle { frames, bodies }))
    }
}

struct SyntheticFaceSource {
    shared: Arc<Shared>,
    slot: usize,
    tracking_id: u64,
    cursor: TickCursor,
}

impl FaceSource for SyntheticFaceSource {
    fn set_tracking_id(&mut self, tracking_id: u64) {
        self.tracking_id = tracking_id;
    }

    fn subscribe(&mut self) -> Result<(), CaptureError> {
        self.cursor.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.cursor.subscribed = false;
    }

    fn poll_arrival(&mut self) -> bool {
        self.tracking_id != 0 && self.cursor.pending(&self.shared)
    }

    fn acquire_latest(&mut self) -> Option<FaceSample> {
        if self.tracking_id == 0 {
            return None;
        }
        let tick = self.cursor.take(&self.shared)?;
        let scene = &self.shared.scene;
        let face = scene.face(self.slot, self.tracking_id, tick);
        Some(FaceSample {
            tracking_id_valid: face.is_some(),
            relative_time: scene.device_time(tick),
            data: face.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A clock slow enough that every test runs inside tick 0.
    fn frozen() -> SyntheticDevice {
        SyntheticDevice::new(SyntheticConfig {
            frame_interval: Duration::from_secs(3600),
            ..Default::default()
        })
    }

    #[test]
    fn reader_delivers_each_tick_once() {
        let device = frozen();
        device.open().unwrap();
        let mut reader = device.open_reader(Modality::Depth).unwrap();
        assert!(!reader.poll_arrival());

        reader.subscribe().unwrap();
        assert!(reader.poll_arrival());
        let frame = reader.acquire_latest().unwrap();
        assert_eq!(frame.sub_frame(0).unwrap().len(), frame.description().frame_bytes());
        assert_eq!(frame.relative_time(), 0);

        assert!(!reader.poll_arrival());
        assert!(reader.acquire_latest().is_none());
    }

    #[test]
    fn readers_need_an_open_device() {
        let device = frozen();
        assert_eq!(device.open_reader(Modality::Color).err(), Some(CaptureError::DeviceNotAvailable));
        device.open().unwrap();
        assert!(device.open_reader(Modality::Color).is_ok());
        assert!(device.open_reader(Modality::Body).is_err());

        device.close();
        assert!(!device.is_open());
        assert!(device.depth_intrinsics().is_none());
    }

    #[test]
    fn unavailable_sources_fail_to_open() {
        let device = SyntheticDevice::new(SyntheticConfig {
            unavailable: SourceSet::COLOR | SourceSet::FACE,
            ..Default::default()
        });
        device.open().unwrap();
        assert!(matches!(
            device.open_reader(Modality::Color),
            Err(CaptureError::ReaderUnavailable(_))
        ));
        assert!(device.open_face_source(0).is_err());
        assert!(device.open_multi_source_reader(SourceSet::DEPTH).is_ok());
    }

    #[test]
    fn bundle_carries_requested_sources() {
        let device = frozen();
        device.open().unwrap();
        let mut reader = device
            .open_multi_source_reader(SourceSet::DEPTH | SourceSet::BODY_INDEX | SourceSet::BODY)
            .unwrap();
        reader.subscribe().unwrap();
        assert!(reader.poll_arrival());

        let bundle = reader.acquire_bundle().unwrap();
        assert!(bundle.frame(Modality::Depth).is_some());
        assert!(bundle.frame(Modality::BodyIndex).is_some());
        assert!(bundle.frame(Modality::Infrared).is_none());
        let bodies = bundle.bodies().unwrap();
        let tracked: Vec<usize> = (0..6)
            .filter(|&slot| bodies.slots[slot].as_ref().is_some_and(|s| s.is_tracked))
            .collect();
        assert_eq!(tracked, vec![1, 3, 5]);
    }

    #[test]
    fn face_source_follows_tracking_id() {
        let device = frozen();
        device.open().unwrap();
        let mut source = device.open_face_source(1).unwrap();
        source.subscribe().unwrap();
        assert!(!source.poll_arrival());

        source.set_tracking_id(Scene::tracking_id(1));
        assert!(source.poll_arrival());
        let sample = source.acquire_latest().unwrap();
        assert!(sample.tracking_id_valid);
        assert_eq!(sample.data.tracking_id, Scene::tracking_id(1));

        let mut stale = device.open_face_source(2).unwrap();
        stale.subscribe().unwrap();
        stale.set_tracking_id(Scene::tracking_id(2));
        assert!(!stale.acquire_latest().unwrap().tracking_id_valid);
    }

    #[test]
    fn audio_frames_carry_sub_frames() {
        let device = frozen();
        device.open().unwrap();
        let mut reader = device.open_reader(Modality::Audio).unwrap();
        reader.subscribe().unwrap();
        let frame = reader.acquire_latest().unwrap();
        assert_eq!(frame.sub_frame_count(), 2);
        assert_eq!(frame.sub_frame(1).unwrap().len(), 256 * 4);
        assert!(frame.sub_frame(2).is_none());
    }

    #[test]
    fn intrinsics_scale_with_resolution() {
        let device = frozen();
        device.open().unwrap();
        let intrinsics = device.depth_intrinsics().unwrap();
        approx::assert_relative_eq!(intrinsics.focal_length_x, 365.5 / 4.0);
    }
}
