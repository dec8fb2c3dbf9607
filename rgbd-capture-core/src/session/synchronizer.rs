use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::layout::body::BodySet;
use crate::layout::registry::LayoutRegistry;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::frame::{CameraIntrinsics, CaptureTimestamp};
use crate::models::sources::{Modality, SourceSet};
use crate::models::state::{StreamStats, SynchronizerState};
use crate::recording::context::{RecordingContext, SharedContext};
use crate::recording::manager::RecordingManager;
use crate::traits::device::{FrameBundle, MultiSourceReader, SensorDevice};
use crate::traits::listeners::{BodyEvent, FrameEvent, Listeners};

use super::stream_thread::{StreamCaptureThread, StreamSource};
use super::streams::{AudioStream, ColorStream, FaceStream};
use super::tracking::{SharedTrackingTable, TrackingTable};

struct SharedStatus {
    state: SynchronizerState,
    sources: SourceSet,
    intrinsics: Option<CameraIntrinsics>,
}

/// Primary acquisition engine.
///
/// Owns the device session: one thread reads the combined depth / infrared /
/// body-index / body reader, and one [`StreamCaptureThread`] each runs color,
/// face and audio.
///
/// ```text
/// [combined reader] ─→ depth, infrared, long-exposure, body index ─→ contexts ─→ listeners
///                  └─→ bodies ─→ BodySet ─→ context ─→ listeners
///                                   └─→ TrackingTable ─→ [face thread]
/// [color reader] ─→ [color thread] ─→ context ─→ listener
/// [audio reader] ─→ [audio thread] ─→ context ─→ listener
/// ```
///
/// State transitions:
/// ```text
/// uninitialized → starting → running → stopping → stopped
/// ```
pub struct MultiSourceSynchronizer {
    device: Arc<dyn SensorDevice>,
    config: CaptureConfiguration,
    listeners: Listeners,
    manager: Arc<RecordingManager>,
    status: Arc<Mutex<SharedStatus>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MultiSourceSynchronizer {
    pub fn new(device: Arc<dyn SensorDevice>, config: CaptureConfiguration, listeners: Listeners) -> Self {
        LayoutRegistry::init();
        Self {
            device,
            config,
            listeners,
            manager: Arc::new(RecordingManager::new()),
            status: Arc::new(Mutex::new(SharedStatus {
                state: SynchronizerState::Uninitialized,
                sources: SourceSet::NONE,
                intrinsics: None,
            })),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn state(&self) -> SynchronizerState {
        self.status.lock().state
    }

    /// Sources actually acquired (face adds body).
    pub fn sources(&self) -> SourceSet {
        self.status.lock().sources
    }

    pub fn depth_intrinsics(&self) -> Option<CameraIntrinsics> {
        self.status.lock().intrinsics
    }

    pub fn is_recording(&self) -> bool {
        self.manager.is_recording()
    }

    pub fn stream_stats(&self) -> Vec<StreamStats> {
        self.manager.stats()
    }

    /// Start acquiring `sources` and wait for the acquisition thread to come up.
    pub fn init(&mut self, sources: SourceSet) -> Result<(), CaptureError> {
        if sources.is_empty() {
            return Err(CaptureError::ConfigurationFailed("no data source selected".into()));
        }
        let sources = sources.with_implied();

        {
            let status = self.status.lock();
            if status.state.is_active() {
                if status.sources == sources {
                    return Ok(());
                }
                return Err(CaptureError::AlreadyRunning);
            }
        }
        // reap a previous session that stopped on its own
        self.join_thread();

        let config = CaptureConfiguration {
            sources,
            ..self.config.clone()
        };
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        {
            let mut status = self.status.lock();
            status.state = SynchronizerState::Starting;
            status.sources = sources;
        }
        self.running.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let acquisition = Acquisition {
            device: Arc::clone(&self.device),
            config: config.clone(),
            listeners: self.listeners.clone(),
            manager: Arc::clone(&self.manager),
            status: Arc::clone(&self.status),
            running: Arc::clone(&self.running),
        };
        let handle = thread::Builder::new()
            .name("rgbd-synchronizer".into())
            .spawn(move || acquisition.run(ready_tx))
            .map_err(|e| {
                self.status.lock().state = SynchronizerState::Stopped;
                CaptureError::Unknown(format!("failed to spawn acquisition thread: {}", e))
            })?;
        self.handle = Some(handle);

        match ready_rx.recv_timeout(config.init_timeout) {
            Ok(Ok(())) => {
                log::info!("acquisition running with {}", sources);
                Ok(())
            }
            Ok(Err(e)) => {
                self.join_thread();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!("acquisition thread did not report within {:?}", config.init_timeout);
                // the thread is left to wind down; the next init reaps it
                {
                    let mut status = self.status.lock();
                    if status.state.is_active() {
                        status.state = SynchronizerState::Stopping;
                    }
                }
                self.running.store(false, Ordering::SeqCst);
                Err(CaptureError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join_thread();
                Err(CaptureError::Unknown("acquisition thread exited during init".into()))
            }
        }
    }

    /// Start recording every acquired modality under `session_folder`.
    pub fn start_recording(&self, session_folder: &Path) -> Result<(), CaptureError> {
        if !self.state().is_running() {
            return Err(CaptureError::ConfigurationFailed("acquisition is not running".into()));
        }
        self.manager.start_recording(session_folder)
    }

    pub fn stop_recording(&self) {
        self.manager.stop_recording();
    }

    /// Stop the acquisition thread and every stream thread, then release the device.
    pub fn shutdown(&mut self) {
        {
            let mut status = self.status.lock();
            if status.state.is_active() {
                status.state = SynchronizerState::Stopping;
            }
        }
        self.running.store(false, Ordering::SeqCst);
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("acquisition thread panicked");
                self.status.lock().state = SynchronizerState::Stopped;
            }
        }
    }
}

impl Drop for MultiSourceSynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Everything the acquisition thread owns while the device is open.
struct Session {
    reader: Option<Box<dyn MultiSourceReader>>,
    contexts: Vec<(Modality, SharedContext)>,
    threads: Vec<StreamCaptureThread>,
    tracking: Option<SharedTrackingTable>,
    bodies: BodySet,
    had_bodies: bool,
}

struct Acquisition {
    device: Arc<dyn SensorDevice>,
    config: CaptureConfiguration,
    listeners: Listeners,
    manager: Arc<RecordingManager>,
    status: Arc<Mutex<SharedStatus>>,
    running: Arc<AtomicBool>,
}

impl Acquisition {
    fn run(self, ready: SyncSender<Result<(), CaptureError>>) {
        let mut session = match self.open_session() {
            Ok(session) => session,
            Err(e) => {
                log::error!("acquisition init failed: {}", e);
                self.set_state(SynchronizerState::Stopped);
                let _ = ready.send(Err(e));
                return;
            }
        };

        {
            let mut status = self.status.lock();
            if status.state != SynchronizerState::Starting {
                // init gave up waiting
                drop(status);
                self.close_session(session);
                return;
            }
            status.state = SynchronizerState::Running;
        }
        let _ = ready.send(Ok(()));

        self.acquire(&mut session);
        self.close_session(session);
    }

    fn set_state(&self, state: SynchronizerState) {
        self.status.lock().state = state;
    }

    fn open_session(&self) -> Result<Session, CaptureError> {
        self.device.open()?;
        log::info!("device opened");
        self.status.lock().intrinsics = self.device.depth_intrinsics();

        match self.build_session() {
            Ok(session) => Ok(session),
            Err(e) => {
                self.device.close();
                self.manager.clear_rec_contexts();
                Err(e)
            }
        }
    }

    fn build_session(&self) -> Result<Session, CaptureError> {
        let sources = self.config.sources;
        let synchronized = sources.synchronized();

        let mut contexts = Vec::new();
        for modality in Modality::SYNCHRONIZED {
            if synchronized.contains(modality) {
                let context = self
                    .manager
                    .add_rec_context(RecordingContext::for_modality(modality, &self.config));
                contexts.push((modality, context));
            }
        }

        let reader = if synchronized.is_empty() {
            None
        } else {
            let mut reader = self.device.open_multi_source_reader(synchronized)?;
            reader.subscribe()?;
            Some(reader)
        };

        let tracking = sources.contains(Modality::Face).then(TrackingTable::shared);

        let mut threads = Vec::new();
        if sources.contains(Modality::Color) {
            threads.push(self.spawn_stream(ColorStream::new())?);
        }
        if let Some(table) = &tracking {
            threads.push(self.spawn_stream(FaceStream::new(Arc::clone(table), self.config.face_idle_sleep))?);
        }
        if sources.contains(Modality::Audio) {
            threads.push(self.spawn_stream(AudioStream::new())?);
        }

        Ok(Session {
            reader,
            contexts,
            threads,
            tracking,
            bodies: BodySet::new(),
            had_bodies: false,
        })
    }

    fn spawn_stream<S: StreamSource>(&self, source: S) -> Result<StreamCaptureThread, CaptureError> {
        let context = self
            .manager
            .add_rec_context(RecordingContext::for_modality(source.modality(), &self.config));
        StreamCaptureThread::spawn(
            source,
            Some(context),
            Arc::clone(&self.device),
            self.listeners.clone(),
            &self.config,
        )
    }

    fn acquire(&self, session: &mut Session) {
        while self.running.load(Ordering::SeqCst) {
            let Some(reader) = session.reader.as_mut() else {
                thread::sleep(self.config.idle_sleep);
                self.update_frame_rates(CaptureTimestamp::now());
                continue;
            };
            if !reader.poll_arrival() {
                thread::sleep(self.config.idle_sleep);
                continue;
            }
            let Some(bundle) = reader.acquire_bundle() else {
                log::debug!("combined frame not available");
                continue;
            };

            let timestamp = CaptureTimestamp::now();
            self.manager.with_lock(|| {
                self.process_bundle(session, bundle.as_ref(), timestamp);
                self.update_frame_rates(timestamp);
            });
        }
    }

    fn process_bundle(&self, session: &mut Session, bundle: &dyn FrameBundle, timestamp: CaptureTimestamp) {
        let Session {
            contexts,
            tracking,
            bodies,
            had_bodies,
            ..
        } = session;

        for (modality, shared) in contexts.iter() {
            let mut context = shared.lock();
            if *modality == Modality::Body {
                self.process_bodies(&mut context, bundle, bodies, had_bodies, tracking.as_ref(), timestamp);
                continue;
            }

            let Some(frame) = bundle.frame(*modality) else {
                continue;
            };
            if context.needs_description() {
                context.set_description(frame.description());
            }
            let Some(data) = frame.sub_frame(0) else {
                continue;
            };
            if !context.load(data) || !context.set_last_frame_time(frame.relative_time()) {
                continue;
            }

            let frame_number = context.save_data_and_increase_input_number(timestamp, None);
            let description = *context.description();
            self.listeners.notify_frame(&FrameEvent {
                modality: *modality,
                buffer: context.buffer(),
                width: description.width,
                height: description.height,
                format: modality.image_format(),
                frame_number,
                timestamp,
                device_time: context.last_frame_time(),
            });
        }
    }

    fn process_bodies(
        &self,
        context: &mut RecordingContext,
        bundle: &dyn FrameBundle,
        bodies: &mut BodySet,
        had_bodies: &mut bool,
        tracking: Option<&SharedTrackingTable>,
        timestamp: CaptureTimestamp,
    ) {
        let Some(frame) = bundle.bodies() else {
            return;
        };
        let count = match bodies.compact(frame) {
            Ok(count) => count,
            Err(e) => {
                log::warn!("body frame dropped: {}", e);
                return;
            }
        };
        if !context.load(bodies.as_bytes()) {
            return;
        }
        if let Some(table) = tracking {
            table.lock().exchange(bodies);
        }
        if !context.set_last_frame_time(frame.relative_time) {
            return;
        }

        let frame_number = context.save_and_advance(timestamp, Some(count as u64), count as u64);
        if count > 0 {
            *had_bodies = true;
            self.listeners.notify_bodies(&BodyEvent::Present {
                bodies,
                frame_number,
                timestamp,
                device_time: frame.relative_time,
            });
        } else if *had_bodies {
            *had_bodies = false;
            self.listeners.notify_bodies(&BodyEvent::Absent { timestamp });
        }
    }

    fn update_frame_rates(&self, now: CaptureTimestamp) {
        if !self.manager.is_recording() {
            return;
        }
        let now = now.as_secs_f64();
        for shared in self.manager.contexts() {
            let mut context = shared.lock();
            if context.is_active() {
                context.update_frame_rate(now);
            }
        }
    }

    fn close_session(&self, session: Session) {
        let Session {
            reader, mut threads, ..
        } = session;

        if let Some(mut reader) = reader {
            reader.unsubscribe();
        }
        for thread in &mut threads {
            thread.join();
        }
        drop(threads);

        self.device.close();
        log::info!("device closed");

        self.manager.with_lock(|| {
            self.manager.stop_recording();
            self.manager.clear_rec_contexts();
        });
        self.set_state(SynchronizerState::Stopped);
    }
}
