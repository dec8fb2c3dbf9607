use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::frame::CaptureTimestamp;
use crate::models::sources::Modality;
use crate::models::state::StreamThreadState;
use crate::recording::context::{RecordingContext, SharedContext};
use crate::traits::device::SensorDevice;
use crate::traits::listeners::Listeners;

/// Result of copying one frame into a context buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    /// Extra column of the index line (record or sample count).
    pub supplemental: Option<u64>,
    /// Logical records this event stands for.
    pub logical_records: u64,
    /// Sleep after this event before polling again.
    pub pause_after: Option<Duration>,
}

impl Capture {
    /// A plain single-frame capture.
    pub fn frame() -> Self {
        Self {
            supplemental: None,
            logical_records: 1,
            pause_after: None,
        }
    }
}

/// One independently read modality, driven by a [`StreamCaptureThread`].
pub trait StreamSource: Send + 'static {
    fn modality(&self) -> Modality;

    /// Acquire readers. An error here ends the thread.
    fn open(&mut self, device: &dyn SensorDevice) -> Result<(), CaptureError>;

    /// Non-blocking check for new data.
    fn poll(&mut self) -> bool;

    /// Copy the newest data into the context buffer. `None` is a transient miss.
    fn capture_into(&mut self, context: &mut RecordingContext) -> Option<Capture>;

    /// Report the capture to listeners. `frame_number` is `None` when nothing was saved.
    fn notify(
        &mut self,
        context: &RecordingContext,
        listeners: &Listeners,
        frame_number: Option<u64>,
        timestamp: CaptureTimestamp,
    );

    /// Release readers.
    fn close(&mut self);
}

/// Worker thread polling one [`StreamSource`] into its recording context.
///
/// ```text
/// created → running → stop requested → joined
/// ```
pub struct StreamCaptureThread {
    name: String,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<StreamThreadState>>,
    failure: Arc<Mutex<Option<CaptureError>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamCaptureThread {
    pub fn spawn<S: StreamSource>(
        mut source: S,
        context: Option<SharedContext>,
        device: Arc<dyn SensorDevice>,
        listeners: Listeners,
        config: &CaptureConfiguration,
    ) -> Result<Self, CaptureError> {
        let name = format!("{}-capture", source.modality().prefix());
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(StreamThreadState::Created));
        let idle_sleep = config.idle_sleep;

        let failure = Arc::new(Mutex::new(None));

        let thread_running = Arc::clone(&running);
        let thread_state = Arc::clone(&state);
        let thread_failure = Arc::clone(&failure);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let Some(context) = context else {
                    let e = CaptureError::MissingContext(source.modality().prefix().into());
                    log::error!("{}, thread exits", e);
                    *thread_failure.lock() = Some(e);
                    return;
                };
                if let Err(e) = source.open(device.as_ref()) {
                    log::error!("{}: could not open reader: {}", source.modality(), e);
                    source.close();
                    *thread_failure.lock() = Some(e);
                    return;
                }
                {
                    let mut state = thread_state.lock();
                    if *state == StreamThreadState::Created {
                        *state = StreamThreadState::Running;
                    }
                }

                run_loop(&mut source, &context, &listeners, &thread_running, idle_sleep);
                source.close();
                log::debug!("{}: capture thread finished", source.modality());
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn {} thread: {}", name, e)))?;

        Ok(Self {
            name,
            running,
            state,
            failure,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StreamThreadState {
        *self.state.lock()
    }

    /// Why the thread exited before capturing, if it did.
    pub fn failure(&self) -> Option<CaptureError> {
        self.failure.lock().clone()
    }

    /// Whether the thread body has returned (stopped or failed at startup).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        if matches!(*state, StreamThreadState::Created | StreamThreadState::Running) {
            *state = StreamThreadState::StopRequested;
        }
    }

    pub fn join(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} panicked", self.name);
            }
        }
        *self.state.lock() = StreamThreadState::Joined;
    }
}

impl Drop for StreamCaptureThread {
    fn drop(&mut self) {
        self.join();
    }
}

fn run_loop<S: StreamSource>(
    source: &mut S,
    context: &SharedContext,
    listeners: &Listeners,
    running: &AtomicBool,
    idle_sleep: Duration,
) {
    while running.load(Ordering::SeqCst) {
        if !source.poll() {
            thread::sleep(idle_sleep);
            continue;
        }

        let mut context = context.lock();
        let Some(capture) = source.capture_into(&mut context) else {
            log::debug!("{}: frame not available", source.modality());
            continue;
        };
        let timestamp = CaptureTimestamp::now();

        let frame_number = (context.buffer_size() != 0)
            .then(|| context.save_and_advance(timestamp, capture.supplemental, capture.logical_records));
        source.notify(&context, listeners, frame_number, timestamp);
        drop(context);

        if let Some(pause) = capture.pause_after {
            thread::sleep(pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::context::ContextKind;
    use crate::testing::MockDevice;
    use std::time::Instant;

    /// Emits `total` one-byte frames, then goes quiet.
    struct CountingSource {
        emitted: u8,
        total: u8,
        fail_open: bool,
        notified: Arc<Mutex<Vec<Option<u64>>>>,
    }

    impl CountingSource {
        fn new(total: u8) -> Self {
            Self {
                emitted: 0,
                total,
                fail_open: false,
                notified: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl StreamSource for CountingSource {
        fn modality(&self) -> Modality {
            Modality::Color
        }

        fn open(&mut self, _device: &dyn SensorDevice) -> Result<(), CaptureError> {
            if self.fail_open {
                return Err(CaptureError::ReaderUnavailable("color".into()));
            }
            Ok(())
        }

        fn poll(&mut self) -> bool {
            self.emitted < self.total
        }

        fn capture_into(&mut self, context: &mut RecordingContext) -> Option<Capture> {
            self.emitted += 1;
            // every third frame is empty and must not be saved
            if self.emitted % 3 == 0 {
                context.clear_buffer();
            } else {
                context.load(&[self.emitted]);
            }
            Some(Capture::frame())
        }

        fn notify(&mut self, _: &RecordingContext, _: &Listeners, frame_number: Option<u64>, _: CaptureTimestamp) {
            self.notified.lock().push(frame_number);
        }

        fn close(&mut self) {}
    }

    fn context() -> SharedContext {
        RecordingContext::new(ContextKind::Raw { capacity: 4 }, "video", "YUY2", true).shared()
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn saves_only_non_empty_frames() {
        let source = CountingSource::new(6);
        let notified = Arc::clone(&source.notified);
        let shared = context();
        let mut worker = StreamCaptureThread::spawn(
            source,
            Some(Arc::clone(&shared)),
            Arc::new(MockDevice::new()),
            Listeners::new(),
            &CaptureConfiguration::default(),
        )
        .unwrap();

        wait_for(|| notified.lock().len() == 6);
        worker.join();

        assert_eq!(worker.state(), StreamThreadState::Joined);
        assert_eq!(shared.lock().input_number(), 4);
        assert_eq!(*notified.lock(), vec![Some(0), Some(1), None, Some(2), Some(3), None]);
    }

    #[test]
    fn missing_context_ends_thread() {
        let source = CountingSource::new(3);
        let notified = Arc::clone(&source.notified);
        let mut worker = StreamCaptureThread::spawn(
            source,
            None,
            Arc::new(MockDevice::new()),
            Listeners::new(),
            &CaptureConfiguration::default(),
        )
        .unwrap();

        wait_for(|| worker.is_finished());
        assert!(worker.is_finished());
        assert_eq!(worker.failure(), Some(CaptureError::MissingContext("video".into())));
        worker.join();
        assert!(notified.lock().is_empty());
    }

    #[test]
    fn reader_failure_ends_thread_without_touching_context() {
        let mut source = CountingSource::new(3);
        source.fail_open = true;
        let shared = context();
        let worker = StreamCaptureThread::spawn(
            source,
            Some(Arc::clone(&shared)),
            Arc::new(MockDevice::new()),
            Listeners::new(),
            &CaptureConfiguration::default(),
        )
        .unwrap();

        wait_for(|| worker.is_finished());
        assert!(worker.is_finished());
        assert_eq!(worker.state(), StreamThreadState::Created);
        assert_eq!(worker.failure(), Some(CaptureError::ReaderUnavailable("color".into())));
        assert_eq!(shared.lock().input_number(), 0);
    }
}
