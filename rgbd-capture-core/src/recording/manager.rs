use std::cell::RefCell;
use std::path::Path;

use parking_lot::ReentrantMutex;

use crate::models::error::CaptureError;
use crate::models::frame::CaptureTimestamp;
use crate::models::state::StreamStats;

use super::context::{RecordingContext, SharedContext};

struct ManagerState {
    contexts: Vec<SharedContext>,
    is_recording: bool,
}

/// Owns every recording context and switches them on and off as a group.
///
/// One reentrant lock guards both the context list and the recording flag,
/// so a failed start can stop the contexts it already started from inside
/// the same critical section.
pub struct RecordingManager {
    state: ReentrantMutex<RefCell<ManagerState>>,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(ManagerState {
                contexts: Vec::new(),
                is_recording: false,
            })),
        }
    }

    /// Run `f` while holding the manager lock. Recording cannot start or stop
    /// on another thread until `f` returns.
    pub fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.state.lock();
        f()
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().borrow().is_recording
    }

    pub fn add_rec_context(&self, context: RecordingContext) -> SharedContext {
        let shared = context.shared();
        self.state.lock().borrow_mut().contexts.push(shared.clone());
        shared
    }

    /// Drop every context. Threads feeding them must already be joined.
    pub fn clear_rec_contexts(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        if state.is_recording {
            log::warn!("clearing recording contexts while recording");
            state.is_recording = false;
        }
        state.contexts.clear();
    }

    pub fn contexts(&self) -> Vec<SharedContext> {
        self.state.lock().borrow().contexts.clone()
    }

    pub fn context(&self, prefix: &str) -> Option<SharedContext> {
        self.state
            .lock()
            .borrow()
            .contexts
            .iter()
            .find(|c| c.lock().prefix() == prefix)
            .cloned()
    }

    pub fn stats(&self) -> Vec<StreamStats> {
        self.contexts()
            .iter()
            .filter_map(|c| {
                let context = c.lock();
                context.is_active().then(|| context.stats())
            })
            .collect()
    }

    /// Start every active context under `session_folder`, all or nothing.
    pub fn start_recording(&self, session_folder: &Path) -> Result<(), CaptureError> {
        let guard = self.state.lock();
        if guard.borrow().is_recording {
            return Err(CaptureError::AlreadyRecording);
        }

        let contexts = guard.borrow().contexts.clone();
        for shared in &contexts {
            let mut context = shared.lock();
            if !context.is_active() {
                continue;
            }
            if let Err(e) = context.start_recording(session_folder) {
                log::error!(
                    "{}: could not start recording in {}: {}; rolling back",
                    context.prefix(),
                    session_folder.display(),
                    e
                );
                drop(context);
                guard.borrow_mut().is_recording = true;
                self.stop_recording();
                return Err(e);
            }
        }

        guard.borrow_mut().is_recording = true;
        log::info!("recording started in {}", session_folder.display());
        Ok(())
    }

    pub fn stop_recording(&self) {
        self.stop_recording_at(CaptureTimestamp::now().as_secs_f64());
    }

    /// Stop every active context with `now` as the closing wall-clock time.
    pub fn stop_recording_at(&self, now: f64) {
        let guard = self.state.lock();
        if !guard.borrow().is_recording {
            return;
        }

        let contexts = guard.borrow().contexts.clone();
        for shared in &contexts {
            let mut context = shared.lock();
            if context.is_active() {
                context.stop_recording(now);
            }
        }
        guard.borrow_mut().is_recording = false;
        log::info!("recording stopped");
    }
}

impl Default for RecordingManager {
    fn default() -> Self {
        Self::new()
    }
}
