/// Lifecycle of the multi-source acquisition thread.
///
/// State transitions:
/// ```text
/// uninitialized → starting → running → stopping → stopped
///                    ↓                                ↑
///                    └────────── (init failed) ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronizerState {
    Uninitialized,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl SynchronizerState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether an acquisition thread exists or is being brought up.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Lifecycle of a per-modality capture thread.
///
/// ```text
/// created → running → stop requested → joined
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamThreadState {
    Created,
    Running,
    StopRequested,
    Joined,
}

/// Per-context counters, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStats {
    pub prefix: String,
    /// Logical records recorded (one per body/face for set modalities).
    pub input_number: u64,
    /// Index lines written.
    pub event_count: u64,
    pub frame_rate: f32,
    pub is_recording: bool,
}
