use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::layout::body::MAX_BODIES;
use crate::layout::registry::LayoutRegistry;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::frame::{CaptureTimestamp, DeviceTime, FrameDescription};
use crate::models::sources::Modality;
use crate::models::state::StreamStats;
use crate::storage::description::StreamDescription;
use crate::storage::index::TimestampLine;

/// A context shared between the manager and the thread feeding it.
pub type SharedContext = Arc<Mutex<RecordingContext>>;

/// Consecutive transient write errors tolerated before a payload is dropped.
const MAX_TRANSIENT_WRITE_RETRIES: u32 = 64;

/// What kind of context to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Inactive slot: no prefix, no buffer, skipped by every operation.
    Placeholder,
    /// Recording context with a buffer of `capacity` bytes.
    Raw { capacity: usize },
}

impl ContextKind {
    /// Buffer sized for the largest frame `modality` can produce.
    pub fn for_modality(modality: Modality, config: &CaptureConfiguration) -> Self {
        let registry = LayoutRegistry::global();
        let capacity = match modality {
            Modality::Body => registry.body().size() * MAX_BODIES,
            Modality::Face => registry.face().size() * MAX_BODIES,
            Modality::Audio => config.max_audio_frame_bytes,
            image => image.max_image_bytes().unwrap_or(0),
        };
        ContextKind::Raw { capacity }
    }
}

struct ContextFiles {
    timestamp: BufWriter<File>,
    raw: Option<File>,
    desc: Option<File>,
}

/// Per-modality capture buffer, counters and output files.
///
/// File layout under a session folder:
/// ```text
/// <session>/<prefix>/<prefix>.timestamp
/// <session>/<prefix>/<prefix>.raw    (raw recording only)
/// <session>/<prefix>/<prefix>.desc   (raw recording only)
/// ```
pub struct RecordingContext {
    prefix: String,
    frame_type: String,
    raw_recording: bool,

    buffer: Vec<u8>,
    buffer_size: usize,

    input_number: u64,
    event_count: u64,
    last_frame_time: DeviceTime,
    start_time: Option<f64>,
    frame_rate: f32,

    description: FrameDescription,
    init_description: bool,

    folder: Option<PathBuf>,
    files: Option<ContextFiles>,
}

impl RecordingContext {
    pub fn new(kind: ContextKind, prefix: &str, frame_type: &str, raw_recording: bool) -> Self {
        let (prefix, capacity) = match kind {
            ContextKind::Placeholder => ("", 0),
            ContextKind::Raw { capacity } => (prefix, capacity),
        };
        let mut context = Self {
            prefix: String::new(),
            frame_type: String::new(),
            raw_recording,
            buffer: vec![0u8; capacity],
            buffer_size: 0,
            input_number: 0,
            event_count: 0,
            last_frame_time: 0,
            start_time: None,
            frame_rate: 0.0,
            description: FrameDescription::default(),
            init_description: true,
            folder: None,
            files: None,
        };
        context.init(prefix, frame_type, raw_recording);
        context
    }

    pub fn for_modality(modality: Modality, config: &CaptureConfiguration) -> Self {
        Self::new(
            ContextKind::for_modality(modality, config),
            modality.prefix(),
            modality.frame_type(),
            config.raw_recording,
        )
    }

    pub fn placeholder() -> Self {
        Self::new(ContextKind::Placeholder, "", "", false)
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Reset identity and counters. Any open files are closed without a description.
    pub fn init(&mut self, prefix: &str, frame_type: &str, raw_recording: bool) {
        self.files = None;
        self.folder = None;
        self.prefix = prefix.to_string();
        self.frame_type = frame_type.to_string();
        self.raw_recording = raw_recording;
        self.buffer_size = 0;
        self.reset_counters();
        self.description = FrameDescription::default();
    }

    fn reset_counters(&mut self) {
        self.input_number = 0;
        self.event_count = 0;
        self.last_frame_time = 0;
        self.start_time = None;
        self.frame_rate = 0.0;
        self.init_description = true;
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn frame_type(&self) -> &str {
        &self.frame_type
    }

    pub fn is_active(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Whether output files are currently open.
    pub fn is_recording(&self) -> bool {
        self.files.is_some()
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The populated part of the buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.buffer_size]
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn input_number(&self) -> u64 {
        self.input_number
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn last_frame_time(&self) -> DeviceTime {
        self.last_frame_time
    }

    /// Record the device time of the frame just loaded; returns whether it changed.
    pub fn set_last_frame_time(&mut self, time: DeviceTime) -> bool {
        let changed = self.last_frame_time != time;
        self.last_frame_time = time;
        changed
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn description(&self) -> &FrameDescription {
        &self.description
    }

    /// Whether the frame description still has to be measured.
    pub fn needs_description(&self) -> bool {
        self.init_description
    }

    /// Cache the frame description; only the first call after a start sticks.
    pub fn set_description(&mut self, description: FrameDescription) {
        if self.init_description {
            self.description = description;
            self.init_description = false;
        }
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            prefix: self.prefix.clone(),
            input_number: self.input_number,
            event_count: self.event_count,
            frame_rate: self.frame_rate,
            is_recording: self.is_recording(),
        }
    }

    pub fn clear_buffer(&mut self) {
        self.buffer_size = 0;
    }

    /// Copy one payload into the buffer. An oversized payload leaves the buffer empty.
    pub fn load(&mut self, payload: &[u8]) -> bool {
        self.load_parts([payload])
    }

    /// Concatenate several payloads into the buffer.
    pub fn load_parts<'p, I>(&mut self, parts: I) -> bool
    where
        I: IntoIterator<Item = &'p [u8]>,
    {
        let mut written = 0;
        for part in parts {
            let end = written + part.len();
            if end > self.buffer.len() {
                log::warn!(
                    "{}: frame of at least {} bytes exceeds buffer of {} bytes, dropped",
                    self.prefix,
                    end,
                    self.buffer.len()
                );
                self.buffer_size = 0;
                return false;
            }
            self.buffer[written..end].copy_from_slice(part);
            written = end;
        }
        self.buffer_size = written;
        true
    }

    /// Create the modality folder and open its output files.
    ///
    /// On failure nothing stays open.
    pub fn start_recording(&mut self, session_folder: &Path) -> Result<(), CaptureError> {
        if !self.is_active() {
            return Ok(());
        }
        self.files = None;
        self.reset_counters();

        let folder = session_folder.join(&self.prefix);
        fs::create_dir_all(&folder).map_err(|e| {
            CaptureError::StorageError(format!("could not create '{}': {}", folder.display(), e))
        })?;

        let root = folder.join(&self.prefix);
        let timestamp = BufWriter::new(create_file(&root, "timestamp")?);
        let (raw, desc) = if self.raw_recording {
            let raw = create_file(&root, "raw")?;
            let desc = create_file(&root, "desc")?;
            (Some(raw), Some(desc))
        } else {
            (None, None)
        };

        log::info!("{}: recording to {}", self.prefix, folder.display());
        self.files = Some(ContextFiles { timestamp, raw, desc });
        self.folder = Some(folder);
        Ok(())
    }

    /// Persist one plain frame.
    pub fn save_data_and_increase_input_number(
        &mut self,
        stamp: CaptureTimestamp,
        supplemental: Option<u64>,
    ) -> u64 {
        self.save_and_advance(stamp, supplemental, 1)
    }

    /// Persist the buffer and one index line, then advance the logical
    /// counter by `logical_records`. Returns the frame number written.
    pub fn save_and_advance(
        &mut self,
        stamp: CaptureTimestamp,
        supplemental: Option<u64>,
        logical_records: u64,
    ) -> u64 {
        let frame_number = self.input_number;

        if let Some(files) = self.files.as_mut() {
            if self.start_time.is_none() {
                self.start_time = Some(stamp.as_secs_f64());
            }

            if let Some(raw) = files.raw.as_mut() {
                if self.buffer_size != 0 {
                    if let Err(e) = write_payload(raw, &self.buffer[..self.buffer_size]) {
                        log::error!("{}: dropped frame {} payload: {}", self.prefix, frame_number, e);
                    }
                }
            }

            let line = TimestampLine {
                stamp,
                frame_number,
                supplemental,
                device_time: self.last_frame_time,
            };
            if let Err(e) = writeln!(files.timestamp, "{}", line) {
                log::error!("{}: failed to write index line {}: {}", self.prefix, frame_number, e);
            }
        }

        self.input_number += logical_records;
        self.event_count += 1;
        frame_number
    }

    /// Refresh `frame_rate` from the counters while recording.
    pub fn update_frame_rate(&mut self, now: f64) {
        if !self.is_recording() {
            return;
        }
        self.frame_rate = self.compute_frame_rate(now);
    }

    fn compute_frame_rate(&self, now: f64) -> f32 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let elapsed = now - start;
        if elapsed <= 0.0 || self.input_number == 0 {
            return 0.0;
        }
        (self.input_number as f64 / elapsed) as f32
    }

    /// Write the description and close every file. No-op when not recording.
    pub fn stop_recording(&mut self, now: f64) {
        let Some(mut files) = self.files.take() else {
            return;
        };

        self.frame_rate = self.compute_frame_rate(now);
        if let Some(desc) = files.desc.as_mut() {
            let record = StreamDescription::new(&self.frame_type, &self.description, self.frame_rate);
            if let Err(e) = record.write_line(desc) {
                log::error!("{}: {}", self.prefix, e);
            }
        }
        if let Err(e) = files.timestamp.flush() {
            log::error!("{}: failed to flush index: {}", self.prefix, e);
        }

        log::info!(
            "{}: stopped after {} inputs ({:.2} fps)",
            self.prefix,
            self.input_number,
            self.frame_rate
        );
    }
}

impl Drop for RecordingContext {
    fn drop(&mut self) {
        if self.is_recording() {
            self.stop_recording(CaptureTimestamp::now().as_secs_f64());
        }
    }
}

fn create_file(root: &Path, extension: &str) -> Result<File, CaptureError> {
    let path = root.with_extension(extension);
    File::create(&path)
        .map_err(|e| CaptureError::StorageError(format!("could not create '{}': {}", path.display(), e)))
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Write all of `payload`, retrying transient failures without duplicating bytes.
fn write_payload<W: Write>(out: &mut W, payload: &[u8]) -> io::Result<()> {
    let mut written = 0;
    let mut retries = 0;
    while written < payload.len() {
        match out.write(&payload[written..]) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => {
                written += n;
                retries = 0;
            }
            Err(e) if is_transient(e.kind()) && retries < MAX_TRANSIENT_WRITE_RETRIES => retries += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_context(raw: bool) -> RecordingContext {
        RecordingContext::new(ContextKind::Raw { capacity: 64 }, "depth", "UINT16", raw)
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn placeholder_is_inactive() {
        let mut context = RecordingContext::placeholder();
        assert!(!context.is_active());
        assert_eq!(context.capacity(), 0);

        let dir = tempfile::tempdir().unwrap();
        context.start_recording(dir.path()).unwrap();
        assert!(!context.is_recording());
    }

    #[test]
    fn capacity_follows_modality() {
        let config = CaptureConfiguration::default();
        assert_eq!(RecordingContext::for_modality(Modality::Depth, &config).capacity(), 512 * 424 * 2);
        assert_eq!(RecordingContext::for_modality(Modality::Color, &config).capacity(), 1920 * 1080 * 2);
        assert_eq!(RecordingContext::for_modality(Modality::Body, &config).capacity(), 6 * 1441);
        assert_eq!(RecordingContext::for_modality(Modality::Face, &config).capacity(), 6 * 168);
        assert_eq!(
            RecordingContext::for_modality(Modality::Audio, &config).capacity(),
            config.max_audio_frame_bytes
        );
    }

    #[test]
    fn n_frames_give_n_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = depth_context(true);
        context.start_recording(dir.path()).unwrap();

        for i in 0..25u16 {
            assert!(context.load(&[i as u8; 8]));
            context.set_last_frame_time(1000 + i64::from(i));
            context.save_data_and_increase_input_number(CaptureTimestamp::new(100, i), None);
        }
        context.stop_recording(101.0);

        assert_eq!(context.input_number(), 25);
        let lines = read_lines(&dir.path().join("depth/depth.timestamp"));
        assert_eq!(lines.len(), 25);
        assert_eq!(lines[3], "100.003 3, 1003");
        assert_eq!(fs::metadata(dir.path().join("depth/depth.raw")).unwrap().len(), 25 * 8);
    }

    #[test]
    fn index_only_recording_has_no_raw_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = depth_context(false);
        context.start_recording(dir.path()).unwrap();
        context.load(&[1; 4]);
        context.save_data_and_increase_input_number(CaptureTimestamp::new(1, 0), Some(2));
        context.stop_recording(2.0);

        assert_eq!(read_lines(&dir.path().join("depth/depth.timestamp")), vec!["1.000 0, 2, 0"]);
        assert!(!dir.path().join("depth/depth.raw").exists());
        assert!(!dir.path().join("depth/depth.desc").exists());
    }

    #[test]
    fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = depth_context(true);
        context.start_recording(dir.path()).unwrap();
        context.load(&[0; 2]);
        context.save_data_and_increase_input_number(CaptureTimestamp::new(10, 0), None);

        context.stop_recording(11.0);
        context.stop_recording(12.0);

        assert!(!context.is_recording());
        assert_eq!(read_lines(&dir.path().join("depth/depth.desc")).len(), 1);
        approx::assert_relative_eq!(context.frame_rate(), 1.0);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut context = depth_context(false);
        assert!(context.load(&[1; 16]));
        assert!(!context.load(&[1; 65]));
        assert_eq!(context.buffer_size(), 0);
        assert!(!context.load_parts([&[0u8; 40][..], &[0u8; 40][..]]));
        assert!(context.load_parts([&[1u8; 10][..], &[2u8; 6][..]]));
        assert_eq!(context.buffer(), &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn logical_records_advance_frame_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = RecordingContext::new(ContextKind::Raw { capacity: 16 }, "skeleton", "BodyRecord", true);
        context.start_recording(dir.path()).unwrap();

        let stamp = CaptureTimestamp::new(5, 0);
        assert_eq!(context.save_and_advance(stamp, Some(3), 3), 0);
        context.clear_buffer();
        assert_eq!(context.save_and_advance(stamp, Some(0), 0), 3);
        assert_eq!(context.save_and_advance(stamp, Some(2), 2), 3);
        context.stop_recording(6.0);

        assert_eq!(context.input_number(), 5);
        assert_eq!(context.event_count(), 3);
        let lines = read_lines(&dir.path().join("skeleton/skeleton.timestamp"));
        assert_eq!(lines, vec!["5.000 0, 3, 0", "5.000 3, 0, 0", "5.000 3, 2, 0"]);
    }

    #[test]
    fn start_resets_counters_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = depth_context(true);
        context.set_description(FrameDescription { width: 4, ..Default::default() });
        context.save_data_and_increase_input_number(CaptureTimestamp::new(1, 0), None);
        assert_eq!(context.input_number(), 1);

        context.start_recording(dir.path()).unwrap();
        assert_eq!(context.input_number(), 0);
        assert!(context.needs_description());
        context.set_description(FrameDescription { width: 8, ..Default::default() });
        context.set_description(FrameDescription { width: 16, ..Default::default() });
        assert_eq!(context.description().width, 8);
    }

    #[test]
    fn start_fails_when_folder_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("depth"), b"not a folder").unwrap();
        let mut context = depth_context(true);
        assert!(matches!(context.start_recording(dir.path()), Err(CaptureError::StorageError(_))));
        assert!(!context.is_recording());
    }

    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        chunk: usize,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(kind.into());
            }
            let n = buf.len().min(self.chunk);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transient_write_errors_are_retried() {
        let mut out = FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            chunk: 3,
            data: Vec::new(),
        };
        write_payload(&mut out, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(out.data, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn persistent_write_errors_give_up() {
        let mut out = FlakyWriter {
            failures: vec![ErrorKind::PermissionDenied],
            chunk: 8,
            data: Vec::new(),
        };
        assert!(write_payload(&mut out, &[1, 2]).is_err());
        assert!(out.data.is_empty());
    }
}
