use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::{Path, PathBuf};

use crate::layout::body::BodySet;
use crate::layout::face::FaceSet;
use crate::layout::registry::LayoutRegistry;
use crate::models::error::CaptureError;
use crate::models::sources::Modality;

use super::description::StreamDescription;
use super::index::TimestampLine;

/// How the payload length of one index line is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadSize {
    Fixed(usize),
    PerRecord(usize),
    PerSample,
}

/// One recorded event: its index line and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub line: TimestampLine,
    pub payload: Vec<u8>,
}

impl RecordedFrame {
    /// Decode a body payload back into a dense body set.
    pub fn bodies(&self) -> Result<BodySet, CaptureError> {
        BodySet::from_bytes(&self.payload)
    }

    pub fn faces(&self) -> Result<FaceSet, CaptureError> {
        FaceSet::from_bytes(&self.payload)
    }
}

/// Reads back one modality of a recorded session.
pub struct RecordedStream {
    folder: PathBuf,
    description: StreamDescription,
    payload_size: PayloadSize,
    index: Lines<BufReader<File>>,
    raw: BufReader<File>,
}

impl std::fmt::Debug for RecordedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordedStream")
            .field("folder", &self.folder)
            .field("description", &self.description)
            .finish()
    }
}

fn open(path: &Path) -> Result<File, CaptureError> {
    File::open(path).map_err(|e| CaptureError::StorageError(format!("could not open '{}': {}", path.display(), e)))
}

impl RecordedStream {
    /// Open `<session>/<prefix>/<prefix>.{desc,timestamp,raw}`.
    pub fn open(session_folder: &Path, prefix: &str) -> Result<Self, CaptureError> {
        let folder = session_folder.join(prefix);
        let root = folder.join(prefix);
        let description = StreamDescription::read(&root.with_extension("desc"))?;

        let registry = LayoutRegistry::global();
        let modality = Modality::ALL.into_iter().find(|m| m.prefix() == prefix);
        let payload_size = match modality.and_then(|m| registry.for_modality(m)) {
            Some(layout) => PayloadSize::PerRecord(layout.size()),
            None if modality == Some(Modality::Audio) => PayloadSize::PerSample,
            None => PayloadSize::Fixed(description.frame_description().frame_bytes()),
        };

        Ok(Self {
            index: BufReader::new(open(&root.with_extension("timestamp"))?).lines(),
            raw: BufReader::new(open(&root.with_extension("raw"))?),
            folder,
            description,
            payload_size,
        })
    }

    pub fn description(&self) -> &StreamDescription {
        &self.description
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Number of index lines, read without consuming the stream.
    pub fn count_events(&self) -> Result<usize, CaptureError> {
        let prefix = self
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = self.folder.join(prefix).with_extension("timestamp");
        let text = fs::read_to_string(&path)
            .map_err(|e| CaptureError::StorageError(format!("could not read '{}': {}", path.display(), e)))?;
        Ok(text.lines().filter(|l| !l.trim().is_empty()).count())
    }

    fn payload_len(&self, line: &TimestampLine) -> usize {
        let count = line.supplemental.unwrap_or(0) as usize;
        match self.payload_size {
            PayloadSize::Fixed(bytes) => bytes,
            PayloadSize::PerRecord(record) => count * record,
            PayloadSize::PerSample => count * std::mem::size_of::<f32>(),
        }
    }

    fn read_frame(&mut self, text: &str) -> Result<RecordedFrame, CaptureError> {
        let line: TimestampLine = text.parse()?;
        let mut payload = vec![0u8; self.payload_len(&line)];
        self.raw.read_exact(&mut payload).map_err(|e| {
            CaptureError::StorageError(format!("frame {}: raw payload truncated: {}", line.frame_number, e))
        })?;
        Ok(RecordedFrame { line, payload })
    }
}

impl Iterator for RecordedStream {
    type Item = Result<RecordedFrame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.index.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(CaptureError::StorageError(format!("index read failed: {}", e)))),
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(self.read_frame(&text));
        }
    }
}
