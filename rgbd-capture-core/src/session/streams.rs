//! Modalities read outside the combined reader: color, audio and faces.

use std::mem::size_of;
use std::time::Duration;

use crate::layout::body::MAX_BODIES;
use crate::layout::face::FaceSet;
use crate::models::error::CaptureError;
use crate::models::frame::{CaptureTimestamp, DeviceTime};
use crate::models::sources::Modality;
use crate::recording::context::RecordingContext;
use crate::traits::device::{FaceSource, FrameReader, SensorDevice, SensorFrame};
use crate::traits::listeners::{FaceEvent, FrameEvent, Listeners};

use super::stream_thread::{Capture, StreamSource};
use super::tracking::SharedTrackingTable;

fn open_subscribed_reader(device: &dyn SensorDevice, modality: Modality) -> Result<Box<dyn FrameReader>, CaptureError> {
    let mut reader = device.open_reader(modality)?;
    reader.subscribe()?;
    Ok(reader)
}

fn close_reader(reader: &mut Option<Box<dyn FrameReader>>) {
    if let Some(mut reader) = reader.take() {
        reader.unsubscribe();
    }
}

fn cache_description(context: &mut RecordingContext, frame: &dyn SensorFrame) {
    if context.needs_description() {
        context.set_description(frame.description());
    }
}

/// Full-resolution color, one buffer per frame.
#[derive(Default)]
pub struct ColorStream {
    reader: Option<Box<dyn FrameReader>>,
}

impl ColorStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamSource for ColorStream {
    fn modality(&self) -> Modality {
        Modality::Color
    }

    fn open(&mut self, device: &dyn SensorDevice) -> Result<(), CaptureError> {
        self.reader = Some(open_subscribed_reader(device, Modality::Color)?);
        Ok(())
    }

    fn poll(&mut self) -> bool {
        self.reader.as_mut().is_some_and(|r| r.poll_arrival())
    }

    fn capture_into(&mut self, context: &mut RecordingContext) -> Option<Capture> {
        let frame = self.reader.as_mut()?.acquire_latest()?;
        cache_description(context, frame.as_ref());
        if !context.load(frame.sub_frame(0)?) {
            return None;
        }
        context.set_last_frame_time(frame.relative_time());
        Some(Capture::frame())
    }

    fn notify(
        &mut self,
        context: &RecordingContext,
        listeners: &Listeners,
        frame_number: Option<u64>,
        timestamp: CaptureTimestamp,
    ) {
        let Some(frame_number) = frame_number else {
            return;
        };
        let description = context.description();
        listeners.notify_frame(&FrameEvent {
            modality: Modality::Color,
            buffer: context.buffer(),
            width: description.width,
            height: description.height,
            format: Modality::Color.image_format(),
            frame_number,
            timestamp,
            device_time: context.last_frame_time(),
        });
    }

    fn close(&mut self) {
        close_reader(&mut self.reader);
    }
}

/// Beam-formed audio. All sub-frames of an event are concatenated; the index
/// line carries the number of f32 samples.
#[derive(Default)]
pub struct AudioStream {
    reader: Option<Box<dyn FrameReader>>,
}

impl AudioStream {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamSource for AudioStream {
    fn modality(&self) -> Modality {
        Modality::Audio
    }

    fn open(&mut self, device: &dyn SensorDevice) -> Result<(), CaptureError> {
        self.reader = Some(open_subscribed_reader(device, Modality::Audio)?);
        Ok(())
    }

    fn poll(&mut self) -> bool {
        self.reader.as_mut().is_some_and(|r| r.poll_arrival())
    }

    fn capture_into(&mut self, context: &mut RecordingContext) -> Option<Capture> {
        let frame = self.reader.as_mut()?.acquire_latest()?;
        cache_description(context, frame.as_ref());
        let parts = (0..frame.sub_frame_count()).filter_map(|i| frame.sub_frame(i));
        if !context.load_parts(parts) {
            return None;
        }
        context.set_last_frame_time(frame.relative_time());
        Some(Capture {
            supplemental: Some((context.buffer_size() / size_of::<f32>()) as u64),
            ..Capture::frame()
        })
    }

    fn notify(
        &mut self,
        context: &RecordingContext,
        listeners: &Listeners,
        frame_number: Option<u64>,
        timestamp: CaptureTimestamp,
    ) {
        let Some(frame_number) = frame_number else {
            return;
        };
        listeners.notify_frame(&FrameEvent {
            modality: Modality::Audio,
            buffer: context.buffer(),
            width: (context.buffer_size() / size_of::<f32>()) as u32,
            height: 1,
            format: Modality::Audio.image_format(),
            frame_number,
            timestamp,
            device_time: context.last_frame_time(),
        });
    }

    fn close(&mut self) {
        close_reader(&mut self.reader);
    }
}

/// Face tracking, one face source per body slot, keyed by the body tracking
/// ids published in the shared tracking table.
pub struct FaceStream {
    table: SharedTrackingTable,
    sources: Vec<Box<dyn FaceSource>>,
    faces: FaceSet,
    had_faces: bool,
    idle_sleep: Duration,
}

impl FaceStream {
    pub fn new(table: SharedTrackingTable, idle_sleep: Duration) -> Self {
        Self {
            table,
            sources: Vec::with_capacity(MAX_BODIES),
            faces: FaceSet::new(),
            had_faces: false,
            idle_sleep,
        }
    }
}

impl StreamSource for FaceStream {
    fn modality(&self) -> Modality {
        Modality::Face
    }

    fn open(&mut self, device: &dyn SensorDevice) -> Result<(), CaptureError> {
        for slot in 0..MAX_BODIES {
            let mut source = device.open_face_source(slot)?;
            source.subscribe()?;
            self.sources.push(source);
        }
        Ok(())
    }

    fn poll(&mut self) -> bool {
        !self.sources.is_empty()
    }

    fn capture_into(&mut self, context: &mut RecordingContext) -> Option<Capture> {
        let pass = self.table.lock().begin_pass();
        for &(slot, tracking_id) in &pass.to_start {
            if let Some(source) = self.sources.get_mut(slot) {
                source.set_tracking_id(tracking_id);
            }
        }

        self.faces.clear();
        let mut latest: Option<DeviceTime> = None;
        for &(slot, tracking_id) in &pass.searching {
            let Some(source) = self.sources.get_mut(slot) else {
                continue;
            };
            if !source.poll_arrival() {
                continue;
            }
            let Some(sample) = source.acquire_latest() else {
                continue;
            };
            if !sample.tracking_id_valid {
                source.set_tracking_id(tracking_id);
                continue;
            }
            if let Err(e) = self.faces.push(slot, &sample.data) {
                log::warn!("face set full: {}", e);
                continue;
            }
            latest = Some(latest.map_or(sample.relative_time, |t| t.max(sample.relative_time)));
        }

        if !context.load(self.faces.as_bytes()) {
            return None;
        }
        if let Some(time) = latest {
            context.set_last_frame_time(time);
        }

        let count = self.faces.len() as u64;
        Some(Capture {
            supplemental: Some(count),
            logical_records: count,
            pause_after: (count == 0).then_some(self.idle_sleep),
        })
    }

    fn notify(
        &mut self,
        context: &RecordingContext,
        listeners: &Listeners,
        frame_number: Option<u64>,
        timestamp: CaptureTimestamp,
    ) {
        match frame_number {
            Some(frame_number) if !self.faces.is_empty() => {
                self.had_faces = true;
                listeners.notify_faces(&FaceEvent::Present {
                    faces: &self.faces,
                    frame_number,
                    timestamp,
                    device_time: context.last_frame_time(),
                });
            }
            _ if self.had_faces && self.faces.is_empty() => {
                self.had_faces = false;
                listeners.notify_faces(&FaceEvent::Absent { timestamp });
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        for source in &mut self.sources {
            source.unsubscribe();
        }
        self.sources.clear();
    }
}
