use std::sync::Arc;

use crate::layout::body::BodySet;
use crate::layout::face::FaceSet;
use crate::models::frame::{CaptureTimestamp, DeviceTime};
use crate::models::sources::{ImageFormat, Modality};

/// One saved image or audio frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameEvent<'a> {
    pub modality: Modality,
    pub buffer: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub frame_number: u64,
    pub timestamp: CaptureTimestamp,
    pub device_time: DeviceTime,
}

#[derive(Debug, Clone, Copy)]
pub enum BodyEvent<'a> {
    Present {
        bodies: &'a BodySet,
        frame_number: u64,
        timestamp: CaptureTimestamp,
        device_time: DeviceTime,
    },
    /// Emitted once when the last tracked body disappears.
    Absent { timestamp: CaptureTimestamp },
}

#[derive(Debug, Clone, Copy)]
pub enum FaceEvent<'a> {
    Present {
        faces: &'a FaceSet,
        frame_number: u64,
        timestamp: CaptureTimestamp,
        device_time: DeviceTime,
    },
    /// Emitted once when the last tracked face disappears.
    Absent { timestamp: CaptureTimestamp },
}

/// Receives saved frames of one modality.
///
/// Called on the capture thread with the context lock held: keep it short,
/// and never start or stop recording from inside.
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, event: &FrameEvent<'_>);
}

/// Receives compacted body sets.
///
/// Called on the acquisition thread while the recording manager and the body
/// context are locked: keep it short, and never start or stop recording from
/// inside.
pub trait BodyListener: Send + Sync {
    fn on_body_frame(&self, event: &BodyEvent<'_>);
}

/// Receives face sets from the face thread.
///
/// Called with the face context lock held: keep it short, and never start or
/// stop recording from inside.
pub trait FaceListener: Send + Sync {
    fn on_face_frame(&self, event: &FaceEvent<'_>);
}

impl<F> FrameListener for F
where
    F: Fn(&FrameEvent<'_>) + Send + Sync,
{
    fn on_frame(&self, event: &FrameEvent<'_>) {
        self(event)
    }
}

impl<F> BodyListener for F
where
    F: Fn(&BodyEvent<'_>) + Send + Sync,
{
    fn on_body_frame(&self, event: &BodyEvent<'_>) {
        self(event)
    }
}

impl<F> FaceListener for F
where
    F: Fn(&FaceEvent<'_>) + Send + Sync,
{
    fn on_face_frame(&self, event: &FaceEvent<'_>) {
        self(event)
    }
}

/// Per-modality observers. A missing listener means the frames are only recorded.
#[derive(Clone, Default)]
pub struct Listeners {
    color: Option<Arc<dyn FrameListener>>,
    infrared: Option<Arc<dyn FrameListener>>,
    long_exposure_infrared: Option<Arc<dyn FrameListener>>,
    depth: Option<Arc<dyn FrameListener>>,
    body_index: Option<Arc<dyn FrameListener>>,
    audio: Option<Arc<dyn FrameListener>>,
    body: Option<Arc<dyn BodyListener>>,
    face: Option<Arc<dyn FaceListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn frame_slot(&mut self, modality: Modality) -> Option<&mut Option<Arc<dyn FrameListener>>> {
        match modality {
            Modality::Color => Some(&mut self.color),
            Modality::Infrared => Some(&mut self.infrared),
            Modality::LongExposureInfrared => Some(&mut self.long_exposure_infrared),
            Modality::Depth => Some(&mut self.depth),
            Modality::BodyIndex => Some(&mut self.body_index),
            Modality::Audio => Some(&mut self.audio),
            Modality::Body | Modality::Face => None,
        }
    }

    /// Observe an image or audio modality. Body and face take their own listener types.
    pub fn with_frame_listener(mut self, modality: Modality, listener: Arc<dyn FrameListener>) -> Self {
        match self.frame_slot(modality) {
            Some(slot) => *slot = Some(listener),
            None => log::warn!("{} frames are delivered as record sets, listener ignored", modality),
        }
        self
    }

    pub fn with_body_listener(mut self, listener: Arc<dyn BodyListener>) -> Self {
        self.body = Some(listener);
        self
    }

    pub fn with_face_listener(mut self, listener: Arc<dyn FaceListener>) -> Self {
        self.face = Some(listener);
        self
    }

    pub fn frame_listener(&self, modality: Modality) -> Option<&Arc<dyn FrameListener>> {
        match modality {
            Modality::Color => self.color.as_ref(),
            Modality::Infrared => self.infrared.as_ref(),
            Modality::LongExposureInfrared => self.long_exposure_infrared.as_ref(),
            Modality::Depth => self.depth.as_ref(),
            Modality::BodyIndex => self.body_index.as_ref(),
            Modality::Audio => self.audio.as_ref(),
            Modality::Body | Modality::Face => None,
        }
    }

    pub fn body_listener(&self) -> Option<&Arc<dyn BodyListener>> {
        self.body.as_ref()
    }

    pub fn face_listener(&self) -> Option<&Arc<dyn FaceListener>> {
        self.face.as_ref()
    }

    pub fn notify_frame(&self, event: &FrameEvent<'_>) {
        if let Some(listener) = self.frame_listener(event.modality) {
            listener.on_frame(event);
        }
    }

    pub fn notify_bodies(&self, event: &BodyEvent<'_>) {
        if let Some(listener) = &self.body {
            listener.on_body_frame(event);
        }
    }

    pub fn notify_faces(&self, event: &FaceEvent<'_>) {
        if let Some(listener) = &self.face {
            listener.on_face_frame(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(modality: Modality) -> FrameEvent<'static> {
        FrameEvent {
            modality,
            buffer: &[1, 2, 3],
            width: 3,
            height: 1,
            format: modality.image_format(),
            frame_number: 9,
            timestamp: CaptureTimestamp::new(1, 0),
            device_time: 5,
        }
    }

    #[test]
    fn frames_reach_only_their_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listeners = Listeners::new().with_frame_listener(
            Modality::Depth,
            Arc::new(move |e: &FrameEvent<'_>| sink.lock().push((e.modality, e.frame_number))),
        );

        listeners.notify_frame(&event(Modality::Depth));
        listeners.notify_frame(&event(Modality::Color));

        assert_eq!(*seen.lock(), vec![(Modality::Depth, 9)]);
    }

    #[test]
    fn set_modalities_have_no_frame_listener() {
        let listeners = Listeners::new().with_frame_listener(Modality::Body, Arc::new(|_: &FrameEvent<'_>| {}));
        assert!(listeners.frame_listener(Modality::Body).is_none());
        assert!(listeners.body_listener().is_none());
    }

    #[test]
    fn absent_listeners_are_noops() {
        let listeners = Listeners::new();
        listeners.notify_frame(&event(Modality::Audio));
        listeners.notify_bodies(&BodyEvent::Absent {
            timestamp: CaptureTimestamp::new(0, 0),
        });
    }
}
