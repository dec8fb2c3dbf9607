//! Face records and the dense per-pass face set.

use crate::models::error::CaptureError;
use crate::models::frame::DeviceTime;

use super::arena::RecordArena;
use super::body::MAX_BODIES;
use super::primitives::{PointF, RectI, Vector4};
use super::registry::LayoutRegistry;
use super::schema::{field, FieldType, Schema};
use super::view::{RecordView, RecordViewMut};

/// Eyes, nose, mouth corners.
pub const FACE_POINT_COUNT: usize = 5;

/// Happy, engaged, glasses, eyes closed (l/r), mouth open, mouth moved, looking away.
pub const FACE_PROPERTY_COUNT: usize = 8;

pub const FACE_SCHEMA: Schema = Schema {
    name: "face",
    fields: &[
        field("tracking_id", FieldType::U64, 1),
        field("rotation_quaternion", FieldType::Vector4, 1),
        field("bounding_box_in_color_space", FieldType::RectI, 1),
        field("bounding_box_in_infrared_space", FieldType::RectI, 1),
        field("points_in_color_space", FieldType::PointF, FACE_POINT_COUNT),
        field("points_in_infrared_space", FieldType::PointF, FACE_POINT_COUNT),
        field("face_properties", FieldType::I32, FACE_PROPERTY_COUNT),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceData {
    pub tracking_id: u64,
    pub rotation_quaternion: Vector4,
    pub bounding_box_in_color_space: RectI,
    pub bounding_box_in_infrared_space: RectI,
    pub points_in_color_space: [PointF; FACE_POINT_COUNT],
    pub points_in_infrared_space: [PointF; FACE_POINT_COUNT],
    pub face_properties: [i32; FACE_PROPERTY_COUNT],
}

impl FaceData {
    pub fn encode(&self, view: &mut RecordViewMut<'_>) -> Result<(), CaptureError> {
        view.set("tracking_id", 0, self.tracking_id)?;
        view.set("rotation_quaternion", 0, self.rotation_quaternion)?;
        view.set("bounding_box_in_color_space", 0, self.bounding_box_in_color_space)?;
        view.set("bounding_box_in_infrared_space", 0, self.bounding_box_in_infrared_space)?;
        view.set_all("points_in_color_space", &self.points_in_color_space)?;
        view.set_all("points_in_infrared_space", &self.points_in_infrared_space)?;
        view.set_all("face_properties", &self.face_properties)?;
        Ok(())
    }

    pub fn decode(view: &RecordView<'_>) -> Result<Self, CaptureError> {
        let mut face = FaceData {
            tracking_id: view.get("tracking_id", 0)?,
            rotation_quaternion: view.get("rotation_quaternion", 0)?,
            bounding_box_in_color_space: view.get("bounding_box_in_color_space", 0)?,
            bounding_box_in_infrared_space: view.get("bounding_box_in_infrared_space", 0)?,
            ..Default::default()
        };
        for point in 0..FACE_POINT_COUNT {
            face.points_in_color_space[point] = view.get("points_in_color_space", point)?;
            face.points_in_infrared_space[point] = view.get("points_in_infrared_space", point)?;
        }
        for property in 0..FACE_PROPERTY_COUNT {
            face.face_properties[property] = view.get("face_properties", property)?;
        }
        Ok(face)
    }
}

/// Latest result of one face source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSample {
    /// False when the source lost the body it was searching for.
    pub tracking_id_valid: bool,
    pub relative_time: DeviceTime,
    pub data: FaceData,
}

/// Faces found during one pass over the face sources, densely packed.
#[derive(Debug, Clone)]
pub struct FaceSet {
    records: RecordArena,
}

impl FaceSet {
    pub fn new() -> Self {
        Self {
            records: RecordArena::new(LayoutRegistry::global().face(), MAX_BODIES),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CaptureError> {
        Ok(Self {
            records: RecordArena::from_bytes(LayoutRegistry::global().face(), MAX_BODIES, bytes)?,
        })
    }

    /// Append a face found for body `slot`; returns its dense index.
    pub fn push(&mut self, slot: usize, face: &FaceData) -> Result<usize, CaptureError> {
        self.records.push_with(slot, |view| face.encode(view))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn face(&self, index: usize) -> Result<FaceData, CaptureError> {
        let view = self
            .records
            .view(index)
            .ok_or_else(|| CaptureError::UnknownField(format!("face[{index}] of {}", self.len())))?;
        FaceData::decode(&view)
    }

    pub fn view(&self, index: usize) -> Option<RecordView<'_>> {
        self.records.view(index)
    }

    /// Body slot the i-th face was found for.
    pub fn initial_index(&self, index: usize) -> Option<usize> {
        self.records.origin(index)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.records.as_bytes()
    }
}

impl Default for FaceSet {
    fn default() -> Self {
        Self::new()
    }
}
