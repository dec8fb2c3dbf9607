//! Skeletal body records and the dense per-frame body set.

use crate::models::error::CaptureError;
use crate::models::frame::DeviceTime;

use super::arena::RecordArena;
use super::primitives::{Joint, JointOrientation, PixelPosition, PointF};
use super::registry::LayoutRegistry;
use super::schema::{field, FieldType, Schema};
use super::view::{RecordView, RecordViewMut};

/// Hardware body slots reported by the sensor.
pub const MAX_BODIES: usize = 6;

/// Joints per skeleton.
pub const JOINT_COUNT: usize = 25;

pub const BODY_SCHEMA: Schema = Schema {
    name: "body",
    fields: &[
        field("engaged", FieldType::I32, 1),
        field("hands_tracking_confidence", FieldType::I32, 2),
        field("hands_state", FieldType::I32, 2),
        field("lean", FieldType::PointF, 1),
        field("lean_tracking_state", FieldType::I32, 1),
        field("tracking_id", FieldType::U64, 1),
        field("is_restricted", FieldType::U8, 1),
        field("joints", FieldType::Joint, JOINT_COUNT),
        field("joint_orientations", FieldType::JointOrientation, JOINT_COUNT),
        field("joints_in_color_space", FieldType::PixelPosition, JOINT_COUNT),
        field("joints_in_depth_space", FieldType::PixelPosition, JOINT_COUNT),
        field("coordinate_mapper", FieldType::Handle, 1),
    ],
};

/// One tracked skeleton, decoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyData {
    pub engaged: i32,
    /// Left then right.
    pub hands_tracking_confidence: [i32; 2],
    /// Left then right.
    pub hands_state: [i32; 2],
    pub lean: PointF,
    pub lean_tracking_state: i32,
    pub tracking_id: u64,
    pub is_restricted: bool,
    pub joints: [Joint; JOINT_COUNT],
    pub joint_orientations: [JointOrientation; JOINT_COUNT],
    pub joints_in_color_space: [PixelPosition; JOINT_COUNT],
    pub joints_in_depth_space: [PixelPosition; JOINT_COUNT],
}

impl BodyData {
    pub fn encode(&self, view: &mut RecordViewMut<'_>) -> Result<(), CaptureError> {
        view.set("engaged", 0, self.engaged)?;
        view.set_all("hands_tracking_confidence", &self.hands_tracking_confidence)?;
        view.set_all("hands_state", &self.hands_state)?;
        view.set("lean", 0, self.lean)?;
        view.set("lean_tracking_state", 0, self.lean_tracking_state)?;
        view.set("tracking_id", 0, self.tracking_id)?;
        view.set("is_restricted", 0, u8::from(self.is_restricted))?;
        view.set_all("joints", &self.joints)?;
        view.set_all("joint_orientations", &self.joint_orientations)?;
        view.set_all("joints_in_color_space", &self.joints_in_color_space)?;
        view.set_all("joints_in_depth_space", &self.joints_in_depth_space)?;
        Ok(())
    }

    pub fn decode(view: &RecordView<'_>) -> Result<Self, CaptureError> {
        let mut body = BodyData {
            engaged: view.get("engaged", 0)?,
            lean: view.get("lean", 0)?,
            lean_tracking_state: view.get("lean_tracking_state", 0)?,
            tracking_id: view.get("tracking_id", 0)?,
            is_restricted: view.get::<u8>("is_restricted", 0)? != 0,
            ..Default::default()
        };
        for hand in 0..2 {
            body.hands_tracking_confidence[hand] = view.get("hands_tracking_confidence", hand)?;
            body.hands_state[hand] = view.get("hands_state", hand)?;
        }
        for joint in 0..JOINT_COUNT {
            body.joints[joint] = view.get("joints", joint)?;
            body.joint_orientations[joint] = view.get("joint_orientations", joint)?;
            body.joints_in_color_space[joint] = view.get("joints_in_color_space", joint)?;
            body.joints_in_depth_space[joint] = view.get("joints_in_depth_space", joint)?;
        }
        Ok(body)
    }
}

/// What the sensor reports for one hardware slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySample {
    pub is_tracked: bool,
    pub data: BodyData,
}

/// One body frame as delivered by the device: sparse, slot-indexed.
#[derive(Debug, Clone, Default)]
pub struct BodyFrame {
    pub relative_time: DeviceTime,
    pub slots: [Option<BodySample>; MAX_BODIES],
}

/// Tracked bodies of one frame, compacted into `0..len()`.
///
/// `initial_index(i)` gives the hardware slot the i-th dense body came from,
/// which keeps face searches attached to the same person while other slots
/// come and go.
#[derive(Debug, Clone)]
pub struct BodySet {
    records: RecordArena,
    present: [bool; MAX_BODIES],
}

impl BodySet {
    pub fn new() -> Self {
        Self {
            records: RecordArena::new(LayoutRegistry::global().body(), MAX_BODIES),
            present: [false; MAX_BODIES],
        }
    }

    /// Rebuild a set from recorded bytes. Slot origins are not recorded, so
    /// each body reports its dense index as its slot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CaptureError> {
        let records = RecordArena::from_bytes(LayoutRegistry::global().body(), MAX_BODIES, bytes)?;
        let mut present = [false; MAX_BODIES];
        for slot in records.origins() {
            present[*slot] = true;
        }
        Ok(Self { records, present })
    }

    /// Keep the tracked slots of `frame`, in slot order. Returns the dense count.
    pub fn compact(&mut self, frame: &BodyFrame) -> Result<usize, CaptureError> {
        self.clear();
        for (slot, sample) in frame.slots.iter().enumerate() {
            let Some(sample) = sample else {
                continue;
            };
            if !sample.is_tracked {
                continue;
            }
            self.records.push_with(slot, |view| sample.data.encode(view))?;
            self.present[slot] = true;
        }
        Ok(self.records.len())
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.present = [false; MAX_BODIES];
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn body(&self, index: usize) -> Result<BodyData, CaptureError> {
        let view = self
            .view(index)
            .ok_or_else(|| CaptureError::UnknownField(format!("body[{index}] of {}", self.len())))?;
        BodyData::decode(&view)
    }

    pub fn view(&self, index: usize) -> Option<RecordView<'_>> {
        self.records.view(index)
    }

    pub fn initial_index(&self, index: usize) -> Option<usize> {
        self.records.origin(index)
    }

    pub fn initial_indices(&self) -> &[usize] {
        self.records.origins()
    }

    /// Whether hardware `slot` held a tracked body.
    pub fn is_present(&self, slot: usize) -> bool {
        self.present.get(slot).copied().unwrap_or(false)
    }

    pub fn tracking_id(&self, index: usize) -> Option<u64> {
        self.view(index).and_then(|v| v.get::<u64>("tracking_id", 0).ok())
    }

    pub fn record_size(&self) -> usize {
        self.records.layout().size()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.records.as_bytes()
    }
}

impl Default for BodySet {
    fn default() -> Self {
        Self::new()
    }
}
