//! Value types stored inside flat records.
//!
//! Every value is encoded little-endian and packed, with no alignment
//! padding between members.

use super::schema::FieldType;

/// A value that can be read from and written to a record field slot.
pub trait FieldValue: Copy {
    const TYPE: FieldType;

    /// Decode from exactly `Self::TYPE.size()` bytes.
    fn read(bytes: &[u8]) -> Self;

    /// Encode into exactly `Self::TYPE.size()` bytes.
    fn write(&self, out: &mut [u8]);
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn put(out: &mut [u8], at: usize, raw: [u8; 4]) {
    out[at..at + 4].copy_from_slice(&raw);
}

impl FieldValue for u8 {
    const TYPE: FieldType = FieldType::U8;

    fn read(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write(&self, out: &mut [u8]) {
        out[0] = *self;
    }
}

impl FieldValue for i32 {
    const TYPE: FieldType = FieldType::I32;

    fn read(bytes: &[u8]) -> Self {
        read_i32(bytes, 0)
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.to_le_bytes());
    }
}

impl FieldValue for u64 {
    const TYPE: FieldType = FieldType::U64;

    fn read(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(raw)
    }

    fn write(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_le_bytes());
    }
}

impl FieldValue for f32 {
    const TYPE: FieldType = FieldType::F32;

    fn read(bytes: &[u8]) -> Self {
        read_f32(bytes, 0)
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.to_le_bytes());
    }
}

/// 2D float point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl FieldValue for PointF {
    const TYPE: FieldType = FieldType::PointF;

    fn read(bytes: &[u8]) -> Self {
        Self {
            x: read_f32(bytes, 0),
            y: read_f32(bytes, 4),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.x.to_le_bytes());
        put(out, 4, self.y.to_le_bytes());
    }
}

/// Pixel coordinates of a joint projected in an image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPosition {
    pub x: f32,
    pub y: f32,
}

impl FieldValue for PixelPosition {
    const TYPE: FieldType = FieldType::PixelPosition;

    fn read(bytes: &[u8]) -> Self {
        Self {
            x: read_f32(bytes, 0),
            y: read_f32(bytes, 4),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.x.to_le_bytes());
        put(out, 4, self.y.to_le_bytes());
    }
}

/// Quaternion or homogeneous vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl FieldValue for Vector4 {
    const TYPE: FieldType = FieldType::Vector4;

    fn read(bytes: &[u8]) -> Self {
        Self {
            x: read_f32(bytes, 0),
            y: read_f32(bytes, 4),
            z: read_f32(bytes, 8),
            w: read_f32(bytes, 12),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.x.to_le_bytes());
        put(out, 4, self.y.to_le_bytes());
        put(out, 8, self.z.to_le_bytes());
        put(out, 12, self.w.to_le_bytes());
    }
}

/// Integer rectangle (left, top, right, bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectI {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl FieldValue for RectI {
    const TYPE: FieldType = FieldType::RectI;

    fn read(bytes: &[u8]) -> Self {
        Self {
            left: read_i32(bytes, 0),
            top: read_i32(bytes, 4),
            right: read_i32(bytes, 8),
            bottom: read_i32(bytes, 12),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.left.to_le_bytes());
        put(out, 4, self.top.to_le_bytes());
        put(out, 8, self.right.to_le_bytes());
        put(out, 12, self.bottom.to_le_bytes());
    }
}

/// 3D point in camera space, meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSpacePoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Skeleton joint: type, camera-space position, tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Joint {
    pub joint_type: i32,
    pub position: CameraSpacePoint,
    pub tracking_state: i32,
}

impl FieldValue for Joint {
    const TYPE: FieldType = FieldType::Joint;

    fn read(bytes: &[u8]) -> Self {
        Self {
            joint_type: read_i32(bytes, 0),
            position: CameraSpacePoint {
                x: read_f32(bytes, 4),
                y: read_f32(bytes, 8),
                z: read_f32(bytes, 12),
            },
            tracking_state: read_i32(bytes, 16),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.joint_type.to_le_bytes());
        put(out, 4, self.position.x.to_le_bytes());
        put(out, 8, self.position.y.to_le_bytes());
        put(out, 12, self.position.z.to_le_bytes());
        put(out, 16, self.tracking_state.to_le_bytes());
    }
}

/// Joint orientation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointOrientation {
    pub joint_type: i32,
    pub orientation: Vector4,
}

impl FieldValue for JointOrientation {
    const TYPE: FieldType = FieldType::JointOrientation;

    fn read(bytes: &[u8]) -> Self {
        Self {
            joint_type: read_i32(bytes, 0),
            orientation: Vector4::read(&bytes[4..20]),
        }
    }

    fn write(&self, out: &mut [u8]) {
        put(out, 0, self.joint_type.to_le_bytes());
        self.orientation.write(&mut out[4..20]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_encoding_is_packed_little_endian() {
        let joint = Joint {
            joint_type: 3,
            position: CameraSpacePoint { x: 1.0, y: -2.5, z: 0.25 },
            tracking_state: 2,
        };
        let mut raw = [0u8; 20];
        joint.write(&mut raw);
        assert_eq!(&raw[0..4], &3i32.to_le_bytes());
        assert_eq!(&raw[8..12], &(-2.5f32).to_le_bytes());
        assert_eq!(&raw[16..20], &2i32.to_le_bytes());
        assert_eq!(Joint::read(&raw), joint);
    }

    #[test]
    fn sizes_match_field_types() {
        assert_eq!(<Joint as FieldValue>::TYPE.size(), 20);
        assert_eq!(<JointOrientation as FieldValue>::TYPE.size(), 20);
        assert_eq!(<RectI as FieldValue>::TYPE.size(), 16);
        assert_eq!(<PointF as FieldValue>::TYPE.size(), 8);
    }
}
