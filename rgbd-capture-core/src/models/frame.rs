use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device-relative frame time, in the device's own ticks.
pub type DeviceTime = i64;

/// Wall-clock time at which a frame was consumed, at millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CaptureTimestamp {
    pub secs: i64,
    pub millis: u16,
}

impl CaptureTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self {
            secs: time.timestamp(),
            millis: time.timestamp_subsec_millis().min(999) as u16,
        }
    }

    pub fn new(secs: i64, millis: u16) -> Self {
        Self {
            secs,
            millis: millis.min(999),
        }
    }

    /// Seconds since the epoch as a float, used for frame-rate accounting.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + f64::from(self.millis) / 1000.0
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.secs, self.millis)
    }
}

/// Geometry of one frame as reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameDescription {
    pub width: u32,
    pub height: u32,
    pub horizontal_fov: f32,
    pub vertical_fov: f32,
    pub diagonal_fov: f32,
    pub length_in_pixels: u32,
    pub bytes_per_pixel: u32,
}

impl FrameDescription {
    /// Bytes of a full frame with this description.
    pub fn frame_bytes(&self) -> usize {
        self.length_in_pixels as usize * self.bytes_per_pixel as usize
    }
}

/// Depth camera intrinsics supplied by the sensor. Stored, never computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CameraIntrinsics {
    pub focal_length_x: f32,
    pub focal_length_y: f32,
    pub principal_point_x: f32,
    pub principal_point_y: f32,
    pub radial_distortion_second_order: f32,
    pub radial_distortion_fourth_order: f32,
    pub radial_distortion_sixth_order: f32,
}
