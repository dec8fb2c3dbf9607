//! Deterministic scene content.
//!
//! Everything here is a pure function of the frame tick, so a recording of a
//! synthetic session can be checked against the generator after the fact.

use std::f32::consts::TAU;
use std::time::Duration;

use rgbd_capture_core::layout::body::{BodyData, BodyFrame, BodySample, JOINT_COUNT, MAX_BODIES};
use rgbd_capture_core::layout::face::{FaceData, FACE_POINT_COUNT};
use rgbd_capture_core::layout::primitives::{
    CameraSpacePoint, Joint, JointOrientation, PixelPosition, PointF, RectI, Vector4,
};
use rgbd_capture_core::models::sources::{
    COLOR_BYTES_PER_PIXEL, COLOR_HEIGHT, COLOR_WIDTH, DEPTH_HEIGHT, DEPTH_WIDTH,
};
use rgbd_capture_core::{CameraIntrinsics, DeviceTime, FrameDescription, Modality, SourceSet};

/// Device ticks per second (100 ns units).
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Tracking ids are `BASE_TRACKING_ID + slot`.
pub const BASE_TRACKING_ID: u64 = 72_057_594_037_927_000;

const TRACKED: i32 = 2;

/// Knobs for the synthetic sensor.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Time between two frames of every stream (default: 33ms).
    pub frame_interval: Duration,

    /// Image resolutions are the native ones divided by this (default: 4).
    pub scale: usize,

    /// Frames between two changes of the tracked body set (default: 30).
    pub body_phase_frames: u64,

    /// Audio sub-frames delivered per audio frame (default: 2).
    pub audio_sub_frames: usize,

    /// Float samples per audio sub-frame (default: 256).
    pub samples_per_sub_frame: usize,

    /// Audio sample rate in Hz (default: 16000).
    pub sample_rate: u32,

    /// Sources whose readers fail to open.
    pub unavailable: SourceSet,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            scale: 4,
            body_phase_frames: 30,
            audio_sub_frames: 2,
            samples_per_sub_frame: 256,
            sample_rate: 16_000,
            unavailable: SourceSet::NONE,
        }
    }
}

/// Frame generator driven by a tick counter.
#[derive(Debug, Clone)]
pub struct Scene {
    config: SyntheticConfig,
}

impl Scene {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Frame tick reached after `elapsed`.
    pub fn tick_at(&self, elapsed: Duration) -> u64 {
        let interval = self.config.frame_interval.as_nanos().max(1);
        (elapsed.as_nanos() / interval) as u64
    }

    pub fn device_time(&self, tick: u64) -> DeviceTime {
        let interval = self.config.frame_interval.as_nanos() as i64;
        tick as i64 * interval / 100
    }

    fn scale(&self) -> usize {
        self.config.scale.max(1)
    }

    pub fn description(&self, modality: Modality) -> Option<FrameDescription> {
        let scale = self.scale();
        let (width, height, bytes_per_pixel, fov) = match modality {
            Modality::Color => (COLOR_WIDTH, COLOR_HEIGHT, COLOR_BYTES_PER_PIXEL, (84.1, 53.8, 91.9)),
            Modality::Depth | Modality::Infrared | Modality::LongExposureInfrared => {
                (DEPTH_WIDTH, DEPTH_HEIGHT, 2, (70.6, 60.0, 89.5))
            }
            Modality::BodyIndex => (DEPTH_WIDTH, DEPTH_HEIGHT, 1, (70.6, 60.0, 89.5)),
            Modality::Body | Modality::Face | Modality::Audio => return None,
        };
        let (width, height) = ((width / scale) as u32, (height / scale) as u32);
        Some(FrameDescription {
            width,
            height,
            horizontal_fov: fov.0,
            vertical_fov: fov.1,
            diagonal_fov: fov.2,
            length_in_pixels: width * height,
            bytes_per_pixel: bytes_per_pixel as u32,
        })
    }

    /// Pixel data of an image modality at `tick`.
    pub fn image(&self, modality: Modality, tick: u64) -> Option<(FrameDescription, Vec<u8>)> {
        let description = self.description(modality)?;
        let (width, height) = (description.width as usize, description.height as usize);
        let mut data = Vec::with_capacity(description.frame_bytes());

        match modality {
            Modality::Color => {
                // YUY2: luma ramps across the row, chroma held neutral
                for y in 0..height {
                    for x in 0..width {
                        data.push(((x + y) as u64 + tick) as u8);
                        data.push(128);
                    }
                }
            }
            Modality::BodyIndex => {
                let tracked = self.tracked_slots(tick);
                let band = width / MAX_BODIES;
                for _ in 0..height {
                    for x in 0..width {
                        let slot = (x / band.max(1)).min(MAX_BODIES - 1);
                        data.push(if tracked[slot] { slot as u8 } else { 0xff });
                    }
                }
            }
            _ => {
                let base: u16 = if modality == Modality::Depth { 500 } else { 1000 };
                for y in 0..height {
                    for x in 0..width {
                        let value = base + (((x + y) as u64 + tick) % 4000) as u16;
                        data.extend_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }
        Some((description, data))
    }

    /// Slots holding a tracked body at `tick`.
    ///
    /// Slot 1 is always tracked, slot 3 on even phases, slot 5 on every third
    /// phase. Slots 0, 2 and 4 stay empty.
    pub fn tracked_slots(&self, tick: u64) -> [bool; MAX_BODIES] {
        let phase = tick / self.config.body_phase_frames.max(1);
        let mut tracked = [false; MAX_BODIES];
        tracked[1] = true;
        tracked[3] = phase % 2 == 0;
        tracked[5] = phase % 3 == 0;
        tracked
    }

    pub fn tracking_id(slot: usize) -> u64 {
        BASE_TRACKING_ID + slot as u64
    }

    pub fn bodies(&self, tick: u64) -> BodyFrame {
        let mut frame = BodyFrame {
            relative_time: self.device_time(tick),
            ..Default::default()
        };
        for (slot, tracked) in self.tracked_slots(tick).into_iter().enumerate() {
            frame.slots[slot] = Some(BodySample {
                is_tracked: tracked,
                data: if tracked { self.body(slot, tick) } else { BodyData::default() },
            });
        }
        frame
    }

    fn body(&self, slot: usize, tick: u64) -> BodyData {
        let sway = (tick as f32 * 0.1).sin() * 0.05;
        let offset = slot as f32 * 0.4 - 1.0;
        let mut body = BodyData {
            engaged: 1,
            hands_tracking_confidence: [1, 1],
            hands_state: [2, 3],
            lean: PointF { x: sway, y: 0.0 },
            lean_tracking_state: TRACKED,
            tracking_id: Self::tracking_id(slot),
            ..Default::default()
        };
        for joint in 0..JOINT_COUNT {
            let height = 1.6 - joint as f32 * 0.06;
            body.joints[joint] = Joint {
                joint_type: joint as i32,
                position: CameraSpacePoint {
                    x: offset + sway,
                    y: height,
                    z: 2.5,
                },
                tracking_state: TRACKED,
            };
            body.joint_orientations[joint] = JointOrientation {
                joint_type: joint as i32,
                orientation: Vector4 {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    w: 1.0,
                },
            };
            body.joints_in_color_space[joint] = PixelPosition {
                x: 960.0 + (offset + sway) * 400.0,
                y: 540.0 - height * 300.0,
            };
            body.joints_in_depth_space[joint] = PixelPosition {
                x: 256.0 + (offset + sway) * 100.0,
                y: 212.0 - height * 80.0,
            };
        }
        body
    }

    /// Face of the body in `slot`, if that slot is tracked with `tracking_id` at `tick`.
    pub fn face(&self, slot: usize, tracking_id: u64, tick: u64) -> Option<FaceData> {
        if slot >= MAX_BODIES || !self.tracked_slots(tick)[slot] || tracking_id != Self::tracking_id(slot) {
            return None;
        }
        let center_x = 200 + slot as i32 * 250;
        let mut face = FaceData {
            tracking_id,
            rotation_quaternion: Vector4 {
                x: 0.0,
                y: (tick as f32 * 0.05).sin() * 0.1,
                z: 0.0,
                w: 1.0,
            },
            bounding_box_in_color_space: RectI {
                left: center_x - 60,
                top: 200,
                right: center_x + 60,
                bottom: 340,
            },
            bounding_box_in_infrared_space: RectI {
                left: center_x / 4 - 15,
                top: 50,
                right: center_x / 4 + 15,
                bottom: 85,
            },
            ..Default::default()
        };
        for point in 0..FACE_POINT_COUNT {
            let spread = point as f32 * 20.0 - 40.0;
            face.points_in_color_space[point] = PointF {
                x: center_x as f32 + spread,
                y: 260.0,
            };
            face.points_in_infrared_space[point] = PointF {
                x: center_x as f32 / 4.0 + spread / 4.0,
                y: 65.0,
            };
        }
        face.face_properties[0] = (tick % 2) as i32;
        Some(face)
    }

    /// Little-endian f32 sub-frames of a 440 Hz tone, continuous across ticks.
    pub fn audio(&self, tick: u64) -> Vec<Vec<u8>> {
        let per_sub_frame = self.config.samples_per_sub_frame;
        let sub_frames = self.config.audio_sub_frames;
        let rate = self.config.sample_rate.max(1) as f32;
        (0..sub_frames)
            .map(|part| {
                let first = (tick as usize * sub_frames + part) * per_sub_frame;
                (first..first + per_sub_frame)
                    .flat_map(|n| (0.25 * (TAU * 440.0 * n as f32 / rate).sin()).to_le_bytes())
                    .collect()
            })
            .collect()
    }

    pub fn depth_intrinsics(&self) -> CameraIntrinsics {
        let scale = self.scale() as f32;
        CameraIntrinsics {
            focal_length_x: 365.5 / scale,
            focal_length_y: 365.5 / scale,
            principal_point_x: 257.0 / scale,
            principal_point_y: 206.0 / scale,
            radial_distortion_second_order: 0.091,
            radial_distortion_fourth_order: -0.271,
            radial_distortion_sixth_order: 0.094,
        }
    }
}
