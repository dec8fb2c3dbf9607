use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::models::frame::FrameDescription;

/// The one-line JSON record written to `<prefix>.desc` when a recording stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamDescription {
    pub frame_type: String,
    pub width: u32,
    pub height: u32,
    pub horizontal_field_of_view: f32,
    pub vertical_field_of_view: f32,
    pub diagonal_field_of_view: f32,
    pub frame_length_in_pixels: u32,
    pub bytes_per_pixel: u32,
    pub event_frame_rate: f32,
}

impl StreamDescription {
    pub fn new(frame_type: &str, description: &FrameDescription, event_frame_rate: f32) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            width: description.width,
            height: description.height,
            horizontal_field_of_view: description.horizontal_fov,
            vertical_field_of_view: description.vertical_fov,
            diagonal_field_of_view: description.diagonal_fov,
            frame_length_in_pixels: description.length_in_pixels,
            bytes_per_pixel: description.bytes_per_pixel,
            event_frame_rate,
        }
    }

    pub fn frame_description(&self) -> FrameDescription {
        FrameDescription {
            width: self.width,
            height: self.height,
            horizontal_fov: self.horizontal_field_of_view,
            vertical_fov: self.vertical_field_of_view,
            diagonal_fov: self.diagonal_field_of_view,
            length_in_pixels: self.frame_length_in_pixels,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }

    /// Write the record as a single line.
    pub fn write_line<W: Write>(&self, out: &mut W) -> Result<(), CaptureError> {
        let json = serde_json::to_string(self)
            .map_err(|e| CaptureError::StorageError(format!("failed to encode description: {}", e)))?;
        writeln!(out, "{}", json)
            .map_err(|e| CaptureError::StorageError(format!("failed to write description: {}", e)))
    }

    /// Read the first record of a `.desc` file.
    pub fn read(path: &Path) -> Result<Self, CaptureError> {
        let text = fs::read_to_string(path)
            .map_err(|e| CaptureError::StorageError(format!("failed to read {}: {}", path.display(), e)))?;
        let first = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| CaptureError::StorageError(format!("{} is empty", path.display())))?;
        serde_json::from_str(first)
            .map_err(|e| CaptureError::StorageError(format!("failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth() -> FrameDescription {
        FrameDescription {
            width: 512,
            height: 424,
            horizontal_fov: 70.6,
            vertical_fov: 60.0,
            diagonal_fov: 89.5,
            length_in_pixels: 512 * 424,
            bytes_per_pixel: 2,
        }
    }

    #[test]
    fn serializes_pascal_case_on_one_line() {
        let mut out = Vec::new();
        StreamDescription::new("UINT16", &depth(), 30.0).write_line(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("{\"FrameType\":\"UINT16\",\"Width\":512,\"Height\":424,"));
        assert!(text.contains("\"FrameLengthInPixels\":217088"));
        assert!(text.contains("\"EventFrameRate\":30.0"));
    }

    #[test]
    fn reads_back_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.desc");
        let mut file = fs::File::create(&path).unwrap();
        StreamDescription::new("UINT16", &depth(), 29.5).write_line(&mut file).unwrap();

        let read = StreamDescription::read(&path).unwrap();
        assert_eq!(read.frame_description(), depth());
        approx::assert_relative_eq!(read.event_frame_rate, 29.5);
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.desc");
        fs::write(&path, "\n").unwrap();
        assert!(StreamDescription::read(&path).is_err());
    }
}
