//! Per-frame timestamp index.
//!
//! One text line per saved event:
//! ```text
//! <epoch secs>.<millis> <frame number>[, <supplemental>], <device time>
//! ```

use std::fmt;
use std::str::FromStr;

use crate::models::error::CaptureError;
use crate::models::frame::{CaptureTimestamp, DeviceTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampLine {
    pub stamp: CaptureTimestamp,
    pub frame_number: u64,
    /// Record count for body/face, sample count for audio.
    pub supplemental: Option<u64>,
    pub device_time: DeviceTime,
}

impl fmt::Display for TimestampLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stamp, self.frame_number)?;
        if let Some(supplemental) = self.supplemental {
            write!(f, ", {}", supplemental)?;
        }
        write!(f, ", {}", self.device_time)
    }
}

fn malformed(line: &str) -> CaptureError {
    CaptureError::StorageError(format!("malformed timestamp line: {:?}", line))
}

impl FromStr for TimestampLine {
    type Err = CaptureError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end();
        let (stamp, rest) = line.split_once(' ').ok_or_else(|| malformed(line))?;
        let (secs, millis) = stamp.split_once('.').ok_or_else(|| malformed(line))?;
        let stamp = CaptureTimestamp::new(
            secs.parse().map_err(|_| malformed(line))?,
            millis.parse().map_err(|_| malformed(line))?,
        );

        let fields: Vec<&str> = rest.split(", ").collect();
        let (frame_number, supplemental, device_time) = match fields.as_slice() {
            [frame, device] => (*frame, None, *device),
            [frame, supplemental, device] => (*frame, Some(*supplemental), *device),
            _ => return Err(malformed(line)),
        };

        Ok(TimestampLine {
            stamp,
            frame_number: frame_number.parse().map_err(|_| malformed(line))?,
            supplemental: supplemental
                .map(|s| s.parse().map_err(|_| malformed(line)))
                .transpose()?,
            device_time: device_time.parse().map_err(|_| malformed(line))?,
        })
    }
}
