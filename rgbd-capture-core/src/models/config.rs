use std::time::Duration;

use super::sources::SourceSet;

/// Configuration for a multi-source acquisition session.
#[derive(Debug, Clone)]
pub struct CaptureConfiguration {
    /// Requested modalities (default: depth + body).
    pub sources: SourceSet,

    /// Open `.raw` and `.desc` files next to the timestamp index (default: true).
    pub raw_recording: bool,

    /// Bounded wait for the acquisition thread to report init (default: 5s).
    pub init_timeout: Duration,

    /// Sleep when no frame-arrival event is pending (default: 1ms).
    pub idle_sleep: Duration,

    /// Sleep after a face pass that found no face (default: 5ms).
    pub face_idle_sleep: Duration,

    /// Capacity of the audio context buffer in bytes (default: 1 MiB).
    pub max_audio_frame_bytes: usize,
}

impl CaptureConfiguration {
    pub fn with_sources(sources: SourceSet) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("at least one data source must be selected".into());
        }
        if self.init_timeout.is_zero() {
            return Err("init timeout must be positive".into());
        }
        if self.max_audio_frame_bytes == 0 {
            return Err("audio buffer capacity must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sources: SourceSet::DEPTH | SourceSet::BODY,
            raw_recording: true,
            init_timeout: Duration::from_secs(5),
            idle_sleep: Duration::from_millis(1),
            face_idle_sleep: Duration::from_millis(5),
            max_audio_frame_bytes: 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CaptureConfiguration::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_sources() {
        let config = CaptureConfiguration::with_sources(SourceSet::NONE);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout_and_capacity() {
        let config = CaptureConfiguration {
            init_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfiguration {
            max_audio_frame_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
