use crate::processing::aiff_format::{CHANNELS, SAMPLE_RATE};

/// Default number of samples pulled from the capture source per read.
pub const DEFAULT_FRAME_SIZE: usize = 64;

/// Default byte capacity reserved for the encode buffer at start.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

const MAX_FRAME_SIZE: usize = 16384;

/// Configuration for a capture session.
///
/// The output format itself (mono, 32-bit PCM, 44100 Hz) is fixed; only the
/// delivery granularity and the initial buffer reservation are tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Samples per frame requested from the capture source (default: 64).
    pub frame_size: usize,

    /// Bytes reserved up front in the encode buffer (default: 1024).
    pub initial_capacity: usize,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_size == 0 {
            return Err("frame size must be positive".into());
        }
        if self.frame_size > MAX_FRAME_SIZE {
            return Err(format!("frame size too large: {}", self.frame_size));
        }
        Ok(())
    }

    /// Parameters handed to the capture source when opening the device.
    pub fn stream_parameters(&self) -> StreamParameters {
        StreamParameters {
            channels: CHANNELS,
            sample_rate: SAMPLE_RATE,
            frame_size: self.frame_size,
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

/// What a capture source is asked to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParameters {
    pub channels: u16,
    pub sample_rate: u32,
    pub frame_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = CaptureConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_size, 64);
    }

    #[test]
    fn rejects_zero_frame_size() {
        let config = CaptureConfiguration {
            frame_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_frames() {
        let config = CaptureConfiguration {
            frame_size: MAX_FRAME_SIZE + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn stream_parameters_are_fixed_format() {
        let params = CaptureConfiguration::default().stream_parameters();
        assert_eq!(params.channels, 1);
        assert_eq!(params.sample_rate, 44100);
        assert_eq!(params.frame_size, 64);
    }
}
