use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::processing::aiff_format::{BITS_PER_SAMPLE, CHANNELS, SAMPLE_RATE};

/// Result returned when a capture session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    /// Finalized AIFF file contents.
    pub bytes: Vec<u8>,
    pub total_samples: u64,
    /// Audio length, `total_samples / 44100`.
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
}

impl RecordingResult {
    pub fn new(bytes: Vec<u8>, total_samples: u64, device_name: &str) -> Self {
        let duration_secs = total_samples as f64 / SAMPLE_RATE as f64;
        let metadata = RecordingMetadata::new_mono(&bytes, total_samples, duration_secs, device_name);
        Self {
            bytes,
            total_samples,
            duration_secs,
            metadata,
        }
    }
}

/// Metadata describing a finished recording.
///
/// Serializable for JSON export alongside the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub total_samples: u64,
    pub duration_secs: f64,
    pub byte_length: u64,
    /// SHA-256 of the AIFF bytes, lowercase hex.
    pub checksum: String,
}

impl RecordingMetadata {
    /// Creates metadata for a mono 32-bit 44.1 kHz recording.
    pub fn new_mono(bytes: &[u8], total_samples: u64, duration_secs: f64, device_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            device_name: device_name.to_string(),
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bits_per_sample: BITS_PER_SAMPLE,
            total_samples,
            duration_secs,
            byte_length: bytes.len() as u64,
            checksum: sha256_hex(bytes),
        }
    }

    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to serialize metadata: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("failed to parse metadata: {}", e)))
    }

    /// Whether `bytes` are the recording this metadata describes.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.byte_length == bytes.len() as u64 && self.checksum == sha256_hex(bytes)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn duration_from_sample_count() {
        let result = RecordingResult::new(vec![0; 54 + 4 * 44100], 44100, "test mic");
        assert_relative_eq!(result.duration_secs, 1.0);
        assert_relative_eq!(result.metadata.duration_secs, 1.0);
        assert_eq!(result.metadata.byte_length, 54 + 4 * 44100);
    }

    #[test]
    fn checksum_of_empty_input() {
        let metadata = RecordingMetadata::new_mono(&[], 0, 0.0, "mic");
        assert_eq!(
            metadata.checksum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matches_detects_changes() {
        let bytes = vec![1u8, 2, 3];
        let metadata = RecordingMetadata::new_mono(&bytes, 0, 0.0, "mic");
        assert!(metadata.matches(&bytes));
        assert!(!metadata.matches(&[1, 2, 4]));
        assert!(!metadata.matches(&[1, 2]));
    }

    #[test]
    fn json_round_trip() {
        let metadata = RecordingMetadata::new_mono(&[0; 54], 0, 0.0, "USB mic");
        let json = metadata.to_json().unwrap();
        assert!(json.contains("\"sample_rate\": 44100"));
        assert_eq!(RecordingMetadata::from_json(&json).unwrap(), metadata);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            RecordingMetadata::from_json("{"),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }
}
