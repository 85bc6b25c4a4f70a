//! AIFF format utilities.
//!
//! Writes the fixed 54-byte provisional header for mono 32-bit PCM at
//! 44100 Hz, computes the size fields patched at finalize, and reads headers
//! back for verification.
//!
//! Layout:
//! ```text
//! [0-3]    "FORM"
//! [4-7]    form size (patched: 46 + 4N)
//! [8-11]   "AIFF"
//! [12-15]  "COMM"
//! [16-19]  18 (COMM body size)
//! [20-21]  1 (channels)
//! [22-25]  number of sample frames (patched: N)
//! [26-27]  32 (bits per sample)
//! [28-37]  sample rate, 80-bit extended
//! [38-41]  "SSND"
//! [42-45]  sound data size (patched: 4N + 8)
//! [46-49]  0 (offset)
//! [50-53]  0 (block size)
//! [54..]   big-endian i32 samples
//! ```

use crate::models::error::CaptureError;
use crate::processing::seekable_buffer::SeekableByteBuffer;

pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 32;
pub const SAMPLE_RATE: u32 = 44100;
pub const BYTES_PER_SAMPLE: u64 = (BITS_PER_SAMPLE / 8) as u64;

/// Size of the provisional header in bytes.
pub const AIFF_HEADER_SIZE: usize = 54;

const COMM_BODY_SIZE: u32 = 18;
const SSND_FIXED_FIELDS_SIZE: u32 = 8;
const CHUNK_HEADER_SIZE: u32 = 8;

/// Form size with no samples: "AIFF" tag + COMM chunk + SSND chunk header
/// and fixed fields.
const EMPTY_FORM_SIZE: u64 =
    4 + (CHUNK_HEADER_SIZE + COMM_BODY_SIZE + CHUNK_HEADER_SIZE + SSND_FIXED_FIELDS_SIZE) as u64;

/// Positions of the three size fields, recorded while the header is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOffsets {
    pub form_size: u64,
    pub num_sample_frames: u64,
    pub sound_data_size: u64,
}

/// Size fields derived from the total sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchValues {
    pub form_size: u32,
    pub num_sample_frames: u32,
    pub sound_data_size: u32,
}

impl PatchValues {
    /// Compute the three patched fields for `total_samples` samples.
    ///
    /// Fails if any value does not fit its 32-bit field.
    pub fn for_samples(total_samples: u64) -> Result<Self, CaptureError> {
        let data_bytes = total_samples
            .checked_mul(BYTES_PER_SAMPLE)
            .ok_or_else(|| too_large(total_samples))?;
        let fit = |v: u64| u32::try_from(v).map_err(|_| too_large(total_samples));

        Ok(Self {
            form_size: fit(EMPTY_FORM_SIZE + data_bytes)?,
            num_sample_frames: fit(total_samples)?,
            sound_data_size: fit(data_bytes + SSND_FIXED_FIELDS_SIZE as u64)?,
        })
    }
}

fn too_large(total_samples: u64) -> CaptureError {
    CaptureError::Patch(format!(
        "{} samples exceed the 32-bit AIFF size fields",
        total_samples
    ))
}

/// Total file length for `total_samples` samples.
pub fn file_length(total_samples: u64) -> u64 {
    AIFF_HEADER_SIZE as u64 + BYTES_PER_SAMPLE * total_samples
}

/// Encode an integer sample rate as an 80-bit IEEE 754 extended float,
/// big-endian: sign + 15-bit exponent, then a 64-bit mantissa with an
/// explicit integer bit.
pub fn encode_extended_f80(rate: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if rate == 0 {
        return out;
    }
    let msb = 31 - rate.leading_zeros();
    let exponent = 16383u16 + msb as u16;
    let mantissa = (rate as u64) << (63 - msb);

    out[0..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..10].copy_from_slice(&mantissa.to_be_bytes());
    out
}

/// Write the provisional header at the buffer's cursor (normally 0).
///
/// Size fields are written as zero placeholders; their positions are
/// returned so the patcher never duplicates the layout.
pub fn write_provisional_header(buffer: &mut SeekableByteBuffer) -> Result<PatchOffsets, CaptureError> {
    buffer.write_text("FORM")?;
    let form_size = buffer.position();
    buffer.write_bytes(&0u32.to_be_bytes())?;
    buffer.write_text("AIFF")?;

    // common chunk
    buffer.write_text("COMM")?;
    buffer.write_bytes(&COMM_BODY_SIZE.to_be_bytes())?;
    buffer.write_bytes(&CHANNELS.to_be_bytes())?;
    let num_sample_frames = buffer.position();
    buffer.write_bytes(&0u32.to_be_bytes())?;
    buffer.write_bytes(&BITS_PER_SAMPLE.to_be_bytes())?;
    buffer.write_bytes(&encode_extended_f80(SAMPLE_RATE))?;

    // sound data chunk
    buffer.write_text("SSND")?;
    let sound_data_size = buffer.position();
    buffer.write_bytes(&0u32.to_be_bytes())?;
    buffer.write_bytes(&0u32.to_be_bytes())?; // offset
    buffer.write_bytes(&0u32.to_be_bytes())?; // block size

    Ok(PatchOffsets {
        form_size,
        num_sample_frames,
        sound_data_size,
    })
}

/// Header fields read back from encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiffHeader {
    pub form_size: u32,
    pub comm_size: u32,
    pub channels: u16,
    pub num_sample_frames: u32,
    pub bits_per_sample: u16,
    pub sample_rate: [u8; 10],
    pub sound_data_size: u32,
    pub data_offset: u32,
    pub block_size: u32,
}

impl AiffHeader {
    /// Whether the patched sizes agree with each other and with `total_len`.
    pub fn is_consistent_with(&self, total_len: usize) -> bool {
        match PatchValues::for_samples(self.num_sample_frames as u64) {
            Ok(expected) => {
                expected.form_size == self.form_size
                    && expected.sound_data_size == self.sound_data_size
                    && file_length(self.num_sample_frames as u64) == total_len as u64
            }
            Err(_) => false,
        }
    }
}

/// Parse the fixed header layout written by [`write_provisional_header`].
pub fn parse_header(bytes: &[u8]) -> Result<AiffHeader, CaptureError> {
    if bytes.len() < AIFF_HEADER_SIZE {
        return Err(CaptureError::MalformedHeader(format!(
            "expected at least {} bytes, got {}",
            AIFF_HEADER_SIZE,
            bytes.len()
        )));
    }
    for (offset, tag) in [(0, b"FORM"), (8, b"AIFF"), (12, b"COMM"), (38, b"SSND")] {
        if &bytes[offset..offset + 4] != tag {
            return Err(CaptureError::MalformedHeader(format!(
                "missing {} tag at offset {}",
                String::from_utf8_lossy(tag),
                offset
            )));
        }
    }

    let u32_at = |o: usize| u32::from_be_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
    let u16_at = |o: usize| u16::from_be_bytes([bytes[o], bytes[o + 1]]);
    let mut sample_rate = [0u8; 10];
    sample_rate.copy_from_slice(&bytes[28..38]);

    Ok(AiffHeader {
        form_size: u32_at(4),
        comm_size: u32_at(16),
        channels: u16_at(20),
        num_sample_frames: u32_at(22),
        bits_per_sample: u16_at(26),
        sample_rate,
        sound_data_size: u32_at(42),
        data_offset: u32_at(46),
        block_size: u32_at(50),
    })
}
