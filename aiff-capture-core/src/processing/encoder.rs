use log::debug;

use crate::models::error::CaptureError;
use crate::models::state::EncoderState;
use crate::processing::aiff_format::{self, PatchOffsets, PatchValues};
use crate::processing::seekable_buffer::{SeekMode, SeekableByteBuffer};

/// Incremental AIFF encoder.
///
/// Writes a provisional header, streams big-endian samples straight into the
/// buffer, and patches the three size fields once the sample count is known.
/// Owns no sample memory, only the running count and the header field
/// positions recorded by [`start`](Self::start).
#[derive(Debug)]
pub struct AiffEncoder {
    state: EncoderState,
    total_samples: u64,
    offsets: Option<PatchOffsets>,
    /// Where the next sample must land.
    data_end: u64,
}

impl AiffEncoder {
    pub fn new() -> Self {
        Self {
            state: EncoderState::Unstarted,
            total_samples: 0,
            offsets: None,
            data_end: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Number of individual samples appended so far.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Header field positions, available once the header is written.
    pub fn patch_offsets(&self) -> Option<PatchOffsets> {
        self.offsets
    }

    /// Write the provisional header at offset 0 of an empty buffer.
    /// Transitions: unstarted → header written.
    pub fn start(&mut self, buffer: &mut SeekableByteBuffer) -> Result<(), CaptureError> {
        if self.state != EncoderState::Unstarted {
            return Err(CaptureError::InvalidState(
                "encoder can only start once".into(),
            ));
        }
        if !buffer.is_empty() {
            return Err(CaptureError::HeaderWrite(format!(
                "buffer already holds {} bytes",
                buffer.len()
            )));
        }

        let offsets = buffer
            .seek(0, SeekMode::FromStart)
            .and_then(|_| aiff_format::write_provisional_header(buffer))
            .map_err(|e| CaptureError::HeaderWrite(e.to_string()))?;

        self.offsets = Some(offsets);
        self.data_end = buffer.position();
        self.state = EncoderState::HeaderWritten;
        debug!("AIFF header written ({} bytes)", self.data_end);
        Ok(())
    }

    /// Append `samples` as big-endian 32-bit PCM at the end of the data.
    pub fn append_samples(
        &mut self,
        buffer: &mut SeekableByteBuffer,
        samples: &[i32],
    ) -> Result<(), CaptureError> {
        if self.state != EncoderState::HeaderWritten {
            return Err(CaptureError::InvalidState(
                "samples can only be appended after start and before finalize".into(),
            ));
        }
        if buffer.position() != self.data_end {
            return Err(CaptureError::InvalidState(format!(
                "buffer cursor moved during capture: expected {}, found {}",
                self.data_end,
                buffer.position()
            )));
        }

        for (written, sample) in samples.iter().enumerate() {
            if let Err(e) = buffer.write_bytes(&sample.to_be_bytes()) {
                self.data_end = buffer.position();
                self.total_samples += written as u64;
                return Err(e);
            }
        }

        self.data_end = buffer.position();
        self.total_samples += samples.len() as u64;
        Ok(())
    }

    /// Patch form size, sample count, and sound data size.
    /// Transitions: header written → finalized.
    ///
    /// Calling again after finalize re-patches the same values. The cursor is
    /// left at the end of the data.
    pub fn finalize(&mut self, buffer: &mut SeekableByteBuffer) -> Result<PatchValues, CaptureError> {
        let offsets = match (self.state, self.offsets) {
            (EncoderState::HeaderWritten | EncoderState::Finalized, Some(offsets)) => offsets,
            _ => {
                return Err(CaptureError::InvalidState(
                    "cannot finalize before the header is written".into(),
                ))
            }
        };

        let values = PatchValues::for_samples(self.total_samples)?;
        patch_fields(buffer, &offsets, &values).map_err(|e| CaptureError::Patch(e.to_string()))?;

        self.state = EncoderState::Finalized;
        debug!(
            "AIFF header patched: {} samples, form size {}",
            self.total_samples, values.form_size
        );
        Ok(values)
    }
}

fn patch_fields(
    buffer: &mut SeekableByteBuffer,
    offsets: &PatchOffsets,
    values: &PatchValues,
) -> Result<(), CaptureError> {
    for (at, value) in [
        (offsets.form_size, values.form_size),
        (offsets.num_sample_frames, values.num_sample_frames),
        (offsets.sound_data_size, values.sound_data_size),
    ] {
        buffer.seek(at as i64, SeekMode::FromStart)?;
        buffer.write_bytes(&value.to_be_bytes())?;
    }
    buffer.seek(0, SeekMode::FromEnd)?;
    Ok(())
}

impl Default for AiffEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::aiff_format::{file_length, parse_header, AIFF_HEADER_SIZE};

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    fn started() -> (AiffEncoder, SeekableByteBuffer) {
        let mut buf = SeekableByteBuffer::with_capacity(1024);
        let mut encoder = AiffEncoder::new();
        encoder.start(&mut buf).unwrap();
        (encoder, buf)
    }

    #[test]
    fn start_writes_header() {
        let (encoder, buf) = started();
        assert_eq!(encoder.state(), EncoderState::HeaderWritten);
        assert_eq!(buf.len(), AIFF_HEADER_SIZE);
        assert_eq!(&buf.snapshot()[0..4], b"FORM");
    }

    #[test]
    fn start_twice_is_rejected() {
        let (mut encoder, mut buf) = started();
        assert!(matches!(encoder.start(&mut buf), Err(CaptureError::InvalidState(_))));
        assert_eq!(buf.len(), AIFF_HEADER_SIZE);
    }

    #[test]
    fn start_rejects_non_empty_buffer() {
        let mut buf = SeekableByteBuffer::new();
        buf.write_bytes(&[9, 9, 9]).unwrap();
        let mut encoder = AiffEncoder::new();

        assert!(matches!(encoder.start(&mut buf), Err(CaptureError::HeaderWrite(_))));
        assert_eq!(encoder.state(), EncoderState::Unstarted);
        assert_eq!(buf.snapshot(), &[9, 9, 9]);
    }

    #[test]
    fn start_writes_at_offset_zero_after_stray_seek() {
        let mut buf = SeekableByteBuffer::new();
        buf.seek(5, SeekMode::FromStart).unwrap();
        let mut encoder = AiffEncoder::new();
        encoder.start(&mut buf).unwrap();

        assert_eq!(buf.len(), AIFF_HEADER_SIZE);
        assert_eq!(&buf.snapshot()[0..4], b"FORM");
        let offsets = encoder.patch_offsets().unwrap();
        assert_eq!(offsets.form_size, 4);
        assert_eq!(offsets.num_sample_frames, 22);
        assert_eq!(offsets.sound_data_size, 42);
    }

    #[test]
    fn append_writes_straight_into_reserved_capacity() {
        let mut buf = SeekableByteBuffer::with_capacity(AIFF_HEADER_SIZE + 4 * 64);
        let capacity = buf.capacity();
        let mut encoder = AiffEncoder::new();
        encoder.start(&mut buf).unwrap();
        encoder.append_samples(&mut buf, &[3; 64]).unwrap();

        assert_eq!(buf.len(), AIFF_HEADER_SIZE + 4 * 64);
        assert_eq!(buf.capacity(), capacity);
    }

    #[test]
    fn append_before_start_is_rejected() {
        let mut buf = SeekableByteBuffer::new();
        let mut encoder = AiffEncoder::new();
        assert!(encoder.append_samples(&mut buf, &[1]).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn finalize_before_start_is_rejected() {
        let mut buf = SeekableByteBuffer::new();
        let mut encoder = AiffEncoder::new();
        assert!(matches!(encoder.finalize(&mut buf), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn samples_are_big_endian() {
        let (mut encoder, mut buf) = started();
        encoder.append_samples(&mut buf, &[1, -1, 0x01020304]).unwrap();

        let data = &buf.snapshot()[AIFF_HEADER_SIZE..];
        assert_eq!(data, &[0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3, 4]);
        assert_eq!(encoder.total_samples(), 3);
    }

    #[test]
    fn finalize_one_frame_of_64() {
        let (mut encoder, mut buf) = started();
        encoder.append_samples(&mut buf, &[7; 64]).unwrap();
        encoder.finalize(&mut buf).unwrap();

        let bytes = buf.snapshot();
        assert_eq!(u32_at(bytes, 4), 302);
        assert_eq!(u32_at(bytes, 22), 64);
        assert_eq!(u32_at(bytes, 42), 264);
        assert_eq!(bytes.len(), 310);
        assert_eq!(encoder.state(), EncoderState::Finalized);
    }

    #[test]
    fn finalize_empty_recording() {
        let (mut encoder, mut buf) = started();
        encoder.finalize(&mut buf).unwrap();

        let bytes = buf.snapshot();
        assert_eq!(u32_at(bytes, 4), 46);
        assert_eq!(u32_at(bytes, 22), 0);
        assert_eq!(u32_at(bytes, 42), 8);
        assert_eq!(bytes.len(), 54);
    }

    #[test]
    fn header_fields_match_for_various_counts() {
        for frames in [0usize, 1, 3, 17] {
            let (mut encoder, mut buf) = started();
            for i in 0..frames {
                let frame: Vec<i32> = (0..64).map(|s| (i * 64 + s) as i32).collect();
                encoder.append_samples(&mut buf, &frame).unwrap();
            }
            // a short trailing delivery
            encoder.append_samples(&mut buf, &[5, 6, 7]).unwrap();
            encoder.finalize(&mut buf).unwrap();

            let n = (frames * 64 + 3) as u64;
            let bytes = buf.snapshot();
            assert_eq!(u32_at(bytes, 4) as u64, 4 + 8 + 18 + 8 + 8 + 4 * n);
            assert_eq!(u32_at(bytes, 22) as u64, n);
            assert_eq!(u32_at(bytes, 42) as u64, 4 * n + 8);
            assert_eq!(bytes.len() as u64, file_length(n));

            let header = parse_header(bytes).unwrap();
            assert!(header.is_consistent_with(bytes.len()));
        }
    }

    #[test]
    fn finalize_twice_is_identical() {
        let (mut encoder, mut buf) = started();
        encoder.append_samples(&mut buf, &[42; 128]).unwrap();

        let first_values = encoder.finalize(&mut buf).unwrap();
        let first = buf.snapshot().to_vec();
        let second_values = encoder.finalize(&mut buf).unwrap();

        assert_eq!(first_values, second_values);
        assert_eq!(buf.snapshot(), first.as_slice());
    }

    #[test]
    fn finalize_leaves_cursor_at_end() {
        let (mut encoder, mut buf) = started();
        encoder.append_samples(&mut buf, &[1; 10]).unwrap();
        encoder.finalize(&mut buf).unwrap();
        assert_eq!(buf.position(), buf.len() as u64);
    }

    #[test]
    fn append_after_finalize_is_rejected() {
        let (mut encoder, mut buf) = started();
        encoder.finalize(&mut buf).unwrap();
        assert!(matches!(
            encoder.append_samples(&mut buf, &[1]),
            Err(CaptureError::InvalidState(_))
        ));
        assert_eq!(buf.len(), AIFF_HEADER_SIZE);
    }

    #[test]
    fn append_detects_moved_cursor() {
        let (mut encoder, mut buf) = started();
        encoder.append_samples(&mut buf, &[1; 4]).unwrap();
        buf.seek(0, SeekMode::FromStart).unwrap();

        assert!(matches!(
            encoder.append_samples(&mut buf, &[2; 4]),
            Err(CaptureError::InvalidState(_))
        ));
        assert_eq!(encoder.total_samples(), 4);
    }
}
