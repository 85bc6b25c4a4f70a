/// Regroups device callbacks into fixed-size mono i32 frames.
///
/// Device callbacks deliver whatever buffer size the host chooses, often
/// interleaved multi-channel. The capture session reads exactly
/// `frame_size` mono samples at a time, so deliveries are downmixed,
/// converted, and carried over until a full frame is available.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    pending: Vec<i32>,
}

impl FrameAssembler {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            pending: Vec::with_capacity(frame_size.max(1)),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples waiting for the next frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Push interleaved f32 samples in [-1, 1], returning any completed frames.
    pub fn push_f32(&mut self, samples: &[f32], channels: u16) -> Vec<Vec<i32>> {
        self.push_with(samples, channels, |frame| {
            let sum: f32 = frame.iter().sum();
            f32_to_i32(sum / frame.len() as f32)
        })
    }

    /// Push interleaved i16 samples, returning any completed frames.
    pub fn push_i16(&mut self, samples: &[i16], channels: u16) -> Vec<Vec<i32>> {
        self.push_with(samples, channels, |frame| {
            let sum: i64 = frame.iter().map(|&s| i16_to_i32(s) as i64).sum();
            (sum / frame.len() as i64) as i32
        })
    }

    /// Push interleaved i32 samples, returning any completed frames.
    pub fn push_i32(&mut self, samples: &[i32], channels: u16) -> Vec<Vec<i32>> {
        self.push_with(samples, channels, |frame| {
            let sum: i64 = frame.iter().map(|&s| s as i64).sum();
            (sum / frame.len() as i64) as i32
        })
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn push_with<T>(
        &mut self,
        samples: &[T],
        channels: u16,
        downmix: impl Fn(&[T]) -> i32,
    ) -> Vec<Vec<i32>> {
        let channels = channels.max(1) as usize;
        let mut frames = Vec::new();
        for interleaved in samples.chunks_exact(channels) {
            self.pending.push(downmix(interleaved));
            if self.pending.len() == self.frame_size {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                frames.push(full);
            }
        }
        frames
    }
}

/// Convert a float sample in [-1, 1] to full-scale i32 PCM, clamping.
pub fn f32_to_i32(sample: f32) -> i32 {
    let clamped = sample.clamp(-1.0, 1.0) as f64;
    (clamped * i32::MAX as f64).round() as i32
}

/// Widen an i16 sample to full-scale i32 PCM.
pub fn i16_to_i32(sample: i16) -> i32 {
    (sample as i32) << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_full_scale() {
        assert_eq!(f32_to_i32(0.0), 0);
        assert_eq!(f32_to_i32(1.0), i32::MAX);
        assert_eq!(f32_to_i32(-1.0), -i32::MAX);
        assert_eq!(f32_to_i32(2.5), i32::MAX);
        assert_eq!(f32_to_i32(-7.0), -i32::MAX);
        approx::assert_relative_eq!(f32_to_i32(0.5) as f64, i32::MAX as f64 / 2.0, epsilon = 1.0);
    }

    #[test]
    fn i16_widening() {
        assert_eq!(i16_to_i32(1), 1 << 16);
        assert_eq!(i16_to_i32(-1), -(1 << 16));
        assert_eq!(i16_to_i32(i16::MIN), i32::MIN);
    }

    #[test]
    fn small_deliveries_accumulate() {
        let mut assembler = FrameAssembler::new(4);
        assert!(assembler.push_i32(&[1, 2, 3], 1).is_empty());
        assert_eq!(assembler.pending_len(), 3);

        let frames = assembler.push_i32(&[4, 5], 1);
        assert_eq!(frames, vec![vec![1, 2, 3, 4]]);
        assert_eq!(assembler.pending_len(), 1);
    }

    #[test]
    fn large_delivery_splits_into_frames() {
        let mut assembler = FrameAssembler::new(64);
        let samples: Vec<i32> = (0..200).collect();
        let frames = assembler.push_i32(&samples, 1);

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 64));
        assert_eq!(frames[2][63], 191);
        assert_eq!(assembler.pending_len(), 8);
    }

    #[test]
    fn stereo_is_downmixed() {
        let mut assembler = FrameAssembler::new(2);
        let frames = assembler.push_i32(&[10, 20, -4, 4], 2);
        assert_eq!(frames, vec![vec![15, 0]]);
    }

    #[test]
    fn float_stereo_is_downmixed_and_converted() {
        let mut assembler = FrameAssembler::new(1);
        let frames = assembler.push_f32(&[1.0, 0.0], 2);
        assert_eq!(frames.len(), 1);
        approx::assert_relative_eq!(frames[0][0] as f64, i32::MAX as f64 / 2.0, epsilon = 1.0);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut assembler = FrameAssembler::new(8);
        assembler.push_i16(&[1, 2, 3], 1);
        assembler.reset();
        assert_eq!(assembler.pending_len(), 0);
    }
}
