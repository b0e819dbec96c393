//! Source playback for the render path.
//!
//! [`SourcePlayer`] walks a decoded [`SampleBuffer`] frame by frame and either
//! wraps at the end or reports end of stream.

use crate::messages::SampleBuffer;

/// A decoded source with its current playback position.
#[derive(Debug, Clone)]
pub struct SourcePlayer {
    /// The sample buffer being played.
    sample: SampleBuffer,

    /// Current playback position in frames.
    frame_pos: usize,
}

impl SourcePlayer {
    pub fn new(sample: SampleBuffer) -> Self {
        Self {
            sample,
            frame_pos: 0,
        }
    }

    pub fn channels(&self) -> usize {
        self.sample.channels
    }

    pub fn frame_pos(&self) -> usize {
        self.frame_pos
    }

    /// Copies the next frames into `output` (interleaved, same channel count
    /// as the source).
    ///
    /// # Parameters
    ///
    /// - `output`: block to fill
    /// - `looping`: wrap to the first frame at the end of the source
    ///
    /// # Returns
    ///
    /// `true` when the source ran out without looping. The rest of the block
    /// is then silent.
    pub fn fill(&mut self, output: &mut [f32], looping: bool) -> bool {
        let channels = self.sample.channels;
        let total_frames = self.sample.frames();
        let out_frames = output.len() / channels;

        if total_frames == 0 {
            output.fill(0.0);
            return !looping;
        }

        let mut written = 0;
        while written < out_frames {
            if self.frame_pos >= total_frames {
                if !looping {
                    output[written * channels..].fill(0.0);
                    return true;
                }
                self.frame_pos = 0;
            }

            let frames = (total_frames - self.frame_pos).min(out_frames - written);
            let src = &self.sample.samples[self.frame_pos * channels..(self.frame_pos + frames) * channels];
            output[written * channels..(written + frames) * channels].copy_from_slice(src);

            self.frame_pos += frames;
            written += frames;
        }

        // A source that ends exactly on the block boundary is finished too.
        !looping && self.frame_pos >= total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_sample(channels: usize, frames: usize) -> SampleBuffer {
        let samples = (0..frames * channels).map(|i| i as f32).collect();
        SampleBuffer::new(channels, 48_000, samples)
    }

    #[test]
    fn test_fill_copies_frames_in_order() {
        let mut player = SourcePlayer::new(ramp_sample(2, 8));
        let mut block = [0.0f32; 6];

        assert!(!player.fill(&mut block, false));
        assert_eq!(block, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(player.frame_pos(), 3);
    }

    #[test]
    fn test_fill_wraps_when_looping() {
        let mut player = SourcePlayer::new(ramp_sample(1, 4));
        let mut block = [0.0f32; 6];

        assert!(!player.fill(&mut block, true));
        assert_eq!(block, [0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
        assert_eq!(player.frame_pos(), 2);
    }

    #[test]
    fn test_fill_pads_silence_at_end_without_loop() {
        let mut player = SourcePlayer::new(ramp_sample(1, 3));
        let mut block = [9.0f32; 5];

        assert!(player.fill(&mut block, false));
        assert_eq!(block, [0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_end_on_block_boundary_is_reported() {
        let mut player = SourcePlayer::new(ramp_sample(1, 4));
        let mut block = [0.0f32; 4];

        assert!(player.fill(&mut block, false));
        assert!(player.fill(&mut block, false));
        assert!(block.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_source_is_silent() {
        let mut player = SourcePlayer::new(ramp_sample(2, 0));
        let mut block = [1.0f32; 4];

        assert!(!player.fill(&mut block, true));
        assert!(block.iter().all(|&s| s == 0.0));
        assert!(player.fill(&mut block, false));
    }
}
