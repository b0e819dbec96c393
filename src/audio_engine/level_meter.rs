//! Output level meter with a clip indicator.
//!
//! Runs on the render path after the gain stage. Per channel it follows the
//! block RMS with instant attack and a slow release, and it remembers the
//! last stream frame at which any sample reached [`CLIP_LEVEL`]. Whether that
//! still counts as clipping is decided by the reader against a lag.

use crate::audio_engine::config::StreamFormat;
use crate::audio_engine::constants::{
    CLIP_LEVEL, LEVEL_AVERAGING, LEVEL_QUANTUM_FRAMES, MAX_CHANNELS,
};

/// Output level after one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    channels: usize,
    volume: [f32; MAX_CHANNELS],
    last_clip_frame: Option<u64>,
}

impl LevelReading {
    /// Reading before any audio was metered.
    pub fn silent(channels: usize) -> Self {
        Self {
            channels: channels.min(MAX_CHANNELS),
            volume: [0.0; MAX_CHANNELS],
            last_clip_frame: None,
        }
    }

    /// Smoothed RMS per channel.
    pub fn volume(&self) -> &[f32] {
        &self.volume[..self.channels]
    }

    /// Smoothed RMS of the loudest channel.
    pub fn peak_volume(&self) -> f32 {
        self.volume().iter().copied().fold(0.0, f32::max)
    }

    pub fn last_clip_frame(&self) -> Option<u64> {
        self.last_clip_frame
    }

    /// `true` while `frame` lies less than `lag_frames` after the last
    /// clipping sample.
    pub fn is_clipping_at(&self, frame: u64, lag_frames: u64) -> bool {
        self.last_clip_frame
            .is_some_and(|clip| clip <= frame && frame - clip < lag_frames)
    }
}

/// Render-side post-gain level meter.
#[derive(Debug, Clone)]
pub struct LevelMeter {
    channels: usize,
    volume: [f32; MAX_CHANNELS],
    last_clip_frame: Option<u64>,
}

impl LevelMeter {
    pub fn new(format: &StreamFormat) -> Self {
        Self {
            channels: format.channels(),
            volume: [0.0; MAX_CHANNELS],
            last_clip_frame: None,
        }
    }

    /// Meters an interleaved block whose first frame is stream frame
    /// `start_frame`.
    ///
    /// The release factor applies once per [`LEVEL_QUANTUM_FRAMES`], so the
    /// meter falls at the same speed whatever the block size.
    pub fn process(&mut self, samples: &[f32], start_frame: u64) -> LevelReading {
        let channels = self.channels;
        let frames = samples.len() / channels;
        if frames == 0 {
            return self.reading();
        }

        let mut sums = [0.0f32; MAX_CHANNELS];
        for (offset, frame) in samples.chunks_exact(channels).enumerate() {
            for (sum, &x) in sums.iter_mut().zip(frame) {
                if x.abs() >= CLIP_LEVEL {
                    self.last_clip_frame = Some(start_frame + offset as u64);
                }
                *sum += x * x;
            }
        }

        let release = LEVEL_AVERAGING.powf(frames as f32 / LEVEL_QUANTUM_FRAMES as f32);
        for (volume, sum) in self.volume[..channels].iter_mut().zip(&sums) {
            let rms = (sum / frames as f32).sqrt();
            *volume = rms.max(*volume * release);
        }

        self.reading()
    }

    pub fn reading(&self) -> LevelReading {
        LevelReading {
            channels: self.channels,
            volume: self.volume,
            last_clip_frame: self.last_clip_frame,
        }
    }
}
