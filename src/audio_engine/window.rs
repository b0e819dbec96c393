//! Overlapping-window energy accumulation.

use crate::audio_engine::config::WindowGeometry;
use crate::audio_engine::constants::MAX_CHANNELS;
use crate::audio_engine::energy_ring::EnergyRecord;

/// Collects squared K-weighted samples and emits one [`EnergyRecord`] per
/// completed window.
///
/// The first record is emitted once a full window has been seen, then one per
/// hop. Only the most recent window of squares is kept; the buffer is sized at
/// construction and never grows.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    channels: usize,
    window_frames: usize,
    hop_frames: usize,
    squares: Box<[f64]>,
    write_frame: usize,
    until_emit: usize,
}

impl WindowAccumulator {
    pub fn new(geometry: WindowGeometry, channels: usize) -> Self {
        assert!((1..=MAX_CHANNELS).contains(&channels));
        assert!(geometry.window_frames > 0 && geometry.hop_frames > 0);

        Self {
            channels,
            window_frames: geometry.window_frames,
            hop_frames: geometry.hop_frames,
            squares: vec![0.0; geometry.window_frames * channels].into_boxed_slice(),
            write_frame: 0,
            until_emit: geometry.window_frames,
        }
    }

    pub fn window_frames(&self) -> usize {
        self.window_frames
    }

    pub fn hop_frames(&self) -> usize {
        self.hop_frames
    }

    /// Adds one frame of filtered samples. Returns a record when a window
    /// completes.
    #[inline]
    pub fn push_frame(&mut self, frame: &[f64]) -> Option<EnergyRecord> {
        let base = self.write_frame * self.channels;
        for (slot, x) in self.squares[base..base + self.channels].iter_mut().zip(frame) {
            *slot = x * x;
        }
        self.write_frame = (self.write_frame + 1) % self.window_frames;

        self.until_emit -= 1;
        if self.until_emit > 0 {
            return None;
        }

        self.until_emit = self.hop_frames;
        Some(self.window_energy())
    }

    fn window_energy(&self) -> EnergyRecord {
        let mut sums = [0.0; MAX_CHANNELS];
        for frame in self.squares.chunks_exact(self.channels) {
            for (sum, square) in sums.iter_mut().zip(frame) {
                *sum += square;
            }
        }

        let inv_len = 1.0 / self.window_frames as f64;
        for sum in &mut sums[..self.channels] {
            *sum *= inv_len;
        }
        EnergyRecord::new(&sums[..self.channels])
    }

    /// Forgets all accumulated samples; the next record needs a full window.
    pub fn reset(&mut self) {
        self.squares.fill(0.0);
        self.write_frame = 0;
        self.until_emit = self.window_frames;
    }
}
