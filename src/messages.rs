//! Message definitions for communication between the control path and the render path.
//!
//! This module defines the types that serve as the wire format for the lock-free rings between
//! the control thread and the real-time render callback, plus the telemetry handed to the host.
//! Everything that crosses into the render path is `Copy` and fixed-size, so pushing and popping
//! never allocates.

use std::sync::Arc;

use crate::audio_engine::energy_ring::EnergyRecord;
use crate::audio_engine::errors::BlockError;
use crate::audio_engine::gain::GainCommand;
use crate::audio_engine::level_meter::LevelReading;

/// Decoded, immutable source audio (interleaved).
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub channels: usize,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn new(channels: usize, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels,
            sample_rate,
            samples: Arc::from(samples.into_boxed_slice()),
        }
    }

    /// Number of whole frames.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// A borrowed interleaved block as delivered by a decoder or device callback.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    pub channels: usize,
    pub samples: &'a [f32],
}

impl<'a> AudioBlock<'a> {
    pub fn new(channels: usize, samples: &'a [f32]) -> Self {
        Self { channels, samples }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Identifies which of the two meters produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeterId {
    /// Measures the signal before gain correction; drives the controller.
    Live,
    /// Measures the signal after gain correction; display only.
    PostGain,
}

/// Message sent from the control path to the render path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    /// Start a new gain trajectory.
    Gain(GainCommand),
}

/// Message emitted from the render path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    /// A measurement window completed.
    ///
    /// `epoch` is the reset generation the render path was in when the
    /// window closed; records from older generations are discarded.
    /// `end_frame` is the stream frame count at which the window closed.
    Energy {
        meter: MeterId,
        epoch: u64,
        end_frame: u64,
        record: EnergyRecord,
    },

    /// A gain command took effect at the start of the block beginning at
    /// stream frame `stream_frames`, with the output gain at `start_gain`.
    GainApplied {
        command: GainCommand,
        stream_frames: u64,
        start_gain: f64,
    },

    /// Post-gain output level after a block.
    Level(LevelReading),

    /// A block was consumed; advances the stream clock.
    ///
    /// `stream_frames` counts every frame rendered since playback started, so
    /// a dropped event never loses stream time.
    BlockRendered { stream_frames: u64 },

    /// An input block was skipped because its layout did not match the
    /// session format.
    BlockSkipped(BlockError),

    /// A non-looping source ran out of frames.
    EndOfStream,
}

/// One control-tick sample for display collaborators.
///
/// Missing measurements are NaN, never omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    /// Stream time in seconds since playback started.
    pub timestamp: f64,
    pub live_gated_loudness: f64,
    pub post_gain_gated_loudness: f64,
    pub target_loudness: f64,
    pub target_gain: f64,
    /// Post-gain output level of the latest block.
    pub output_level: LevelReading,
    /// A post-gain sample reached the clip level within the clip lag.
    pub clipping: bool,
}
