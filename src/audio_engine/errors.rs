//! Loudness engine error types.

use thiserror::Error;

use crate::audio_engine::scheduler::TransportState;

/// Errors raised while validating configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Value is not one of the enumerated choices for the parameter.
    #[error("unsupported {parameter}: {value} (allowed: {allowed:?})")]
    UnsupportedValue {
        /// Name of the parameter.
        parameter: &'static str,
        /// Rejected value.
        value: f64,
        /// Accepted values.
        allowed: &'static [f64],
    },

    /// Table index is outside the parameter table.
    #[error("{parameter} index out of range (expected 0..{len}, got {index})")]
    IndexOutOfRange {
        /// Name of the parameter.
        parameter: &'static str,
        /// Rejected index.
        index: usize,
        /// Table length.
        len: usize,
    },

    /// Target loudness is not finite or outside the accepted range.
    #[error("invalid target loudness: {0} LKFS")]
    InvalidTargetLoudness(f64),

    /// A channel weight is negative or not finite.
    #[error("invalid weight {weight} for channel {channel}")]
    InvalidChannelWeight {
        /// Channel index.
        channel: usize,
        /// Rejected weight.
        weight: f64,
    },

    /// Explicit channel weights do not cover the stream's channels.
    #[error("channel weights cover {weights} channels, stream has {channels}")]
    ChannelWeightCount {
        /// Number of configured weights.
        weights: usize,
        /// Number of stream channels.
        channels: usize,
    },

    /// Channel count is zero or above the supported maximum.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(usize),

    /// Sample rate is outside the supported range.
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),
}

/// Errors raised for a single block handed to a meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Block channel count differs from the configured one.
    #[error("channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch {
        /// Configured channel count.
        expected: usize,
        /// Channel count of the block.
        actual: usize,
    },

    /// Block length is not a whole number of frames.
    #[error("block of {samples} samples is not a whole number of {channels}-channel frames")]
    PartialFrame {
        /// Number of samples in the block.
        samples: usize,
        /// Channel count of the block.
        channels: usize,
    },
}

/// Errors raised by the stream scheduler.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Requested action is not valid in the current transport state.
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        /// Current transport state.
        state: TransportState,
        /// Rejected action.
        action: &'static str,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors that can occur while loading audio files.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    /// Failed to open the audio file.
    #[error("failed to open file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the audio file.
    #[error("failed to decode audio file: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Audio file has no default track.
    #[error("audio file has no default track")]
    NoDefaultTrack,

    /// Audio file is missing sample rate information.
    #[error("audio file is missing a sample rate")]
    MissingSampleRate,

    /// Audio file is missing channel information.
    #[error("audio file is missing channel information")]
    MissingChannels,

    /// One side of a channel mapping has no channels.
    #[error("cannot map {from} channels to {to} channels")]
    UnsupportedChannels { from: usize, to: usize },

    /// The resampler rejected the rate pair.
    #[error("failed to set up resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Resampling a chunk failed.
    #[error("failed to resample: {0}")]
    Resample(#[from] rubato::ResampleError),
}

/// Errors raised while opening the output device stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// No output device is available.
    #[error("no audio output device found")]
    NoDevice,

    /// Failed to list the device's output configurations.
    #[error("failed to query output configurations: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    /// Failed to read the device's default output configuration.
    #[error("failed to query default output configuration: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    /// The device cannot play f32 samples in this layout.
    #[error("device does not support {channels} ch@{sample_rate} Hz f32 output")]
    UnsupportedFormat { channels: usize, sample_rate: u32 },

    /// The device's own format is outside what the engine accepts.
    #[error(transparent)]
    Format(#[from] ConfigError),

    /// Failed to build the output stream.
    #[error("failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    /// Failed to start the output stream.
    #[error("failed to play audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Errors surfaced by the device-backed [`AudioEngine`](crate::audio_engine::AudioEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// No source has been loaded.
    #[error("no source loaded")]
    NoSource,

    /// Loading the source failed.
    #[error(transparent)]
    SampleLoad(#[from] SampleLoadError),

    /// Invalid configuration value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Output device failure.
    #[error(transparent)]
    Stream(#[from] StreamError),
}
