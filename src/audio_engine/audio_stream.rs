//! Audio Stream Module
//!
//! This module handles CPAL audio stream management including:
//! - Logger setup
//! - Choosing an output format the device supports
//! - Moving the render processor into the real-time callback

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize,
    SupportedStreamConfigRange,
};
use env_logger::{Builder, Env};

use crate::audio_engine::config::StreamFormat;
use crate::audio_engine::constants::DEFAULT_BLOCK_FRAMES;
use crate::audio_engine::errors::StreamError;
use crate::audio_engine::render::RenderProcessor;

/// Handle to a running output stream.
///
/// Dropping it closes the device stream together with the render processor
/// it owns.
pub struct AudioStreamHandle {
    pub stream: Stream,
    pub format: StreamFormat,
}

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Default to `info`; override via `RUST_LOG`, e.g. `RUST_LOG=debug` for
    // per-tick loudness traces.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

fn default_device() -> Result<Device, StreamError> {
    cpal::default_host()
        .default_output_device()
        .ok_or(StreamError::NoDevice)
}

/// Format the default device will be opened at for a source of
/// `sample_rate` and `channels`.
///
/// The source's own format is kept when the device plays it as f32;
/// otherwise the device's default format is used and the source has to be
/// converted at load.
pub fn output_format(sample_rate: u32, channels: usize) -> Result<StreamFormat, StreamError> {
    let device = default_device()?;
    let ranges: Vec<_> = device.supported_output_configs()?.collect();

    if find_config(&ranges, channels, sample_rate).is_some() {
        return Ok(StreamFormat::new(sample_rate, channels)?);
    }

    let default = device.default_output_config()?;
    let format = StreamFormat::new(default.sample_rate(), usize::from(default.channels()))?;
    log::info!(
        "Device cannot play {} ch@{} Hz, using {} ch@{} Hz",
        channels,
        sample_rate,
        format.channels(),
        format.sample_rate()
    );
    Ok(format)
}

/// First f32 range covering the channel count and rate.
fn find_config(
    ranges: &[SupportedStreamConfigRange],
    channels: usize,
    sample_rate: u32,
) -> Option<&SupportedStreamConfigRange> {
    ranges.iter().find(|range| {
        range.sample_format() == SampleFormat::F32
            && usize::from(range.channels()) == channels
            && range.min_sample_rate() <= sample_rate
            && sample_rate <= range.max_sample_rate()
    })
}

/// Fixed block size when the device accepts it, else the device default.
fn buffer_size(supported: &SupportedBufferSize) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max }
            if (*min..=*max).contains(&DEFAULT_BLOCK_FRAMES) =>
        {
            BufferSize::Fixed(DEFAULT_BLOCK_FRAMES)
        }
        _ => BufferSize::Default,
    }
}

/// Create the output stream for a session.
///
/// This function:
/// 1. Sets up the default audio device
/// 2. Checks that it supports the session format as f32
/// 3. Moves `processor` into the audio callback
pub fn create_audio_stream(
    mut processor: RenderProcessor,
    format: StreamFormat,
) -> Result<AudioStreamHandle, StreamError> {
    setup_logger();

    let device = default_device()?;
    let ranges: Vec<_> = device.supported_output_configs()?.collect();
    let range = find_config(&ranges, format.channels(), format.sample_rate()).ok_or(
        StreamError::UnsupportedFormat {
            channels: format.channels(),
            sample_rate: format.sample_rate(),
        },
    )?;

    let stream_config = StreamConfig {
        channels: range.channels(),
        sample_rate: format.sample_rate(),
        buffer_size: buffer_size(range.buffer_size()),
    };
    log::info!(
        "Opening output stream... ({} ch@{} Hz, {:?})",
        format.channels(),
        format.sample_rate(),
        stream_config.buffer_size
    );

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            processor.render(data);
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(AudioStreamHandle { stream, format })
}

/// Start playing the audio stream
pub fn start_stream(stream: &Stream) -> Result<(), StreamError> {
    stream.play()?;
    Ok(())
}
