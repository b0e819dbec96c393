//! Audio Engine Module
//!
//! This module provides real-time loudness measurement and automatic gain
//! control. It is organized into sub-modules, each with a specific
//! responsibility:
//!
//! - [`k_weighting`]: BS.1770 pre-filter
//! - [`window`] and [`energy_ring`]: overlapping windows and their history
//! - [`gating`]: two-stage gated loudness
//! - [`meter`]: the above assembled into a meter
//! - [`gain`]: gain controller and render-side gain ramp
//! - [`level_meter`]: post-gain output level and clip indicator
//! - [`render`] and [`control`]: the two halves of a running session
//! - [`scheduler`]: transport state machine and session lifecycle
//! - [`audio_stream`]: CPAL output stream and device format selection
//! - [`sample_loader`]: audio file decoding and conversion to the device format
//!
//! The [`AudioEngine`] struct ties a decoded source, a scheduler and an
//! output device together.

use std::path::Path;

use crate::audio_engine::audio_stream::{
    AudioStreamHandle, create_audio_stream, output_format, start_stream,
};
use crate::audio_engine::config::{DecayRate, MeasurementConfig, SessionConfig, TargetLoudness};
use crate::audio_engine::errors::EngineError;
use crate::audio_engine::gain::GainState;
use crate::audio_engine::sample_loader::{conform_to_format, decode_audio_file};
use crate::audio_engine::scheduler::{StreamScheduler, TransportState};
use crate::messages::{SampleBuffer, Telemetry};

pub mod audio_stream;
pub mod config;
pub mod constants;
pub mod control;
pub mod energy_ring;
pub mod errors;
pub mod gain;
pub mod gating;
pub mod k_weighting;
pub mod level_meter;
pub mod meter;
pub mod player;
pub mod render;
pub mod sample_loader;
pub mod scheduler;
pub mod window;

/// Plays a decoded file through the default output device with automatic
/// loudness correction.
///
/// The host drives the control path by calling [`AudioEngine::pump`]
/// periodically (every few tens of milliseconds is plenty) and reads the
/// results with [`AudioEngine::poll_telemetry`].
pub struct AudioEngine {
    config: SessionConfig,
    scheduler: Option<StreamScheduler>,
    stream_handle: Option<AudioStreamHandle>,
}

impl AudioEngine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            scheduler: None,
            stream_handle: None,
        }
    }

    /// Decodes `path`, converts it to a format the output device plays and
    /// makes it the source of the next session.
    ///
    /// Any running session is stopped first. Returns the source duration in
    /// seconds.
    pub fn load_file(&mut self, path: &Path) -> Result<f64, EngineError> {
        let decoded = decode_audio_file(path)?;
        let format = output_format(decoded.sample_rate, decoded.channels)?;
        let sample = conform_to_format(decoded, &format)?;
        let duration = sample.duration_secs();
        self.load_buffer(sample)?;
        log::info!("Loaded {} ({:.2}s)", path.display(), duration);
        Ok(duration)
    }

    /// Makes an already decoded buffer the source of the next session.
    pub fn load_buffer(&mut self, sample: SampleBuffer) -> Result<(), EngineError> {
        self.stop();
        self.scheduler = Some(StreamScheduler::with_source(self.config, sample)?);
        Ok(())
    }

    fn scheduler_mut(&mut self) -> Result<&mut StreamScheduler, EngineError> {
        self.scheduler.as_mut().ok_or(EngineError::NoSource)
    }

    /// Starts playback, opening the output device on the first play after a
    /// stop.
    pub fn play(&mut self) -> Result<(), EngineError> {
        let scheduler = self.scheduler_mut()?;
        let format = scheduler.format();

        let Some(processor) = scheduler.play()? else {
            return Ok(());
        };

        let opened = create_audio_stream(processor, format)
            .and_then(|handle| start_stream(&handle.stream).map(|()| handle));
        match opened {
            Ok(handle) => {
                self.stream_handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.stop();
                Err(err.into())
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.scheduler_mut()?.pause()?;
        Ok(())
    }

    /// Discards the session and closes the output device.
    pub fn stop(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.stop();
        }
        self.stream_handle = None;
    }

    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.scheduler_mut()?.reset()?;
        Ok(())
    }

    /// Runs pending control-rate work. Closes the device when the session
    /// finished on its own.
    pub fn pump(&mut self) -> TransportState {
        let state = match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.pump(),
            None => TransportState::Stopped,
        };

        if state == TransportState::Stopped {
            self.stream_handle = None;
        }
        state
    }

    pub fn poll_telemetry(&mut self) -> Vec<Telemetry> {
        self.scheduler
            .as_mut()
            .map(StreamScheduler::poll_telemetry)
            .unwrap_or_default()
    }

    /// Seconds of audio played since the current session started, or `None`
    /// while stopped.
    pub fn current_play_time(&self) -> Option<f64> {
        self.scheduler.as_ref().and_then(StreamScheduler::stream_time)
    }

    pub fn state(&self) -> TransportState {
        self.scheduler
            .as_ref()
            .map_or(TransportState::Stopped, StreamScheduler::state)
    }

    pub fn gain_state(&self) -> Option<GainState> {
        self.scheduler.as_ref().and_then(StreamScheduler::gain_state)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_target_loudness(&mut self, lkfs: f64) -> Result<(), EngineError> {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_target_loudness(lkfs)?;
            self.config.gain = scheduler.config().gain;
        } else {
            self.config.gain.target = TargetLoudness::new(lkfs)?;
        }
        Ok(())
    }

    pub fn set_apply_correction(&mut self, enabled: bool) {
        self.config.gain.apply_correction = enabled;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_apply_correction(enabled);
        }
    }

    /// Sets the rising-gain rate in dB/s.
    pub fn set_decay_increase(&mut self, db_per_s: f64) -> Result<(), EngineError> {
        let rate = DecayRate::new(db_per_s)?;
        self.config.gain.decay_increase = rate;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_decay_increase(rate);
        }
        Ok(())
    }

    /// Sets the falling-gain rate in dB/s.
    pub fn set_decay_decrease(&mut self, db_per_s: f64) -> Result<(), EngineError> {
        let rate = DecayRate::new(db_per_s)?;
        self.config.gain.decay_decrease = rate;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_decay_decrease(rate);
        }
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.config.looping = looping;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_looping(looping);
        }
    }

    /// Replaces the live meter's windowing; only while stopped.
    pub fn set_measurement(&mut self, measurement: MeasurementConfig) -> Result<(), EngineError> {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_measurement(measurement)?;
        }
        self.config.measurement = measurement;
        Ok(())
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
