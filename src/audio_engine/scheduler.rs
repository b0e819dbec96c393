//! Transport state machine and session lifecycle.
//!
//! A session is built on play and discarded on stop. While it exists it is
//! split in two: the [`RenderProcessor`] handed to the caller for the audio
//! callback, and the [`ControlLoop`] kept here and driven by [`StreamScheduler::pump`].
//!
//! ```text
//! Stopped --play--> Playing --pause--> Paused --play--> Playing
//!    ^                 |                  |
//!    +------stop-------+-------stop-------+
//! ```
//!
//! Reset is valid while Playing or Paused and clears both meters without
//! leaving the current state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};

use rtrb::RingBuffer;

use crate::audio_engine::config::{
    DecayRate, MeasurementConfig, SessionConfig, StreamFormat, TargetLoudness,
};
use crate::audio_engine::constants::{
    COMMAND_QUEUE_CAPACITY, EVENT_QUEUE_CAPACITY, TELEMETRY_BACKLOG,
};
use crate::audio_engine::control::{ControlLoop, ControlStatus};
use crate::audio_engine::errors::{ConfigError, SessionError};
use crate::audio_engine::gain::GainState;
use crate::audio_engine::player::SourcePlayer;
use crate::audio_engine::render::{RenderProcessor, TransportFlags};
use crate::messages::{SampleBuffer, Telemetry};

/// Transport state of a [`StreamScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

struct Session {
    flags: Arc<TransportFlags>,
    control: ControlLoop,
}

/// Owns the configuration, the transport state and the control half of the
/// running session.
pub struct StreamScheduler {
    config: SessionConfig,
    format: StreamFormat,
    source: Option<SampleBuffer>,
    state: TransportState,
    session: Option<Session>,
    telemetry_tx: SyncSender<Telemetry>,
    telemetry_rx: Receiver<Telemetry>,
    backlog: VecDeque<Telemetry>,
    backlog_limit: usize,
    dropped_telemetry: u64,
}

impl StreamScheduler {
    /// Scheduler for externally supplied blocks of `format`.
    pub fn new(config: SessionConfig, format: StreamFormat) -> Result<Self, SessionError> {
        config.validate_for(&format)?;

        let (telemetry_tx, telemetry_rx) = mpsc::sync_channel(TELEMETRY_BACKLOG);
        Ok(Self {
            config,
            format,
            source: None,
            state: TransportState::Stopped,
            session: None,
            telemetry_tx,
            telemetry_rx,
            backlog: VecDeque::with_capacity(TELEMETRY_BACKLOG),
            backlog_limit: TELEMETRY_BACKLOG,
            dropped_telemetry: 0,
        })
    }

    /// Scheduler that plays `source`; the stream format follows the source.
    pub fn with_source(config: SessionConfig, source: SampleBuffer) -> Result<Self, SessionError> {
        let format = StreamFormat::new(source.sample_rate, source.channels)?;
        let mut scheduler = Self::new(config, format)?;
        scheduler.source = Some(source);
        Ok(scheduler)
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&SampleBuffer> {
        self.source.as_ref()
    }

    /// Starts or resumes playback.
    ///
    /// # Returns
    ///
    /// The render half of a freshly built session when starting from
    /// Stopped, `None` when resuming from Paused.
    pub fn play(&mut self) -> Result<Option<RenderProcessor>, SessionError> {
        match self.state {
            TransportState::Stopped => {
                let processor = self.build_session();
                self.state = TransportState::Playing;
                log::info!(
                    "Playback started ({} ch@{} Hz)",
                    self.format.channels(),
                    self.format.sample_rate()
                );
                Ok(Some(processor))
            }
            TransportState::Paused => {
                if let Some(session) = &self.session {
                    session.flags.set_paused(false);
                }
                self.state = TransportState::Playing;
                log::info!("Playback resumed");
                Ok(None)
            }
            TransportState::Playing => Err(self.invalid("play")),
        }
    }

    fn build_session(&mut self) -> RenderProcessor {
        let flags = Arc::new(TransportFlags::new(self.config.looping));
        let (command_tx, command_rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let (event_tx, event_rx) = RingBuffer::new(EVENT_QUEUE_CAPACITY);

        let player = self.source.clone().map(SourcePlayer::new);
        let processor = RenderProcessor::new(
            self.format,
            &self.config,
            flags.clone(),
            command_rx,
            event_tx,
            player,
        );
        let control = ControlLoop::new(
            self.format,
            &self.config,
            flags.clone(),
            command_tx,
            event_rx,
            self.telemetry_tx.clone(),
        );

        self.session = Some(Session { flags, control });
        processor
    }

    /// Holds playback; measurement state is kept.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state != TransportState::Playing {
            return Err(self.invalid("pause"));
        }

        if let Some(session) = &self.session {
            session.flags.set_paused(true);
        }
        self.state = TransportState::Paused;
        log::info!("Playback paused");
        Ok(())
    }

    /// Discards the session. The render half sees its rings abandoned and
    /// goes silent. Stopping while stopped does nothing.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            self.dropped_telemetry += session.control.dropped_telemetry();
            log::info!("Playback stopped");
        }
        self.state = TransportState::Stopped;
    }

    /// Clears both meters and returns the gain to its start value.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.state != TransportState::Stopped {
            if let Some(session) = &mut self.session {
                session.control.reset();
                return Ok(());
            }
        }
        Err(self.invalid("reset"))
    }

    /// Runs pending control-rate work. Stops the session when the source
    /// ended without looping.
    pub fn pump(&mut self) -> TransportState {
        let status = match &mut self.session {
            Some(session) => session.control.pump(),
            None => return self.state,
        };

        self.collect_telemetry();
        if status == ControlStatus::Finished {
            self.stop();
        }
        self.state
    }

    /// Moves published telemetry into the backlog, dropping the oldest
    /// entries beyond its limit.
    fn collect_telemetry(&mut self) {
        for telemetry in self.telemetry_rx.try_iter() {
            if self.backlog.len() == self.backlog_limit {
                self.backlog.pop_front();
                self.dropped_telemetry += 1;
            }
            self.backlog.push_back(telemetry);
        }
    }

    /// Telemetry published since the last poll, oldest first.
    ///
    /// At most [`TELEMETRY_BACKLOG`] entries are kept between polls; older
    /// ones are dropped.
    pub fn poll_telemetry(&mut self) -> Vec<Telemetry> {
        self.collect_telemetry();
        self.backlog.drain(..).collect()
    }

    /// Telemetry entries dropped because the host did not poll in time.
    pub fn dropped_telemetry(&self) -> u64 {
        let in_session = self
            .session
            .as_ref()
            .map_or(0, |session| session.control.dropped_telemetry());
        self.dropped_telemetry + in_session
    }

    /// Gain state at the current stream time, while a session exists.
    pub fn gain_state(&self) -> Option<GainState> {
        self.session.as_ref().map(|session| session.control.gain_state())
    }

    /// Stream time of the running session in seconds.
    pub fn stream_time(&self) -> Option<f64> {
        self.session.as_ref().map(|session| session.control.stream_time())
    }

    /// Input blocks skipped for a layout mismatch in this session.
    pub fn skipped_blocks(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |session| session.control.skipped_blocks())
    }

    pub fn set_target_loudness(&mut self, lkfs: f64) -> Result<(), ConfigError> {
        self.config.gain.target = TargetLoudness::new(lkfs)?;
        self.push_gain_settings();
        Ok(())
    }

    pub fn set_apply_correction(&mut self, enabled: bool) {
        self.config.gain.apply_correction = enabled;
        self.push_gain_settings();
    }

    pub fn set_decay_increase(&mut self, rate: DecayRate) {
        self.config.gain.decay_increase = rate;
        self.push_gain_settings();
    }

    pub fn set_decay_decrease(&mut self, rate: DecayRate) {
        self.config.gain.decay_decrease = rate;
        self.push_gain_settings();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.config.looping = looping;
        if let Some(session) = &self.session {
            session.flags.set_looping(looping);
        }
    }

    /// Replaces the live meter's windowing. Takes effect on the next play.
    pub fn set_measurement(&mut self, measurement: MeasurementConfig) -> Result<(), SessionError> {
        if self.state != TransportState::Stopped {
            return Err(self.invalid("change measurement"));
        }
        self.config.measurement = measurement;
        Ok(())
    }

    fn push_gain_settings(&mut self) {
        if let Some(session) = &mut self.session {
            session.control.set_gain_settings(self.config.gain);
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            state: self.state,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::config::ChannelWeights;

    const SAMPLE_RATE: u32 = 48_000;
    const BLOCK_FRAMES: usize = 4_096;

    fn sine(secs: f64, amplitude: f64) -> SampleBuffer {
        let frames = (f64::from(SAMPLE_RATE) * secs) as usize;
        let samples = (0..frames)
            .map(|n| {
                let t = n as f64 / f64::from(SAMPLE_RATE);
                (amplitude * (2.0 * std::f64::consts::PI * 997.0 * t).sin()) as f32
            })
            .collect();
        SampleBuffer::new(1, SAMPLE_RATE, samples)
    }

    fn short_history_config() -> SessionConfig {
        SessionConfig {
            measurement: MeasurementConfig::from_values(0.4, 0.75, 4.0).unwrap(),
            ..SessionConfig::default()
        }
    }

    /// Renders `blocks` blocks, pumping after each one. Returns the gain
    /// after every block.
    fn run(scheduler: &mut StreamScheduler, processor: &mut RenderProcessor, blocks: usize) -> Vec<f64> {
        let channels = scheduler.format().channels();
        let mut output = vec![0.0f32; BLOCK_FRAMES * channels];
        let mut gains = Vec::with_capacity(blocks);
        for _ in 0..blocks {
            processor.render(&mut output);
            scheduler.pump();
            gains.push(processor.gain());
        }
        gains
    }

    #[test]
    fn test_transport_state_machine() {
        let mut scheduler = StreamScheduler::with_source(SessionConfig::default(), sine(1.0, 0.1)).unwrap();
        assert_eq!(scheduler.state(), TransportState::Stopped);

        assert!(scheduler.pause().is_err());
        assert!(scheduler.reset().is_err());

        assert!(scheduler.play().unwrap().is_some());
        assert_eq!(scheduler.state(), TransportState::Playing);
        assert!(matches!(
            scheduler.play(),
            Err(SessionError::InvalidTransition {
                state: TransportState::Playing,
                action: "play"
            })
        ));

        scheduler.pause().unwrap();
        assert_eq!(scheduler.state(), TransportState::Paused);
        scheduler.reset().unwrap();
        assert_eq!(scheduler.state(), TransportState::Paused);

        assert!(scheduler.play().unwrap().is_none());
        assert_eq!(scheduler.state(), TransportState::Playing);

        scheduler.stop();
        assert_eq!(scheduler.state(), TransportState::Stopped);
        assert!(scheduler.gain_state().is_none());
        scheduler.stop();
        assert_eq!(scheduler.state(), TransportState::Stopped);
    }

    #[test]
    fn test_source_format_drives_stream_format() {
        let source = SampleBuffer::new(2, 44_100, vec![0.0; 44_100 * 2]);
        let scheduler = StreamScheduler::with_source(SessionConfig::default(), source).unwrap();

        assert_eq!(scheduler.format().sample_rate(), 44_100);
        assert_eq!(scheduler.format().channels(), 2);
    }

    #[test]
    fn test_weights_must_match_source_channels() {
        let config = SessionConfig {
            channel_weights: ChannelWeights::new(&[1.0, 1.0]).unwrap(),
            ..SessionConfig::default()
        };
        let result = StreamScheduler::with_source(config, sine(1.0, 0.1));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_end_to_end_gain_converges_toward_target() {
        let mut config = short_history_config();
        config.looping = false;
        config.gain.target = TargetLoudness::new(-30.0).unwrap();

        // 997 Hz at -20 dBFS for 10 s.
        let mut scheduler = StreamScheduler::with_source(config, sine(10.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        let blocks = 480_000 / BLOCK_FRAMES;
        let gains = run(&mut scheduler, &mut processor, blocks);
        let telemetry = scheduler.poll_telemetry();

        // At least 10 Hz of stream time.
        assert!(telemetry.len() >= 10 * blocks * BLOCK_FRAMES / 48_000);
        assert!(telemetry[0].live_gated_loudness.is_nan());

        // Stable from the first full window on.
        let measured: Vec<&Telemetry> = telemetry.iter().filter(|t| t.timestamp >= 0.5).collect();
        assert!(!measured.is_empty());
        for t in &measured {
            assert!(
                (t.live_gated_loudness - -23.01).abs() < 0.1,
                "unstable loudness {} at {}",
                t.live_gated_loudness,
                t.timestamp
            );
            assert_eq!(t.target_loudness, -30.0);
        }

        // Monotonic convergence toward startGain / 10^(dB/20).
        let last = measured[measured.len() - 1];
        let expected = 1.0 / 10f64.powf((last.live_gated_loudness - -30.0) / 20.0);
        assert!((last.target_gain - expected).abs() < 1e-9);
        for pair in gains.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-3, "gain rose from {} to {}", pair[0], pair[1]);
        }
        let final_gain = gains[gains.len() - 1];
        assert!((final_gain - expected).abs() < 1e-3, "final gain {final_gain}, expected {expected}");

        // The post-gain meter sees the corrected level.
        let post = last.post_gain_gated_loudness;
        assert!((post - -30.0).abs() < 0.2, "post-gain loudness {post}");
    }

    #[test]
    fn test_gain_state_follows_applied_gain() {
        let mut config = short_history_config();
        config.gain.target = TargetLoudness::new(-30.0).unwrap();
        let mut scheduler = StreamScheduler::with_source(config, sine(10.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        let channels = scheduler.format().channels();
        let mut output = vec![0.0f32; BLOCK_FRAMES * channels];
        for _ in 0..60 {
            processor.render(&mut output);
            scheduler.pump();
            let state = scheduler.gain_state().unwrap();
            assert!(
                (state.current_gain - processor.gain()).abs() < 1e-6,
                "reported {} applied {}",
                state.current_gain,
                processor.gain()
            );
        }
        assert!(processor.gain() < 0.9);
    }

    #[test]
    fn test_stop_then_play_matches_fresh_scheduler() {
        let trace = |scheduler: &mut StreamScheduler, processor: &mut RenderProcessor| {
            let gains = run(scheduler, processor, 25);
            let telemetry = scheduler.poll_telemetry();
            (gains, telemetry)
        };
        let mut config = short_history_config();
        config.gain.target = TargetLoudness::new(-30.0).unwrap();

        let mut fresh = StreamScheduler::with_source(config, sine(4.0, 0.1)).unwrap();
        let mut fresh_processor = fresh.play().unwrap().unwrap();
        let (fresh_gains, fresh_telemetry) = trace(&mut fresh, &mut fresh_processor);

        let mut reused = StreamScheduler::with_source(config, sine(4.0, 0.1)).unwrap();
        let mut old_processor = reused.play().unwrap().unwrap();
        run(&mut reused, &mut old_processor, 17);
        reused.stop();
        assert!(old_processor.is_disconnected());
        assert_eq!(reused.stream_time(), None);
        reused.poll_telemetry();

        let mut processor = reused.play().unwrap().unwrap();
        assert_eq!(processor.stream_frames(), 0);
        assert_eq!(processor.gain(), 1.0);
        let (gains, telemetry) = trace(&mut reused, &mut processor);

        assert_eq!(gains, fresh_gains);
        assert_eq!(telemetry.len(), fresh_telemetry.len());
        for (a, b) in telemetry.iter().zip(&fresh_telemetry) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!(
                (a.live_gated_loudness.is_nan() && b.live_gated_loudness.is_nan())
                    || a.live_gated_loudness == b.live_gated_loudness
            );
            assert!(
                (a.post_gain_gated_loudness.is_nan() && b.post_gain_gated_loudness.is_nan())
                    || a.post_gain_gated_loudness == b.post_gain_gated_loudness
            );
            assert_eq!(a.target_gain, b.target_gain);
            assert_eq!(a.output_level, b.output_level);
        }
    }

    #[test]
    fn test_unpolled_telemetry_keeps_newest_entries() {
        let mut scheduler = StreamScheduler::with_source(short_history_config(), sine(1.0, 0.1)).unwrap();
        scheduler.backlog_limit = 5;
        let mut processor = scheduler.play().unwrap().unwrap();

        // 24 blocks = 20 ticks.
        run(&mut scheduler, &mut processor, 24);
        let telemetry = scheduler.poll_telemetry();

        assert_eq!(telemetry.len(), 5);
        assert_eq!(scheduler.dropped_telemetry(), 15);
        assert!((telemetry[4].timestamp - 2.0).abs() < 1e-9);
        assert!((telemetry[0].timestamp - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_source_end_without_loop_stops_session() {
        let mut config = short_history_config();
        config.looping = false;
        let mut scheduler = StreamScheduler::with_source(config, sine(0.2, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        run(&mut scheduler, &mut processor, 3);

        assert_eq!(scheduler.state(), TransportState::Stopped);
        assert!(processor.is_disconnected());
    }

    #[test]
    fn test_looping_source_keeps_playing() {
        let mut scheduler = StreamScheduler::with_source(short_history_config(), sine(0.2, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        run(&mut scheduler, &mut processor, 10);
        assert_eq!(scheduler.state(), TransportState::Playing);
    }

    #[test]
    fn test_telemetry_rate_follows_stream_time() {
        let mut scheduler = StreamScheduler::with_source(short_history_config(), sine(1.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        // 24 blocks = 2.048 s.
        run(&mut scheduler, &mut processor, 24);
        let telemetry = scheduler.poll_telemetry();

        assert_eq!(telemetry.len(), 20);
        for (i, t) in telemetry.iter().enumerate() {
            assert!((t.timestamp - 0.1 * (i + 1) as f64).abs() < 1e-9);
        }
        assert!(scheduler.poll_telemetry().is_empty());
    }

    #[test]
    fn test_pause_freezes_stream_time() {
        let mut scheduler = StreamScheduler::with_source(short_history_config(), sine(1.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();
        run(&mut scheduler, &mut processor, 5);
        let before = scheduler.stream_time().unwrap();
        scheduler.poll_telemetry();

        scheduler.pause().unwrap();
        run(&mut scheduler, &mut processor, 5);

        assert_eq!(scheduler.stream_time().unwrap(), before);
        assert!(scheduler.poll_telemetry().is_empty());

        scheduler.play().unwrap();
        run(&mut scheduler, &mut processor, 5);
        assert!(scheduler.stream_time().unwrap() > before);
    }

    #[test]
    fn test_reset_clears_measurement_and_gain() {
        let mut config = short_history_config();
        config.gain.target = TargetLoudness::new(-40.0).unwrap();
        let mut scheduler = StreamScheduler::with_source(config, sine(10.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        run(&mut scheduler, &mut processor, 30);
        assert!(processor.gain() < 1.0);
        scheduler.poll_telemetry();

        scheduler.reset().unwrap();
        let state = scheduler.gain_state().unwrap();
        assert_eq!(state.current_gain, 1.0);

        // Not enough new audio for a full window yet.
        run(&mut scheduler, &mut processor, 2);
        assert_eq!(processor.gain(), 1.0);
        let telemetry = scheduler.poll_telemetry();
        assert!(!telemetry.is_empty());
        assert!(telemetry.iter().all(|t| t.live_gated_loudness.is_nan()));
        assert!(telemetry.iter().all(|t| t.post_gain_gated_loudness.is_nan()));
    }

    #[test]
    fn test_repeated_reset_matches_single_reset() {
        let trace = |resets: usize| {
            let mut scheduler = StreamScheduler::with_source(short_history_config(), sine(4.0, 0.1)).unwrap();
            let mut processor = scheduler.play().unwrap().unwrap();
            run(&mut scheduler, &mut processor, 8);
            for _ in 0..resets {
                scheduler.reset().unwrap();
            }
            scheduler.poll_telemetry();
            run(&mut scheduler, &mut processor, 20);
            scheduler
                .poll_telemetry()
                .into_iter()
                .map(|t| (t.live_gated_loudness, t.target_gain))
                .collect::<Vec<_>>()
        };

        let once = trace(1);
        let thrice = trace(3);
        assert_eq!(once.len(), thrice.len());
        for (a, b) in once.iter().zip(&thrice) {
            assert!((a.0.is_nan() && b.0.is_nan()) || a.0 == b.0);
            assert_eq!(a.1, b.1);
        }
    }

    #[test]
    fn test_channel_mismatch_is_skipped_and_flagged() {
        let format = StreamFormat::new(SAMPLE_RATE, 2).unwrap();
        let mut scheduler = StreamScheduler::new(short_history_config(), format).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        let mut mono = vec![0.1f32; BLOCK_FRAMES];
        processor.process(1, &mut mono);
        assert_eq!(scheduler.pump(), TransportState::Playing);
        assert_eq!(scheduler.skipped_blocks(), 1);
        assert_eq!(scheduler.stream_time(), Some(0.0));

        let mut stereo = vec![0.1f32; BLOCK_FRAMES * 2];
        processor.process(2, &mut stereo);
        scheduler.pump();
        assert!(scheduler.stream_time().unwrap() > 0.0);

        let mut partial = vec![0.1f32; 5];
        processor.process(2, &mut partial);
        scheduler.pump();
        assert_eq!(scheduler.skipped_blocks(), 2);
    }

    #[test]
    fn test_correction_off_returns_gain_to_unity() {
        let mut config = short_history_config();
        config.gain.target = TargetLoudness::new(-40.0).unwrap();
        let mut scheduler = StreamScheduler::with_source(config, sine(10.0, 0.1)).unwrap();
        let mut processor = scheduler.play().unwrap().unwrap();

        run(&mut scheduler, &mut processor, 20);
        assert!(processor.gain() < 1.0);

        scheduler.set_apply_correction(false);
        run(&mut scheduler, &mut processor, 3);
        assert_eq!(processor.gain(), 1.0);
    }

    #[test]
    fn test_setters_validate_and_persist() {
        let mut scheduler = StreamScheduler::with_source(SessionConfig::default(), sine(1.0, 0.1)).unwrap();

        assert!(scheduler.set_target_loudness(f64::NAN).is_err());
        scheduler.set_target_loudness(-16.0).unwrap();
        scheduler.set_decay_increase(DecayRate::new(0.5).unwrap());
        scheduler.set_decay_decrease(DecayRate::from_index(7).unwrap());
        scheduler.set_looping(false);

        let config = scheduler.config();
        assert_eq!(config.gain.target.lkfs(), -16.0);
        assert_eq!(config.gain.decay_increase.value(), 0.5);
        assert_eq!(config.gain.decay_decrease.value(), 10.0);
        assert!(!config.looping);

        scheduler.play().unwrap();
        assert!(scheduler.set_measurement(MeasurementConfig::monitor()).is_err());
        scheduler.stop();
        assert!(scheduler.set_measurement(MeasurementConfig::monitor()).is_ok());
    }
}
