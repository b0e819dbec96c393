//! Block-rate processing on the real-time render path.
//!
//! The [`RenderProcessor`] owns everything the audio callback touches: the
//! source player, both meter front ends and the gain ramp. It talks to the
//! control path only through lock-free `rtrb` rings and the atomics in
//! [`TransportFlags`]; nothing here blocks, allocates or logs.
//!
//! Per block:
//! 1. Output silence if the control side is gone or playback is paused.
//! 2. Pick up a pending reset (epoch change) and new gain commands.
//! 3. Measure the live signal, apply the gain, measure the result and its
//!    output level.
//! 4. Report the new stream position.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::Sample;
use rtrb::{Consumer, Producer};

use crate::audio_engine::config::{MeasurementConfig, SessionConfig, StreamFormat};
use crate::audio_engine::gain::GainRamp;
use crate::audio_engine::level_meter::LevelMeter;
use crate::audio_engine::meter::{MeterFrontEnd, check_block};
use crate::audio_engine::player::SourcePlayer;
use crate::messages::{AudioBlock, MeterId, RenderCommand, RenderEvent};

/// Transport state shared between the control and render paths.
#[derive(Debug)]
pub struct TransportFlags {
    paused: AtomicBool,
    looping: AtomicBool,
    reset_epoch: AtomicU64,
    dropped_events: AtomicU64,
}

impl TransportFlags {
    pub fn new(looping: bool) -> Self {
        Self {
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(looping),
            reset_epoch: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    /// Current reset generation.
    pub fn epoch(&self) -> u64 {
        self.reset_epoch.load(Ordering::Acquire)
    }

    /// Starts a new reset generation and returns it.
    pub fn request_reset(&self) -> u64 {
        self.reset_epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn record_dropped(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns and clears the number of events dropped on a full ring.
    pub fn take_dropped_events(&self) -> u64 {
        self.dropped_events.swap(0, Ordering::Relaxed)
    }
}

/// Full-ring policy: drop the newest event and count it.
#[inline]
fn push_event(events: &mut Producer<RenderEvent>, flags: &TransportFlags, event: RenderEvent) {
    if events.push(event).is_err() {
        flags.record_dropped();
    }
}

/// Render-side half of a playback session.
pub struct RenderProcessor {
    format: StreamFormat,
    flags: Arc<TransportFlags>,
    commands: Consumer<RenderCommand>,
    events: Producer<RenderEvent>,
    player: Option<SourcePlayer>,
    live: MeterFrontEnd,
    post_gain: MeterFrontEnd,
    level: LevelMeter,
    ramp: GainRamp,
    epoch: u64,
    stream_frames: u64,
    finished: bool,
}

impl RenderProcessor {
    pub fn new(
        format: StreamFormat,
        config: &SessionConfig,
        flags: Arc<TransportFlags>,
        commands: Consumer<RenderCommand>,
        events: Producer<RenderEvent>,
        player: Option<SourcePlayer>,
    ) -> Self {
        let epoch = flags.epoch();
        Self {
            format,
            flags,
            commands,
            events,
            player,
            live: MeterFrontEnd::new(&format, &config.measurement),
            post_gain: MeterFrontEnd::new(&format, &MeasurementConfig::monitor()),
            level: LevelMeter::new(&format),
            ramp: GainRamp::new(format.sample_rate()),
            epoch,
            stream_frames: 0,
            finished: false,
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Frames rendered since playback started.
    pub fn stream_frames(&self) -> u64 {
        self.stream_frames
    }

    /// Current output gain.
    pub fn gain(&self) -> f64 {
        self.ramp.gain()
    }

    /// `true` once the control side has dropped its ring ends.
    pub fn is_disconnected(&self) -> bool {
        self.events.is_abandoned()
    }

    fn is_idle(&self) -> bool {
        self.is_disconnected() || self.flags.is_paused() || self.finished
    }

    fn sync_control(&mut self) {
        let epoch = self.flags.epoch();
        if epoch != self.epoch {
            self.live.reset();
            self.post_gain.reset();
            self.epoch = epoch;
        }

        while let Ok(command) = self.commands.pop() {
            match command {
                RenderCommand::Gain(gain) => {
                    let start_gain = self.ramp.gain();
                    self.ramp.apply(gain);
                    push_event(
                        &mut self.events,
                        &self.flags,
                        RenderEvent::GainApplied {
                            command: gain,
                            stream_frames: self.stream_frames,
                            start_gain,
                        },
                    );
                }
            }
        }
    }

    /// Plays the next block of the source into `output`.
    ///
    /// Without a source the output is silent but still measured, so the
    /// stream clock keeps running.
    pub fn render(&mut self, output: &mut [f32]) {
        if self.is_idle() {
            output.fill(Sample::EQUILIBRIUM);
            return;
        }

        self.sync_control();

        let ended = match self.player.as_mut() {
            Some(player) => player.fill(output, self.flags.is_looping()),
            None => {
                output.fill(Sample::EQUILIBRIUM);
                false
            }
        };

        self.measure_and_apply(output);

        if ended {
            self.finished = true;
            push_event(&mut self.events, &self.flags, RenderEvent::EndOfStream);
        }
    }

    /// Measures an externally supplied interleaved block and applies the gain
    /// to it in place.
    ///
    /// A block with the wrong layout is skipped: it is silenced, reported to
    /// the control path and the stream clock does not advance.
    pub fn process(&mut self, channels: usize, samples: &mut [f32]) {
        if self.is_idle() {
            samples.fill(Sample::EQUILIBRIUM);
            return;
        }

        let checked = check_block(&self.format, &AudioBlock::new(channels, samples));
        if let Err(err) = checked {
            samples.fill(Sample::EQUILIBRIUM);
            push_event(&mut self.events, &self.flags, RenderEvent::BlockSkipped(err));
            return;
        }

        self.sync_control();
        self.measure_and_apply(samples);
    }

    fn measure_and_apply(&mut self, samples: &mut [f32]) {
        let channels = self.format.channels();
        let epoch = self.epoch;
        let start = self.stream_frames;
        let events = &mut self.events;
        let flags = &*self.flags;

        self.live.process(samples, |offset, record| {
            push_event(
                events,
                flags,
                RenderEvent::Energy {
                    meter: MeterId::Live,
                    epoch,
                    end_frame: start + offset as u64,
                    record,
                },
            );
        });

        self.ramp.process(samples, channels);

        self.post_gain.process(samples, |offset, record| {
            push_event(
                events,
                flags,
                RenderEvent::Energy {
                    meter: MeterId::PostGain,
                    epoch,
                    end_frame: start + offset as u64,
                    record,
                },
            );
        });

        let level = self.level.process(samples, start);
        push_event(events, flags, RenderEvent::Level(level));

        self.stream_frames += (samples.len() / channels) as u64;
        push_event(
            events,
            flags,
            RenderEvent::BlockRendered {
                stream_frames: self.stream_frames,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use rtrb::RingBuffer;

    use super::*;
    use crate::audio_engine::errors::BlockError;
    use crate::audio_engine::gain::GainCommand;
    use crate::messages::SampleBuffer;

    struct Harness {
        processor: RenderProcessor,
        flags: Arc<TransportFlags>,
        commands: Producer<RenderCommand>,
        events: Consumer<RenderEvent>,
    }

    fn harness(channels: usize, player: Option<SourcePlayer>, event_capacity: usize) -> Harness {
        let format = StreamFormat::new(48_000, channels).unwrap();
        let config = SessionConfig {
            measurement: MeasurementConfig::from_values(0.4, 0.75, 4.0).unwrap(),
            ..SessionConfig::default()
        };
        let flags = Arc::new(TransportFlags::new(true));
        let (commands, command_rx) = RingBuffer::new(16);
        let (event_tx, events) = RingBuffer::new(event_capacity);

        Harness {
            processor: RenderProcessor::new(format, &config, flags.clone(), command_rx, event_tx, player),
            flags,
            commands,
            events,
        }
    }

    fn drain(events: &mut Consumer<RenderEvent>) -> Vec<RenderEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.pop() {
            out.push(event);
        }
        out
    }

    fn energy_count(events: &[RenderEvent], meter: MeterId) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, RenderEvent::Energy { meter: m, .. } if *m == meter))
            .count()
    }

    #[test]
    fn test_block_reports_stream_position() {
        let mut h = harness(2, None, 256);
        let mut block = vec![0.25f32; 4_096 * 2];

        h.processor.process(2, &mut block);
        h.processor.process(2, &mut block);

        let events = drain(&mut h.events);
        assert_eq!(
            events.last(),
            Some(&RenderEvent::BlockRendered { stream_frames: 8_192 })
        );
        assert_eq!(h.processor.stream_frames(), 8_192);
    }

    #[test]
    fn test_windows_are_emitted_for_both_meters() {
        let mut h = harness(1, None, 1_024);
        // 0.5 s: one full 0.4 s window plus one hop.
        let mut block = vec![0.1f32; 24_000];

        h.processor.process(1, &mut block);

        let events = drain(&mut h.events);
        assert_eq!(energy_count(&events, MeterId::Live), 2);
        assert_eq!(energy_count(&events, MeterId::PostGain), 2);
    }

    #[test]
    fn test_channel_mismatch_skips_block() {
        let mut h = harness(2, None, 64);
        let mut mono = vec![0.5f32; 1_000];

        h.processor.process(1, &mut mono);

        assert!(mono.iter().all(|&s| s == 0.0));
        assert_eq!(
            drain(&mut h.events),
            vec![RenderEvent::BlockSkipped(BlockError::ChannelMismatch {
                expected: 2,
                actual: 1
            })]
        );
        assert_eq!(h.processor.stream_frames(), 0);
    }

    #[test]
    fn test_gain_command_is_applied_to_output() {
        let mut h = harness(1, None, 256);
        h.commands
            .push(RenderCommand::Gain(GainCommand::snap(0.5)))
            .unwrap();

        let mut block = vec![0.8f32; 512];
        h.processor.process(1, &mut block);

        assert!(block.iter().all(|&s| (s - 0.4).abs() < 1e-6));
        assert!((h.processor.gain() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_applied_gain_is_confirmed_with_position() {
        let mut h = harness(1, None, 256);
        let mut block = vec![0.2f32; 1_000];
        h.processor.process(1, &mut block);
        drain(&mut h.events);

        let command = GainCommand {
            target_gain: 0.5,
            time_constant: 1.5,
        };
        h.commands.push(RenderCommand::Gain(command)).unwrap();
        h.processor.process(1, &mut block);

        let events = drain(&mut h.events);
        assert_eq!(
            events.first(),
            Some(&RenderEvent::GainApplied {
                command,
                stream_frames: 1_000,
                start_gain: 1.0,
            })
        );
    }

    #[test]
    fn test_energy_records_carry_stream_end_frame() {
        let mut h = harness(1, None, 1_024);
        let mut block = vec![0.1f32; 12_000];
        h.processor.process(1, &mut block);
        h.processor.process(1, &mut block);

        let ends: Vec<u64> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Energy {
                    meter: MeterId::Live,
                    end_frame,
                    ..
                } => Some(end_frame),
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec![19_200, 24_000]);
    }

    #[test]
    fn test_level_reports_post_gain_clipping() {
        let mut h = harness(1, None, 256);
        h.commands
            .push(RenderCommand::Gain(GainCommand::snap(4.0)))
            .unwrap();

        let mut block = vec![0.3f32; 512];
        h.processor.process(1, &mut block);

        let level = drain(&mut h.events).into_iter().find_map(|e| match e {
            RenderEvent::Level(level) => Some(level),
            _ => None,
        });
        let level = level.unwrap();
        assert!((level.peak_volume() - 1.2).abs() < 1e-5);
        assert_eq!(level.last_clip_frame(), Some(511));
    }

    #[test]
    fn test_paused_renders_silence_without_events() {
        let sample = SampleBuffer::new(1, 48_000, vec![0.5; 1_000]);
        let mut h = harness(1, Some(SourcePlayer::new(sample)), 64);
        h.flags.set_paused(true);

        let mut output = vec![1.0f32; 256];
        h.processor.render(&mut output);

        assert!(output.iter().all(|&s| s == 0.0));
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn test_end_of_stream_without_loop() {
        let sample = SampleBuffer::new(1, 48_000, vec![0.5; 100]);
        let mut h = harness(1, Some(SourcePlayer::new(sample)), 64);
        h.flags.set_looping(false);

        let mut output = vec![0.0f32; 256];
        h.processor.render(&mut output);
        assert!(drain(&mut h.events).contains(&RenderEvent::EndOfStream));

        // Finished: further blocks are silent and quiet.
        output.fill(1.0);
        h.processor.render(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn test_reset_epoch_restarts_windows() {
        let mut h = harness(1, None, 1_024);
        let mut block = vec![0.1f32; 12_000];
        h.processor.process(1, &mut block);
        drain(&mut h.events);

        h.flags.request_reset();
        // 0.25 s before and 0.3 s after the reset would otherwise complete a
        // 0.4 s window.
        let mut block = vec![0.1f32; 14_400];
        h.processor.process(1, &mut block);

        let events = drain(&mut h.events);
        assert_eq!(energy_count(&events, MeterId::Live), 0);
    }

    #[test]
    fn test_records_carry_current_epoch() {
        let mut h = harness(1, None, 1_024);
        h.flags.request_reset();
        h.flags.request_reset();

        let mut block = vec![0.1f32; 19_200];
        h.processor.process(1, &mut block);

        let epochs: Vec<u64> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Energy { epoch, .. } => Some(epoch),
                _ => None,
            })
            .collect();
        assert_eq!(epochs, vec![2, 2]);
    }

    #[test]
    fn test_full_event_ring_drops_and_counts() {
        let mut h = harness(1, None, 1);
        let mut block = vec![0.0f32; 64];

        h.processor.process(1, &mut block);
        h.processor.process(1, &mut block);
        h.processor.process(1, &mut block);

        // Two events per block: level and position.
        assert_eq!(drain(&mut h.events).len(), 1);
        assert_eq!(h.flags.take_dropped_events(), 5);
        assert_eq!(h.flags.take_dropped_events(), 0);
    }

    #[test]
    fn test_disconnected_control_outputs_silence() {
        let sample = SampleBuffer::new(1, 48_000, vec![0.5; 1_000]);
        let h = harness(1, Some(SourcePlayer::new(sample)), 64);
        let Harness {
            mut processor,
            events,
            commands,
            ..
        } = h;
        drop(events);
        drop(commands);

        assert!(processor.is_disconnected());
        let mut output = vec![1.0f32; 128];
        processor.render(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }
}
