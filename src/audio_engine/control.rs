//! Control-rate processing.
//!
//! [`ControlLoop`] drains the render path's events, keeps both energy
//! histories and runs one evaluation per control tick of stream time: gate
//! both meters, update the gain controller, publish telemetry.
//!
//! A tick at stream frame `T` only sees windows that closed at or before `T`;
//! windows from later in the same block wait for the next tick. Gain
//! trajectories are re-anchored to the frame at which the render path
//! reports having applied them, so [`GainState`] follows the actual output
//! gain.

use std::sync::Arc;
use std::sync::mpsc::{SyncSender, TrySendError};

use rtrb::{Consumer, Producer};

use crate::audio_engine::config::{GainSettings, MeasurementConfig, SessionConfig, StreamFormat};
use crate::audio_engine::constants::{CLIP_LAG_S, CONTROL_TICK_S};
use crate::audio_engine::energy_ring::EnergyRecord;
use crate::audio_engine::gain::{GainCommand, GainController, GainState};
use crate::audio_engine::gating::GatedLoudness;
use crate::audio_engine::level_meter::LevelReading;
use crate::audio_engine::meter::MeterHistory;
use crate::audio_engine::render::TransportFlags;
use crate::messages::{MeterId, RenderCommand, RenderEvent, Telemetry};

/// Outcome of one [`ControlLoop::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Running,
    /// The source ended without looping.
    Finished,
}

#[derive(Debug, Clone, Copy)]
struct PendingRecord {
    meter: MeterId,
    end_frame: u64,
    record: EnergyRecord,
}

/// Control-side half of a playback session.
pub struct ControlLoop {
    format: StreamFormat,
    flags: Arc<TransportFlags>,
    commands: Producer<RenderCommand>,
    events: Consumer<RenderEvent>,
    telemetry: SyncSender<Telemetry>,
    live: MeterHistory,
    post_gain: MeterHistory,
    pending: Vec<PendingRecord>,
    controller: GainController,
    level: LevelReading,
    clip_lag_frames: u64,
    epoch: u64,
    stream_frames: u64,
    tick_frames: u64,
    next_tick: u64,
    skipped_blocks: u64,
    dropped_telemetry: u64,
    finished: bool,
}

impl ControlLoop {
    pub fn new(
        format: StreamFormat,
        config: &SessionConfig,
        flags: Arc<TransportFlags>,
        commands: Producer<RenderCommand>,
        events: Consumer<RenderEvent>,
        telemetry: SyncSender<Telemetry>,
    ) -> Self {
        let tick_frames = format.secs_to_frames(CONTROL_TICK_S).max(1);
        let epoch = flags.epoch();

        Self {
            format,
            flags,
            commands,
            events,
            telemetry,
            live: MeterHistory::new(&format, &config.measurement, config.channel_weights),
            post_gain: MeterHistory::new(&format, &MeasurementConfig::monitor(), config.channel_weights),
            pending: Vec::new(),
            controller: GainController::new(config.gain),
            level: LevelReading::silent(format.channels()),
            clip_lag_frames: format.secs_to_frames(CLIP_LAG_S),
            epoch,
            stream_frames: 0,
            tick_frames,
            next_tick: tick_frames,
            skipped_blocks: 0,
            dropped_telemetry: 0,
            finished: false,
        }
    }

    /// Stream time in seconds.
    pub fn stream_time(&self) -> f64 {
        self.format.frames_to_secs(self.stream_frames)
    }

    /// Blocks the render path skipped because of a layout mismatch.
    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks
    }

    /// Telemetry entries lost because the host channel was full.
    pub fn dropped_telemetry(&self) -> u64 {
        self.dropped_telemetry
    }

    pub fn gain_state(&self) -> GainState {
        self.controller.state(self.stream_time())
    }

    pub fn set_gain_settings(&mut self, settings: GainSettings) {
        self.controller.set_settings(settings);
    }

    /// Handles every pending render event, running a control tick for each
    /// tick boundary the stream clock crosses.
    pub fn pump(&mut self) -> ControlStatus {
        let dropped = self.flags.take_dropped_events();
        if dropped > 0 {
            log::warn!("Render event ring full, dropped {} events", dropped);
        }

        while let Ok(event) = self.events.pop() {
            match event {
                RenderEvent::Energy {
                    meter,
                    epoch,
                    end_frame,
                    record,
                } => {
                    if epoch == self.epoch {
                        self.pending.push(PendingRecord {
                            meter,
                            end_frame,
                            record,
                        });
                    }
                }
                RenderEvent::GainApplied {
                    command,
                    stream_frames,
                    start_gain,
                } => {
                    let at = self.format.frames_to_secs(stream_frames);
                    self.controller.confirm(&command, at, start_gain);
                }
                RenderEvent::Level(level) => self.level = level,
                RenderEvent::BlockRendered { stream_frames } => {
                    self.stream_frames = self.stream_frames.max(stream_frames);
                    while self.stream_frames >= self.next_tick {
                        self.tick(self.next_tick);
                        self.next_tick += self.tick_frames;
                    }
                }
                RenderEvent::BlockSkipped(err) => {
                    self.skipped_blocks += 1;
                    log::warn!("Skipped input block: {}", err);
                }
                RenderEvent::EndOfStream => {
                    log::info!("End of stream at {:.2}s", self.stream_time());
                    self.finished = true;
                }
            }
        }

        if self.finished {
            ControlStatus::Finished
        } else {
            ControlStatus::Running
        }
    }

    /// Moves every pending window that closed by `frame` into its history.
    fn admit_records(&mut self, frame: u64) {
        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.end_frame <= frame);
        self.pending = waiting;

        for pending in ready {
            match pending.meter {
                MeterId::Live => self.live.push(pending.record),
                MeterId::PostGain => self.post_gain.push(pending.record),
            }
        }
    }

    fn tick(&mut self, at_frame: u64) {
        self.admit_records(at_frame);

        let now = self.format.frames_to_secs(at_frame);
        let live = self.live.evaluate().loudness;
        let post_gain = self.post_gain.evaluate().loudness;

        // The render path cannot apply a command before the frames it has
        // already reported, so the new trajectory starts there.
        if let Some(command) = self.controller.update(live, self.stream_time()) {
            self.send(command);
        }

        let telemetry = Telemetry {
            timestamp: now,
            live_gated_loudness: live.lkfs(),
            post_gain_gated_loudness: post_gain.lkfs(),
            target_loudness: self.controller.settings().target.lkfs(),
            target_gain: self.controller.state(now).target_gain,
            output_level: self.level,
            clipping: self.level.is_clipping_at(at_frame, self.clip_lag_frames),
        };
        log::debug!(
            "t={:.1}s live={:.2} post={:.2} gain->{:.4}",
            telemetry.timestamp,
            telemetry.live_gated_loudness,
            telemetry.post_gain_gated_loudness,
            telemetry.target_gain
        );

        match self.telemetry.try_send(telemetry) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_telemetry += 1;
                log::warn!("Telemetry channel full, dropped entry at {:.1}s", now);
            }
            // Nobody listening is fine.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn send(&mut self, command: GainCommand) {
        if self.commands.push(RenderCommand::Gain(command)).is_err() {
            log::warn!("Render command ring full, dropped gain command");
        }
    }

    /// Clears both histories, starts a new reset generation and snaps the
    /// gain back to the start gain.
    ///
    /// The render path picks the new generation up at its next block; any
    /// record still in flight from the old one is discarded.
    pub fn reset(&mut self) {
        self.epoch = self.flags.request_reset();
        self.pending.clear();
        self.live.clear();
        self.post_gain.clear();

        let command = self.controller.reset(self.stream_time());
        self.send(command);
        log::info!("Measurement reset at {:.2}s", self.stream_time());
    }

    /// Latest gated loudness of the live meter.
    pub fn live_loudness(&self) -> GatedLoudness {
        self.live.evaluate().loudness
    }
}
