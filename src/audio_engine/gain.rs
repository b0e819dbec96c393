//! Automatic gain control.
//!
//! [`GainController`] runs on the control path and turns each gated loudness
//! value into a new exponential gain trajectory. [`GainRamp`] runs on the
//! render path and follows the latest trajectory sample by sample.

use crate::audio_engine::config::GainSettings;
use crate::audio_engine::constants::START_GAIN;
use crate::audio_engine::gating::GatedLoudness;

/// Gain trajectory sent to the output stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainCommand {
    /// Gain the trajectory converges to.
    pub target_gain: f64,
    /// Time in seconds to cover the whole error at the configured decay rate.
    pub time_constant: f64,
}

impl GainCommand {
    /// Jump straight to `gain`.
    pub fn snap(gain: f64) -> Self {
        Self {
            target_gain: gain,
            time_constant: 0.0,
        }
    }

    /// Exponential smoothing constant, a third of the time constant.
    pub fn tau(&self) -> f64 {
        self.time_constant / 3.0
    }
}

/// Snapshot of the controller at one point in stream time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainState {
    pub current_gain: f64,
    pub target_gain: f64,
    pub start_gain: f64,
    pub time_constant: f64,
    pub tau: f64,
}

/// `gain(t) = target + (g0 - target) * e^(-(t - t0) / tau)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainTrajectory {
    start_time: f64,
    start_gain: f64,
    target_gain: f64,
    tau: f64,
}

impl GainTrajectory {
    /// Constant gain from `now` on.
    pub fn constant(gain: f64, now: f64) -> Self {
        Self {
            start_time: now,
            start_gain: gain,
            target_gain: gain,
            tau: 0.0,
        }
    }

    pub fn new(start_time: f64, start_gain: f64, target_gain: f64, tau: f64) -> Self {
        Self {
            start_time,
            start_gain,
            target_gain,
            tau,
        }
    }

    /// Gain at stream time `t`. Times before the start clamp to the start.
    pub fn gain_at(&self, t: f64) -> f64 {
        if self.tau <= 0.0 {
            return self.target_gain;
        }

        let elapsed = (t - self.start_time).max(0.0);
        self.target_gain + (self.start_gain - self.target_gain) * (-elapsed / self.tau).exp()
    }

    pub fn target_gain(&self) -> f64 {
        self.target_gain
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }
}

/// Converts loudness errors into gain trajectories with asymmetric decay
/// rates.
///
/// Only the controller mutates the gain state.
#[derive(Debug, Clone)]
pub struct GainController {
    settings: GainSettings,
    trajectory: GainTrajectory,
    command: GainCommand,
}

impl GainController {
    pub fn new(settings: GainSettings) -> Self {
        Self {
            settings,
            trajectory: GainTrajectory::constant(START_GAIN, 0.0),
            command: GainCommand::snap(START_GAIN),
        }
    }

    pub fn settings(&self) -> &GainSettings {
        &self.settings
    }

    /// Replaces the settings. The running trajectory continues until the next
    /// update.
    pub fn set_settings(&mut self, settings: GainSettings) {
        self.settings = settings;
    }

    /// Starts a new trajectory from the gain reached at `now`.
    ///
    /// # Parameters
    ///
    /// - `loudness`: latest live gated loudness
    /// - `now`: stream time in seconds
    ///
    /// # Returns
    ///
    /// The command for the output stage, or `None` when the measurement is
    /// unusable and the tick is skipped.
    pub fn update(&mut self, loudness: GatedLoudness, now: f64) -> Option<GainCommand> {
        if !self.settings.apply_correction {
            return Some(self.snap(START_GAIN, now));
        }

        let measured = loudness.measured()?;
        let error_db = measured - self.settings.target.lkfs();
        let time_constant = if error_db > 0.0 {
            error_db / self.settings.decay_decrease.value()
        } else {
            error_db.abs() / self.settings.decay_increase.value()
        };
        let target_gain = START_GAIN / 10f64.powf(error_db / 20.0);

        let command = GainCommand {
            target_gain,
            time_constant,
        };
        let current = self.trajectory.gain_at(now);
        self.trajectory = GainTrajectory::new(now, current, target_gain, command.tau());
        self.command = command;

        Some(command)
    }

    /// Moves the start of the latest trajectory to where the output stage
    /// actually picked it up.
    ///
    /// `at` is the stream time the command took effect and `start_gain` the
    /// output gain at that moment. Confirmations for an older command are
    /// ignored; a newer command is still on its way.
    pub fn confirm(&mut self, command: &GainCommand, at: f64, start_gain: f64) {
        if *command != self.command {
            return;
        }
        self.trajectory = if command.tau() <= 0.0 {
            GainTrajectory::constant(command.target_gain, at)
        } else {
            GainTrajectory::new(at, start_gain, command.target_gain, command.tau())
        };
    }

    /// Returns to the start gain immediately.
    pub fn reset(&mut self, now: f64) -> GainCommand {
        self.snap(START_GAIN, now)
    }

    fn snap(&mut self, gain: f64, now: f64) -> GainCommand {
        self.trajectory = GainTrajectory::constant(gain, now);
        self.command = GainCommand::snap(gain);
        self.command
    }

    pub fn trajectory(&self) -> &GainTrajectory {
        &self.trajectory
    }

    pub fn state(&self, now: f64) -> GainState {
        GainState {
            current_gain: self.trajectory.gain_at(now),
            target_gain: self.trajectory.target_gain(),
            start_gain: START_GAIN,
            time_constant: self.command.time_constant,
            tau: self.trajectory.tau(),
        }
    }
}

/// Render-side follower of the latest [`GainCommand`].
///
/// A one-pole smoother whose per-sample coefficient reproduces the
/// controller's exponential: after `n` samples the remaining distance is
/// `e^(-n / (tau * sample_rate))`.
#[derive(Debug, Clone)]
pub struct GainRamp {
    sample_rate: f64,
    gain: f64,
    target: f64,
    coeff: f64,
}

impl GainRamp {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: f64::from(sample_rate),
            gain: START_GAIN,
            target: START_GAIN,
            coeff: 1.0,
        }
    }

    pub fn apply(&mut self, command: GainCommand) {
        self.target = command.target_gain;

        let tau = command.tau();
        if tau <= 0.0 {
            self.gain = command.target_gain;
            self.coeff = 1.0;
        } else {
            self.coeff = 1.0 - (-1.0 / (tau * self.sample_rate)).exp();
        }
    }

    /// Advances one sample and returns the gain for it.
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        self.gain += self.coeff * (self.target - self.gain);
        self.gain as f32
    }

    /// Multiplies an interleaved block in place, one gain step per frame.
    pub fn process(&mut self, samples: &mut [f32], channels: usize) {
        for frame in samples.chunks_exact_mut(channels) {
            let gain = self.next_gain();
            for sample in frame {
                *sample *= gain;
            }
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}
