//! Session configuration.
//!
//! Every enumerated parameter is a newtype that can only hold a value from its
//! table, so a constructed configuration is valid for the whole session. Values
//! are accepted either directly or by table index, the way a settings dialog
//! hands them over.

use crate::audio_engine::constants::{
    DEFAULT_TARGET_LKFS, MAX_CHANNELS, SAMPLE_RATE_MAX, SAMPLE_RATE_MIN, TARGET_LKFS_MAX,
    TARGET_LKFS_MIN,
};
use crate::audio_engine::errors::ConfigError;

/// Measurement window lengths in seconds.
pub const INTERVALS_S: [f64; 4] = [0.2, 0.3, 0.4, 0.5];

/// Window overlap fractions.
pub const OVERLAPS: [f64; 3] = [0.25, 0.5, 0.75];

/// Energy history lengths in seconds.
pub const MAX_HISTORIES_S: [f64; 7] = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 84.0];

/// Gain decay rates in dB/s, shared by the increase and decrease tables.
pub const DECAY_RATES_DB_PER_S: [f64; 8] = [0.2, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0];

fn position_in(table: &'static [f64], parameter: &'static str, value: f64) -> Result<usize, ConfigError> {
    table
        .iter()
        .position(|candidate| (candidate - value).abs() < 1e-9)
        .ok_or(ConfigError::UnsupportedValue {
            parameter,
            value,
            allowed: table,
        })
}

fn check_index(table: &'static [f64], parameter: &'static str, index: usize) -> Result<usize, ConfigError> {
    if index < table.len() {
        Ok(index)
    } else {
        Err(ConfigError::IndexOutOfRange {
            parameter,
            index,
            len: table.len(),
        })
    }
}

macro_rules! table_param {
    ($(#[$meta:meta])* $name:ident, $table:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Looks the value up in its table.
            pub fn new(value: f64) -> Result<Self, ConfigError> {
                position_in(&$table, $label, value).map(Self)
            }

            /// Picks the table entry at `index`.
            pub fn from_index(index: usize) -> Result<Self, ConfigError> {
                check_index(&$table, $label, index).map(Self)
            }

            /// Position in the table.
            pub fn index(self) -> usize {
                self.0
            }

            /// Table value.
            pub fn value(self) -> f64 {
                $table[self.0]
            }
        }

        impl TryFrom<f64> for $name {
            type Error = ConfigError;

            fn try_from(value: f64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

table_param!(
    /// Measurement window length.
    Interval,
    INTERVALS_S,
    "interval"
);
table_param!(
    /// Overlap fraction between consecutive windows.
    Overlap,
    OVERLAPS,
    "overlap"
);
table_param!(
    /// Length of the energy history used for gating.
    MaxHistory,
    MAX_HISTORIES_S,
    "max history"
);
table_param!(
    /// Gain slew rate in dB/s.
    DecayRate,
    DECAY_RATES_DB_PER_S,
    "decay rate"
);

/// Window and history sizes in frames for one sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Frames per measurement window.
    pub window_frames: usize,
    /// Frames between the starts of consecutive windows.
    pub hop_frames: usize,
    /// Number of energy records the history holds.
    pub capacity: usize,
}

/// Windowing parameters of one loudness meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementConfig {
    pub interval: Interval,
    pub overlap: Overlap,
    pub max_history: MaxHistory,
}

impl MeasurementConfig {
    pub fn new(interval: Interval, overlap: Overlap, max_history: MaxHistory) -> Self {
        Self {
            interval,
            overlap,
            max_history,
        }
    }

    /// Builds a configuration from raw values.
    pub fn from_values(interval_s: f64, overlap: f64, max_history_s: f64) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Interval::new(interval_s)?,
            Overlap::new(overlap)?,
            MaxHistory::new(max_history_s)?,
        ))
    }

    /// Builds a configuration from table indices.
    pub fn from_indices(
        interval_idx: usize,
        overlap_idx: usize,
        max_history_idx: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            Interval::from_index(interval_idx)?,
            Overlap::from_index(overlap_idx)?,
            MaxHistory::from_index(max_history_idx)?,
        ))
    }

    /// Short fixed configuration of the post-gain monitor meter.
    pub fn monitor() -> Self {
        Self::new(Interval(2), Overlap(2), MaxHistory(1))
    }

    /// Window, hop and ring sizes at `sample_rate`.
    ///
    /// Window and hop are rounded to whole frames. The capacity is
    /// `(history - window) / hop + 1`, the number of full windows that fit in
    /// the history.
    pub fn geometry(&self, sample_rate: u32) -> WindowGeometry {
        let rate = f64::from(sample_rate);
        let window_frames = (self.interval.value() * rate).round() as usize;
        let hop_frames = (((1.0 - self.overlap.value()) * window_frames as f64).round() as usize).max(1);
        let history_frames = (self.max_history.value() * rate).round() as usize;

        assert!(window_frames > 0, "measurement window must hold at least one frame");
        assert!(
            history_frames >= window_frames,
            "history must hold at least one window"
        );

        WindowGeometry {
            window_frames,
            hop_frames,
            capacity: (history_frames - window_frames) / hop_frames + 1,
        }
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        // 0.4 s windows, 75 % overlap, 32 s history.
        Self::new(Interval(2), Overlap(2), MaxHistory(4))
    }
}

/// Per-channel loudness weights (Gi).
///
/// The default weighs every channel with 1.0 regardless of channel count.
/// Explicit weights must match the stream's channel count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelWeights {
    weights: [f64; MAX_CHANNELS],
    explicit: Option<usize>,
}

impl ChannelWeights {
    pub fn uniform() -> Self {
        Self {
            weights: [1.0; MAX_CHANNELS],
            explicit: None,
        }
    }

    /// Explicit per-channel weights, e.g. `[1.0, 1.0, 1.0, 1.41, 1.41]` for
    /// 5.0 surround.
    pub fn new(weights: &[f64]) -> Result<Self, ConfigError> {
        if weights.is_empty() || weights.len() > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedChannels(weights.len()));
        }

        let mut table = [1.0; MAX_CHANNELS];
        for (channel, (&weight, slot)) in weights.iter().zip(table.iter_mut()).enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidChannelWeight { channel, weight });
            }
            *slot = weight;
        }

        Ok(Self {
            weights: table,
            explicit: Some(weights.len()),
        })
    }

    /// Weight of `channel`.
    pub fn weight(&self, channel: usize) -> f64 {
        self.weights[channel]
    }

    /// Checks the weights against a stream's channel count.
    pub fn validate_for(&self, channels: usize) -> Result<(), ConfigError> {
        match self.explicit {
            Some(count) if count != channels => Err(ConfigError::ChannelWeightCount {
                weights: count,
                channels,
            }),
            _ => Ok(()),
        }
    }
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Target loudness in LKFS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLoudness(f64);

impl TargetLoudness {
    pub fn new(lkfs: f64) -> Result<Self, ConfigError> {
        if !lkfs.is_finite() || !(TARGET_LKFS_MIN..=TARGET_LKFS_MAX).contains(&lkfs) {
            return Err(ConfigError::InvalidTargetLoudness(lkfs));
        }
        Ok(Self(lkfs))
    }

    pub fn lkfs(self) -> f64 {
        self.0
    }
}

impl Default for TargetLoudness {
    fn default() -> Self {
        Self(DEFAULT_TARGET_LKFS)
    }
}

/// Parameters of the gain controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainSettings {
    pub target: TargetLoudness,
    /// Rate used while the gain rises (signal too quiet).
    pub decay_increase: DecayRate,
    /// Rate used while the gain falls (signal too loud).
    pub decay_decrease: DecayRate,
    pub apply_correction: bool,
}

impl Default for GainSettings {
    fn default() -> Self {
        Self {
            target: TargetLoudness::default(),
            decay_increase: DecayRate(2),
            decay_decrease: DecayRate(6),
            apply_correction: true,
        }
    }
}

/// Sample rate and channel count, fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    sample_rate: u32,
    channels: usize,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: usize) -> Result<Self, ConfigError> {
        if !(SAMPLE_RATE_MIN..=SAMPLE_RATE_MAX).contains(&sample_rate) {
            return Err(ConfigError::UnsupportedSampleRate(sample_rate));
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedChannels(channels));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Converts a frame count to seconds.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Converts seconds to the nearest whole frame count.
    pub fn secs_to_frames(&self, secs: f64) -> u64 {
        (secs.max(0.0) * f64::from(self.sample_rate)).round() as u64
    }
}

/// Everything a playback session is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Windowing of the live (pre-gain) meter.
    pub measurement: MeasurementConfig,
    pub gain: GainSettings,
    pub channel_weights: ChannelWeights,
    /// Wrap the source at its end instead of stopping.
    pub looping: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            measurement: MeasurementConfig::default(),
            gain: GainSettings::default(),
            channel_weights: ChannelWeights::uniform(),
            looping: true,
        }
    }
}

impl SessionConfig {
    pub fn validate_for(&self, format: &StreamFormat) -> Result<(), ConfigError> {
        self.channel_weights.validate_for(format.channels())
    }
}
