//! Loudness engine constants and limits.

/// Maximum number of channels a session can measure.
pub const MAX_CHANNELS: usize = 8;

/// Lowest accepted stream sample rate in Hz.
pub const SAMPLE_RATE_MIN: u32 = 8_000;

/// Highest accepted stream sample rate in Hz.
pub const SAMPLE_RATE_MAX: u32 = 384_000;

/// Absolute gating threshold (Γa) in LKFS.
pub const ABSOLUTE_GATE_LKFS: f64 = -70.0;

/// Distance of the relative gate below the absolute-gated mean, in LU.
pub const RELATIVE_GATE_OFFSET_LU: f64 = -10.0;

/// Constant term of the BS.1770 loudness formula.
pub const LOUDNESS_OFFSET_DB: f64 = -0.691;

/// Energy floor applied before any logarithm.
pub const ENERGY_FLOOR: f64 = 1e-12;

/// Loudness reported when every window lies at or below the absolute gate.
pub const SILENCE_FLOOR_LKFS: f64 = ABSOLUTE_GATE_LKFS;

/// Control-rate tick in seconds of stream time.
pub const CONTROL_TICK_S: f64 = 0.1;

/// Default target loudness in LKFS.
pub const DEFAULT_TARGET_LKFS: f64 = -23.0;

/// Lowest accepted target loudness.
pub const TARGET_LKFS_MIN: f64 = -70.0;

/// Highest accepted target loudness.
pub const TARGET_LKFS_MAX: f64 = 0.0;

/// Gain the controller starts from and falls back to.
pub const START_GAIN: f64 = 1.0;

/// Capacity of the render -> control event ring.
pub const EVENT_QUEUE_CAPACITY: usize = 4096;

/// Capacity of the control -> render command ring.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Telemetry entries kept for the host between polls (one minute at the
/// control rate). Older entries are dropped first.
pub const TELEMETRY_BACKLOG: usize = 600;

/// Frames per render callback requested from the output device.
pub const DEFAULT_BLOCK_FRAMES: u32 = 4096;

/// Output level at or above which a sample counts as clipping.
pub const CLIP_LEVEL: f32 = 0.98;

/// How long the clip indicator stays on after the last clipping sample.
pub const CLIP_LAG_S: f64 = 0.25;

/// Release factor of the output level meter per [`LEVEL_QUANTUM_FRAMES`].
pub const LEVEL_AVERAGING: f32 = 0.95;

/// Frame count the level release factor is defined over.
pub const LEVEL_QUANTUM_FRAMES: usize = 128;

/// Input chunk handed to the resampler when converting a decoded file.
pub const RESAMPLE_CHUNK_FRAMES: usize = 1024;
