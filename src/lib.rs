//! Real-time ITU-R BS.1770 gated loudness metering with automatic gain
//! control.
//!
//! The [`audio_engine`] module holds the measurement and control components;
//! [`messages`] defines what crosses between the render and control paths.

pub mod audio_engine;
pub mod messages;

#[cfg(feature = "python")]
mod python;

pub use audio_engine::AudioEngine;
pub use audio_engine::config::{
    ChannelWeights, DecayRate, GainSettings, Interval, MaxHistory, MeasurementConfig, Overlap,
    SessionConfig, StreamFormat, TargetLoudness,
};
pub use audio_engine::gating::GatedLoudness;
pub use audio_engine::level_meter::LevelReading;
pub use audio_engine::meter::LoudnessMeter;
pub use audio_engine::scheduler::{StreamScheduler, TransportState};
pub use messages::{AudioBlock, SampleBuffer, Telemetry};

/// The Python module implemented in Rust.
#[cfg(feature = "python")]
#[pyo3::pymodule]
mod auto_loudness {
    #[pymodule_export]
    use super::python::PyAudioEngine;
}
