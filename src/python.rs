//! Python bindings for [`AudioEngine`].

use std::path::Path;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::audio_engine::AudioEngine;
use crate::audio_engine::config::MeasurementConfig;
use crate::audio_engine::errors::EngineError;
use crate::audio_engine::scheduler::TransportState;

fn to_py_err(err: EngineError) -> PyErr {
    match err {
        EngineError::Config(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn state_label(state: TransportState) -> &'static str {
    match state {
        TransportState::Stopped => "stopped",
        TransportState::Playing => "playing",
        TransportState::Paused => "paused",
    }
}

/// AudioEngine plays a file with automatic loudness correction.
///
/// Call `pump()` regularly from the host loop and read `poll_telemetry()`.
#[pyclass(name = "AudioEngine", unsendable)]
pub struct PyAudioEngine {
    engine: AudioEngine,
}

#[pymethods]
impl PyAudioEngine {
    /// Create a new AudioEngine with default settings.
    #[new]
    pub fn new() -> Self {
        Self {
            engine: AudioEngine::default(),
        }
    }

    /// Decode a file and make it the current source. Returns its duration
    /// in seconds.
    pub fn load_file(&mut self, path: String) -> PyResult<f64> {
        self.engine.load_file(Path::new(&path)).map_err(to_py_err)
    }

    pub fn play(&mut self) -> PyResult<()> {
        self.engine.play().map_err(to_py_err)
    }

    pub fn pause(&mut self) -> PyResult<()> {
        self.engine.pause().map_err(to_py_err)
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn reset(&mut self) -> PyResult<()> {
        self.engine.reset().map_err(to_py_err)
    }

    /// Run pending control work. Returns the transport state.
    pub fn pump(&mut self) -> &'static str {
        state_label(self.engine.pump())
    }

    pub fn state(&self) -> &'static str {
        state_label(self.engine.state())
    }

    /// Drain telemetry published since the last call, as a list of dicts.
    pub fn poll_telemetry(&mut self, py: Python<'_>) -> PyResult<Vec<Py<PyAny>>> {
        self.engine
            .poll_telemetry()
            .into_iter()
            .map(|telemetry| {
                let dict = PyDict::new(py);
                dict.set_item("timestamp", telemetry.timestamp)?;
                dict.set_item("live_gated_loudness", telemetry.live_gated_loudness)?;
                dict.set_item("post_gain_gated_loudness", telemetry.post_gain_gated_loudness)?;
                dict.set_item("target_loudness", telemetry.target_loudness)?;
                dict.set_item("target_gain", telemetry.target_gain)?;
                dict.set_item("output_volume", telemetry.output_level.volume().to_vec())?;
                dict.set_item("clipping", telemetry.clipping)?;
                Ok(dict.into_any().unbind())
            })
            .collect()
    }

    /// Seconds played in the current session, or `None` while stopped.
    pub fn current_play_time(&self) -> Option<f64> {
        self.engine.current_play_time()
    }

    /// Current gain state, or `None` while stopped.
    pub fn gain_state(&self, py: Python<'_>) -> PyResult<Option<Py<PyAny>>> {
        let Some(state) = self.engine.gain_state() else {
            return Ok(None);
        };

        let dict = PyDict::new(py);
        dict.set_item("current_gain", state.current_gain)?;
        dict.set_item("target_gain", state.target_gain)?;
        dict.set_item("start_gain", state.start_gain)?;
        dict.set_item("time_constant", state.time_constant)?;
        dict.set_item("tau", state.tau)?;
        Ok(Some(dict.into_any().unbind()))
    }

    pub fn set_target_loudness(&mut self, lkfs: f64) -> PyResult<()> {
        self.engine.set_target_loudness(lkfs).map_err(to_py_err)
    }

    pub fn set_apply_correction(&mut self, enabled: bool) {
        self.engine.set_apply_correction(enabled);
    }

    pub fn set_decay_increase(&mut self, db_per_s: f64) -> PyResult<()> {
        self.engine.set_decay_increase(db_per_s).map_err(to_py_err)
    }

    pub fn set_decay_decrease(&mut self, db_per_s: f64) -> PyResult<()> {
        self.engine.set_decay_decrease(db_per_s).map_err(to_py_err)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.engine.set_looping(looping);
    }

    /// Set the live meter's window length, overlap and history (seconds).
    /// Only valid while stopped.
    pub fn set_measurement(&mut self, interval_s: f64, overlap: f64, max_history_s: f64) -> PyResult<()> {
        let measurement = MeasurementConfig::from_values(interval_s, overlap, max_history_s)
            .map_err(|err| to_py_err(err.into()))?;
        self.engine.set_measurement(measurement).map_err(to_py_err)
    }
}

impl Default for PyAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}
