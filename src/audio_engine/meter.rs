//! Loudness meter assembled from the K-weighting filter, the window
//! accumulator and the energy ring.
//!
//! The meter is split at the render/control boundary:
//! - [`MeterFrontEnd`] filters and windows blocks on the render path.
//! - [`MeterHistory`] keeps the energy ring and gates on the control path.
//!
//! [`LoudnessMeter`] joins both halves for single-threaded use, e.g. offline
//! analysis or tests.

use crate::audio_engine::config::{ChannelWeights, MeasurementConfig, StreamFormat};
use crate::audio_engine::constants::MAX_CHANNELS;
use crate::audio_engine::energy_ring::{EnergyRecord, EnergyRing, EnergySnapshot};
use crate::audio_engine::errors::{BlockError, ConfigError};
use crate::audio_engine::gating::{GatedLoudness, GatingReport, gate};
use crate::audio_engine::k_weighting::KWeightingFilter;
use crate::audio_engine::window::WindowAccumulator;
use crate::messages::AudioBlock;

/// Checks that `block` carries whole frames of the session's channel count.
pub(crate) fn check_block(format: &StreamFormat, block: &AudioBlock<'_>) -> Result<(), BlockError> {
    if block.channels != format.channels() {
        return Err(BlockError::ChannelMismatch {
            expected: format.channels(),
            actual: block.channels,
        });
    }
    if block.samples.len() % block.channels != 0 {
        return Err(BlockError::PartialFrame {
            samples: block.samples.len(),
            channels: block.channels,
        });
    }
    Ok(())
}

/// Render-side half of a meter.
#[derive(Debug, Clone)]
pub struct MeterFrontEnd {
    filter: KWeightingFilter,
    window: WindowAccumulator,
}

impl MeterFrontEnd {
    pub fn new(format: &StreamFormat, config: &MeasurementConfig) -> Self {
        let geometry = config.geometry(format.sample_rate());
        Self {
            filter: KWeightingFilter::new(format.sample_rate(), format.channels()),
            window: WindowAccumulator::new(geometry, format.channels()),
        }
    }

    /// K-weights an interleaved block and passes each completed window to
    /// `on_record`, together with the number of block frames consumed when
    /// the window closed.
    pub fn process(&mut self, samples: &[f32], mut on_record: impl FnMut(usize, EnergyRecord)) {
        let channels = self.filter.channels();
        let mut filtered = [0.0; MAX_CHANNELS];

        for (index, frame) in samples.chunks_exact(channels).enumerate() {
            for (channel, &x) in frame.iter().enumerate() {
                filtered[channel] = self.filter.process_sample(channel, x);
            }
            if let Some(record) = self.window.push_frame(&filtered[..channels]) {
                on_record(index + 1, record);
            }
        }
    }

    /// Clears filter memory and the partial window.
    pub fn reset(&mut self) {
        self.filter.reset_memory();
        self.window.reset();
    }
}

/// Control-side half of a meter.
#[derive(Debug, Clone)]
pub struct MeterHistory {
    ring: EnergyRing,
    weights: ChannelWeights,
}

impl MeterHistory {
    pub fn new(format: &StreamFormat, config: &MeasurementConfig, weights: ChannelWeights) -> Self {
        let geometry = config.geometry(format.sample_rate());
        Self {
            ring: EnergyRing::new(geometry.capacity),
            weights,
        }
    }

    pub fn push(&mut self, record: EnergyRecord) {
        self.ring.push(record);
    }

    pub fn snapshot(&self) -> EnergySnapshot {
        self.ring.snapshot()
    }

    /// Gates a snapshot of the current history.
    pub fn evaluate(&self) -> GatingReport {
        gate(&self.ring.snapshot(), &self.weights)
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Single-threaded gated loudness meter.
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    format: StreamFormat,
    front: MeterFrontEnd,
    history: MeterHistory,
}

impl LoudnessMeter {
    pub fn new(
        format: StreamFormat,
        config: MeasurementConfig,
        weights: ChannelWeights,
    ) -> Result<Self, ConfigError> {
        weights.validate_for(format.channels())?;

        Ok(Self {
            format,
            front: MeterFrontEnd::new(&format, &config),
            history: MeterHistory::new(&format, &config, weights),
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Measures one block. Returns the number of windows it completed.
    ///
    /// A block with the wrong layout is rejected without touching any state.
    pub fn process(&mut self, block: AudioBlock<'_>) -> Result<usize, BlockError> {
        check_block(&self.format, &block)?;

        let history = &mut self.history;
        let mut completed = 0;
        self.front.process(block.samples, |_, record| {
            history.push(record);
            completed += 1;
        });
        Ok(completed)
    }

    pub fn gated_loudness(&self) -> GatedLoudness {
        self.history.evaluate().loudness
    }

    pub fn report(&self) -> GatingReport {
        self.history.evaluate()
    }

    pub fn history(&self) -> &MeterHistory {
        &self.history
    }

    /// Clears ring contents and filter memory; configuration is kept.
    pub fn reset(&mut self) {
        self.front.reset();
        self.history.clear();
    }
}
