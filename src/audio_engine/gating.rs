//! Two-stage BS.1770 gating over a snapshot of energy records.

use crate::audio_engine::config::ChannelWeights;
use crate::audio_engine::constants::{
    ABSOLUTE_GATE_LKFS, ENERGY_FLOOR, LOUDNESS_OFFSET_DB, RELATIVE_GATE_OFFSET_LU,
    SILENCE_FLOOR_LKFS,
};
use crate::audio_engine::energy_ring::EnergySnapshot;

/// Result of one gating evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatedLoudness {
    /// No complete window yet, or nothing left after the relative gate.
    Insufficient,
    /// Every window lies at or below the absolute gate (silence).
    BelowAbsoluteGate,
    /// Gated loudness in LKFS.
    Measured(f64),
}

impl GatedLoudness {
    /// Value for display and telemetry: NaN when there is not enough data,
    /// the silence floor when everything was gated out absolutely.
    pub fn lkfs(self) -> f64 {
        match self {
            Self::Insufficient => f64::NAN,
            Self::BelowAbsoluteGate => SILENCE_FLOOR_LKFS,
            Self::Measured(lkfs) => lkfs,
        }
    }

    /// Loudness usable for control decisions.
    pub fn measured(self) -> Option<f64> {
        match self {
            Self::Measured(lkfs) => Some(lkfs),
            _ => None,
        }
    }
}

/// Gating outcome with the thresholds that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatingReport {
    pub loudness: GatedLoudness,
    /// Relative threshold Γr, when the absolute gate left any record.
    pub relative_threshold: Option<f64>,
    /// Records in the snapshot.
    pub records: usize,
    /// Records surviving both gates.
    pub survivors: usize,
}

/// Converts a weighted mean square to LKFS, flooring zero energy.
#[inline]
pub fn energy_to_lkfs(energy: f64) -> f64 {
    LOUDNESS_OFFSET_DB + 10.0 * energy.max(ENERGY_FLOOR).log10()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Applies the absolute and relative gates to `snapshot`.
///
/// Both stages discard a block when its loudness is less than or equal to
/// the threshold.
pub fn gate(snapshot: &EnergySnapshot, weights: &ChannelWeights) -> GatingReport {
    let records = snapshot.len();
    if records == 0 {
        return GatingReport {
            loudness: GatedLoudness::Insufficient,
            relative_threshold: None,
            records,
            survivors: 0,
        };
    }

    let absolute: Vec<f64> = snapshot
        .records()
        .iter()
        .map(|record| record.weighted_energy(weights))
        .filter(|&energy| energy_to_lkfs(energy) > ABSOLUTE_GATE_LKFS)
        .collect();

    if absolute.is_empty() {
        return GatingReport {
            loudness: GatedLoudness::BelowAbsoluteGate,
            relative_threshold: None,
            records,
            survivors: 0,
        };
    }

    let relative_threshold = energy_to_lkfs(mean(&absolute)) + RELATIVE_GATE_OFFSET_LU;
    let relative: Vec<f64> = absolute
        .into_iter()
        .filter(|&energy| energy_to_lkfs(energy) > relative_threshold)
        .collect();

    let loudness = if relative.is_empty() {
        GatedLoudness::Insufficient
    } else {
        GatedLoudness::Measured(energy_to_lkfs(mean(&relative)))
    };

    GatingReport {
        loudness,
        relative_threshold: Some(relative_threshold),
        records,
        survivors: relative.len(),
    }
}
