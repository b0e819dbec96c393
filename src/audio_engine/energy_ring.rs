//! Fixed-capacity history of per-window energy records.

use crate::audio_engine::config::ChannelWeights;
use crate::audio_engine::constants::MAX_CHANNELS;

/// Per-channel mean square of one measurement window.
///
/// Stored inline so records can cross the render/control boundary without
/// allocating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRecord {
    channels: usize,
    mean_squares: [f64; MAX_CHANNELS],
}

impl EnergyRecord {
    pub fn new(mean_squares: &[f64]) -> Self {
        assert!(
            (1..=MAX_CHANNELS).contains(&mean_squares.len()),
            "energy records hold 1..={MAX_CHANNELS} channels"
        );

        let mut values = [0.0; MAX_CHANNELS];
        values[..mean_squares.len()].copy_from_slice(mean_squares);
        Self {
            channels: mean_squares.len(),
            mean_squares: values,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn mean_squares(&self) -> &[f64] {
        &self.mean_squares[..self.channels]
    }

    /// `Σ Gi · meanSquare_i` over the record's channels.
    pub fn weighted_energy(&self, weights: &ChannelWeights) -> f64 {
        self.mean_squares()
            .iter()
            .enumerate()
            .map(|(channel, ms)| weights.weight(channel) * ms)
            .sum()
    }
}

/// Immutable, chronologically ordered copy of the ring contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergySnapshot {
    records: Vec<EnergyRecord>,
}

impl EnergySnapshot {
    pub fn records(&self) -> &[EnergyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Circular buffer of energy records with oldest-overwrite semantics.
///
/// Capacity is fixed at construction; `push` never reallocates.
#[derive(Debug, Clone)]
pub struct EnergyRing {
    slots: Box<[EnergyRecord]>,
    head: usize,
    len: usize,
}

impl EnergyRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "energy ring needs a non-zero capacity");

        Self {
            slots: vec![EnergyRecord::new(&[0.0]); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a record, overwriting the oldest one when full.
    pub fn push(&mut self, record: EnergyRecord) {
        self.slots[self.head] = record;
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &EnergyRecord> {
        let capacity = self.slots.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).map(move |offset| &self.slots[(start + offset) % capacity])
    }

    /// Copies the valid records out in chronological order.
    pub fn snapshot(&self) -> EnergySnapshot {
        EnergySnapshot {
            records: self.iter().copied().collect(),
        }
    }

    /// Drops every record; capacity is unchanged.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
