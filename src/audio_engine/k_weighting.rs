//! BS.1770 K-weighting pre-filter.
//!
//! Two cascaded biquads per channel: a high shelf (+4 dB above ~1.7 kHz)
//! followed by the RLB high-pass (~38 Hz). Coefficients are derived for the
//! stream's sample rate with the bilinear transform; at 48 kHz they reproduce
//! the table published in BS.1770.

use std::f64::consts::PI;

use crate::audio_engine::constants::MAX_CHANNELS;

const SHELF_FREQ_HZ: f64 = 1_681.974_450_955_533;
const SHELF_GAIN_DB: f64 = 3.999_843_853_973_347;
const SHELF_Q: f64 = 0.707_175_236_955_419_6;
const SHELF_BANDWIDTH_EXP: f64 = 0.499_666_774_154_541_6;

const HIGH_PASS_FREQ_HZ: f64 = 38.135_470_876_024_44;
const HIGH_PASS_Q: f64 = 0.500_327_037_323_877_3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

fn biquad_process(coeffs: &BiquadCoeffs, state: &mut BiquadState, x: f64) -> f64 {
    let y = coeffs.b0 * x + state.z1;
    state.z1 = coeffs.b1 * x - coeffs.a1 * y + state.z2;
    state.z2 = coeffs.b2 * x - coeffs.a2 * y;
    y
}

fn normalize_biquad(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let inv_a0 = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * inv_a0,
        b1: b1 * inv_a0,
        b2: b2 * inv_a0,
        a1: a1 * inv_a0,
        a2: a2 * inv_a0,
    }
}

/// High-shelf stage of the K-weighting curve.
pub fn high_shelf_coeffs(fs_hz: f64) -> BiquadCoeffs {
    let k = (PI * SHELF_FREQ_HZ / fs_hz).tan();
    let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
    let vb = vh.powf(SHELF_BANDWIDTH_EXP);

    let b0 = vh + vb * k / SHELF_Q + k * k;
    let b1 = 2.0 * (k * k - vh);
    let b2 = vh - vb * k / SHELF_Q + k * k;
    let a0 = 1.0 + k / SHELF_Q + k * k;
    let a1 = 2.0 * (k * k - 1.0);
    let a2 = 1.0 - k / SHELF_Q + k * k;

    normalize_biquad(b0, b1, b2, a0, a1, a2)
}

/// High-pass (RLB) stage of the K-weighting curve.
///
/// The numerator stays `[1, -2, 1]`; only the denominator is normalized, as
/// in the reference coefficients.
pub fn high_pass_coeffs(fs_hz: f64) -> BiquadCoeffs {
    let k = (PI * HIGH_PASS_FREQ_HZ / fs_hz).tan();
    let a0 = 1.0 + k / HIGH_PASS_Q + k * k;

    BiquadCoeffs {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / HIGH_PASS_Q + k * k) / a0,
    }
}

/// Per-channel K-weighting filter over interleaved blocks.
///
/// Filter memory lives in fixed arrays, so processing never allocates.
#[derive(Debug, Clone)]
pub struct KWeightingFilter {
    channels: usize,
    shelf: BiquadCoeffs,
    high_pass: BiquadCoeffs,
    state: [[BiquadState; 2]; MAX_CHANNELS],
}

impl KWeightingFilter {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        assert!(
            (1..=MAX_CHANNELS).contains(&channels),
            "K-weighting supports 1..={MAX_CHANNELS} channels"
        );

        let fs_hz = f64::from(sample_rate);
        Self {
            channels,
            shelf: high_shelf_coeffs(fs_hz),
            high_pass: high_pass_coeffs(fs_hz),
            state: [[BiquadState::default(); 2]; MAX_CHANNELS],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Filters one sample of `channel`.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f64 {
        let [shelf_state, high_pass_state] = &mut self.state[channel];
        let shelved = biquad_process(&self.shelf, shelf_state, f64::from(x));
        biquad_process(&self.high_pass, high_pass_state, shelved)
    }

    /// Filters an interleaved block into `output`.
    ///
    /// Only whole frames present in both slices are processed.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let channels = self.channels;
        for (in_frame, out_frame) in input
            .chunks_exact(channels)
            .zip(output.chunks_exact_mut(channels))
        {
            for (channel, (x, y)) in in_frame.iter().zip(out_frame.iter_mut()).enumerate() {
                *y = self.process_sample(channel, *x) as f32;
            }
        }
    }

    /// Zeroes the memory of every stage of every channel.
    pub fn reset_memory(&mut self) {
        self.state = [[BiquadState::default(); 2]; MAX_CHANNELS];
    }
}
