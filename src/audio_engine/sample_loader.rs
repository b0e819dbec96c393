//! Audio file loading.
//!
//! [`decode_audio_file`] reads a file with Symphonia into an interleaved
//! [`SampleBuffer`] at the file's own rate and layout. [`conform_to_format`]
//! then brings it to the output stream's format: channels are mapped first,
//! then the rate is converted with rubato.

use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer,
    codecs::{Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::config::StreamFormat;
use crate::audio_engine::constants::RESAMPLE_CHUNK_FRAMES;
use crate::audio_engine::errors::SampleLoadError;
use crate::messages::SampleBuffer;

/// Decodes an audio file keeping its own rate and channel layout.
///
/// # Errors
///
/// - File not found or cannot be opened
/// - Audio format not recognized or corrupted
/// - Missing sample rate or channel information
pub fn decode_audio_file(path: &Path) -> Result<SampleBuffer, SampleLoadError> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let mut reader = get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?
        .format;

    let track = reader
        .default_track()
        .ok_or(SampleLoadError::NoDefaultTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SampleLoadError::MissingSampleRate)?;
    let channels = track
        .codec_params
        .channels
        .ok_or(SampleLoadError::MissingChannels)?
        .count();
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let samples = read_track(reader.as_mut(), decoder.as_mut(), track_id)?;
    log::debug!(
        "Decoded {} ({} frames, {} ch@{} Hz)",
        path.display(),
        samples.len() / channels.max(1),
        channels,
        sample_rate
    );

    Ok(SampleBuffer::new(channels, sample_rate, samples))
}

/// Interleaved f32 samples of every packet of `track_id` until end of file.
fn read_track(
    reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Vec<f32>, SampleLoadError> {
    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(samples);
            }
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let mut interleaved =
            SymphoniaSampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        interleaved.copy_interleaved_ref(decoded);
        samples.extend_from_slice(interleaved.samples());
    }
}

/// Brings `sample` to the channel count and rate of `format`.
///
/// Returns the buffer untouched when it already matches.
pub fn conform_to_format(
    sample: SampleBuffer,
    format: &StreamFormat,
) -> Result<SampleBuffer, SampleLoadError> {
    let channels = format.channels();
    let sample_rate = format.sample_rate();
    if sample.channels == channels && sample.sample_rate == sample_rate {
        return Ok(sample);
    }

    let mapped = map_channels(&sample.samples, sample.channels, channels)?;
    let resampled = if sample.sample_rate == sample_rate {
        mapped
    } else {
        resample(&mapped, channels, sample.sample_rate, sample_rate)?
    };

    log::info!(
        "Converted source {} ch@{} Hz -> {} ch@{} Hz",
        sample.channels,
        sample.sample_rate,
        channels,
        sample_rate
    );
    Ok(SampleBuffer::new(channels, sample_rate, resampled))
}

/// Maps interleaved frames of `from` channels to `to` channels.
///
/// Mono is copied to every output channel and anything folded to mono is
/// averaged. Other layouts keep their first channels and wrap around when
/// the output has more.
pub fn map_channels(samples: &[f32], from: usize, to: usize) -> Result<Vec<f32>, SampleLoadError> {
    if from == 0 || to == 0 {
        return Err(SampleLoadError::UnsupportedChannels { from, to });
    }
    if from == to {
        return Ok(samples.to_vec());
    }

    let frames = samples.chunks_exact(from);
    let mut out = Vec::with_capacity(frames.len() * to);
    match (from, to) {
        (1, _) => {
            for frame in frames {
                out.extend(std::iter::repeat_n(frame[0], to));
            }
        }
        (_, 1) => {
            let scale = 1.0 / from as f32;
            out.extend(frames.map(|frame| frame.iter().sum::<f32>() * scale));
        }
        _ => {
            for frame in frames {
                out.extend((0..to).map(|channel| frame[channel % from]));
            }
        }
    }
    Ok(out)
}

/// Converts interleaved `samples` from `from_hz` to `to_hz`.
///
/// The output has `round(frames * to_hz / from_hz)` frames and is aligned
/// with the input: the resampler's delay is trimmed off the front.
pub fn resample(
    samples: &[f32],
    channels: usize,
    from_hz: u32,
    to_hz: u32,
) -> Result<Vec<f32>, SampleLoadError> {
    if channels == 0 {
        return Err(SampleLoadError::UnsupportedChannels { from: 0, to: 0 });
    }
    let frames = samples.len() / channels;
    let expected =
        (frames as f64 * f64::from(to_hz) / f64::from(from_hz)).round() as usize;
    if frames == 0 || from_hz == to_hz {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        from_hz as usize,
        to_hz as usize,
        RESAMPLE_CHUNK_FRAMES,
        2,
        channels,
    )?;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| samples.iter().skip(channel).step_by(channels).copied().collect())
        .collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(delay + expected); channels];

    // Past the end of the input the resampler is fed silence until the
    // delayed tail has come out.
    let mut position = 0;
    while output[0].len() < delay + expected {
        let needed = resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|channel| {
                let start = position.min(frames);
                let end = (position + needed).min(frames);
                let mut chunk = channel[start..end].to_vec();
                chunk.resize(needed, 0.0);
                chunk
            })
            .collect();
        position += needed;

        for (out, produced) in output.iter_mut().zip(resampler.process(&chunk[..], None)?) {
            out.extend(produced);
        }
    }

    let mut interleaved = Vec::with_capacity(expected * channels);
    for frame in delay..delay + expected {
        interleaved.extend(output.iter().map(|channel| channel[frame]));
    }
    Ok(interleaved)
}
