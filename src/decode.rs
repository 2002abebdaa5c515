//! Conversion of multiplex words into calibrated voltages.

use crate::params::{CHANNELS, FullScale, Gain, GainVector};
use crate::regs::burst::unpack_word;

/// Convert an ADC code to volts at the input of a channel amplified by `gain`.
pub fn decode_code(raw: i16, gain: Gain) -> f64 {
    decode_code_fs(raw, gain, FullScale::Corrected)
}

/// Like `decode_code`, for a specific ADC reference.
pub fn decode_code_fs(raw: i16, gain: Gain, full_scale: FullScale) -> f64 {
    raw as f64 * full_scale.volts_per_lsb(gain)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSample {
    pub channel: usize,
    pub voltage: f64,
    pub raw_code: i16,
}

/// Split `words` into codes in arrival order and assign channels round-robin, starting at 0.
///
/// The channel assignment only depends on the position in `words`; if the words do not start
/// at a sample boundary the result is shifted by the same amount.
pub fn demultiplex<'a>(words: &'a [u32], gains: GainVector, full_scale: FullScale)
        -> impl Iterator<Item = DecodedSample> + 'a {
    words.iter()
        .flat_map(|&word| {
            let (low, high) = unpack_word(word);
            [low, high]
        })
        .enumerate()
        .map(move |(index, raw_code)| {
            let channel = index % CHANNELS;
            DecodedSample {
                channel,
                voltage: decode_code_fs(raw_code, gains.gain(channel), full_scale),
                raw_code,
            }
        })
}

/// Decoded burst, grouped by channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Samples {
    voltages: [Vec<f64>; CHANNELS],
    raw_codes: [Vec<i16>; CHANNELS],
}

impl Samples {
    pub fn decode(words: &[u32], gains: GainVector, full_scale: FullScale) -> Samples {
        let mut samples = Samples::default();
        for sample in demultiplex(words, gains, full_scale) {
            samples.voltages[sample.channel].push(sample.voltage);
            samples.raw_codes[sample.channel].push(sample.raw_code);
        }
        samples
    }

    /// Number of complete samples, i.e. the length of the shortest channel.
    pub fn len(&self) -> usize {
        self.raw_codes.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.raw_codes[0].is_empty()
    }

    pub fn voltages(&self, channel: usize) -> &[f64] {
        &self.voltages[channel]
    }

    pub fn raw_codes(&self, channel: usize) -> &[i16] {
        &self.raw_codes[channel]
    }

    /// Samples of `channel`, oldest first.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = DecodedSample> + '_ {
        self.raw_codes[channel].iter().zip(self.voltages[channel].iter())
            .map(move |(&raw_code, &voltage)| DecodedSample { channel, voltage, raw_code })
    }
}
