//! Acquisition parameters and the constants shared by the host and the burst controller.

use std::fmt;
use std::time::Duration;

use crate::RangeError;

/// Number of ADC channels.
pub const CHANNELS: usize = 8;

/// Number of 32-bit multiplex words per sample (eight 16-bit codes, two per word).
pub const WORDS_PER_SAMPLE: usize = CHANNELS * 16 / 32;

/// Largest burst the controller FIFO can hold.
pub const MAX_SAMPLES: usize = 1024;

const MIN_PERIOD_NS: u64 = 824;
const CONV_TIMEOUT_QUANTUM_NS: u64 = 8;

/// Intrinsic conversion period of the ADC; a burst cannot be sampled faster than this.
pub const MIN_PERIOD: Duration = Duration::from_nanos(MIN_PERIOD_NS);

/// One count of the conversion timeout register.
pub const CONV_TIMEOUT_QUANTUM: Duration = Duration::from_nanos(CONV_TIMEOUT_QUANTUM_NS);

/// Coarse reference period of the real-time system, in machine units (1 mu = 1 ns). The
/// controller runs one cycle per coarse period, which is why it counts timeouts in quanta.
pub const REF_PERIOD_MU: u64 = CONV_TIMEOUT_QUANTUM_NS;

/// Longest period whose conversion timeout still fits into the 16-bit register payload.
pub const MAX_PERIOD: Duration = Duration::from_nanos(
    (u16::MAX as u64 + MIN_PERIOD_NS / CONV_TIMEOUT_QUANTUM_NS + 1) * CONV_TIMEOUT_QUANTUM_NS - 1);

/// Extra idle cycles the burst controller inserts after each conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionTimeout(u16);

impl ConversionTimeout {
    pub fn from_period(period: Duration) -> Result<ConversionTimeout, RangeError> {
        if period < MIN_PERIOD || period > MAX_PERIOD {
            return Err(RangeError::Period(period))
        }
        let period_ns = period.as_nanos() as u64;
        let timeout = period_ns / CONV_TIMEOUT_QUANTUM_NS - MIN_PERIOD_NS / CONV_TIMEOUT_QUANTUM_NS;
        Ok(ConversionTimeout(timeout as u16))
    }

    pub fn from_mu(mu: u16) -> ConversionTimeout {
        ConversionTimeout(mu)
    }

    pub fn mu(self) -> u16 {
        self.0
    }
}

/// A validated burst: `1 ..= MAX_SAMPLES` samples spaced by at least `MIN_PERIOD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionRequest {
    sample_count: usize,
    period: Duration,
    conv_timeout: ConversionTimeout,
}

impl AcquisitionRequest {
    pub fn new(sample_count: usize, period: Duration) -> Result<AcquisitionRequest, RangeError> {
        if sample_count < 1 || sample_count > MAX_SAMPLES {
            return Err(RangeError::SampleCount(sample_count))
        }
        let conv_timeout = ConversionTimeout::from_period(period)?;
        Ok(AcquisitionRequest { sample_count, period, conv_timeout })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn conv_timeout(&self) -> ConversionTimeout {
        self.conv_timeout
    }

    /// Number of multiplex words the controller will push for this request.
    pub fn word_count(&self) -> usize {
        self.sample_count * WORDS_PER_SAMPLE
    }
}

/// Instrumentation amplifier gain of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    #[default]
    X1,
    X10,
    X100,
    X1000,
}

impl Gain {
    pub const ALL: [Gain; 4] = [Gain::X1, Gain::X10, Gain::X100, Gain::X1000];

    /// Only the two low bits of `mu` are significant.
    pub fn from_mu(mu: u8) -> Gain {
        Self::ALL[(mu & 0b11) as usize]
    }

    pub fn mu(self) -> u8 {
        match self {
            Self::X1    => 0b00,
            Self::X10   => 0b01,
            Self::X100  => 0b10,
            Self::X1000 => 0b11,
        }
    }

    pub fn multiplier(self) -> u32 {
        10u32.pow(self.mu() as u32)
    }
}

/// Contents of the PGIA shift register, two bits per channel, channel 0 in the low bits.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct GainVector(u16);

impl fmt::Debug for GainVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GainVector({:#06x} = [", self.0)?;
        for channel in 0..CHANNELS {
            if channel > 0 { write!(f, ", ")? }
            write!(f, "x{}", self.gain(channel).multiplier())?;
        }
        write!(f, "])")
    }
}

impl GainVector {
    pub fn from_mu(mu: u16) -> GainVector {
        GainVector(mu)
    }

    pub fn mu(self) -> u16 {
        self.0
    }

    pub fn gain(self, channel: usize) -> Gain {
        debug_assert!(channel < CHANNELS);
        Gain::from_mu((self.0 >> (channel * 2)) as u8)
    }

    /// Replaces the field of `channel`; bits of `gain_mu` above the field width are dropped.
    pub fn with_gain_mu(self, channel: usize, gain_mu: u8) -> GainVector {
        debug_assert!(channel < CHANNELS);
        let shift = channel * 2;
        let bits = self.0 & !(0b11 << shift) | (((gain_mu & 0b11) as u16) << shift);
        GainVector(bits)
    }

    pub fn with_gain(self, channel: usize, gain: Gain) -> GainVector {
        self.with_gain_mu(channel, gain.mu())
    }
}

/// ADC input span. Hardware revisions up to v2.1 used an uncorrected 20 V reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullScale {
    #[default]
    Corrected,
    Legacy,
}

impl FullScale {
    /// Peak-to-peak input span at unity gain, in volts.
    pub fn volts(self) -> f64 {
        match self {
            Self::Corrected => 20.48,
            Self::Legacy    => 20.0,
        }
    }

    pub fn volts_per_lsb(self, gain: Gain) -> f64 {
        self.volts() / (1 << 16) as f64 / gain.multiplier() as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ref_period_is_timeout_quantum() {
        assert_eq!(Duration::from_nanos(REF_PERIOD_MU), CONV_TIMEOUT_QUANTUM);
        assert_eq!(MIN_PERIOD.as_nanos() as u64 % REF_PERIOD_MU, 0);
    }

    #[test]
    fn test_timeout_at_min_period() {
        assert_eq!(ConversionTimeout::from_period(MIN_PERIOD), Ok(ConversionTimeout(0)));
    }

    #[test]
    fn test_timeout_floors() {
        assert_eq!(ConversionTimeout::from_period(Duration::from_nanos(831)).unwrap().mu(), 0);
        assert_eq!(ConversionTimeout::from_period(Duration::from_nanos(832)).unwrap().mu(), 1);
        assert_eq!(ConversionTimeout::from_period(Duration::from_micros(1)).unwrap().mu(), 22);
    }

    #[test]
    fn test_timeout_bounds() {
        assert_eq!(ConversionTimeout::from_period(MAX_PERIOD).unwrap().mu(), u16::MAX);
        let too_long = MAX_PERIOD + Duration::from_nanos(1);
        assert_eq!(ConversionTimeout::from_period(too_long), Err(RangeError::Period(too_long)));
        let too_short = Duration::from_nanos(823);
        assert_eq!(ConversionTimeout::from_period(too_short), Err(RangeError::Period(too_short)));
    }

    #[test]
    fn test_request_sample_count() {
        assert_eq!(AcquisitionRequest::new(0, MIN_PERIOD), Err(RangeError::SampleCount(0)));
        assert_eq!(AcquisitionRequest::new(1025, MIN_PERIOD), Err(RangeError::SampleCount(1025)));
        let request = AcquisitionRequest::new(1024, MIN_PERIOD).unwrap();
        assert_eq!(request.word_count(), 4096);
        assert_eq!(AcquisitionRequest::new(1, MIN_PERIOD).unwrap().word_count(), 4);
    }

    #[test]
    fn test_gain_codes() {
        assert_eq!(Gain::ALL.map(|gain| gain.multiplier()), [1, 10, 100, 1000]);
        assert_eq!(Gain::from_mu(2), Gain::X100);
        assert_eq!(Gain::from_mu(0b110), Gain::X100);
    }

    #[test]
    fn test_gain_vector_fields() {
        let gains = GainVector::from_mu(0xffff).with_gain(3, Gain::X1);
        assert_eq!(gains.mu(), 0xff3f);
        let gains = GainVector::default().with_gain_mu(7, 0b11);
        assert_eq!(gains.mu(), 0xc000);
        assert_eq!(gains.gain(7), Gain::X1000);
        assert_eq!(gains.gain(6), Gain::X1);
    }

    #[test]
    fn test_gain_vector_masks_wide_values() {
        let gains = GainVector::default().with_gain_mu(0, 0b101);
        assert_eq!(gains.mu(), 0b01);
    }

    #[test]
    fn test_volts_per_lsb() {
        assert_eq!(FullScale::Corrected.volts_per_lsb(Gain::X1), 20.48 / 65536.0);
        assert_eq!(FullScale::Legacy.volts_per_lsb(Gain::X1000), 20.0 / 65536.0 / 1000.0);
    }
}
