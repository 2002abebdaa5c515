mod sys;
mod regs;
mod config;
mod params;
mod timeline;
mod controller;
mod sequencer;
mod pgia;
mod decode;
mod device;

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    SampleCount(usize),
    Period(Duration),
    Channel(usize),
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::SampleCount(count) =>
                write!(f, "sample count {} outside of 1..={}", count, params::MAX_SAMPLES),
            Self::Period(period) =>
                write!(f, "sampling period {:?} outside of {:?}..={:?}",
                    period, params::MIN_PERIOD, params::MAX_PERIOD),
            Self::Channel(channel) =>
                write!(f, "channel {} outside of 0..{}", channel, params::CHANNELS),
        }
    }
}

impl std::error::Error for RangeError {}

#[derive(Debug)]
pub enum Error {
    Range(RangeError),
    ProtocolDesync { expected: usize, drained: usize },
    Underflow { timestamp_mu: u64, counter_mu: u64 },
    Overflow,
    Other(Box<dyn std::error::Error + Sync + Send + 'static>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Range(range_error) =>
                write!(f, "invalid acquisition request: {}", range_error),
            Self::ProtocolDesync { expected, drained } =>
                write!(f, "read channel desynchronized after {} of {} words; device reset required",
                    drained, expected),
            Self::Underflow { timestamp_mu, counter_mu } =>
                write!(f, "write at {} mu scheduled behind device counter at {} mu",
                    timestamp_mu, counter_mu),
            Self::Overflow =>
                write!(f, "input FIFO overflow"),
            Self::Other(error) =>
                write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::Range(ref error) => Some(error),
            &Self::Other(ref error) => Some(error.as_ref()),
            _ => None
        }
    }
}

impl From<RangeError> for Error {
    fn from(error: RangeError) -> Self {
        Error::Range(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::Other(error.into()),
        }
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

pub use config::SamplerConfiguration;

pub use params::{
    CHANNELS,
    WORDS_PER_SAMPLE,
    MAX_SAMPLES,
    MIN_PERIOD,
    MAX_PERIOD,
    CONV_TIMEOUT_QUANTUM,
    REF_PERIOD_MU,
    AcquisitionRequest,
    ConversionTimeout,
    Gain,
    GainVector,
    FullScale,
};

pub use timeline::Timeline;

pub use regs::burst::Register;

pub use regs::spi::SpiConfig;

pub use sys::{RegisterBus, SpiBus};

pub use sys::sim::{SimulatedSampler, LoopbackPgia, Frontend, ramp_frontend, FIFO_DEPTH};

pub use controller::{BurstState, BurstController, Outputs};

pub use sequencer::{BurstSequencer, RawSampleBuffer};

pub use pgia::GainControl;

pub use decode::{decode_code, decode_code_fs, demultiplex, DecodedSample, Samples};

pub use device::Sampler;
