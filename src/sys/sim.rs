//! Cycle-level model of a Sampler: burst controller, ADC serializer and PGIA shift register.
//!
//! The model is lazy. Writes are queued with their timestamps, and the device clock only
//! advances when the host waits for input, so a whole burst runs inside `read`.

use std::collections::VecDeque;
use std::fmt;

use crate::{Error, Result};
use crate::controller::{BurstController, BurstState};
use crate::params::{CHANNELS, MAX_SAMPLES, MIN_PERIOD, REF_PERIOD_MU, WORDS_PER_SAMPLE, GainVector};
use crate::regs::burst::{rtio_channel, Register};
use crate::regs::spi::SpiConfig;

/// Input FIFO depth, in words: a full burst rounded up to a power of two.
pub const FIFO_DEPTH: usize = (MAX_SAMPLES * WORDS_PER_SAMPLE).next_power_of_two();

/// Cycles the controller spends per sample outside of waiting for the ADC: the start strobe,
/// the completion cycle, and one cycle per multiplex word.
const CONTROLLER_OVERHEAD_CYCLES: u64 = 2 + WORDS_PER_SAMPLE as u64;

/// Cycles from the conversion strobe to valid ADC data, chosen so that back-to-back samples
/// take exactly `MIN_PERIOD`.
const ADC_LATENCY_CYCLES: u64 =
    MIN_PERIOD.as_nanos() as u64 / REF_PERIOD_MU - CONTROLLER_OVERHEAD_CYCLES;

pub type Frontend = Box<dyn FnMut(u64) -> [i16; CHANNELS] + Send>;

/// Default analog frontend: channel `n` reads `1000 * n + index` on conversion `index`.
pub fn ramp_frontend() -> Frontend {
    Box::new(|index| {
        let mut codes = [0; CHANNELS];
        for (channel, code) in codes.iter_mut().enumerate() {
            *code = (channel as i64 * 1000 + index as i64) as i16;
        }
        codes
    })
}

struct AdcSerializer {
    latency: u64,
    remaining: Option<u64>,
    conversions: u64,
    frontend: Frontend,
}

impl AdcSerializer {
    fn start(&mut self) {
        self.remaining = Some(self.latency)
    }

    fn tick(&mut self) -> Option<[i16; CHANNELS]> {
        match self.remaining {
            Some(0) => {
                self.remaining = None;
                let codes = (self.frontend)(self.conversions);
                self.conversions += 1;
                Some(codes)
            }
            Some(remaining) => {
                self.remaining = Some(remaining - 1);
                None
            }
            None => None
        }
    }
}

pub struct SimulatedSampler {
    channel: u32,
    cycle: u64,
    controller: BurstController,
    adc: AdcSerializer,
    pending: VecDeque<(u64, Register, u16)>,
    fifo: VecDeque<u32>,
    overflow: bool,
    conversion_starts: Vec<u64>,
    wait_cycles: u64,
}

impl fmt::Debug for SimulatedSampler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SimulatedSampler")
            .field("channel", &self.channel)
            .field("cycle", &self.cycle)
            .field("state", &self.controller.state())
            .field("pending", &self.pending.len())
            .field("fifo", &self.fifo.len())
            .finish_non_exhaustive()
    }
}

impl SimulatedSampler {
    pub fn new(channel: u32, frontend: Frontend) -> SimulatedSampler {
        SimulatedSampler {
            channel,
            cycle: 0,
            controller: BurstController::new(),
            adc: AdcSerializer {
                latency: ADC_LATENCY_CYCLES,
                remaining: None,
                conversions: 0,
                frontend,
            },
            pending: VecDeque::new(),
            fifo: VecDeque::new(),
            overflow: false,
            conversion_starts: Vec::new(),
            wait_cycles: 0,
        }
    }

    pub fn state(&self) -> BurstState {
        self.controller.state()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Cycles at which the ADC start strobe was asserted, oldest first.
    pub fn conversion_starts(&self) -> &[u64] {
        &self.conversion_starts
    }

    /// Total number of cycles the controller has spent in `BurstState::ConversionWait`.
    pub fn wait_cycles(&self) -> u64 {
        self.wait_cycles
    }

    /// Words pushed by the controller and not yet read.
    pub fn pending_words(&self) -> usize {
        self.fifo.len()
    }

    fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.controller.is_quiescent()
    }

    fn tick(&mut self) {
        let state = self.controller.state();
        let conversion = self.adc.tick();
        let outputs = self.controller.step(conversion);
        if state == BurstState::ConversionWait {
            self.wait_cycles += 1;
        }
        if outputs.adc_start {
            self.adc.start();
            self.conversion_starts.push(self.cycle);
        }
        if let Some(word) = outputs.word {
            log::trace!("cycle {}: input {:#010x}", self.cycle, word);
            if self.fifo.len() == FIFO_DEPTH {
                self.overflow = true;
            } else {
                self.fifo.push_back(word);
            }
        }
        while let Some(&(cycle, register, data)) = self.pending.front() {
            if cycle != self.cycle { break }
            self.controller.write(register, data);
            self.pending.pop_front();
        }
        self.cycle += 1;
    }

    /// Run the device until every scheduled write has been applied and the controller is idle.
    pub fn settle(&mut self) {
        while !self.is_quiescent() {
            self.tick()
        }
    }
}

impl super::RegisterBus for SimulatedSampler {
    fn write(&mut self, timestamp_mu: u64, address: u32, data: u32) -> Result<()> {
        log::trace!("write({} mu, {:#x}, {:#x})", timestamp_mu, address, data);
        let cycle = timestamp_mu / REF_PERIOD_MU;
        if cycle < self.cycle {
            return Err(Error::Underflow { timestamp_mu, counter_mu: self.counter_mu() })
        }
        if rtio_channel(address) != self.channel {
            log::trace!("write to channel {} ignored", rtio_channel(address));
            return Ok(())
        }
        match Register::decode(address) {
            Some(register) => {
                let index = self.pending.partition_point(|&(pending, _, _)| pending <= cycle);
                self.pending.insert(index, (cycle, register, data as u16));
            }
            None => log::trace!("write to address {:#x} not latched", address),
        }
        Ok(())
    }

    fn read(&mut self, channel: u32) -> Result<u32> {
        if channel != self.channel {
            return Err(Error::Other(format!("channel {} has no input", channel).into()))
        }
        loop {
            if std::mem::take(&mut self.overflow) {
                return Err(Error::Overflow)
            }
            if let Some(word) = self.fifo.pop_front() {
                return Ok(word)
            }
            if self.is_quiescent() {
                // real hardware would block here forever
                return Err(Error::ProtocolDesync { expected: 1, drained: 0 })
            }
            self.tick();
        }
    }

    fn counter_mu(&self) -> u64 {
        self.cycle * REF_PERIOD_MU
    }
}

/// Ideal PGIA shift register with MISO looped back from its output.
#[derive(Debug, Clone, Default)]
pub struct LoopbackPgia {
    config: Option<SpiConfig>,
    length: u8,
    register: u16,
    input: VecDeque<u32>,
}

impl LoopbackPgia {
    pub fn new(register: GainVector) -> LoopbackPgia {
        LoopbackPgia { register: register.mu(), ..Default::default() }
    }

    /// Gains currently applied by the amplifiers.
    pub fn gains(&self) -> GainVector {
        GainVector::from_mu(self.register)
    }
}

impl super::SpiBus for LoopbackPgia {
    fn set_config_mu(&mut self, flags: SpiConfig, length: u8, div: u8, cs: u8) -> Result<()> {
        log::trace!("set_config_mu({:?}, {}, {}, {})", flags, length, div, cs);
        if length == 0 || length > 32 {
            return Err(Error::Other(format!("invalid SPI transfer length {}", length).into()))
        }
        self.config = Some(flags);
        self.length = length;
        Ok(())
    }

    fn write(&mut self, data: u32) -> Result<()> {
        let Some(config) = self.config else {
            return Err(Error::Other("SPI master not configured".into()))
        };
        let shifted_out = self.register;
        self.register = (data >> (32 - self.length as u32)) as u16;
        log::trace!("pgia: {:#06x} -> {:#06x}", shifted_out, self.register);
        if config.contains(SpiConfig::Input) {
            self.input.push_back(shifted_out as u32);
        }
        Ok(())
    }

    fn read(&mut self) -> Result<u32> {
        self.input.pop_front().ok_or(Error::ProtocolDesync { expected: 1, drained: 0 })
    }
}
