//! Burst acquisition state machine.
//!
//! This is the device side of the burst protocol. It advances one step per coarse clock cycle,
//! drives the ADC conversion strobe, and pushes each converted sample as four multiplex words
//! into the input channel. It is written as a pure transition function over explicit inputs so
//! that it can be stepped without an ADC attached.

use crate::params::{CHANNELS, WORDS_PER_SAMPLE};
use crate::regs::burst::{pack_word, Register};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstState {
    #[default]
    Idle,
    StartAcquire,
    Acquiring,
    Reading,
    ConversionWait,
}

/// Signals asserted by the controller during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outputs {
    /// ADC conversion start strobe.
    pub adc_start: bool,
    /// Input word strobed into the read channel.
    pub word: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct BurstController {
    // configuration registers
    trigger: bool,
    conv_timeout: u16,
    samples: u16,
    // state
    state: BurstState,
    sample_cnt: u16,
    mux_cnt: u8,
    conv_timeout_cnt: u16,
    codes: [i16; CHANNELS],
}

impl BurstController {
    pub fn new() -> BurstController {
        Default::default()
    }

    pub fn state(&self) -> BurstState {
        self.state
    }

    pub fn sample_counter(&self) -> u16 {
        self.sample_cnt
    }

    pub fn mux_counter(&self) -> u8 {
        self.mux_cnt
    }

    pub fn timeout_counter(&self) -> u16 {
        self.conv_timeout_cnt
    }

    /// Idle with no trigger latched; nothing will happen until the next register write.
    pub fn is_quiescent(&self) -> bool {
        self.state == BurstState::Idle && !self.trigger
    }

    /// Latch a register write. Takes effect on the next call to `step`. The trigger register
    /// holds its value for exactly one step.
    pub fn write(&mut self, register: Register, data: u16) {
        match register {
            Register::Trigger           => self.trigger = data != 0,
            Register::ConversionTimeout => self.conv_timeout = data,
            Register::SampleCount       => self.samples = data,
        }
    }

    /// Advance one clock cycle. `conversion` carries the ADC output bank on the cycle the
    /// serializer signals completion, and is `None` otherwise.
    pub fn step(&mut self, conversion: Option<[i16; CHANNELS]>) -> Outputs {
        let trigger = std::mem::take(&mut self.trigger);
        let mut outputs = Outputs::default();
        match self.state {
            BurstState::Idle => {
                // a zero sample count is a burst that is already complete
                if trigger && self.samples != 0 {
                    self.sample_cnt = 0;
                    self.state = BurstState::StartAcquire;
                }
            }
            BurstState::StartAcquire => {
                outputs.adc_start = true;
                self.state = BurstState::Acquiring;
            }
            BurstState::Acquiring => {
                if let Some(codes) = conversion {
                    self.codes = codes;
                    self.mux_cnt = 0;
                    self.state = BurstState::Reading;
                }
            }
            BurstState::Reading => {
                outputs.word = Some(pack_word(&self.codes, self.mux_cnt as usize));
                if self.mux_cnt as usize == WORDS_PER_SAMPLE - 1 {
                    if self.sample_cnt + 1 >= self.samples {
                        self.state = BurstState::Idle;
                    } else if self.conv_timeout == 0 {
                        self.sample_cnt += 1;
                        self.state = BurstState::StartAcquire;
                    } else {
                        self.sample_cnt += 1;
                        self.conv_timeout_cnt = self.conv_timeout;
                        self.state = BurstState::ConversionWait;
                    }
                }
                self.mux_cnt += 1;
            }
            BurstState::ConversionWait => {
                self.conv_timeout_cnt -= 1;
                if self.conv_timeout_cnt == 0 {
                    self.state = BurstState::StartAcquire;
                }
            }
        }
        outputs
    }
}
