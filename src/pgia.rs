//! Programmable-gain instrumentation amplifiers.
//!
//! The gains of all eight channels live in one 16-bit shift register on a dedicated SPI bus.
//! The register cannot be read without shifting a new value in, so the host keeps a shadow copy
//! and always shifts out the full word. The shadow starts out as an assumption: the amplifiers
//! keep their state across sessions, but the host does not, until `read_gains` resynchronizes it.

use crate::{RangeError, Result};
use crate::params::{CHANNELS, Gain, GainVector};
use crate::regs::spi::{SpiConfig, CS_PGIA, PGIA_LENGTH};
use crate::sys::SpiBus;

#[derive(Debug)]
pub struct GainControl<S: SpiBus> {
    bus: S,
    div: u8,
    shadow: GainVector,
    synchronized: bool,
}

impl<S: SpiBus> GainControl<S> {
    pub fn new(bus: S, div: u8, assumed: GainVector) -> GainControl<S> {
        GainControl { bus, div, shadow: assumed, synchronized: false }
    }

    pub fn bus(&self) -> &S {
        &self.bus
    }

    /// Host copy of the gain register.
    pub fn gains(&self) -> GainVector {
        self.shadow
    }

    /// Whether the shadow has been read back from, or written in full to, the amplifiers.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    fn set_config(&mut self, flags: SpiConfig) -> Result<()> {
        self.bus.set_config_mu(flags | SpiConfig::End, PGIA_LENGTH, self.div, CS_PGIA)
    }

    fn shift_out(&mut self, gains: GainVector) -> Result<()> {
        self.bus.write((gains.mu() as u32) << (32 - PGIA_LENGTH as u32))
    }

    pub fn init(&mut self) -> Result<()> {
        log::debug!("pgia: init, div = {}", self.div);
        self.set_config(SpiConfig::empty())
    }

    /// Set the gain of `channel` from a raw 2-bit code.
    ///
    /// Only the two low bits of `gain_mu` are used; wider values are truncated, not rejected.
    pub fn set_channel_gain(&mut self, channel: usize, gain_mu: u8) -> Result<()> {
        if channel >= CHANNELS {
            return Err(RangeError::Channel(channel).into())
        }
        if gain_mu > 0b11 {
            log::warn!("pgia: gain {:#b} for channel {} truncated to {:#b}",
                gain_mu, channel, gain_mu & 0b11);
        }
        let gains = self.shadow.with_gain_mu(channel, gain_mu);
        log::debug!("pgia: set channel {} gain to {:?}", channel, Gain::from_mu(gain_mu));
        self.shift_out(gains)?;
        self.shadow = gains;
        self.synchronized = true;
        Ok(())
    }

    pub fn set_gain(&mut self, channel: usize, gain: Gain) -> Result<()> {
        self.set_channel_gain(channel, gain.mu())
    }

    /// Read the gain register back from the amplifiers and refresh the shadow.
    ///
    /// The readback is a full-duplex transfer that shifts the shadow in while the current
    /// contents shift out. If the two differ, the contents read back are written again so that
    /// the amplifiers end up unchanged.
    pub fn read_gains(&mut self) -> Result<GainVector> {
        self.set_config(SpiConfig::Input)?;
        self.shift_out(self.shadow)?;
        self.set_config(SpiConfig::empty())?;
        let gains = GainVector::from_mu((self.bus.read()? & 0xffff) as u16);
        if gains != self.shadow {
            log::debug!("pgia: shadow {:?} was stale, amplifiers at {:?}", self.shadow, gains);
            self.shift_out(gains)?;
        }
        self.shadow = gains;
        self.synchronized = true;
        Ok(gains)
    }
}
