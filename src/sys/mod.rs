use crate::Result;
use crate::regs::spi::SpiConfig;

/// Real-time register bus shared by the burst controller's write and read channels.
pub trait RegisterBus {
    /// Schedule a write of `data` to `address` at `timestamp_mu`. Successive writes to the same
    /// channel must be at least one coarse period apart; this is not checked.
    fn write(&mut self, timestamp_mu: u64, address: u32, data: u32) -> Result<()>;

    /// Block until the device pushes the next input word of `channel`.
    fn read(&mut self, channel: u32) -> Result<u32>;

    /// Current value of the device's timestamp counter.
    fn counter_mu(&self) -> u64;
}

/// SPI master driving the PGIA shift register.
pub trait SpiBus {
    fn set_config_mu(&mut self, flags: SpiConfig, length: u8, div: u8, cs: u8) -> Result<()>;

    /// Shift out the top `length` bits of `data`.
    fn write(&mut self, data: u32) -> Result<()>;

    /// Return the word captured by the last transfer configured with `SpiConfig::Input`.
    fn read(&mut self) -> Result<u32>;
}

pub mod sim;
