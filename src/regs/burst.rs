//! Register protocol of the burst controller.
//!
//! The write channel carries a 16-bit payload and a 3-bit register address; the full real-time
//! address is `(channel << 8) | register`. Bit 2 of the register address selects the register
//! group: when clear, the low two bits select one of the write-strobed registers below; when set,
//! the write belongs to the other group and is not latched by the burst controller.
//!
//! The read channel returns one 32-bit multiplex word per read, in FIFO order, with no framing.

use crate::params::CHANNELS;

pub const ADDRESS_WIDTH: u32 = 3;

const GROUP_BIT: u8 = 1 << (ADDRESS_WIDTH - 1);

/// Burst trigger; any non-zero payload starts a burst.
pub const ADDR_TRIGGER: u8 = 0x0;
/// Extra idle cycles after each conversion.
pub const ADDR_CONV_TIMEOUT: u8 = 0x1;
/// Number of samples in the burst.
pub const ADDR_SAMPLES: u8 = 0x2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Trigger,
    ConversionTimeout,
    SampleCount,
}

impl Register {
    pub fn address(self) -> u8 {
        match self {
            Self::Trigger           => ADDR_TRIGGER,
            Self::ConversionTimeout => ADDR_CONV_TIMEOUT,
            Self::SampleCount       => ADDR_SAMPLES,
        }
    }

    /// Decodes the register field of a real-time address, i.e. its low `ADDRESS_WIDTH` bits.
    pub fn decode(address: u32) -> Option<Register> {
        let address = (address & ((1 << ADDRESS_WIDTH) - 1)) as u8;
        if address & GROUP_BIT != 0 {
            return None
        }
        match address {
            ADDR_TRIGGER      => Some(Self::Trigger),
            ADDR_CONV_TIMEOUT => Some(Self::ConversionTimeout),
            ADDR_SAMPLES      => Some(Self::SampleCount),
            _ => None
        }
    }

    pub fn rtio_address(self, channel: u32) -> u32 {
        (channel << 8) | self.address() as u32
    }
}

pub fn rtio_channel(address: u32) -> u32 {
    address >> 8
}

/// Packs channels `2 * index` (low half) and `2 * index + 1` (high half) into one word.
pub fn pack_word(codes: &[i16; CHANNELS], index: usize) -> u32 {
    let low  = codes[index * 2] as u16 as u32;
    let high = codes[index * 2 + 1] as u16 as u32;
    high << 16 | low
}

/// Splits a multiplex word into its (low, high) two's-complement codes.
pub fn unpack_word(word: u32) -> (i16, i16) {
    (word as u16 as i16, (word >> 16) as u16 as i16)
}
