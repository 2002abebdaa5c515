use bitflags::bitflags;

/// Chip select of the PGIA shift register. It is on a dedicated SPI bus, and the chip select
/// line doubles as the shift register's storage clock.
pub const CS_PGIA: u8 = 1;

/// Transfer length of the PGIA shift register, in bits.
pub const PGIA_LENGTH: u8 = 16;

bitflags! {
    /// SPI master configuration word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpiConfig: u32 {
        /// Tristate all outputs.
        const Offline     = 1<<0;
        /// Deassert chip select at the end of this transfer.
        const End         = 1<<1;
        /// Capture MISO into the read FIFO during this transfer.
        const Input       = 1<<2;
        const CsPolarity  = 1<<3;
        const ClkPolarity = 1<<4;
        const ClkPhase    = 1<<5;
        const LsbFirst    = 1<<6;
        const HalfDuplex  = 1<<7;
    }
}
