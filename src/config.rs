//! High-level configuration of one Sampler in terms of its position in the real-time system.

use crate::params::{FullScale, GainVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfiguration {
    /// Real-time channel of the burst controller. The PGIA SPI master is the next channel.
    pub channel: u32,
    /// SPI clock divider for the PGIA bus.
    pub div: u8,
    /// Assumed initial PGIA shift register contents. The amplifier state is not retained
    /// between sessions, so this is a guess until the gains are read back.
    pub gains: GainVector,
    pub full_scale: FullScale,
}

impl Default for SamplerConfiguration {
    fn default() -> Self {
        Self {
            channel: 0,
            div: 8,
            gains: GainVector::default(),
            full_scale: FullScale::default(),
        }
    }
}
