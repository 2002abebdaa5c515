pub mod burst;
pub mod spi;
