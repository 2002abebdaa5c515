use std::time::Duration;

use crate::Result;
use crate::config::SamplerConfiguration;
use crate::params::{AcquisitionRequest, ConversionTimeout, FullScale, Gain, GainVector};
use crate::sequencer::{BurstSequencer, RawSampleBuffer};
use crate::pgia::GainControl;
use crate::decode::Samples;
use crate::sys::{RegisterBus, SpiBus};
use crate::sys::sim::{Frontend, LoopbackPgia, SimulatedSampler};
use crate::timeline::Timeline;

/// Sampler ADC with burst acquisition.
///
/// Owns the burst sequencer and the PGIA gain control of one board. Board selection, EEPROM
/// and GPIO access are handled elsewhere and must happen before gain accesses.
#[derive(Debug)]
pub struct Sampler<B: RegisterBus, S: SpiBus> {
    sequencer: BurstSequencer<B>,
    pgia: GainControl<S>,
    full_scale: FullScale,
}

impl Sampler<SimulatedSampler, LoopbackPgia> {
    /// A Sampler backed by the cycle-level device model, with amplifiers initially at `gains`.
    pub fn simulated(config: &SamplerConfiguration, frontend: Frontend, gains: GainVector)
            -> Sampler<SimulatedSampler, LoopbackPgia> {
        let bus = SimulatedSampler::new(config.channel, frontend);
        Sampler::new(config, bus, LoopbackPgia::new(gains))
    }
}

impl<B: RegisterBus, S: SpiBus> Sampler<B, S> {
    pub fn new(config: &SamplerConfiguration, bus: B, pgia_bus: S) -> Sampler<B, S> {
        log::debug!("new sampler: {:?}", config);
        Sampler {
            sequencer: BurstSequencer::new(bus, config.channel),
            pgia: GainControl::new(pgia_bus, config.div, config.gains),
            full_scale: config.full_scale,
        }
    }

    pub fn sequencer(&self) -> &BurstSequencer<B> {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut BurstSequencer<B> {
        &mut self.sequencer
    }

    pub fn pgia(&self) -> &GainControl<S> {
        &self.pgia
    }

    pub fn buffer(&self) -> &RawSampleBuffer {
        self.sequencer.buffer()
    }

    /// Set up the PGIA SPI master.
    pub fn init(&mut self) -> Result<()> {
        self.pgia.init()
    }

    /// Move `timeline` safely ahead of the device counter.
    pub fn break_realtime(&self, timeline: &mut Timeline) {
        timeline.break_realtime(self.sequencer.bus().counter_mu())
    }

    pub fn prepare(&mut self, timeline: &mut Timeline, sample_count: usize, period: Duration)
            -> Result<AcquisitionRequest> {
        self.sequencer.prepare(timeline, sample_count, period)
    }

    pub fn trigger(&mut self, timeline: &mut Timeline) -> Result<()> {
        self.sequencer.trigger(timeline)
    }

    /// Acquire a burst of samples. Advances `timeline` by three coarse periods.
    pub fn sample(&mut self, timeline: &mut Timeline, sample_count: usize, period: Duration)
            -> Result<AcquisitionRequest> {
        self.sequencer.sample(timeline, sample_count, period)
    }

    pub fn sample_mu(&mut self, timeline: &mut Timeline, samples: u16, conv_timeout: ConversionTimeout)
            -> Result<()> {
        self.sequencer.sample_mu(timeline, samples, conv_timeout)
    }

    pub fn transfer(&mut self) -> Result<()> {
        self.sequencer.transfer()
    }

    /// Decode the last transfer.
    ///
    /// Codes are scaled with the gains held *now*, not the gains in effect when the burst was
    /// acquired. Change gains only between `decode` and the next `sample`.
    pub fn decode(&self) -> Samples {
        self.sequencer.decode(self.pgia.gains(), self.full_scale)
    }

    /// Transfer and decode the last burst. `sample` must have been called first.
    pub fn get_samples(&mut self) -> Result<Samples> {
        self.transfer()?;
        Ok(self.decode())
    }

    pub fn set_gain_mu(&mut self, channel: usize, gain_mu: u8) -> Result<()> {
        self.pgia.set_channel_gain(channel, gain_mu)
    }

    pub fn set_gain(&mut self, channel: usize, gain: Gain) -> Result<()> {
        self.pgia.set_gain(channel, gain)
    }

    pub fn get_gains_mu(&mut self) -> Result<GainVector> {
        self.pgia.read_gains()
    }

    pub fn gains(&self) -> GainVector {
        self.pgia.gains()
    }
}
