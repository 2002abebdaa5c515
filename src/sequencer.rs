//! Host side of the burst protocol.
//!
//! The sequencer schedules the configuration and trigger writes on the real-time timeline and
//! later drains the words the burst controller pushed. The read channel has no framing, so the
//! sequencer must drain exactly as many words as the controller emits; any mismatch leaves the
//! channel permanently misaligned until the device is reset.

use std::time::Duration;

use crate::{Error, RangeError, Result};
use crate::params::{AcquisitionRequest, ConversionTimeout, FullScale, GainVector};
use crate::params::{MAX_SAMPLES, WORDS_PER_SAMPLE};
use crate::regs::burst::Register;
use crate::decode::Samples;
use crate::sys::RegisterBus;
use crate::timeline::Timeline;

/// Words received by the last transfer, in arrival order.
#[derive(Clone)]
pub struct RawSampleBuffer {
    words: Box<[u32]>,
    len: usize,
}

impl std::fmt::Debug for RawSampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "RawSampleBuffer({} words)", self.len)
    }
}

impl Default for RawSampleBuffer {
    fn default() -> Self {
        RawSampleBuffer { words: vec![0; MAX_SAMPLES * WORDS_PER_SAMPLE].into_boxed_slice(), len: 0 }
    }
}

impl RawSampleBuffer {
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.words())
    }
}

#[derive(Debug)]
pub struct BurstSequencer<B: RegisterBus> {
    bus: B,
    channel: u32,
    samples_num: usize,
    buffer: RawSampleBuffer,
}

impl<B: RegisterBus> BurstSequencer<B> {
    pub fn new(bus: B, channel: u32) -> BurstSequencer<B> {
        BurstSequencer { bus, channel, samples_num: 0, buffer: RawSampleBuffer::default() }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Samples requested by the last burst that have not been transferred yet.
    pub fn pending_samples(&self) -> usize {
        self.samples_num
    }

    pub fn buffer(&self) -> &RawSampleBuffer {
        &self.buffer
    }

    fn write(&mut self, timeline: &mut Timeline, register: Register, data: u16) -> Result<()> {
        log::trace!("write {:?} = {:#x} at {} mu", register, data, timeline.now_mu());
        self.bus.write(timeline.now_mu(), register.rtio_address(self.channel), data as u32)?;
        timeline.delay_ref_period();
        Ok(())
    }

    /// Configure the next burst.
    ///
    /// The request is validated before anything is written. Advances the timeline by two
    /// coarse periods. If a write fails, no samples are expected by `transfer`.
    pub fn prepare(&mut self, timeline: &mut Timeline, sample_count: usize, period: Duration)
            -> Result<AcquisitionRequest> {
        let request = AcquisitionRequest::new(sample_count, period)?;
        log::debug!("prepare({}, {:?}): conv_timeout = {}",
            sample_count, period, request.conv_timeout().mu());
        self.samples_num = 0;
        self.write(timeline, Register::ConversionTimeout, request.conv_timeout().mu())?;
        self.write(timeline, Register::SampleCount, request.sample_count() as u16)?;
        self.samples_num = request.sample_count();
        Ok(request)
    }

    /// Start the configured burst. Advances the timeline by one coarse period.
    pub fn trigger(&mut self, timeline: &mut Timeline) -> Result<()> {
        log::debug!("trigger at {} mu", timeline.now_mu());
        self.write(timeline, Register::Trigger, 1)
    }

    /// Acquire a burst of samples. Advances the timeline by three coarse periods.
    pub fn sample(&mut self, timeline: &mut Timeline, sample_count: usize, period: Duration)
            -> Result<AcquisitionRequest> {
        let request = self.prepare(timeline, sample_count, period)?;
        self.trigger(timeline)?;
        Ok(request)
    }

    /// Acquire a burst with raw register values. Only the sample count is checked against the
    /// FIFO size; a sample count of zero leaves the controller idle and nothing will be
    /// available to transfer.
    pub fn sample_mu(&mut self, timeline: &mut Timeline, samples: u16, conv_timeout: ConversionTimeout)
            -> Result<()> {
        if samples as usize > MAX_SAMPLES {
            return Err(RangeError::SampleCount(samples as usize).into())
        }
        log::debug!("sample_mu({}, {})", samples, conv_timeout.mu());
        self.samples_num = 0;
        self.write(timeline, Register::ConversionTimeout, conv_timeout.mu())?;
        self.write(timeline, Register::SampleCount, samples)?;
        self.samples_num = samples as usize;
        self.trigger(timeline)
    }

    /// Drain the words of the last burst into the raw sample buffer.
    pub fn transfer(&mut self) -> Result<()> {
        let expected = self.samples_num * WORDS_PER_SAMPLE;
        log::debug!("transfer: {} words", expected);
        self.buffer.len = 0;
        self.samples_num = 0;
        for index in 0..expected {
            match self.bus.read(self.channel) {
                Ok(word) => {
                    self.buffer.words[index] = word;
                    self.buffer.len = index + 1;
                }
                Err(Error::ProtocolDesync { .. }) =>
                    return Err(Error::ProtocolDesync { expected, drained: index }),
                Err(error) =>
                    return Err(error),
            }
        }
        Ok(())
    }

    /// Decode the raw sample buffer using `gains` as the amplifier state.
    pub fn decode(&self, gains: GainVector, full_scale: FullScale) -> Samples {
        Samples::decode(self.buffer.words(), gains, full_scale)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{MIN_PERIOD, REF_PERIOD_MU};
    use crate::sys::sim::{ramp_frontend, SimulatedSampler};

    #[derive(Debug, Default)]
    struct RecordingBus {
        writes: Vec<(u64, u32, u32)>,
        // number of writes accepted before every further write fails
        fail_after: Option<usize>,
    }

    impl RegisterBus for RecordingBus {
        fn write(&mut self, timestamp_mu: u64, address: u32, data: u32) -> Result<()> {
            if self.fail_after.is_some_and(|limit| self.writes.len() >= limit) {
                return Err(Error::Other("bus write failed".into()))
            }
            self.writes.push((timestamp_mu, address, data));
            Ok(())
        }

        fn read(&mut self, _channel: u32) -> Result<u32> {
            Err(Error::ProtocolDesync { expected: 1, drained: 0 })
        }

        fn counter_mu(&self) -> u64 {
            0
        }
    }

    fn simulated() -> (BurstSequencer<SimulatedSampler>, Timeline) {
        let sim = SimulatedSampler::new(4, ramp_frontend());
        (BurstSequencer::new(sim, 4), Timeline::new(REF_PERIOD_MU))
    }

    #[test]
    fn test_write_schedule() {
        for (sample_count, period) in [(1, MIN_PERIOD), (17, Duration::from_micros(3)), (1024, MIN_PERIOD)] {
            let mut seq = BurstSequencer::new(RecordingBus::default(), 2);
            let mut timeline = Timeline::new(REF_PERIOD_MU);
            timeline.at_mu(1000);
            seq.sample(&mut timeline, sample_count, period).unwrap();
            let timeout = ConversionTimeout::from_period(period).unwrap().mu() as u32;
            assert_eq!(seq.bus().writes, vec![
                (1000, 0x201, timeout),
                (1008, 0x202, sample_count as u32),
                (1016, 0x200, 1),
            ]);
            assert_eq!(timeline.now_mu(), 1024);
        }
    }

    #[test]
    fn test_validation_before_writes() {
        let mut seq = BurstSequencer::new(RecordingBus::default(), 0);
        let mut timeline = Timeline::new(REF_PERIOD_MU);
        assert!(matches!(seq.prepare(&mut timeline, 0, MIN_PERIOD),
            Err(Error::Range(RangeError::SampleCount(0)))));
        assert!(matches!(seq.prepare(&mut timeline, 1025, MIN_PERIOD),
            Err(Error::Range(RangeError::SampleCount(1025)))));
        assert!(matches!(seq.sample(&mut timeline, 10, Duration::from_nanos(800)),
            Err(Error::Range(RangeError::Period(_)))));
        assert!(seq.bus().writes.is_empty());
        assert_eq!(timeline.now_mu(), 0);
        assert_eq!(seq.pending_samples(), 0);
    }

    #[test]
    fn test_minimum_period_burst() {
        let (mut seq, mut timeline) = simulated();
        let request = seq.sample(&mut timeline, 4, MIN_PERIOD).unwrap();
        assert_eq!(request.conv_timeout().mu(), 0);
        seq.transfer().unwrap();
        assert_eq!(seq.buffer().len(), 16);
        assert_eq!(seq.pending_samples(), 0);
        assert_eq!(seq.bus().wait_cycles(), 0);
        let samples = seq.decode(GainVector::default(), FullScale::Corrected);
        for channel in 0..8 {
            let expected = (0..4).map(|index| (channel * 1000 + index) as i16).collect::<Vec<_>>();
            assert_eq!(samples.raw_codes(channel), &expected[..]);
            assert_eq!(samples.voltages(channel).len(), 4);
        }
        // nothing left behind
        assert_eq!(seq.bus().pending_words(), 0);
    }

    #[test]
    fn test_sample_mu() {
        let (mut seq, mut timeline) = simulated();
        seq.sample_mu(&mut timeline, 2, ConversionTimeout::from_mu(10)).unwrap();
        assert_eq!(timeline.now_mu(), 24);
        seq.transfer().unwrap();
        assert_eq!(seq.buffer().len(), 8);
        assert_eq!(seq.bus().wait_cycles(), 10);
    }

    #[test]
    fn test_sample_mu_rejects_oversized_burst() {
        let (mut seq, mut timeline) = simulated();
        let result = seq.sample_mu(&mut timeline, 1100, ConversionTimeout::from_mu(0));
        assert!(matches!(result, Err(Error::Range(RangeError::SampleCount(1100)))));
        assert_eq!(timeline.now_mu(), 0);
        assert_eq!(seq.pending_samples(), 0);
        seq.bus_mut().settle();
        assert!(seq.bus().conversion_starts().is_empty());

        // the channel stays aligned for the next burst
        seq.sample(&mut timeline, 1, MIN_PERIOD).unwrap();
        seq.transfer().unwrap();
        let samples = seq.decode(GainVector::default(), FullScale::Corrected);
        assert_eq!(samples.raw_codes(0), &[0]);
        assert_eq!(seq.bus().pending_words(), 0);
    }

    #[test]
    fn test_sample_mu_full_fifo() {
        let (mut seq, mut timeline) = simulated();
        seq.sample_mu(&mut timeline, MAX_SAMPLES as u16, ConversionTimeout::from_mu(0)).unwrap();
        seq.transfer().unwrap();
        assert_eq!(seq.buffer().len(), MAX_SAMPLES * WORDS_PER_SAMPLE);
        seq.bus_mut().settle();
        assert_eq!(seq.bus().pending_words(), 0);
    }

    #[test]
    fn test_failed_prepare_expects_nothing() {
        let mut seq = BurstSequencer::new(RecordingBus::default(), 0);
        let mut timeline = Timeline::new(REF_PERIOD_MU);
        seq.sample(&mut timeline, 5, MIN_PERIOD).unwrap();
        assert_eq!(seq.pending_samples(), 5);
        seq.bus_mut().fail_after = Some(4);
        assert!(matches!(seq.prepare(&mut timeline, 7, MIN_PERIOD), Err(Error::Other(_))));
        assert_eq!(seq.pending_samples(), 0);
        assert!(seq.transfer().is_ok());
        assert!(seq.buffer().is_empty());
    }

    #[test]
    fn test_transfer_without_burst() {
        let (mut seq, _) = simulated();
        seq.transfer().unwrap();
        assert!(seq.buffer().is_empty());
        assert!(seq.decode(GainVector::default(), FullScale::Corrected).is_empty());
    }

    #[test]
    fn test_overdrain_desyncs() {
        let (mut seq, mut timeline) = simulated();
        seq.sample(&mut timeline, 2, MIN_PERIOD).unwrap();
        // a stray read consumes one word of the burst
        seq.bus_mut().read(4).unwrap();
        let result = seq.transfer();
        assert!(matches!(result, Err(Error::ProtocolDesync { expected: 8, drained: 7 })));
    }

    #[test]
    fn test_short_drain_misaligns_next_burst() {
        let (mut seq, mut timeline) = simulated();
        seq.sample(&mut timeline, 2, MIN_PERIOD).unwrap();
        seq.transfer().unwrap();
        let aligned = seq.decode(GainVector::default(), FullScale::Corrected);
        assert_eq!(aligned.raw_codes(3), &[3000, 3001]);

        // second burst, drained one word short
        timeline.break_realtime(seq.bus().counter_mu());
        seq.sample(&mut timeline, 2, MIN_PERIOD).unwrap();
        for _ in 0..7 {
            seq.bus_mut().read(4).unwrap();
        }
        // third burst picks up the leftover word first
        timeline.break_realtime(seq.bus().counter_mu());
        seq.sample(&mut timeline, 2, MIN_PERIOD).unwrap();
        seq.transfer().unwrap();
        seq.bus_mut().settle();
        let misaligned = seq.decode(GainVector::default(), FullScale::Corrected);
        assert_ne!(misaligned.raw_codes(0), &[4, 5]);
        // channel 0 sees what the hardware sent for channel 6
        assert_eq!(misaligned.raw_codes(0), &[6003, 6004]);
        assert_eq!(seq.bus().pending_words(), 1);
    }

    #[test]
    fn test_decode_uses_gains_at_decode_time() {
        let (mut seq, mut timeline) = simulated();
        seq.sample(&mut timeline, 1, MIN_PERIOD).unwrap();
        seq.transfer().unwrap();
        let unity = seq.decode(GainVector::default(), FullScale::Corrected);
        let amplified = seq.decode(GainVector::from_mu(0xffff), FullScale::Corrected);
        assert_eq!(unity.raw_codes(5), amplified.raw_codes(5));
        assert!((unity.voltages(5)[0] / amplified.voltages(5)[0] - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_as_bytes() {
        let (mut seq, mut timeline) = simulated();
        seq.sample(&mut timeline, 1, MIN_PERIOD).unwrap();
        seq.transfer().unwrap();
        assert_eq!(seq.buffer().as_bytes().len(), 16);
    }
}
