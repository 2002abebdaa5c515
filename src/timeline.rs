//! Logical real-time clock.
//!
//! Every bus write carries the timestamp at which it takes effect on the device. The host never
//! sleeps; it schedules writes on the timeline and advances the cursor explicitly. Timestamps are
//! in machine units, 1 mu = 1 ns.

/// Slack added by `break_realtime` so that the next write is safely in the future.
const BREAK_REALTIME_SLACK_MU: u64 = 125_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    now_mu: u64,
    ref_period_mu: u64,
}

impl Timeline {
    pub fn new(ref_period_mu: u64) -> Timeline {
        assert!(ref_period_mu > 0);
        Timeline { now_mu: 0, ref_period_mu }
    }

    pub fn now_mu(&self) -> u64 {
        self.now_mu
    }

    pub fn ref_period_mu(&self) -> u64 {
        self.ref_period_mu
    }

    pub fn at_mu(&mut self, timestamp_mu: u64) {
        self.now_mu = timestamp_mu
    }

    pub fn delay_mu(&mut self, duration_mu: u64) {
        self.now_mu += duration_mu
    }

    /// Advance by one coarse period, the minimum spacing between two writes to one channel.
    pub fn delay_ref_period(&mut self) {
        self.delay_mu(self.ref_period_mu)
    }

    /// Move the cursor ahead of `counter_mu` by a fixed slack, rounded up to a coarse period
    /// boundary. Never moves the cursor backwards.
    pub fn break_realtime(&mut self, counter_mu: u64) {
        let min_now_mu = (counter_mu + BREAK_REALTIME_SLACK_MU).next_multiple_of(self.ref_period_mu);
        if self.now_mu < min_now_mu {
            log::trace!("break_realtime: {} mu -> {} mu", self.now_mu, min_now_mu);
            self.now_mu = min_now_mu
        }
    }
}
