//! Poll cadence and the staggered batch of reads issued each cycle.

use std::collections::VecDeque;
use std::time::Duration;

use at_domain::AddressTable;
use tokio::time::Instant;

/// A read scheduled to be sent at `at`, tagged with the connection
/// generation and cycle that scheduled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRead {
    pub at: Instant,
    pub key: String,
    pub address: u32,
    pub generation: u64,
    pub cycle: u64,
}

#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    stagger: Duration,
    next_tick: Option<Instant>,
    cycle: u64,
    batch: VecDeque<ScheduledRead>,
}

impl PollScheduler {
    pub fn new(interval: Duration, stagger: Duration) -> Self {
        Self {
            interval,
            stagger,
            next_tick: None,
            cycle: 0,
            batch: VecDeque::new(),
        }
    }

    /// Start the cadence with the first tick at `first_tick`.
    pub fn start(&mut self, first_tick: Instant) {
        self.next_tick = Some(first_tick);
    }

    /// Stop the cadence and drop every read that has not fired yet.
    pub fn stop(&mut self) {
        self.next_tick = None;
        self.batch.clear();
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Earliest instant at which the scheduler has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        let read = self.batch.front().map(|r| r.at);
        match (self.next_tick, read) {
            (Some(t), Some(r)) => Some(t.min(r)),
            (t, r) => t.or(r),
        }
    }

    pub fn tick_due(&self, now: Instant) -> bool {
        self.next_tick.is_some_and(|t| t <= now)
    }

    /// Begin a new cycle at `now`: replace any unfired reads of the previous
    /// cycle with one read per table entry at `index × stagger`, and schedule
    /// the following tick. Returns the new cycle number.
    pub fn begin_cycle(&mut self, now: Instant, table: &AddressTable, generation: u64) -> u64 {
        self.cycle += 1;
        self.batch.clear();
        let mut at = now;
        for (key, address) in table.iter() {
            self.batch.push_back(ScheduledRead {
                at,
                key: key.to_string(),
                address,
                generation,
                cycle: self.cycle,
            });
            at += self.stagger;
        }
        self.next_tick = Some(now + self.interval);
        self.cycle
    }

    /// Pop the next read whose send time has come.
    pub fn pop_due(&mut self, now: Instant) -> Option<ScheduledRead> {
        if self.batch.front().is_some_and(|r| r.at <= now) {
            self.batch.pop_front()
        } else {
            None
        }
    }
}
