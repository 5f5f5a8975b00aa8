//! Mock collaborators shared by the integration tests.
#![allow(dead_code)]

use std::cell::Cell;

use adc_sampler::{ChannelSource, TransportSink};

/// Replays one row of raw readings per tick.
pub struct RowSource<'a> {
    rows: Vec<Vec<u16>>,
    row: usize,
    clock: Option<&'a Cell<u64>>,
    cost_us: u64,
}

impl<'a> RowSource<'a> {
    pub fn new(rows: Vec<Vec<u16>>) -> Self {
        Self {
            rows,
            row: 0,
            clock: None,
            cost_us: 0,
        }
    }

    /// Every full acquisition advances `clock` by `cost_us`.
    pub fn with_cost(mut self, clock: &'a Cell<u64>, cost_us: u64) -> Self {
        self.clock = Some(clock);
        self.cost_us = cost_us;
        self
    }
}

impl ChannelSource for RowSource<'_> {
    type Error = ();

    fn channel_count(&self) -> usize {
        self.rows[0].len()
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, ()> {
        let row = &self.rows[self.row % self.rows.len()];
        let value = row[channel];
        if channel == row.len() - 1 {
            self.row += 1;
            if let Some(clock) = self.clock {
                clock.set(clock.get() + self.cost_us);
            }
        }
        Ok(value)
    }
}

/// Sink that records every byte and can be told to refuse writes.
#[derive(Default)]
pub struct RecordingSink {
    pub bytes: Vec<u8>,
    pub writes: usize,
    pub blocked: bool,
}

impl TransportSink for RecordingSink {
    type Error = ();

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, ()> {
        self.writes += 1;
        if self.blocked {
            return Err(nb::Error::WouldBlock);
        }
        self.bytes.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}
