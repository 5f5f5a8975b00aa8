//! Oversampling accumulator.
//!
//! Sums one reading per channel per tick until the window is full, then
//! yields one averaged sample per channel. A full window must be drained
//! before anything else is accumulated.

use heapless::Vec;

use crate::config::{SamplerConfig, MAX_CHANNELS, MAX_WINDOW};
use crate::error::{AccumulateError, ConfigError, DrainError};
use crate::Sample;

/// How a window's sum is turned into an average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rounding {
    /// `floor(sum / window)`, bit-exact with the legacy output.
    #[default]
    Truncate,
    /// Round half up. Removes the downward bias of truncation but no longer
    /// matches legacy recordings.
    Nearest,
}

/// Averages of one completed window, in channel order.
pub type Averages = Vec<Sample, MAX_CHANNELS>;

#[derive(Debug, Clone)]
pub struct Accumulator {
    sums: [u32; MAX_CHANNELS],
    channels: usize,
    window: u32,
    ticks: u32,
    /// bit per channel already added in the open tick
    staged: u32,
    rounding: Rounding,
}

impl Accumulator {
    /// Fails on an empty window or a shape the fixed-size sums cannot hold.
    pub fn new(channels: usize, window: u32, rounding: Rounding) -> Result<Self, ConfigError> {
        if channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if channels > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels {
                requested: channels,
                max: MAX_CHANNELS,
            });
        }
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if window > MAX_WINDOW {
            return Err(ConfigError::WindowTooLarge { window, max: MAX_WINDOW });
        }
        Ok(Self {
            sums: [0; MAX_CHANNELS],
            channels,
            window,
            ticks: 0,
            staged: 0,
            rounding,
        })
    }

    pub fn from_config(config: &SamplerConfig) -> Result<Self, ConfigError> {
        Self::new(config.channels(), config.window(), config.rounding())
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Completed ticks in the current window.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn is_window_complete(&self) -> bool {
        self.ticks == self.window
    }

    /// Adds one channel's reading to the open tick.
    ///
    /// The tick counter only advances on [`commit_tick`](Self::commit_tick),
    /// once every channel has been staged.
    pub fn accumulate_channel(&mut self, channel: usize, sample: Sample) -> Result<(), AccumulateError> {
        if self.is_window_complete() {
            return Err(AccumulateError::WindowFull);
        }
        if channel >= self.channels {
            return Err(AccumulateError::ChannelOutOfRange {
                channel,
                channels: self.channels,
            });
        }
        let bit = 1u32 << channel;
        if self.staged & bit != 0 {
            return Err(AccumulateError::ChannelAlreadyStaged { channel });
        }
        self.sums[channel] += u32::from(sample);
        self.staged |= bit;
        Ok(())
    }

    /// Closes the open tick. Every channel must have been staged.
    pub fn commit_tick(&mut self) -> Result<(), AccumulateError> {
        let staged = self.staged.count_ones() as usize;
        if staged != self.channels {
            return Err(AccumulateError::IncompleteTick {
                staged,
                channels: self.channels,
            });
        }
        self.staged = 0;
        self.ticks += 1;
        Ok(())
    }

    /// Adds a full tick: one sample per channel, in channel order.
    pub fn accumulate(&mut self, samples: &[Sample]) -> Result<(), AccumulateError> {
        if self.is_window_complete() {
            return Err(AccumulateError::WindowFull);
        }
        if samples.len() != self.channels {
            return Err(AccumulateError::SampleCountMismatch {
                expected: self.channels,
                got: samples.len(),
            });
        }
        if self.staged != 0 {
            return Err(AccumulateError::ChannelAlreadyStaged {
                channel: self.staged.trailing_zeros() as usize,
            });
        }
        for (sum, &sample) in self.sums.iter_mut().zip(samples) {
            *sum += u32::from(sample);
        }
        self.ticks += 1;
        Ok(())
    }

    /// Averages a completed window and resets for the next one.
    ///
    /// Draining an incomplete window (including draining twice in a row)
    /// is refused and leaves the state untouched.
    pub fn drain(&mut self) -> Result<Averages, DrainError> {
        if !self.is_window_complete() {
            return Err(DrainError::WindowIncomplete {
                ticks: self.ticks,
                window: self.window,
            });
        }
        let window = self.window;
        let mut averages = Averages::new();
        for sum in &mut self.sums[..self.channels] {
            let average = match self.rounding {
                Rounding::Truncate => *sum / window,
                Rounding::Nearest => (*sum + window / 2) / window,
            };
            // capacity is MAX_CHANNELS and channels <= MAX_CHANNELS
            let _ = averages.push(average as Sample);
            *sum = 0;
        }
        self.ticks = 0;
        Ok(averages)
    }

    /// Throws away a partial window.
    pub fn reset(&mut self) {
        self.sums = [0; MAX_CHANNELS];
        self.ticks = 0;
        self.staged = 0;
    }
}
