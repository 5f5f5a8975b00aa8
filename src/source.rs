//! Channel sources.
//!
//! A [`ChannelSource`] is whatever can hand back a raw reading for a channel
//! index: the on-chip ADC, an external converter on I²C, a synthetic
//! generator. Sources follow the `nb` convention of the HAL ADC traits so a
//! conversion that is still running reports `WouldBlock` instead of spinning.
//!
//! [`ChannelSet`] turns a source into the bounded-latency reader the pipeline
//! needs: a channel that does not answer within its poll budget, or that
//! errors, gets a fallback value and the tick carries on.

use crate::config::{Resolution, SamplerConfig, MAX_CHANNELS};
use crate::error::ConfigError;
use crate::Sample;

/// Raw sample provider indexed by logical channel.
pub trait ChannelSource {
    type Error: core::fmt::Debug;

    /// Number of channels, fixed for the lifetime of the source.
    fn channel_count(&self) -> usize;

    /// Reads channel `channel`, which is always `< channel_count()`.
    fn read(&mut self, channel: usize) -> nb::Result<u16, Self::Error>;

    /// Appends `next`'s channels after this source's.
    fn chain<B: ChannelSource>(self, next: B) -> Chain<Self, B>
    where
        Self: Sized,
    {
        Chain::new(self, next)
    }
}

impl<S: ChannelSource + ?Sized> ChannelSource for &mut S {
    type Error = S::Error;

    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, Self::Error> {
        (**self).read(channel)
    }
}

/// Two sources presented as one ordered channel set.
#[derive(Debug)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

/// Error of whichever half of a [`Chain`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChainError<A, B> {
    First(A),
    Second(B),
}

impl<A: ChannelSource, B: ChannelSource> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: ChannelSource, B: ChannelSource> ChannelSource for Chain<A, B> {
    type Error = ChainError<A::Error, B::Error>;

    fn channel_count(&self) -> usize {
        self.first.channel_count() + self.second.channel_count()
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, Self::Error> {
        let split = self.first.channel_count();
        if channel < split {
            self.first.read(channel).map_err(|e| e.map(ChainError::First))
        } else {
            self.second
                .read(channel - split)
                .map_err(|e| e.map(ChainError::Second))
        }
    }
}

/// Value substituted when a channel cannot be read in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fallback {
    #[default]
    Zero,
    /// Repeat the channel's last good reading (zero before the first one).
    LastKnownGood,
}

/// Why a channel read fell back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadFault {
    /// Still `WouldBlock` after the poll budget.
    Timeout,
    /// The peripheral reported an error.
    Peripheral,
}

/// Bounded-latency reader over a [`ChannelSource`].
#[derive(Debug)]
pub struct ChannelSet<S> {
    source: S,
    channels: usize,
    resolution: Resolution,
    fallback: Fallback,
    poll_budget: u16,
    last_good: [Sample; MAX_CHANNELS],
    faults: u32,
}

impl<S: ChannelSource> ChannelSet<S> {
    pub fn new(source: S, config: &SamplerConfig) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let available = source.channel_count();
        if available != config.channels() {
            return Err(ConfigError::ChannelCountMismatch {
                configured: config.channels(),
                available,
            });
        }
        Ok(Self {
            source,
            channels: available,
            resolution: config.resolution(),
            fallback: config.fallback(),
            poll_budget: config.poll_budget(),
            last_good: [0; MAX_CHANNELS],
            faults: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    /// Faults since construction.
    pub fn faults(&self) -> u32 {
        self.faults
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Reads one channel, masked to the configured resolution.
    pub fn read(&mut self, channel: usize) -> Result<Sample, ReadFault> {
        let mut polls = 0;
        loop {
            match self.source.read(channel) {
                Ok(raw) => {
                    let sample = self.resolution.mask(raw);
                    self.last_good[channel] = sample;
                    return Ok(sample);
                }
                Err(nb::Error::WouldBlock) => {
                    polls += 1;
                    if polls >= self.poll_budget {
                        return Err(ReadFault::Timeout);
                    }
                }
                Err(nb::Error::Other(_)) => return Err(ReadFault::Peripheral),
            }
        }
    }

    /// Reads every channel into `out` in layout order, substituting the
    /// fallback value for channels that fault. Returns the fault count.
    pub fn acquire(&mut self, out: &mut [Sample]) -> u32 {
        debug_assert_eq!(out.len(), self.channels);
        let mut faults = 0;
        for (channel, slot) in out.iter_mut().enumerate().take(self.channels) {
            *slot = match self.read(channel) {
                Ok(sample) => sample,
                Err(fault) => {
                    debug!("channel {} read fault: {}", channel, fault);
                    faults += 1;
                    self.fallback_value(channel)
                }
            };
        }
        self.faults = self.faults.wrapping_add(faults);
        faults
    }

    fn fallback_value(&self, channel: usize) -> Sample {
        match self.fallback {
            Fallback::Zero => 0,
            Fallback::LastKnownGood => self.last_good[channel],
        }
    }
}

/// Synthetic source: each read of channel 0 advances a counter, and channel
/// `i` reports `counter + i`, wrapped to the resolution.
///
/// Useful for bring-up: the host can check ordering and count lost packets
/// without any analog front end attached.
#[derive(Debug, Clone)]
pub struct CounterSource {
    channels: usize,
    modulus: u32,
    count: u32,
}

impl CounterSource {
    pub fn new(channels: usize, resolution: Resolution) -> Self {
        Self {
            channels,
            modulus: u32::from(resolution.max_value()) + 1,
            count: 0,
        }
    }
}

impl ChannelSource for CounterSource {
    type Error = core::convert::Infallible;

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, Self::Error> {
        if channel == 0 {
            self.count = (self.count + 1) % self.modulus;
        }
        Ok(((self.count + channel as u32) % self.modulus) as u16)
    }
}
