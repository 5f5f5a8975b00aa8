//! Static sampler configuration.
//!
//! Everything here is fixed at build time. The builder methods are `const fn`
//! so firmware can declare its configuration as a constant and have
//! [`SamplerConfig::validate`] reject it during compilation:
//!
//! ```
//! use adc_sampler::SamplerConfig;
//!
//! const CONFIG: SamplerConfig = match SamplerConfig::new(6, 1_000)
//!     .with_resolution(12)
//!     .with_oversampling(4_000)
//!     .validate()
//! {
//!     Ok(config) => config,
//!     Err(_) => panic!("invalid sampler configuration"),
//! };
//!
//! assert_eq!(CONFIG.window(), 4);
//! assert_eq!(CONFIG.tick_period_us(), 250);
//! ```

use crate::accumulator::Rounding;
use crate::error::ConfigError;
use crate::sink::HandoffPolicy;
use crate::source::Fallback;
use crate::Sample;

/// Largest channel count a packet can carry.
pub const MAX_CHANNELS: usize = 32;

/// Largest oversampling window. Keeps per-channel `u32` sums from overflowing
/// at the widest accepted resolution.
pub const MAX_WINDOW: u32 = 1 << 16;

const US_PER_SECOND: u32 = 1_000_000;

/// Significant bits of an ADC sample.
///
/// Widths of 16 bits are refused: a full-scale 16-bit reading is `0xFFFF`,
/// which is the packet sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Resolution(u8);

impl Resolution {
    pub const BITS_12: Resolution = Resolution(12);

    pub const fn new(bits: u8) -> Result<Self, ConfigError> {
        if bits == 0 {
            Err(ConfigError::ZeroResolution)
        } else if bits >= 16 {
            Err(ConfigError::SentinelReachable { bits })
        } else {
            Ok(Self(bits))
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Full-scale reading, e.g. 4095 for 12 bits.
    pub const fn max_value(self) -> Sample {
        ((1u32 << self.0) - 1) as Sample
    }

    /// Drops any bits above the resolution.
    pub const fn mask(self, raw: u16) -> Sample {
        raw & self.max_value()
    }
}

/// Build-time configuration of the acquisition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplerConfig {
    channels: usize,
    resolution_bits: u8,
    packet_rate_hz: u32,
    oversample_rate_hz: Option<u32>,
    rounding: Rounding,
    fallback: Fallback,
    poll_budget: u16,
    handoff: HandoffPolicy,
    completion_budget: u16,
}

impl SamplerConfig {
    /// Channel count and packet rate, with 12-bit samples, no oversampling,
    /// truncating averages, zero fallback and whole-packet drop.
    pub const fn new(channels: usize, packet_rate_hz: u32) -> Self {
        Self {
            channels,
            resolution_bits: 12,
            packet_rate_hz,
            oversample_rate_hz: None,
            rounding: Rounding::Truncate,
            fallback: Fallback::Zero,
            poll_budget: 64,
            handoff: HandoffPolicy::DropWhole,
            completion_budget: 8,
        }
    }

    pub const fn with_resolution(mut self, bits: u8) -> Self {
        self.resolution_bits = bits;
        self
    }

    /// Samples every channel at `rate_hz` and averages down to the packet rate.
    pub const fn with_oversampling(mut self, rate_hz: u32) -> Self {
        self.oversample_rate_hz = Some(rate_hz);
        self
    }

    pub const fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub const fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of `WouldBlock` polls a channel read may take before the
    /// fallback value is used.
    pub const fn with_poll_budget(mut self, polls: u16) -> Self {
        self.poll_budget = polls;
        self
    }

    /// Transport backpressure policy and the number of extra polls allowed to
    /// finish a frame the sink already started accepting.
    pub const fn with_handoff(mut self, policy: HandoffPolicy, completion_budget: u16) -> Self {
        self.handoff = policy;
        self.completion_budget = completion_budget;
        self
    }

    pub const fn validate(self) -> Result<Self, ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if self.channels > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels {
                requested: self.channels,
                max: MAX_CHANNELS,
            });
        }
        if self.packet_rate_hz == 0 {
            return Err(ConfigError::ZeroPacketRate);
        }
        if let Err(e) = Resolution::new(self.resolution_bits) {
            return Err(e);
        }
        if let Some(oversample_hz) = self.oversample_rate_hz {
            let packet_hz = self.packet_rate_hz;
            if oversample_hz < packet_hz {
                return Err(ConfigError::OversampleBelowPacketRate { oversample_hz, packet_hz });
            }
            if oversample_hz % packet_hz != 0 {
                return Err(ConfigError::FractionalWindow { oversample_hz, packet_hz });
            }
            let window = oversample_hz / packet_hz;
            if window > MAX_WINDOW {
                return Err(ConfigError::WindowTooLarge { window, max: MAX_WINDOW });
            }
        }
        if self.tick_rate_hz() > US_PER_SECOND {
            return Err(ConfigError::RateTooHigh {
                rate_hz: self.tick_rate_hz(),
            });
        }
        if self.poll_budget == 0 {
            return Err(ConfigError::ZeroPollBudget);
        }
        Ok(self)
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Only meaningful on a validated config.
    pub const fn resolution(&self) -> Resolution {
        Resolution(self.resolution_bits)
    }

    pub const fn packet_rate_hz(&self) -> u32 {
        self.packet_rate_hz
    }

    pub const fn oversample_rate_hz(&self) -> Option<u32> {
        self.oversample_rate_hz
    }

    /// Rate at which the cadence fires: the oversample rate when set.
    pub const fn tick_rate_hz(&self) -> u32 {
        match self.oversample_rate_hz {
            Some(rate) => rate,
            None => self.packet_rate_hz,
        }
    }

    /// Cadence period, truncated to whole microseconds.
    pub const fn tick_period_us(&self) -> u32 {
        US_PER_SECOND / self.tick_rate_hz()
    }

    /// Ticks averaged into each packet; 1 without oversampling.
    pub const fn window(&self) -> u32 {
        match self.oversample_rate_hz {
            Some(rate) => rate / self.packet_rate_hz,
            None => 1,
        }
    }

    pub const fn is_oversampling(&self) -> bool {
        self.window() > 1
    }

    pub const fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub const fn fallback(&self) -> Fallback {
        self.fallback
    }

    pub const fn poll_budget(&self) -> u16 {
        self.poll_budget
    }

    pub const fn handoff(&self) -> HandoffPolicy {
        self.handoff
    }

    pub const fn completion_budget(&self) -> u16 {
        self.completion_budget
    }

    /// Bytes per packet on the wire, sentinel included.
    pub const fn frame_len(&self) -> usize {
        (self.channels + 1) * core::mem::size_of::<Sample>()
    }
}
