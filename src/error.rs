//! Error types for the acquisition pipeline.
//!
//! Configuration errors are fatal and surface before the main loop starts.
//! Everything that can go wrong at runtime (slow channels, a busy transport,
//! late ticks) is absorbed by the pipeline and only shows up in its counters.

use thiserror::Error;

/// Rejected sampler configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("at least one channel is required")]
    NoChannels,

    #[error("{requested} channels requested, at most {max} supported")]
    TooManyChannels { requested: usize, max: usize },

    #[error("channel source provides {available} channels, config expects {configured}")]
    ChannelCountMismatch { configured: usize, available: usize },

    #[error("packet rate must be non-zero")]
    ZeroPacketRate,

    #[error("tick rate of {rate_hz} Hz is faster than the 1 us clock resolution")]
    RateTooHigh { rate_hz: u32 },

    #[error("ADC resolution must be at least one bit")]
    ZeroResolution,

    /// A full-scale reading at this width would equal the packet sentinel.
    #[error("{bits}-bit samples can collide with the 0xFFFF sentinel")]
    SentinelReachable { bits: u8 },

    #[error("oversample rate {oversample_hz} Hz is below packet rate {packet_hz} Hz")]
    OversampleBelowPacketRate { oversample_hz: u32, packet_hz: u32 },

    #[error("oversample rate {oversample_hz} Hz is not a multiple of packet rate {packet_hz} Hz")]
    FractionalWindow { oversample_hz: u32, packet_hz: u32 },

    #[error("oversampling window must be at least one tick")]
    ZeroWindow,

    #[error("oversampling window of {window} ticks exceeds the maximum of {max}")]
    WindowTooLarge { window: u32, max: u32 },

    #[error("channel poll budget must be non-zero")]
    ZeroPollBudget,
}

/// Misuse of the oversampling accumulator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccumulateError {
    /// The window is complete and has to be drained first.
    #[error("accumulation window is full")]
    WindowFull,

    #[error("channel {channel} out of range for {channels} channels")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("channel {channel} already has a sample in this tick")]
    ChannelAlreadyStaged { channel: usize },

    #[error("tick committed with {staged} of {channels} channels")]
    IncompleteTick { staged: usize, channels: usize },

    #[error("expected {expected} samples, got {got}")]
    SampleCountMismatch { expected: usize, got: usize },
}

/// Draining a window that is not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrainError {
    #[error("window holds {ticks} of {window} ticks")]
    WindowIncomplete { ticks: u32, window: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    #[error("expected {expected} samples, got {got}")]
    SampleCountMismatch { expected: usize, got: usize },

    #[error("layout needs {needed} channels, packet has {channels}")]
    LayoutNeedsChannels { needed: usize, channels: usize },
}

/// Failure to assemble a [`Pipeline`](crate::Pipeline).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("packet layout: {0}")]
    Packet(#[from] PacketError),
}
