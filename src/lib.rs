//! Timed multi-channel ADC acquisition, framed for a raw serial stream.
//!
//! A cadence source paces the [`Pipeline`]; every tick it reads all channels
//! through a bounded-latency [`ChannelSet`], optionally averages them over an
//! oversampling window, lays them out as little-endian `u16` words closed by
//! the [`SENTINEL`], and offers the frame to a non-blocking
//! [`TransportSink`]. Late ticks and a busy transport cost data, never time.
//!
//! The crate is `no_std` and allocation free. Enable the `defmt` feature to
//! get log output and `defmt::Format` on the public types.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod accumulator;
pub mod cadence;
pub mod config;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod pipeline;
pub mod sink;
pub mod source;

/// One channel reading, raw or averaged.
pub type Sample = u16;

pub use accumulator::{Accumulator, Rounding};
pub use cadence::{CadenceSource, Clock, Deadline, FlagCadence, ReadyFlag, Tick};
pub use config::{Resolution, SamplerConfig, MAX_CHANNELS};
pub use decoder::{DecodeEvent, FrameDecoder};
pub use error::{AccumulateError, ConfigError, DrainError, PacketError, PipelineError};
pub use packet::{PacketBuilder, PacketLayout, Telemetry, TickStamp, TimingDiagnostics, SENTINEL};
pub use pipeline::{Pipeline, PipelineState, PipelineStats, TickReport};
pub use sink::{DropReason, Handoff, HandoffPolicy, SendOutcome, TransportSink};
pub use source::{Chain, ChannelSet, ChannelSource, CounterSource, Fallback, ReadFault};
