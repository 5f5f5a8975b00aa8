//! Packet layout and wire encoding.
//!
//! A packet is N little-endian `u16` words followed by the `0xFFFF`
//! sentinel. There is no length prefix and no escaping, so the sentinel is
//! the only thing a host can resynchronise on:
//!
//! ```text
//! | ch0 lo | ch0 hi | ch1 lo | ch1 hi | ... | ch(N-1) hi | 0xFF | 0xFF |
//! ```
//!
//! Sample words never reach `0xFFFF` because resolutions of 16 bits are
//! refused by [`Resolution`].

use crate::config::{Resolution, SamplerConfig, MAX_CHANNELS};
use crate::error::PacketError;
use crate::Sample;

/// Packet terminator.
pub const SENTINEL: Sample = 0xFFFF;

/// Words in the largest packet, sentinel included.
pub const MAX_WORDS: usize = MAX_CHANNELS + 1;

/// Bytes in the largest packet, sentinel included.
pub const MAX_FRAME_BYTES: usize = MAX_WORDS * core::mem::size_of::<Sample>();

/// Timing of the tick a packet is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickStamp {
    /// Monotonic time the cadence fired.
    pub fired_at_us: u64,
    /// Time since the previous tick fired; 0 on the first tick.
    pub since_last_us: u64,
    /// Time the previous tick spent acquiring, building and sending.
    pub last_busy_us: u64,
}

/// Decides what goes into the N sample words of a packet.
pub trait PacketLayout {
    /// Smallest channel count the layout can fill.
    fn min_channels(&self) -> usize {
        1
    }

    /// Fills `words` (exactly N long) from one sample per channel.
    fn compose(&mut self, samples: &[Sample], stamp: &TickStamp, resolution: Resolution, words: &mut [Sample]);
}

/// Channel samples, verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry;

impl PacketLayout for Telemetry {
    fn compose(&mut self, samples: &[Sample], _stamp: &TickStamp, _resolution: Resolution, words: &mut [Sample]) {
        words.copy_from_slice(samples);
    }
}

/// Timing probe: word 0 carries the microseconds since the previous tick and
/// word 1 the microseconds the previous tick's work took, both clamped to the
/// resolution's full scale. The remaining words are channel samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingDiagnostics;

impl PacketLayout for TimingDiagnostics {
    fn min_channels(&self) -> usize {
        2
    }

    fn compose(&mut self, samples: &[Sample], stamp: &TickStamp, resolution: Resolution, words: &mut [Sample]) {
        let clamp = |us: u64| us.min(u64::from(resolution.max_value())) as Sample;
        words.copy_from_slice(samples);
        words[0] = clamp(stamp.since_last_us);
        words[1] = clamp(stamp.last_busy_us);
    }
}

/// Owns the single packet buffer and re-fills it every build.
#[derive(Debug)]
pub struct PacketBuilder<L> {
    layout: L,
    channels: usize,
    resolution: Resolution,
    words: [Sample; MAX_WORDS],
    bytes: [u8; MAX_FRAME_BYTES],
}

impl<L: PacketLayout> PacketBuilder<L> {
    /// `config` is expected to be validated.
    pub fn new(layout: L, config: &SamplerConfig) -> Result<Self, PacketError> {
        let channels = config.channels();
        let needed = layout.min_channels();
        if channels < needed {
            return Err(PacketError::LayoutNeedsChannels { needed, channels });
        }
        let mut builder = Self {
            layout,
            channels,
            resolution: config.resolution(),
            words: [0; MAX_WORDS],
            bytes: [0; MAX_FRAME_BYTES],
        };
        builder.words[channels] = SENTINEL;
        builder.encode();
        Ok(builder)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frame size in bytes, sentinel included.
    pub fn frame_len(&self) -> usize {
        (self.channels + 1) * core::mem::size_of::<Sample>()
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Lays `samples` out in channel order, terminates with the sentinel and
    /// returns the encoded frame.
    pub fn build(&mut self, samples: &[Sample], stamp: &TickStamp) -> Result<&[u8], PacketError> {
        let n = self.channels;
        if samples.len() != n {
            return Err(PacketError::SampleCountMismatch {
                expected: n,
                got: samples.len(),
            });
        }
        // the layout only ever sees words[..n]
        self.layout.compose(samples, stamp, self.resolution, &mut self.words[..n]);
        self.words[n] = SENTINEL;
        debug_assert!(!self.words[..n].contains(&SENTINEL));
        self.encode();
        Ok(self.frame())
    }

    /// Words of the last built packet, sentinel included.
    pub fn words(&self) -> &[Sample] {
        &self.words[..=self.channels]
    }

    /// Encoded bytes of the last built packet.
    pub fn frame(&self) -> &[u8] {
        &self.bytes[..self.frame_len()]
    }

    fn encode(&mut self) {
        let len = self.channels + 1;
        for (chunk, word) in self.bytes.chunks_exact_mut(2).zip(&self.words[..len]) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_channel_frame_bytes() {
        let config = SamplerConfig::new(6, 2048).validate().unwrap();
        let mut builder = PacketBuilder::new(Telemetry, &config).unwrap();
        let frame = builder
            .build(&[100, 200, 300, 400, 500, 4095], &TickStamp::default())
            .unwrap();
        assert_eq!(
            frame,
            &[0x64, 0x00, 0xC8, 0x00, 0x2C, 0x01, 0x90, 0x01, 0xF4, 0x01, 0xFF, 0x0F, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_sentinel_present_before_first_build() {
        let config = SamplerConfig::new(2, 100).validate().unwrap();
        let builder = PacketBuilder::new(Telemetry, &config).unwrap();
        assert_eq!(builder.words(), &[0, 0, SENTINEL]);
        assert_eq!(builder.frame(), &[0, 0, 0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_buffer_reuse_overwrites_previous_packet() {
        let config = SamplerConfig::new(3, 100).validate().unwrap();
        let mut builder = PacketBuilder::new(Telemetry, &config).unwrap();
        builder.build(&[1, 2, 3], &TickStamp::default()).unwrap();
        builder.build(&[4, 5, 6], &TickStamp::default()).unwrap();
        assert_eq!(builder.words(), &[4, 5, 6, SENTINEL]);
    }

    #[test]
    fn test_wrong_sample_count() {
        let config = SamplerConfig::new(3, 100).validate().unwrap();
        let mut builder = PacketBuilder::new(Telemetry, &config).unwrap();
        assert_eq!(
            builder.build(&[1, 2], &TickStamp::default()),
            Err(PacketError::SampleCountMismatch { expected: 3, got: 2 })
        );
    }

    #[test]
    fn test_timing_diagnostics_replace_first_two_words() {
        let config = SamplerConfig::new(4, 7000).validate().unwrap();
        let mut builder = PacketBuilder::new(TimingDiagnostics, &config).unwrap();
        let stamp = TickStamp {
            fired_at_us: 10_000,
            since_last_us: 143,
            last_busy_us: 1_000_000,
        };
        builder.build(&[10, 20, 30, 40], &stamp).unwrap();
        assert_eq!(builder.words(), &[143, 4095, 30, 40, SENTINEL]);
    }

    #[test]
    fn test_timing_diagnostics_need_two_channels() {
        let config = SamplerConfig::new(1, 100).validate().unwrap();
        assert_eq!(
            PacketBuilder::new(TimingDiagnostics, &config).unwrap_err(),
            PacketError::LayoutNeedsChannels { needed: 2, channels: 1 }
        );
    }
}
