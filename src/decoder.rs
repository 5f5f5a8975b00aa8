//! Receiving side of the wire format.
//!
//! Splits a raw byte stream back into packets by scanning for the sentinel.
//! A receiver that joins mid-stream, or loses bytes, throws away whatever it
//! had buffered and starts clean at the next sentinel.
//!
//! Samples are at most 15 bits wide, so a data word's high byte never
//! reaches `0xFF`. A non-sentinel word with a `0xFF` high byte can only come
//! from reading the stream one byte out of phase.

use heapless::Vec;

use crate::config::MAX_CHANNELS;
use crate::error::ConfigError;
use crate::packet::SENTINEL;
use crate::Sample;

/// Sample words of one decoded packet.
pub type Words = Vec<Sample, MAX_CHANNELS>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A complete packet of exactly N words.
    Packet(Words),
    /// A sentinel closed a run of `discarded` words that was not a packet.
    Resync { discarded: usize },
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    channels: usize,
    words: Words,
    low_byte: Option<u8>,
    /// Words thrown away since framing was lost, `None` while in sync.
    discarding: Option<usize>,
}

impl FrameDecoder {
    pub fn new(channels: usize) -> Result<Self, ConfigError> {
        if channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if channels > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels {
                requested: channels,
                max: MAX_CHANNELS,
            });
        }
        Ok(Self {
            channels,
            words: Words::new(),
            low_byte: None,
            discarding: None,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Feeds one 16-bit word.
    pub fn push_word(&mut self, word: Sample) -> Option<DecodeEvent> {
        if word == SENTINEL {
            if let Some(discarded) = self.discarding.take() {
                return Some(DecodeEvent::Resync { discarded });
            }
            if self.words.len() == self.channels {
                return Some(DecodeEvent::Packet(core::mem::take(&mut self.words)));
            }
            let discarded = self.words.len();
            self.words.clear();
            return Some(DecodeEvent::Resync { discarded });
        }

        if word & 0xFF00 == 0xFF00 || self.words.len() == self.channels {
            // out of phase, or more than N words without a sentinel
            self.lose_framing();
        } else if let Some(discarded) = self.discarding.as_mut() {
            *discarded += 1;
        } else {
            // len < channels <= MAX_CHANNELS
            let _ = self.words.push(word);
        }
        None
    }

    /// Feeds one byte; words are assembled little-endian.
    ///
    /// A `0xFF` landing in the high half of a non-sentinel word means the
    /// byte phase is off by one. That byte is kept as the low half of the
    /// next word, which puts the phase back in line.
    pub fn push_byte(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self.low_byte.take() {
            None => {
                self.low_byte = Some(byte);
                None
            }
            Some(low) if byte == 0xFF && low != 0xFF => {
                self.lose_framing();
                self.low_byte = Some(byte);
                None
            }
            Some(low) => self.push_word(u16::from_le_bytes([low, byte])),
        }
    }

    /// Drops the partial packet and discards up to the next sentinel.
    fn lose_framing(&mut self) {
        let discarded = match self.discarding {
            Some(discarded) => discarded,
            None => self.words.len(),
        };
        self.discarding = Some(discarded + 1);
        self.words.clear();
    }

    /// Decodes a chunk of the stream. Bytes not forming a whole word yet are
    /// kept for the next call.
    pub fn decode<'a>(&'a mut self, bytes: &'a [u8]) -> impl Iterator<Item = DecodeEvent> + 'a {
        bytes.iter().filter_map(move |&b| self.push_byte(b))
    }

    /// Forgets any partial packet, e.g. after the port was reopened.
    pub fn reset(&mut self) {
        self.words.clear();
        self.low_byte = None;
        self.discarding = None;
    }
}
