//! Transport handoff.
//!
//! The serial transport is fire-and-forget: a write either takes bytes right
//! now or reports `WouldBlock`. [`Handoff`] decides what happens to a frame
//! that does not fit, without ever waiting on the host.

use crate::config::SamplerConfig;

/// Non-blocking byte sink, e.g. a USB CDC endpoint or a UART FIFO.
pub trait TransportSink {
    type Error: core::fmt::Debug;

    /// Writes a prefix of `bytes` and returns its length, or `WouldBlock`
    /// if nothing can be accepted right now.
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error>;

    /// Bytes that can be written without blocking, if the sink knows.
    fn writable(&self) -> Option<usize> {
        None
    }
}

impl<K: TransportSink + ?Sized> TransportSink for &mut K {
    type Error = K::Error;

    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, Self::Error> {
        (**self).write(bytes)
    }

    fn writable(&self) -> Option<usize> {
        (**self).writable()
    }
}

/// What to do with a frame the sink cannot take in full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandoffPolicy {
    /// Drop the frame if it cannot start; finish a started frame within the
    /// completion budget.
    #[default]
    DropWhole,
    /// One write, keep whatever was accepted. A cut frame corrupts the
    /// packet around it on the host side.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DropReason {
    /// The sink reported less free space than the frame needs.
    NoRoom,
    WouldBlock,
    SinkError,
}

/// Fate of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    Sent,
    Dropped(DropReason),
    /// Only the first `written` bytes went out.
    Truncated { written: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Handoff {
    policy: HandoffPolicy,
    completion_budget: u16,
}

impl Handoff {
    pub fn new(policy: HandoffPolicy, completion_budget: u16) -> Self {
        Self {
            policy,
            completion_budget,
        }
    }

    pub fn from_config(config: &SamplerConfig) -> Self {
        Self::new(config.handoff(), config.completion_budget())
    }

    pub fn policy(&self) -> HandoffPolicy {
        self.policy
    }

    /// Hands `frame` to `sink`. Never retries a frame that did not start.
    pub fn send<K: TransportSink>(&self, sink: &mut K, frame: &[u8]) -> SendOutcome {
        if self.policy == HandoffPolicy::DropWhole {
            if let Some(free) = sink.writable() {
                if free < frame.len() {
                    return SendOutcome::Dropped(DropReason::NoRoom);
                }
            }
        }

        let mut written = match sink.write(frame) {
            Ok(0) | Err(nb::Error::WouldBlock) => return SendOutcome::Dropped(DropReason::WouldBlock),
            Ok(n) => n.min(frame.len()),
            Err(nb::Error::Other(_)) => return SendOutcome::Dropped(DropReason::SinkError),
        };

        if self.policy == HandoffPolicy::Truncate {
            return if written == frame.len() {
                SendOutcome::Sent
            } else {
                SendOutcome::Truncated { written }
            };
        }

        let mut stalls = 0;
        while written < frame.len() {
            match sink.write(&frame[written..]) {
                Ok(0) | Err(nb::Error::WouldBlock) => {
                    stalls += 1;
                    if stalls > self.completion_budget {
                        return SendOutcome::Truncated { written };
                    }
                }
                Ok(n) => written += n.min(frame.len() - written),
                Err(nb::Error::Other(_)) => return SendOutcome::Truncated { written },
            }
        }
        SendOutcome::Sent
    }
}
