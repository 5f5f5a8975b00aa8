//! Pipeline driver.
//!
//! One [`Pipeline`] owns every piece of per-device state: the channel set,
//! the optional accumulator, the packet buffer and the counters. The main
//! loop passes it ticks; each tick runs to completion before the next one is
//! looked at.
//!
//! ```text
//!            +--------------------------------------------+
//!            v                                            |
//!  Idle -> Acquiring -> Accumulating (window open) -------+
//!                  \          | (window complete)         |
//!                   \         v                           |
//!                    +---> Building -> Sending -----------+
//! ```

use crate::accumulator::{Accumulator, Averages};
use crate::cadence::{CadenceSource, Clock, Tick};
use crate::config::{SamplerConfig, MAX_CHANNELS};
use crate::error::PipelineError;
use crate::packet::{PacketBuilder, PacketLayout, TickStamp};
use crate::sink::{Handoff, SendOutcome, TransportSink};
use crate::source::{ChannelSet, ChannelSource};
use crate::Sample;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    #[default]
    Idle,
    Acquiring,
    Accumulating,
    Building,
    Sending,
}

/// Running totals since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineStats {
    pub ticks: u32,
    /// Ticks the cadence dropped because the pipeline was still busy.
    pub missed_ticks: u32,
    pub packets_sent: u32,
    pub packets_dropped: u32,
    pub packets_truncated: u32,
    pub channel_faults: u32,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub tick: Tick,
    /// Channels that fell back this tick.
    pub faults: u32,
    /// `None` while an oversampling window is still filling.
    pub packet: Option<SendOutcome>,
}

pub struct Pipeline<S, L> {
    channels: ChannelSet<S>,
    accumulator: Option<Accumulator>,
    builder: PacketBuilder<L>,
    handoff: Handoff,
    state: PipelineState,
    stats: PipelineStats,
    raw: [Sample; MAX_CHANNELS],
    last_fire_us: Option<u64>,
    last_busy_us: u64,
}

impl<S: ChannelSource, L: PacketLayout> Pipeline<S, L> {
    pub fn new(config: &SamplerConfig, source: S, layout: L) -> Result<Self, PipelineError> {
        let config = config.validate()?;
        let channels = ChannelSet::new(source, &config)?;
        let builder = PacketBuilder::new(layout, &config)?;
        let accumulator = if config.is_oversampling() {
            Some(Accumulator::from_config(&config)?)
        } else {
            None
        };
        info!(
            "sampler: {} channels, {} Hz packets, window {}, {} byte frames",
            config.channels(),
            config.packet_rate_hz(),
            config.window(),
            config.frame_len()
        );
        Ok(Self {
            channels,
            accumulator,
            builder,
            handoff: Handoff::from_config(&config),
            state: PipelineState::Idle,
            stats: PipelineStats::default(),
            raw: [0; MAX_CHANNELS],
            last_fire_us: None,
            last_busy_us: 0,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.accumulator.as_ref()
    }

    pub fn channel_set(&self) -> &ChannelSet<S> {
        &self.channels
    }

    pub fn channel_set_mut(&mut self) -> &mut ChannelSet<S> {
        &mut self.channels
    }

    pub fn builder(&self) -> &PacketBuilder<L> {
        &self.builder
    }

    /// Main-loop body: polls `cadence` and, if a tick is due, runs it.
    pub fn service<C, T, K>(&mut self, cadence: &mut C, clock: &mut T, sink: &mut K) -> Option<TickReport>
    where
        C: CadenceSource,
        T: Clock,
        K: TransportSink,
    {
        let started = clock.now_us();
        let tick = cadence.poll(started)?;
        let report = self.on_tick(tick, sink);
        self.last_busy_us = clock.now_us().saturating_sub(started);
        Some(report)
    }

    /// Runs one tick end to end: acquire, accumulate or build, send.
    pub fn on_tick<K: TransportSink>(&mut self, tick: Tick, sink: &mut K) -> TickReport {
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        if tick.missed > 0 {
            self.stats.missed_ticks = self.stats.missed_ticks.wrapping_add(tick.missed);
            debug!("{} ticks dropped before tick {}", tick.missed, tick.seq);
        }

        let stamp = TickStamp {
            fired_at_us: tick.at_us,
            since_last_us: self.last_fire_us.map_or(0, |last| tick.at_us.saturating_sub(last)),
            last_busy_us: self.last_busy_us,
        };
        self.last_fire_us = Some(tick.at_us);

        self.state = PipelineState::Acquiring;
        let n = self.channels.len();
        let faults = self.channels.acquire(&mut self.raw[..n]);
        self.stats.channel_faults = self.stats.channel_faults.wrapping_add(faults);

        let mut report = TickReport {
            tick,
            faults,
            packet: None,
        };

        let averages: Averages;
        let samples: &[Sample] = match self.accumulator.as_mut() {
            None => &self.raw[..n],
            Some(acc) => {
                self.state = PipelineState::Accumulating;
                if let Err(e) = acc.accumulate(&self.raw[..n]) {
                    error!("accumulator rejected tick {}: {}", tick.seq, e);
                    acc.reset();
                    self.state = PipelineState::Idle;
                    return report;
                }
                match acc.drain() {
                    Ok(drained) => averages = drained,
                    // window still filling
                    Err(_) => {
                        self.state = PipelineState::Idle;
                        return report;
                    }
                }
                &averages
            }
        };

        self.state = PipelineState::Building;
        let frame = match self.builder.build(samples, &stamp) {
            Ok(frame) => frame,
            Err(e) => {
                error!("packet build failed on tick {}: {}", tick.seq, e);
                self.state = PipelineState::Idle;
                return report;
            }
        };

        self.state = PipelineState::Sending;
        let outcome = self.handoff.send(sink, frame);
        match outcome {
            SendOutcome::Sent => self.stats.packets_sent = self.stats.packets_sent.wrapping_add(1),
            SendOutcome::Dropped(reason) => {
                self.stats.packets_dropped = self.stats.packets_dropped.wrapping_add(1);
                debug!("packet dropped on tick {}: {}", tick.seq, reason);
            }
            SendOutcome::Truncated { written } => {
                self.stats.packets_truncated = self.stats.packets_truncated.wrapping_add(1);
                debug!("packet truncated to {} bytes on tick {}", written, tick.seq);
            }
        }
        report.packet = Some(outcome);
        self.state = PipelineState::Idle;
        report
    }
}
