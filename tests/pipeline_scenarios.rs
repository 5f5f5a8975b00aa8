mod common;

use std::cell::Cell;

use adc_sampler::{
    CadenceSource, Deadline, DecodeEvent, DropReason, FlagCadence, FrameDecoder, HandoffPolicy, Pipeline,
    PipelineState, ReadyFlag, SamplerConfig, SendOutcome, Telemetry, Tick, TimingDiagnostics,
};
use common::{RecordingSink, RowSource};

fn tick(seq: u32) -> Tick {
    Tick {
        seq,
        at_us: u64::from(seq) * 1_000,
        missed: 0,
    }
}

#[test]
fn six_channels_twelve_bit_reference_packet() {
    let config = SamplerConfig::new(6, 2048).with_resolution(12).validate().unwrap();
    let source = RowSource::new(vec![vec![100, 200, 300, 400, 500, 4095]]);
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut sink = RecordingSink::default();

    let report = pipeline.on_tick(tick(1), &mut sink);

    assert_eq!(report.packet, Some(SendOutcome::Sent));
    assert_eq!(
        sink.bytes,
        [0x64, 0x00, 0xC8, 0x00, 0x2C, 0x01, 0x90, 0x01, 0xF4, 0x01, 0xFF, 0x0F, 0xFF, 0xFF]
    );
}

#[test]
fn oversampled_packet_only_after_window_completes() {
    let config = SamplerConfig::new(2, 1000).with_oversampling(3000).validate().unwrap();
    let source = RowSource::new(vec![vec![10, 20], vec![20, 30], vec![30, 10]]);
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut sink = RecordingSink::default();

    assert_eq!(pipeline.on_tick(tick(1), &mut sink).packet, None);
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(pipeline.on_tick(tick(2), &mut sink).packet, None);
    assert!(sink.bytes.is_empty());
    assert_eq!(sink.writes, 0);

    assert_eq!(pipeline.on_tick(tick(3), &mut sink).packet, Some(SendOutcome::Sent));
    assert_eq!(sink.bytes, [20, 0, 20, 0, 0xFF, 0xFF]);
    assert_eq!(pipeline.accumulator().unwrap().ticks(), 0);
}

#[test]
fn blocked_transport_drops_packet_and_moves_on() {
    let config = SamplerConfig::new(2, 1000).validate().unwrap();
    let source = RowSource::new(vec![vec![1, 2], vec![3, 4]]);
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut sink = RecordingSink {
        blocked: true,
        ..Default::default()
    };

    let report = pipeline.on_tick(tick(1), &mut sink);
    assert_eq!(report.packet, Some(SendOutcome::Dropped(DropReason::WouldBlock)));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(sink.writes, 1, "a refused packet must not be retried");

    sink.blocked = false;
    let report = pipeline.on_tick(tick(2), &mut sink);
    assert_eq!(report.packet, Some(SendOutcome::Sent));
    assert_eq!(sink.bytes, [3, 0, 4, 0, 0xFF, 0xFF]);

    let stats = pipeline.stats();
    assert_eq!((stats.packets_sent, stats.packets_dropped), (1, 1));
}

#[test]
fn truncate_policy_reports_partial_frames() {
    struct Narrow(Vec<u8>);
    impl adc_sampler::TransportSink for Narrow {
        type Error = ();
        fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, ()> {
            let n = bytes.len().min(4);
            self.0.extend_from_slice(&bytes[..n]);
            Ok(n)
        }
    }

    let config = SamplerConfig::new(3, 1000)
        .with_handoff(HandoffPolicy::Truncate, 0)
        .validate()
        .unwrap();
    let source = RowSource::new(vec![vec![1, 2, 3]]);
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut sink = Narrow(Vec::new());

    let report = pipeline.on_tick(tick(1), &mut sink);
    assert_eq!(report.packet, Some(SendOutcome::Truncated { written: 4 }));
    assert_eq!(pipeline.stats().packets_truncated, 1);
}

#[test]
fn decoder_recovers_every_streamed_packet() {
    let config = SamplerConfig::new(3, 1000).validate().unwrap();
    let rows = vec![vec![1, 2, 3], vec![4095, 0, 17], vec![8, 9, 10]];
    let source = RowSource::new(rows.clone());
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut sink = RecordingSink::default();
    for seq in 1..=3 {
        pipeline.on_tick(tick(seq), &mut sink);
    }

    // join two bytes into the stream, as a host opening the port late would
    let mut decoder = FrameDecoder::new(3).unwrap();
    let events: Vec<_> = decoder.decode(&sink.bytes[2..]).collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], DecodeEvent::Resync { discarded: 2 });
    for (event, row) in events[1..].iter().zip(&rows[1..]) {
        match event {
            DecodeEvent::Packet(words) => assert_eq!(words.as_slice(), row.as_slice()),
            other => panic!("expected packet, got {other:?}"),
        }
    }
}

#[test]
fn deadline_cadence_without_load_fires_every_period() {
    const PERIOD: u32 = 250;
    const TICKS: u64 = 40;

    let clock = Cell::new(0u64);
    let mut now = || clock.get();
    let config = SamplerConfig::new(1, 4000).validate().unwrap();
    assert_eq!(config.tick_period_us(), PERIOD);
    let mut pipeline = Pipeline::new(&config, RowSource::new(vec![vec![1]]), Telemetry).unwrap();
    let mut cadence = Deadline::from_config(&config, 0);
    let mut sink = RecordingSink::default();

    let mut fired = Vec::new();
    for t in 0..=TICKS * u64::from(PERIOD) {
        clock.set(t);
        if let Some(report) = pipeline.service(&mut cadence, &mut now, &mut sink) {
            fired.push(report.tick.at_us);
        }
    }

    assert_eq!(fired.len() as u64, TICKS);
    assert!(fired.windows(2).all(|w| w[1] - w[0] >= u64::from(PERIOD)));
    assert_eq!(pipeline.stats().missed_ticks, 0);
    assert_eq!(pipeline.stats().packets_sent as u64, TICKS);
}

#[test]
fn deadline_cadence_under_overload_drops_instead_of_queuing() {
    const PERIOD: u64 = 100;
    const COST: u64 = 250;

    let clock = Cell::new(0u64);
    let source = RowSource::new(vec![vec![1, 2]]).with_cost(&clock, COST);
    let config = SamplerConfig::new(2, 10_000).validate().unwrap();
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let mut cadence = Deadline::new(PERIOD as u32, 0);
    let mut sink = RecordingSink::default();
    let mut now = || clock.get();

    let mut fired = Vec::new();
    let mut t = 0;
    while t < 10_000 {
        clock.set(t);
        if let Some(report) = pipeline.service(&mut cadence, &mut now, &mut sink) {
            fired.push(report.tick.at_us);
        }
        t = clock.get() + 1;
    }

    let stats = *pipeline.stats();
    assert!(stats.missed_ticks > 0);
    // each deadline either fired or was counted as dropped, exactly once
    assert_eq!(
        u64::from(stats.ticks + stats.missed_ticks + 1) * PERIOD,
        cadence.next_deadline_us()
    );
    // no catch-up bursts: every tick starts after the previous one finished
    assert!(fired.windows(2).all(|w| w[1] - w[0] > COST));
    assert_eq!(cadence.period_us() as u64, PERIOD);
}

#[test]
fn timer_flag_cadence_counts_overruns() {
    const PERIOD: u64 = 100;
    const COST: u64 = 250;

    let clock = Cell::new(0u64);
    let source = RowSource::new(vec![vec![5]]).with_cost(&clock, COST);
    let config = SamplerConfig::new(1, 10_000).validate().unwrap();
    let mut pipeline = Pipeline::new(&config, source, Telemetry).unwrap();
    let flag = ReadyFlag::new();
    let mut cadence = FlagCadence::new(&flag, PERIOD as u32);
    let mut sink = RecordingSink::default();
    let mut now = || clock.get();

    let mut irqs = 0u32;
    let mut next_irq = PERIOD;
    let mut t = 0;
    while t < 10_000 {
        // timer interrupts that came due while the loop was busy
        while next_irq <= t {
            flag.signal();
            irqs += 1;
            next_irq += PERIOD;
        }
        clock.set(t);
        pipeline.service(&mut cadence, &mut now, &mut sink);
        t = clock.get() + 1;
    }

    let pending = u32::from(flag.take());
    let stats = pipeline.stats();
    assert!(flag.overruns() > 0);
    assert!(stats.missed_ticks > 0 && stats.missed_ticks <= flag.overruns());
    assert_eq!(stats.ticks + pending + flag.overruns(), irqs);
}

#[test]
fn timer_flag_cadence_without_load_never_overruns() {
    let clock = Cell::new(0u64);
    let config = SamplerConfig::new(1, 1000).validate().unwrap();
    let mut pipeline = Pipeline::new(&config, RowSource::new(vec![vec![5]]), Telemetry).unwrap();
    let flag = ReadyFlag::new();
    let mut cadence = FlagCadence::new(&flag, config.tick_period_us());
    let mut sink = RecordingSink::default();
    let mut now = || clock.get();

    for irq in 1..=25u64 {
        clock.set(irq * 1000);
        flag.signal();
        assert!(pipeline.service(&mut cadence, &mut now, &mut sink).is_some());
        assert!(pipeline.service(&mut cadence, &mut now, &mut sink).is_none());
    }
    assert_eq!(flag.overruns(), 0);
    assert_eq!(pipeline.stats().ticks, 25);
}

#[test]
fn timing_diagnostics_layout_reports_tick_spacing() {
    let clock = Cell::new(0u64);
    let source = RowSource::new(vec![vec![7, 8, 9]]).with_cost(&clock, 12);
    let config = SamplerConfig::new(3, 5000).validate().unwrap();
    let mut pipeline = Pipeline::new(&config, source, TimingDiagnostics).unwrap();
    let mut cadence = Deadline::from_config(&config, 0);
    let mut sink = RecordingSink::default();
    let mut now = || clock.get();

    for t in [200, 400] {
        clock.set(t);
        pipeline.service(&mut cadence, &mut now, &mut sink).unwrap();
    }

    // first packet: no previous tick yet
    assert_eq!(&sink.bytes[..8], &[0, 0, 0, 0, 9, 0, 0xFF, 0xFF]);
    // second: 200 us since the first, which took 12 us
    assert_eq!(&sink.bytes[8..], &[200, 0, 12, 0, 9, 0, 0xFF, 0xFF]);
}
