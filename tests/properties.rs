use adc_sampler::{
    Accumulator, CadenceSource, Deadline, DecodeEvent, DrainError, FrameDecoder, PacketBuilder, Rounding,
    SamplerConfig, Telemetry, TickStamp, MAX_CHANNELS, SENTINEL,
};
use proptest::prelude::*;

/// Channel count, resolution, and one in-range sample per channel.
fn arb_packet() -> impl Strategy<Value = (u8, Vec<u16>)> {
    (1u8..=15, 1usize..=MAX_CHANNELS).prop_flat_map(|(bits, channels)| {
        let max = (1u16 << bits) - 1;
        (Just(bits), prop::collection::vec(0..=max, channels))
    })
}

proptest! {
    #[test]
    fn prop_packet_is_n_plus_one_words_with_trailing_sentinel((bits, samples) in arb_packet()) {
        let n = samples.len();
        let config = SamplerConfig::new(n, 1000).with_resolution(bits).validate().unwrap();
        let mut builder = PacketBuilder::new(Telemetry, &config).unwrap();
        let frame = builder.build(&samples, &TickStamp::default()).unwrap().to_vec();

        prop_assert_eq!(frame.len(), 2 * (n + 1));
        let words = builder.words();
        prop_assert_eq!(words.len(), n + 1);
        prop_assert_eq!(words[n], SENTINEL);
        prop_assert!(words[..n].iter().all(|&w| w != SENTINEL));
        prop_assert_eq!(&words[..n], samples.as_slice());

        // the only sentinel in the frame is the last aligned word
        let sentinels = frame.chunks_exact(2).filter(|c| **c == [0xFF, 0xFF]).count();
        prop_assert_eq!(sentinels, 1);

        let mut decoder = FrameDecoder::new(n).unwrap();
        let events: Vec<_> = decoder.decode(&frame).collect();
        prop_assert_eq!(events.len(), 1);
        match &events[0] {
            DecodeEvent::Packet(decoded) => prop_assert_eq!(decoded.as_slice(), samples.as_slice()),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_drain_is_floor_of_window_mean(
        window in 1u32..=64,
        channels in 1usize..=8,
        seed in prop::collection::vec(0u16..=4095, 8 * 64),
    ) {
        let mut acc = Accumulator::new(channels, window, Rounding::Truncate).unwrap();
        let mut sums = vec![0u32; channels];
        for tick in 0..window as usize {
            let row = &seed[tick * 8..tick * 8 + channels];
            for (sum, &s) in sums.iter_mut().zip(row) {
                *sum += u32::from(s);
            }
            prop_assert!(!acc.is_window_complete());
            acc.accumulate(row).unwrap();
        }
        prop_assert!(acc.is_window_complete());

        let averages = acc.drain().unwrap();
        let expected: Vec<u16> = sums.iter().map(|s| (s / window) as u16).collect();
        prop_assert_eq!(averages.as_slice(), expected.as_slice());
        prop_assert_eq!(acc.ticks(), 0);
        prop_assert_eq!(acc.drain(), Err(DrainError::WindowIncomplete { ticks: 0, window }));
    }

    #[test]
    fn prop_deadline_fires_k_times_at_least_p_apart(period in 1u32..=200, ticks in 1u64..=40) {
        let mut cadence = Deadline::new(period, 0);
        let fired: Vec<u64> = (0..=ticks * u64::from(period))
            .filter_map(|t| cadence.poll(t))
            .map(|tick| tick.at_us)
            .collect();
        prop_assert_eq!(fired.len() as u64, ticks);
        prop_assert!(fired.windows(2).all(|w| w[1] - w[0] >= u64::from(period)));
    }
}
